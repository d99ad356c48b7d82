//! Optional observability helpers for adapter and lifecycle operations.
//!
//! # Feature Flags
//!
//! - Enable `tracing` (on by default) to emit structured spans named `social_broker.operation`
//!   with the `platform` and `operation` fields, plus retry and invalidation events.
//! - Enable `metrics` to increment the `social_broker_operation_total` counter for every
//!   attempt/success/failure, labeled by `platform` + `operation` + `outcome`, and the
//!   `social_broker_publish_retry_total` counter for every scheduled publish retry.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::{_prelude::*, platform::Platform};

/// Operations observed by the broker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationKind {
	/// Authorization-code exchange.
	Callback,
	/// Publish pipeline.
	Publish,
	/// Refresh exchange.
	Refresh,
	/// Account lookup.
	AccountInfo,
	/// Token validation check.
	Validate,
	/// Token revocation.
	Revoke,
	/// Rate-limit snapshot.
	RateLimits,
	/// Post analytics lookup.
	Analytics,
}
impl OperationKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OperationKind::Callback => "callback",
			OperationKind::Publish => "publish",
			OperationKind::Refresh => "refresh",
			OperationKind::AccountInfo => "account_info",
			OperationKind::Validate => "validate",
			OperationKind::Revoke => "revoke",
			OperationKind::RateLimits => "rate_limits",
			OperationKind::Analytics => "analytics",
		}
	}
}
impl Display for OperationKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationOutcome {
	/// Entry to an operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl OperationOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OperationOutcome::Attempt => "attempt",
			OperationOutcome::Success => "success",
			OperationOutcome::Failure => "failure",
		}
	}
}
impl Display for OperationOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Runs `fut` inside an [`OperationSpan`], recording attempt and outcome counters.
pub async fn observe<T, Fut>(platform: Platform, kind: OperationKind, fut: Fut) -> Result<T>
where
	Fut: Future<Output = Result<T>>,
{
	let span = OperationSpan::new(platform, kind);

	record_operation_outcome(platform, kind, OperationOutcome::Attempt);

	let result = span.instrument(fut).await;

	match &result {
		Ok(_) => record_operation_outcome(platform, kind, OperationOutcome::Success),
		Err(_) => record_operation_outcome(platform, kind, OperationOutcome::Failure),
	}

	result
}
