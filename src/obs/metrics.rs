// self
use crate::{
	obs::{OperationKind, OperationOutcome},
	platform::Platform,
};

/// Records an operation outcome via the global metrics recorder (when enabled).
pub fn record_operation_outcome(platform: Platform, kind: OperationKind, outcome: OperationOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"social_broker_operation_total",
			"platform" => platform.as_str(),
			"operation" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (platform, kind, outcome);
	}
}

/// Records a scheduled publish retry via the global metrics recorder (when enabled).
pub fn record_publish_retry(platform: Platform) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("social_broker_publish_retry_total", "platform" => platform.as_str())
			.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = platform;
	}
}
