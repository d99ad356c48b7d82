//! Bounded publish retry with linear backoff.
//!
//! Only rate limiting (HTTP 429) and per-call timeouts are retried, and only inside
//! the publish loop. The wait before attempt `n + 1` is `n × base_delay`, stretched
//! to the platform's Retry-After hint when that is longer (hints are capped).

// self
use crate::{
	_prelude::*,
	obs,
	platform::Platform,
};

/// Boxed future returned by [`Backoff::wait`].
pub type BackoffFuture<'a> = Pin<Box<dyn Future<Output = ()> + 'a + Send>>;

/// Suspends the publish loop between attempts.
pub trait Backoff
where
	Self: Send + Sync,
{
	/// Waits for `delay`; dropping the future cancels the wait.
	fn wait(&self, delay: Duration) -> BackoffFuture<'_>;
}

/// [`Backoff`] backed by the tokio timer.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioBackoff;
impl Backoff for TokioBackoff {
	fn wait(&self, delay: Duration) -> BackoffFuture<'_> {
		Box::pin(tokio::time::sleep(delay.unsigned_abs()))
	}
}

/// Attempt cap and delay schedule for the publish loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
	/// Total attempts, including the first.
	pub max_attempts: u32,
	/// Linear backoff step.
	pub base_delay: Duration,
	/// Upper bound applied to Retry-After hints.
	pub max_retry_after: Duration,
}
impl RetryPolicy {
	/// Delay before the attempt following `attempt` (1-based).
	pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
		let linear = self.base_delay * attempt;

		match retry_after {
			Some(hint) => linear.max(hint.min(self.max_retry_after)),
			None => linear,
		}
	}

	/// Drives `attempt_fn` until it succeeds, fails with a non-retryable error, or the
	/// attempt cap is reached.
	///
	/// `attempt_fn` receives the 1-based attempt index. Exhaustion yields
	/// [`Error::AttemptsExhausted`] wrapping the last failure.
	pub async fn run<T, F, Fut>(
		&self,
		platform: Platform,
		backoff: &dyn Backoff,
		mut attempt_fn: F,
	) -> Result<T>
	where
		F: FnMut(u32) -> Fut,
		Fut: Future<Output = Result<T>>,
	{
		let max_attempts = self.max_attempts.max(1);
		let mut attempt = 1;

		loop {
			let err = match attempt_fn(attempt).await {
				Ok(value) => return Ok(value),
				Err(err) if err.is_publish_retryable() => err,
				Err(err) => return Err(err),
			};

			if attempt >= max_attempts {
				return Err(Error::AttemptsExhausted { attempts: attempt, last: Box::new(err) });
			}

			let delay = self.delay_for(attempt, err.retry_after());

			#[cfg(feature = "tracing")]
			tracing::warn!(
				platform = platform.as_str(),
				attempt,
				delay_ms = delay.whole_milliseconds() as u64,
				error = %err,
				"Publish attempt failed; retrying."
			);

			obs::record_publish_retry(platform);
			backoff.wait(delay).await;

			attempt += 1;
		}
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_attempts: 3,
			base_delay: Duration::seconds(5),
			max_retry_after: Duration::seconds(60),
		}
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicU32, Ordering};
	// self
	use super::*;
	use crate::{_preludet::RecordingBackoff, error::TransientError};

	fn limited() -> Error {
		Error::RateLimited { platform: Platform::LinkedIn, retry_after: None }
	}

	#[test]
	fn delay_schedule_is_linear_with_capped_hints() {
		let policy = RetryPolicy::default();

		assert_eq!(policy.delay_for(1, None), Duration::seconds(5));
		assert_eq!(policy.delay_for(2, None), Duration::seconds(10));
		assert_eq!(policy.delay_for(1, Some(Duration::seconds(2))), Duration::seconds(5));
		assert_eq!(policy.delay_for(1, Some(Duration::seconds(20))), Duration::seconds(20));
		assert_eq!(policy.delay_for(2, Some(Duration::hours(1))), Duration::seconds(60));
	}

	#[tokio::test]
	async fn succeeds_after_two_rate_limits() {
		let backoff = RecordingBackoff::default();
		let calls = AtomicU32::new(0);
		let value = RetryPolicy::default()
			.run(Platform::LinkedIn, &backoff, |attempt| {
				calls.fetch_add(1, Ordering::SeqCst);

				async move { if attempt < 3 { Err(limited()) } else { Ok(attempt) } }
			})
			.await
			.expect("Third attempt should succeed.");

		assert_eq!(value, 3);
		assert_eq!(calls.load(Ordering::SeqCst), 3);
		assert_eq!(backoff.delays(), [Duration::seconds(5), Duration::seconds(10)]);
	}

	#[tokio::test]
	async fn exhaustion_and_non_retryable_failures() {
		let backoff = RecordingBackoff::default();
		let err = RetryPolicy::default()
			.run(Platform::LinkedIn, &backoff, |_| async { Err::<(), _>(limited()) })
			.await
			.expect_err("Permanent rate limiting must exhaust the attempts.");

		assert!(matches!(err, Error::AttemptsExhausted { attempts: 3, .. }));
		assert_eq!(backoff.delays().len(), 2);

		let backoff = RecordingBackoff::default();
		let calls = AtomicU32::new(0);
		let err = RetryPolicy::default()
			.run(Platform::LinkedIn, &backoff, |_| {
				calls.fetch_add(1, Ordering::SeqCst);

				async {
					Err::<(), _>(Error::Api {
						platform: Platform::LinkedIn,
						operation: "publish",
						status: 500,
						body: String::new(),
					})
				}
			})
			.await
			.expect_err("Server errors must not be retried.");

		assert!(matches!(err, Error::Api { status: 500, .. }));
		assert_eq!(calls.load(Ordering::SeqCst), 1);
		assert!(backoff.delays().is_empty());
	}

	#[tokio::test]
	async fn timeouts_are_retried_like_rate_limits() {
		let backoff = RecordingBackoff::default();
		let value = RetryPolicy::default()
			.run(Platform::LinkedIn, &backoff, |attempt| async move {
				if attempt == 1 {
					Err(TransientError::Timeout { operation: "publish" }.into())
				} else {
					Ok("posted")
				}
			})
			.await
			.expect("Second attempt should succeed.");

		assert_eq!(value, "posted");
		assert_eq!(backoff.delays(), [Duration::seconds(5)]);
	}
}
