//! Shared retry configuration and per-run attempt bookkeeping.

// self
use crate::_prelude::*;

/// Bounds applied by [`AuthorizedClient`](crate::flows::AuthorizedClient) before it gives up.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
	/// Maximum number of network sends per authorized request, including the first one.
	pub max_attempts: usize,
	/// Maximum number of refresh calls per refresh round.
	pub max_refresh_attempts: usize,
}
impl RetryPolicy {
	const DEFAULT_MAX_ATTEMPTS: usize = 3;
	const DEFAULT_MAX_REFRESH_ATTEMPTS: usize = 3;

	/// Overrides the send bound; values below 1 are raised to 1.
	pub fn with_max_attempts(mut self, attempts: usize) -> Self {
		self.max_attempts = attempts.max(1);

		self
	}

	/// Overrides the refresh bound; values below 1 are raised to 1.
	pub fn with_max_refresh_attempts(mut self, attempts: usize) -> Self {
		self.max_refresh_attempts = attempts.max(1);

		self
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
			max_refresh_attempts: Self::DEFAULT_MAX_REFRESH_ATTEMPTS,
		}
	}
}

/// Running failure count for one retry loop.
///
/// Each loop owns its own log, so concurrent requests never share counters.
#[derive(Clone, Debug, Default)]
pub struct AttemptLog {
	count: usize,
	last: Option<Error>,
}
impl AttemptLog {
	/// Records `error` and returns the updated count together with it.
	pub fn record(&mut self, error: Error) -> (usize, Error) {
		self.count += 1;
		self.last = Some(error.clone());

		(self.count, error)
	}

	/// Number of failures recorded so far.
	pub fn count(&self) -> usize {
		self.count
	}

	/// Most recently recorded failure.
	pub fn last(&self) -> Option<&Error> {
		self.last.as_ref()
	}
}
