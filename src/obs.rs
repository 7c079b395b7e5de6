//! Optional observability helpers for the authorized pipeline.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `bearer_flight.flow` with the `flow` (pipeline
//!   operation) and `stage` (call site) fields, plus debug events for refresh decisions.
//! - Enable `metrics` to increment the `bearer_flight_flow_total` counter for every
//!   attempt/success/failure/ignored outcome, labeled by `flow`, `stage`, and `outcome`.

mod tracing;

pub use tracing::*;

pub(crate) use self::tracing::debug_event;

// self
use crate::_prelude::*;

/// Pipeline operations observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// [`AuthorizedClient::authorized_request`](crate::flows::AuthorizedClient::authorized_request)
	/// and the helpers built on it.
	AuthorizedRequest,
	/// Single-flight credential refresh.
	Refresh,
	/// Reading and validating the persisted credential.
	CurrentCredential,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::AuthorizedRequest => "authorized_request",
			FlowKind::Refresh => "refresh",
			FlowKind::CurrentCredential => "current_credential",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a pipeline operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
	/// Failure swallowed by the ignore-on-error predicate.
	Ignored,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
			FlowOutcome::Ignored => "ignored",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Counts one `outcome` of the `stage` call site of `kind` (no-op without the `metrics` feature).
pub fn record_flow_outcome(kind: FlowKind, stage: &'static str, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	metrics::counter!(
		"bearer_flight_flow_total",
		"flow" => kind.as_str(),
		"stage" => stage,
		"outcome" => outcome.as_str()
	)
	.increment(1);

	#[cfg(not(feature = "metrics"))]
	let _ = (kind, stage, outcome);
}

/// Runs `flow` inside a [`FlowSpan`], recording the attempt and then its success or failure.
pub(crate) async fn observe<T, F>(kind: FlowKind, stage: &'static str, flow: F) -> Result<T>
where
	F: Future<Output = Result<T>>,
{
	let span = FlowSpan::new(kind, stage);

	record_flow_outcome(kind, stage, FlowOutcome::Attempt);

	let result = span.instrument(flow).await;

	match &result {
		Ok(_) => record_flow_outcome(kind, stage, FlowOutcome::Success),
		Err(err) => {
			span.record_failure(err);
			record_flow_outcome(kind, stage, FlowOutcome::Failure);
		},
	}

	result
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::error::TransportErrorKind;

	#[tokio::test]
	async fn observe_returns_the_flow_result_unchanged() {
		let ok = observe(FlowKind::Refresh, "ok", async { Ok(3) }).await;
		let err = observe::<u8, _>(FlowKind::Refresh, "err", async {
			Err(Error::new(TransportErrorKind::Timeout))
		})
		.await;

		assert_eq!(ok, Ok(3));
		assert_eq!(err, Err(Error::new(TransportErrorKind::Timeout)));
	}

	#[test]
	fn recording_outcomes_never_panics_without_a_recorder() {
		for outcome in
			[FlowOutcome::Attempt, FlowOutcome::Success, FlowOutcome::Failure, FlowOutcome::Ignored]
		{
			record_flow_outcome(FlowKind::AuthorizedRequest, "authorized_request", outcome);
		}
	}

	#[test]
	fn labels_are_stable() {
		assert_eq!(FlowKind::CurrentCredential.to_string(), "current_credential");
		assert_eq!(FlowOutcome::Ignored.to_string(), "ignored");
	}
}
