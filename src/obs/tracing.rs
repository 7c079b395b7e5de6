// self
use crate::{_prelude::*, obs::FlowKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// Emits a `tracing::debug!` event when the `tracing` feature is enabled.
macro_rules! debug_event {
	($($arg:tt)+) => {
		#[cfg(feature = "tracing")]
		::tracing::debug!($($arg)+);
	};
}
pub(crate) use debug_event;

/// Span wrapping one pipeline operation.
///
/// Failures are stamped with the error's correlation id, so a span can be matched with the error
/// the caller received.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Creates a new span tagged with the provided flow kind + stage.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"bearer_flight.flow",
				flow = kind.as_str(),
				stage,
				correlation_id = tracing::field::Empty,
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}

	/// Records `err`'s correlation id on the span.
	pub fn record_failure(&self, err: &Error) {
		#[cfg(feature = "tracing")]
		{
			self.span.record("correlation_id", tracing::field::display(err.correlation_id()));
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = err;
		}
	}
}
