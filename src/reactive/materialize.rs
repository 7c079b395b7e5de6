//! Reify values, failures, and completion as ordinary stream items.

// std
use std::task::ready;
// crates.io
use pin_project_lite::pin_project;
// self
use crate::_prelude::*;

/// A single observation of a fallible stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event<T, E> {
	/// The upstream produced a value.
	Value(T),
	/// The upstream failed; nothing follows.
	Failure(E),
	/// The upstream finished normally; nothing follows.
	Finished,
}
impl<T, E> Event<T, E> {
	/// Borrowed value, if this is [`Event::Value`].
	pub fn value(&self) -> Option<&T> {
		match self {
			Event::Value(value) => Some(value),
			_ => None,
		}
	}

	/// Borrowed failure, if this is [`Event::Failure`].
	pub fn failure(&self) -> Option<&E> {
		match self {
			Event::Failure(failure) => Some(failure),
			_ => None,
		}
	}

	/// `true` for [`Event::Failure`].
	pub fn is_failure(&self) -> bool {
		matches!(self, Event::Failure(_))
	}

	/// `true` for [`Event::Value`] and [`Event::Failure`], the events that carry an outcome.
	pub fn is_outcome(&self) -> bool {
		!matches!(self, Event::Finished)
	}

	/// `true` for [`Event::Failure`] and [`Event::Finished`].
	pub fn is_terminal(&self) -> bool {
		!matches!(self, Event::Value(_))
	}

	/// Converts into the stream item this event was materialized from.
	pub fn into_result(self) -> Option<Result<T, E>> {
		match self {
			Event::Value(value) => Some(Ok(value)),
			Event::Failure(failure) => Some(Err(failure)),
			Event::Finished => None,
		}
	}

	/// Maps the value while keeping failures and completion untouched.
	pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Event<U, E> {
		match self {
			Event::Value(value) => Event::Value(f(value)),
			Event::Failure(failure) => Event::Failure(failure),
			Event::Finished => Event::Finished,
		}
	}
}

pin_project! {
	/// Stream adapter returned by
	/// [`ReactiveExt::materialize`](crate::reactive::ReactiveExt::materialize).
	///
	/// Every `Ok` item becomes [`Event::Value`]. The first `Err` becomes [`Event::Failure`] and the
	/// upstream is no longer polled. A normal end becomes [`Event::Finished`]. Either terminal event
	/// is followed by the end of this stream, so a consumer sees a terminal outcome exactly once.
	#[must_use = "streams do nothing unless polled"]
	#[derive(Debug)]
	pub struct Materialize<St> {
		#[pin]
		upstream: St,
		done: bool,
	}
}
impl<St> Materialize<St> {
	pub(crate) fn new(upstream: St) -> Self {
		Self { upstream, done: false }
	}
}
impl<St, T, E> Stream for Materialize<St>
where
	St: Stream<Item = Result<T, E>>,
{
	type Item = Event<T, E>;

	fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
		let this = self.project();

		if *this.done {
			return Poll::Ready(None);
		}

		let event = match ready!(this.upstream.poll_next(cx)) {
			Some(Ok(value)) => Event::Value(value),
			Some(Err(failure)) => Event::Failure(failure),
			None => Event::Finished,
		};

		*this.done = event.is_terminal();

		Poll::Ready(Some(event))
	}
}

pin_project! {
	/// Stream adapter returned by
	/// [`ReactiveExt::dematerialize`](crate::reactive::ReactiveExt::dematerialize).
	///
	/// Ends after the first [`Event::Failure`] or [`Event::Finished`].
	#[must_use = "streams do nothing unless polled"]
	#[derive(Debug)]
	pub struct Dematerialize<St> {
		#[pin]
		upstream: St,
		done: bool,
	}
}
impl<St> Dematerialize<St> {
	pub(crate) fn new(upstream: St) -> Self {
		Self { upstream, done: false }
	}
}
impl<St, T, E> Stream for Dematerialize<St>
where
	St: Stream<Item = Event<T, E>>,
{
	type Item = Result<T, E>;

	fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
		let this = self.project();

		if *this.done {
			return Poll::Ready(None);
		}

		let Some(event) = ready!(this.upstream.poll_next(cx)) else {
			*this.done = true;

			return Poll::Ready(None);
		};

		*this.done = event.is_terminal();

		Poll::Ready(event.into_result())
	}
}
