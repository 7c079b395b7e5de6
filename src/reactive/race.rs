//! First-to-emit-wins selection between two producers.

// crates.io
use pin_project_lite::pin_project;
// self
use crate::_prelude::*;

/// Which side of a [`Race`] produced the first event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Winner {
	/// The first producer passed to [`race`].
	First,
	/// The second producer passed to [`race`].
	Second,
}

pin_project! {
	/// Mirrors whichever of two producers emits first.
	///
	/// As a [`Future`], the first output wins. As a [`Stream`], the first item *or* end-of-stream
	/// wins, and every later poll is routed to the winner only. The loser is dropped the moment the
	/// decision is made, so its pending work is cancelled and its later events are never observed.
	/// When both are ready in the same poll, the first producer wins; the decision never changes.
	#[must_use = "futures and streams do nothing unless polled"]
	#[derive(Debug)]
	pub struct Race<A, B> {
		#[pin]
		first: Option<A>,
		#[pin]
		second: Option<B>,
		winner: Option<Winner>,
	}
}
impl<A, B> Race<A, B> {
	/// Returns the decided winner, if any event has been observed yet.
	pub fn winner(&self) -> Option<Winner> {
		self.winner
	}
}

/// Races `first` against `second`; see [`Race`].
pub fn race<A, B>(first: A, second: B) -> Race<A, B> {
	Race { first: Some(first), second: Some(second), winner: None }
}

impl<A, B> Future for Race<A, B>
where
	A: Future,
	B: Future<Output = A::Output>,
{
	type Output = A::Output;

	fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		let mut this = self.project();

		if this.winner.is_some() {
			// The winner already resolved and was released.
			return Poll::Pending;
		}
		if let Some(Poll::Ready(output)) =
			this.first.as_mut().as_pin_mut().map(|first| first.poll(cx))
		{
			*this.winner = Some(Winner::First);
			this.second.set(None);
			this.first.set(None);

			return Poll::Ready(output);
		}
		if let Some(Poll::Ready(output)) =
			this.second.as_mut().as_pin_mut().map(|second| second.poll(cx))
		{
			*this.winner = Some(Winner::Second);
			this.first.set(None);
			this.second.set(None);

			return Poll::Ready(output);
		}

		Poll::Pending
	}
}

impl<A, B> Stream for Race<A, B>
where
	A: Stream,
	B: Stream<Item = A::Item>,
{
	type Item = A::Item;

	fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
		let mut this = self.project();

		match *this.winner {
			Some(Winner::First) =>
				return match this.first.as_mut().as_pin_mut() {
					Some(first) => first.poll_next(cx),
					None => Poll::Ready(None),
				},
			Some(Winner::Second) =>
				return match this.second.as_mut().as_pin_mut() {
					Some(second) => second.poll_next(cx),
					None => Poll::Ready(None),
				},
			None => {},
		}
		if let Some(Poll::Ready(event)) =
			this.first.as_mut().as_pin_mut().map(|first| first.poll_next(cx))
		{
			*this.winner = Some(Winner::First);
			this.second.set(None);

			return Poll::Ready(event);
		}
		if let Some(Poll::Ready(event)) =
			this.second.as_mut().as_pin_mut().map(|second| second.poll_next(cx))
		{
			*this.winner = Some(Winner::Second);
			this.first.set(None);

			return Poll::Ready(event);
		}

		Poll::Pending
	}
}
