//! Resubscription driven by an external permit stream.

// std
use std::task::ready;
// crates.io
use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use pin_project_lite::pin_project;
// self
use crate::_prelude::*;

/// Stream of every failure observed by a [`RetryWhen`], in order.
pub type ErrorHistory<E> = UnboundedReceiver<E>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RetryState {
	Primary,
	AwaitingPermit,
	Done,
}

pin_project! {
	/// Stream returned by [`retry_when`].
	#[must_use = "streams do nothing unless polled"]
	pub struct RetryWhen<F, S, H, P, E> {
		factory: F,
		#[pin]
		primary: Option<S>,
		handler: Option<H>,
		#[pin]
		permits: Option<P>,
		errors: Option<UnboundedSender<E>>,
		state: RetryState,
	}
}

/// Runs a fresh producer from `factory` and resubscribes it whenever the permit stream allows.
///
/// - Values of the current producer are forwarded; a normal end of the producer ends this stream.
/// - When the producer fails, the failure is pushed to the [`ErrorHistory`] instead of being
///   forwarded. `handler` is called once, on the first failure, to turn that history into a
///   permit stream.
/// - Each `Ok(())` permit starts a new producer from `factory`. An `Err` permit is forwarded as
///   this stream's terminal failure. The end of the permit stream ends this stream.
pub fn retry_when<F, S, H, P, T, E>(mut factory: F, handler: H) -> RetryWhen<F, S, H, P, E>
where
	F: FnMut() -> S,
	S: Stream<Item = Result<T, E>>,
	H: FnOnce(ErrorHistory<E>) -> P,
	P: Stream<Item = Result<(), E>>,
{
	let primary = factory();

	RetryWhen {
		factory,
		primary: Some(primary),
		handler: Some(handler),
		permits: None,
		errors: None,
		state: RetryState::Primary,
	}
}

impl<F, S, H, P, T, E> Stream for RetryWhen<F, S, H, P, E>
where
	F: FnMut() -> S,
	S: Stream<Item = Result<T, E>>,
	H: FnOnce(ErrorHistory<E>) -> P,
	P: Stream<Item = Result<(), E>>,
{
	type Item = Result<T, E>;

	fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
		let mut this = self.project();

		loop {
			match *this.state {
				RetryState::Primary => {
					let Some(primary) = this.primary.as_mut().as_pin_mut() else {
						*this.state = RetryState::Done;

						continue;
					};

					match ready!(primary.poll_next(cx)) {
						Some(Ok(value)) => return Poll::Ready(Some(Ok(value))),
						Some(Err(failure)) => {
							this.primary.set(None);

							if this.errors.is_none() {
								let (tx, rx) = mpsc::unbounded();

								*this.errors = Some(tx);

								if let Some(handler) = this.handler.take() {
									this.permits.set(Some(handler(rx)));
								}
							}
							if let Some(errors) = this.errors.as_ref() {
								// A handler that dropped its history simply stops seeing failures.
								let _ = errors.unbounded_send(failure);
							}

							*this.state = RetryState::AwaitingPermit;
						},
						None => {
							*this.state = RetryState::Done;

							return Poll::Ready(None);
						},
					}
				},
				RetryState::AwaitingPermit => {
					let permit = match this.permits.as_mut().as_pin_mut() {
						Some(permits) => ready!(permits.poll_next(cx)),
						None => None,
					};

					match permit {
						Some(Ok(())) => {
							this.primary.set(Some((this.factory)()));
							*this.state = RetryState::Primary;
						},
						Some(Err(failure)) => {
							this.permits.set(None);
							this.errors.take();
							*this.state = RetryState::Done;

							return Poll::Ready(Some(Err(failure)));
						},
						None => {
							this.permits.set(None);
							this.errors.take();
							*this.state = RetryState::Done;

							return Poll::Ready(None);
						},
					}
				},
				RetryState::Done => return Poll::Ready(None),
			}
		}
	}
}
impl<F, S, H, P, E> Debug for RetryWhen<F, S, H, P, E> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RetryWhen").field("state", &self.state).finish()
	}
}
