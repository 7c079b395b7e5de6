//! Single-flight gate: at most one inner stream runs at a time.
//!
//! Triggers that arrive while an inner stream is running are dropped, not queued. The gate reopens
//! when the running inner stream ends, or earlier when one of its items matches the unlock
//! predicate or the consumer calls [`GateTrigger::release`]. A running inner stream is only
//! replaced by a newer one after such an early unlock.

// std
use std::task::Waker;
// crates.io
use pin_project_lite::pin_project;
// self
use crate::_prelude::*;

/// Unlock predicate type used by gates that only reopen on completion.
pub type Unlock<T> = fn(&T) -> bool;

pub(crate) fn never_unlock<T>(_: &T) -> bool {
	false
}

struct GateState<S> {
	running: bool,
	generation: u64,
	pending: Option<S>,
	waker: Option<Waker>,
}

/// Cloneable handle used to start inner streams on a [`SingleFlightGate`].
pub struct GateTrigger<S> {
	state: Arc<Mutex<GateState<S>>>,
}
impl<S> GateTrigger<S> {
	/// Starts a new inner stream built by `start` unless one is already running.
	///
	/// The check and the claim happen under one lock, so concurrent callers can never start two
	/// inner streams. `start` is only invoked when the trigger is accepted and runs without the
	/// lock held, so it may use this handle. Returns `true` if the trigger was accepted.
	pub fn trigger(&self, start: impl FnOnce() -> S) -> bool {
		let generation = {
			let mut state = self.state.lock();

			if state.running {
				return false;
			}

			state.running = true;
			state.generation += 1;

			state.generation
		};
		let inner = start();
		let waker = {
			let mut state = self.state.lock();

			// The gate was dropped or released while `start` ran.
			if !state.running || state.generation != generation {
				return true;
			}

			state.pending = Some(inner);

			state.waker.take()
		};

		if let Some(waker) = waker {
			waker.wake();
		}

		true
	}

	/// Reopens the gate if the inner stream of `generation` still holds it.
	///
	/// Lets a consumer release the gate at a point of its choosing, for example together with
	/// publishing the item that ends a session, instead of relying on the unlock predicate or on
	/// completion. The superseded inner stream is replaced by the next accepted trigger. Returns
	/// `true` if the gate was released.
	pub fn release(&self, generation: u64) -> bool {
		let mut state = self.state.lock();

		if state.running && state.generation == generation {
			state.running = false;

			true
		} else {
			false
		}
	}

	/// Returns `true` while an inner stream is running or waiting to be polled.
	pub fn is_running(&self) -> bool {
		self.state.lock().running
	}
}
impl<S> Clone for GateTrigger<S> {
	fn clone(&self) -> Self {
		Self { state: self.state.clone() }
	}
}
impl<S> Debug for GateTrigger<S> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("GateTrigger").field("running", &self.is_running()).finish()
	}
}

/// Output side of a single-flight gate.
///
/// Yields the items of the inner stream that is currently running. It never ends on its own; an
/// idle gate stays pending until the next accepted trigger. Dropping the gate reopens it so
/// [`GateTrigger::trigger`] keeps working for a replacement consumer.
pub struct SingleFlightGate<S, P = Unlock<<S as Stream>::Item>>
where
	S: Stream,
{
	state: Arc<Mutex<GateState<S>>>,
	inner: Option<Pin<Box<S>>>,
	inner_generation: u64,
	unlock_on: P,
}
impl<S> SingleFlightGate<S>
where
	S: Stream,
{
	/// Creates a gate that reopens only when the running inner stream ends.
	pub fn new() -> (GateTrigger<S>, Self) {
		Self::with_unlock(never_unlock::<S::Item> as Unlock<S::Item>)
	}
}
impl<S, P> SingleFlightGate<S, P>
where
	S: Stream,
	P: Unpin + FnMut(&S::Item) -> bool,
{
	/// Creates a gate that also reopens as soon as an inner item matches `unlock_on`.
	pub fn with_unlock(unlock_on: P) -> (GateTrigger<S>, Self) {
		let state = Arc::new(Mutex::new(GateState {
			running: false,
			generation: 0,
			pending: None,
			waker: None,
		}));
		let gate = Self { state: state.clone(), inner: None, inner_generation: 0, unlock_on };

		(GateTrigger { state }, gate)
	}

	/// Returns `true` when no inner stream is running or waiting to start.
	pub fn is_idle(&self) -> bool {
		self.inner.is_none() && {
			let state = self.state.lock();

			!state.running && state.pending.is_none()
		}
	}

	/// Generation of the inner stream polled most recently, `0` before the first one.
	pub fn generation(&self) -> u64 {
		self.inner_generation
	}

	fn release(&self) {
		let mut state = self.state.lock();

		if state.generation == self.inner_generation {
			state.running = false;
		}
	}
}
impl<S, P> Stream for SingleFlightGate<S, P>
where
	S: Stream,
	P: Unpin + FnMut(&S::Item) -> bool,
{
	type Item = S::Item;

	fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
		let this = self.get_mut();

		loop {
			{
				let mut state = this.state.lock();

				if let Some(next) = state.pending.take() {
					this.inner = Some(Box::pin(next));
					this.inner_generation = state.generation;
				}

				state.waker = Some(cx.waker().clone());
			}

			let Some(inner) = this.inner.as_mut() else {
				return Poll::Pending;
			};

			match inner.as_mut().poll_next(cx) {
				Poll::Ready(Some(item)) => {
					if (this.unlock_on)(&item) {
						this.release();
					}

					return Poll::Ready(Some(item));
				},
				Poll::Ready(None) => {
					this.inner = None;
					this.release();
				},
				Poll::Pending => return Poll::Pending,
			}
		}
	}
}
impl<S, P> Drop for SingleFlightGate<S, P>
where
	S: Stream,
{
	fn drop(&mut self) {
		let mut state = self.state.lock();

		state.running = false;
		state.pending = None;
		state.waker = None;
	}
}
impl<S, P> Debug for SingleFlightGate<S, P>
where
	S: Stream,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SingleFlightGate")
			.field("active", &self.inner.is_some())
			.field("generation", &self.inner_generation)
			.finish()
	}
}

pin_project! {
	/// Stream adapter returned by
	/// [`ReactiveExt::flat_map_first`](crate::reactive::ReactiveExt::flat_map_first).
	///
	/// Ends once the trigger stream has ended and no inner stream is left running.
	#[must_use = "streams do nothing unless polled"]
	pub struct FlatMapFirst<St, F, U, P>
	where
		U: Stream,
	{
		#[pin]
		triggers: St,
		triggers_done: bool,
		start: F,
		handle: GateTrigger<U>,
		gate: SingleFlightGate<U, P>,
	}
}
impl<St, F, U, P> FlatMapFirst<St, F, U, P>
where
	St: Stream,
	F: FnMut(St::Item) -> U,
	U: Stream,
	P: Unpin + FnMut(&U::Item) -> bool,
{
	pub(crate) fn new(triggers: St, start: F, unlock_on: P) -> Self {
		let (handle, gate) = SingleFlightGate::with_unlock(unlock_on);

		Self { triggers, triggers_done: false, start, handle, gate }
	}
}
impl<St, F, U, P> Stream for FlatMapFirst<St, F, U, P>
where
	St: Stream,
	F: FnMut(St::Item) -> U,
	U: Stream,
	P: Unpin + FnMut(&U::Item) -> bool,
{
	type Item = U::Item;

	fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
		let mut this = self.project();

		while !*this.triggers_done {
			match this.triggers.as_mut().poll_next(cx) {
				Poll::Ready(Some(trigger)) => {
					let start = &mut *this.start;

					this.handle.trigger(|| start(trigger));
				},
				Poll::Ready(None) => *this.triggers_done = true,
				Poll::Pending => break,
			}
		}

		match this.gate.poll_next_unpin(cx) {
			Poll::Ready(item) => Poll::Ready(item),
			Poll::Pending if *this.triggers_done && this.gate.is_idle() => Poll::Ready(None),
			Poll::Pending => Poll::Pending,
		}
	}
}
impl<St, F, U, P> Debug for FlatMapFirst<St, F, U, P>
where
	U: Stream,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("FlatMapFirst")
			.field("triggers_done", &self.triggers_done)
			.field("gate", &self.gate)
			.finish()
	}
}
