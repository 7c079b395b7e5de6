//! Generic asynchronous stream combinators used to coordinate credential refreshes.
//!
//! - [`race`]: mirror whichever of two producers emits first and drop the other.
//! - [`SingleFlightGate`] / [`ReactiveExt::flat_map_first`]: run one inner operation at a time and
//!   drop triggers that arrive while it runs.
//! - [`ReactiveExt::materialize`]: turn a failing stream into a stream of [`Event`] values that
//!   never fails.
//! - [`retry_when`]: resubscribe a producer each time an external permit stream says so.
//!
//! Errors are modelled the way the rest of the crate models them: a stream of `Result<T, E>`
//! treats its first `Err` item as terminal.

pub mod gate;
pub mod materialize;
pub mod race;
pub mod retry;

pub use gate::*;
pub use materialize::*;
pub use race::*;
pub use retry::*;

// self
use crate::_prelude::*;

/// Combinator methods available on every [`Stream`].
pub trait ReactiveExt
where
	Self: Stream,
{
	/// Wraps every item, error, and completion in an [`Event`]; see [`Materialize`].
	fn materialize<T, E>(self) -> Materialize<Self>
	where
		Self: Sized + Stream<Item = Result<T, E>>,
	{
		Materialize::new(self)
	}

	/// Reverses [`ReactiveExt::materialize`]; see [`Dematerialize`].
	fn dematerialize<T, E>(self) -> Dematerialize<Self>
	where
		Self: Sized + Stream<Item = Event<T, E>>,
	{
		Dematerialize::new(self)
	}

	/// Starts one inner stream per trigger unless one is already running; the gate reopens when the
	/// inner stream ends.
	fn flat_map_first<U, F>(self, start: F) -> FlatMapFirst<Self, F, U, Unlock<U::Item>>
	where
		Self: Sized,
		U: Stream,
		F: FnMut(Self::Item) -> U,
	{
		FlatMapFirst::new(self, start, never_unlock::<U::Item> as Unlock<U::Item>)
	}

	/// Like [`ReactiveExt::flat_map_first`], but also reopens the gate as soon as an inner item
	/// matches `unlock_on`.
	fn flat_map_first_until<U, F, P>(self, start: F, unlock_on: P) -> FlatMapFirst<Self, F, U, P>
	where
		Self: Sized,
		U: Stream,
		F: FnMut(Self::Item) -> U,
		P: Unpin + FnMut(&U::Item) -> bool,
	{
		FlatMapFirst::new(self, start, unlock_on)
	}
}
impl<St> ReactiveExt for St where St: ?Sized + Stream {}
