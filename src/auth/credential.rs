//! The opaque credential contract consumed by the coordinator and the request pipeline.

// self
use crate::_prelude::*;

/// An immutable credential identified by a storage discriminator.
///
/// Credentials are never mutated in place: a refresh produces a new value that replaces the old
/// one in the [`CredentialStore`](crate::store::CredentialStore) under the same [`Self::Kind`].
pub trait Credential
where
	Self: 'static + Clone + Debug + Send + Sync,
{
	/// Discriminator used as the storage key.
	type Kind: 'static + Clone + Debug + Eq + Hash + Send + Sync;

	/// Returns the storage key for this credential.
	fn kind(&self) -> Self::Kind;
}
