//! Persistence contract for credentials plus the built-in in-memory store.

pub mod memory;

pub use memory::MemoryStore;

// self
use crate::{_prelude::*, auth::Credential};

/// Boxed future returned by [`CredentialStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract for credentials keyed by [`Credential::Kind`].
///
/// Implementations wrap whatever persistence the host platform offers (keychains, files,
/// databases). The coordinator only ever loads the current credential, stores a refreshed one,
/// or deletes one; it never keeps its own copy.
pub trait CredentialStore<C>
where
	Self: Send + Sync,
	C: Credential,
{
	/// Loads the credential stored under `kind`.
	///
	/// A missing entry is reported as [`StoreError::NotFound`].
	fn load<'a>(&'a self, kind: &'a C::Kind) -> StoreFuture<'a, C>;

	/// Persists `credential`, replacing any value stored under the same kind.
	fn store(&self, credential: C) -> StoreFuture<'_, ()>;

	/// Removes the credential stored under `kind`; removing a missing entry succeeds.
	fn delete<'a>(&'a self, kind: &'a C::Kind) -> StoreFuture<'a, ()>;
}

/// Error type produced by [`CredentialStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// No credential is stored under the requested key.
	#[error("No credential is stored under {key}.")]
	NotFound {
		/// Debug rendering of the missing key.
		key: String,
	},
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
impl StoreError {
	/// Builds a [`StoreError::NotFound`] for the provided key.
	pub fn not_found(key: &impl Debug) -> Self {
		Self::NotFound { key: format!("{key:?}") }
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::error::Error as StdError;
	// self
	use super::*;
	use crate::error::{CredentialErrorKind, ErrorKind};

	#[test]
	fn store_error_becomes_the_cause_of_a_credential_error() {
		let store_error = StoreError::Backend { message: "keychain locked".into() };
		let err = Error::from(store_error.clone()).context(CredentialErrorKind::LoadFailed);

		assert_eq!(err.kind(), &ErrorKind::Credential(CredentialErrorKind::LoadFailed));
		assert!(err.contains_kind(&ErrorKind::Storage(store_error.clone())));

		let source = StdError::source(&err).expect("Credential error should expose the store error.");

		assert_eq!(source.to_string(), store_error.to_string());
	}

	#[test]
	fn store_error_can_be_serialized() {
		let payload = serde_json::to_string(&StoreError::not_found(&"access"))
			.expect("StoreError should serialize to JSON.");

		assert_eq!(payload, "{\"NotFound\":{\"key\":\"\\\"access\\\"\"}}");
	}
}
