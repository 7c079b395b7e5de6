//! Thread-safe in-memory [`CredentialStore`] for local development and tests.

// self
use crate::{
	_prelude::*,
	auth::Credential,
	store::{CredentialStore, StoreError, StoreFuture},
};

type StoreMap<C> = Arc<RwLock<HashMap<<C as Credential>::Kind, C>>>;

/// Storage backend that keeps credentials in-process.
#[derive(Clone, Debug)]
pub struct MemoryStore<C>(StoreMap<C>)
where
	C: Credential;
impl<C> MemoryStore<C>
where
	C: Credential,
{
	/// Creates a store seeded with `credential`.
	pub fn with_credential(credential: C) -> Self {
		let store = Self::default();

		store.insert_now(credential);

		store
	}

	/// Synchronously replaces the credential stored under its kind.
	pub fn insert_now(&self, credential: C) {
		self.0.write().insert(credential.kind(), credential);
	}

	/// Synchronously reads the credential stored under `kind`.
	pub fn get_now(&self, kind: &C::Kind) -> Option<C> {
		self.0.read().get(kind).cloned()
	}

	/// Number of stored credentials.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when nothing is stored.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}
}
impl<C> Default for MemoryStore<C>
where
	C: Credential,
{
	fn default() -> Self {
		Self(Arc::new(RwLock::new(HashMap::new())))
	}
}
impl<C> CredentialStore<C> for MemoryStore<C>
where
	C: Credential,
{
	fn load<'a>(&'a self, kind: &'a C::Kind) -> StoreFuture<'a, C> {
		let found = self.get_now(kind);

		Box::pin(async move { found.ok_or_else(|| StoreError::not_found(kind)) })
	}

	fn store(&self, credential: C) -> StoreFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			map.write().insert(credential.kind(), credential);

			Ok(())
		})
	}

	fn delete<'a>(&'a self, kind: &'a C::Kind) -> StoreFuture<'a, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			map.write().remove(kind);

			Ok(())
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::auth::{BearerToken, TokenKind};

	fn token(kind: &str, access: &str) -> BearerToken {
		BearerToken::builder(TokenKind::new(kind).expect("Token kind fixture should be valid."))
			.access_token(access)
			.build()
			.expect("Token fixture should build.")
	}

	#[tokio::test]
	async fn store_load_and_delete_round_trip() {
		let store = MemoryStore::default();
		let access = token("access", "access-1");
		let kind = access.kind();

		store.store(access.clone()).await.expect("Storing into memory should succeed.");

		assert_eq!(store.load(&kind).await.expect("Stored credential should load."), access);

		store.delete(&kind).await.expect("Deleting should succeed.");

		assert_eq!(
			store.load(&kind).await.expect_err("Deleted credential must not load."),
			StoreError::not_found(&kind)
		);
		assert!(store.is_empty());
	}

	#[tokio::test]
	async fn credentials_are_keyed_by_kind() {
		let store = MemoryStore::with_credential(token("access", "access-1"));

		store.store(token("session", "session-1")).await.expect("Second kind should store.");
		store.store(token("access", "access-2")).await.expect("Replacement should store.");

		let kind = TokenKind::new("access").expect("Token kind fixture should be valid.");

		assert_eq!(store.len(), 2);
		assert_eq!(
			store.get_now(&kind).map(|token| token.access_token.expose().to_owned()),
			Some("access-2".into())
		);
	}
}
