mod common;

// std
use std::{sync::Arc, time::Duration};
// crates.io
use color_eyre::Result;
// self
use bearer_flight::{
	auth::BearerToken,
	coordinator::{RefreshRequester, TokenCoordinator},
	error::{CredentialErrorKind, Error, ErrorKind, StatusErrorKind},
	ext::ExpiryValidator,
	store::{CredentialStore, MemoryStore},
};
use common::*;

fn coordinator_over(
	store: Arc<dyn CredentialStore<BearerToken>>,
	refresher: Arc<ScriptedRefresher>,
) -> Arc<TokenCoordinator<BearerToken>> {
	let refresher: Arc<dyn RefreshRequester<BearerToken>> = refresher;

	Arc::new(TokenCoordinator::new(kind(), store, refresher))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn four_concurrent_refreshes_refresh_and_store_once() -> Result<()> {
	let store = Arc::new(CountingStore::with_credential(token("stale")));
	let refresher = Arc::new(ScriptedRefresher::succeeding("fresh"));
	let coordinator = coordinator_over(store.clone(), refresher.clone());
	let mut tasks = Vec::new();

	for _ in 0..4 {
		let coordinator = coordinator.clone();

		tasks.push(tokio::spawn(async move { coordinator.refresh().await }));
	}

	let mut results = Vec::new();

	for task in tasks {
		results.push(task.await??);
	}

	assert_eq!(refresher.calls(), 1);
	assert_eq!(store.stores(), 1);
	assert!(results.windows(2).all(|pair| pair[0] == pair[1]));
	assert_eq!(results[0].access_token.expose(), "fresh");
	assert_eq!(coordinator.metrics().attempts(), 1);
	assert_eq!(coordinator.metrics().joined(), 3);

	Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn a_failed_session_fails_every_waiter_with_the_same_error() -> Result<()> {
	let store = Arc::new(CountingStore::with_credential(token("stale")));
	let refresher = Arc::new(ScriptedRefresher::new(Duration::from_millis(20), |_| {
		Err(Error::new(StatusErrorKind::Server(503)))
	}));
	let coordinator = coordinator_over(store.clone(), refresher.clone());
	let (a, b, c) = tokio::join!(coordinator.refresh(), coordinator.refresh(), coordinator.refresh());
	let expected =
		Error::new(StatusErrorKind::Server(503)).context(CredentialErrorKind::RefreshFailed);

	for outcome in [a, b, c] {
		assert_eq!(outcome.expect_err("Every waiter must see the failure."), expected);
	}

	assert_eq!(refresher.calls(), 1);
	assert_eq!(store.stores(), 0);
	assert!(!coordinator.is_refreshing());

	Ok(())
}

#[tokio::test]
async fn store_failures_are_classified_after_a_successful_refresh() {
	let store = Arc::new(ReadOnlyStore(MemoryStore::with_credential(token("stale"))));
	let refresher = Arc::new(ScriptedRefresher::succeeding("fresh"));
	let coordinator = coordinator_over(store, refresher.clone());
	let err = coordinator.refresh().await.expect_err("Persisting must fail.");

	assert_eq!(err.kind(), &ErrorKind::Credential(CredentialErrorKind::StoreFailed));
	assert_eq!(refresher.calls(), 1);

	let err = coordinator.clear().await.expect_err("Deleting must fail.");

	assert_eq!(err.kind(), &ErrorKind::Credential(CredentialErrorKind::DeleteFailed));
}

#[tokio::test]
async fn expired_credentials_are_locally_invalid_until_refreshed() -> Result<()> {
	let expired = BearerToken::builder(kind())
		.access_token("stale")
		.refresh_token("refresh-1")
		.expires_in(time::Duration::seconds(-60))
		.build()?;
	let store: Arc<dyn CredentialStore<BearerToken>> =
		Arc::new(MemoryStore::with_credential(expired));
	let refresher: Arc<dyn RefreshRequester<BearerToken>> =
		Arc::new(ScriptedRefresher::succeeding("fresh"));
	let coordinator = TokenCoordinator::builder(kind(), store, refresher)
		.validator(Arc::new(ExpiryValidator::default()))
		.build();
	let err = coordinator.current_credential().await.expect_err("Expired token is invalid.");

	assert!(err.is_locally_invalid());

	coordinator.refresh().await?;

	assert_eq!(coordinator.current_credential().await?.access_token.expose(), "fresh");

	Ok(())
}
