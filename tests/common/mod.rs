//! Fixtures shared by the integration tests.

#![allow(dead_code)]

// std
use std::{
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};
// crates.io
use parking_lot::Mutex;
// self
use bearer_flight::{
	auth::{BearerToken, TokenKind},
	coordinator::{RefreshFuture, RefreshRequester, TokenCoordinator},
	error::{Error, Result},
	ext::{BearerAuthorizer, CredentialValidator},
	flows::AuthorizedClient,
	http::{HttpRequest, HttpResponse, Transport, TransportFuture, check_response},
	store::{CredentialStore, MemoryStore, StoreError, StoreFuture},
};

pub fn kind() -> TokenKind {
	TokenKind::new("access").expect("Token kind fixture should be valid.")
}

pub fn token(access: &str) -> BearerToken {
	BearerToken::builder(kind())
		.access_token(access)
		.refresh_token("refresh-1")
		.build()
		.expect("Token fixture should build.")
}

type Respond = dyn Fn(&HttpRequest) -> Result<HttpResponse> + Send + Sync;

/// Transport answering from a closure and recording every request it sees.
pub struct ScriptedTransport {
	respond: Box<Respond>,
	requests: Mutex<Vec<HttpRequest>>,
}
impl ScriptedTransport {
	pub fn new(
		respond: impl Fn(&HttpRequest) -> Result<HttpResponse> + Send + Sync + 'static,
	) -> Self {
		Self { respond: Box::new(respond), requests: Mutex::new(Vec::new()) }
	}

	/// Answers 200 for `Bearer <accepted>` and 401 for anything else.
	pub fn accepting(accepted: &str) -> Self {
		let expected = format!("Bearer {accepted}");

		Self::new(move |request| {
			if request.header_value("authorization") == Some(expected.as_str()) {
				Ok(HttpResponse::new(200, r#"{"id":7,"name":"flight"}"#))
			} else {
				Ok(HttpResponse::new(401, "").with_header("x-request-id", "req-401"))
			}
		})
	}

	pub fn sends(&self) -> usize {
		self.requests.lock().len()
	}

	pub fn authorizations(&self) -> Vec<Option<String>> {
		self.requests
			.lock()
			.iter()
			.map(|request| request.header_value("authorization").map(str::to_owned))
			.collect()
	}
}
impl Transport for ScriptedTransport {
	fn send(&self, request: HttpRequest) -> TransportFuture<'_> {
		let outcome = (self.respond)(&request).and_then(check_response);

		self.requests.lock().push(request);

		Box::pin(async move { outcome })
	}
}

/// Refresher answering from a closure that receives the 1-based call number.
pub struct ScriptedRefresher {
	calls: AtomicUsize,
	received: Mutex<Vec<String>>,
	delay: Duration,
	respond: Box<dyn Fn(usize) -> Result<BearerToken> + Send + Sync>,
}
impl ScriptedRefresher {
	pub fn new(
		delay: Duration,
		respond: impl Fn(usize) -> Result<BearerToken> + Send + Sync + 'static,
	) -> Self {
		Self {
			calls: AtomicUsize::new(0),
			received: Mutex::new(Vec::new()),
			delay,
			respond: Box::new(respond),
		}
	}

	pub fn succeeding(access: &'static str) -> Self {
		Self::new(Duration::from_millis(20), move |_| Ok(token(access)))
	}

	pub fn failing(err: Error) -> Self {
		Self::new(Duration::ZERO, move |_| Err(err.clone()))
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	/// Access tokens of the stale credentials handed to each refresh call, in call order.
	pub fn received(&self) -> Vec<String> {
		self.received.lock().clone()
	}
}
impl RefreshRequester<BearerToken> for ScriptedRefresher {
	fn refresh(&self, stale: BearerToken) -> RefreshFuture<'_, BearerToken> {
		let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

		self.received.lock().push(stale.access_token.expose().to_owned());

		Box::pin(async move {
			tokio::time::sleep(self.delay).await;

			(self.respond)(call)
		})
	}
}

/// [`MemoryStore`] wrapper that counts writes.
pub struct CountingStore {
	pub inner: MemoryStore<BearerToken>,
	stores: AtomicUsize,
}
impl CountingStore {
	pub fn with_credential(credential: BearerToken) -> Self {
		Self { inner: MemoryStore::with_credential(credential), stores: AtomicUsize::new(0) }
	}

	pub fn stores(&self) -> usize {
		self.stores.load(Ordering::SeqCst)
	}
}
impl CredentialStore<BearerToken> for CountingStore {
	fn load<'a>(&'a self, kind: &'a TokenKind) -> StoreFuture<'a, BearerToken> {
		self.inner.load(kind)
	}

	fn store(&self, credential: BearerToken) -> StoreFuture<'_, ()> {
		self.stores.fetch_add(1, Ordering::SeqCst);

		self.inner.store(credential)
	}

	fn delete<'a>(&'a self, kind: &'a TokenKind) -> StoreFuture<'a, ()> {
		self.inner.delete(kind)
	}
}

/// Store whose writes always fail.
pub struct ReadOnlyStore(pub MemoryStore<BearerToken>);
impl CredentialStore<BearerToken> for ReadOnlyStore {
	fn load<'a>(&'a self, kind: &'a TokenKind) -> StoreFuture<'a, BearerToken> {
		self.0.load(kind)
	}

	fn store(&self, _credential: BearerToken) -> StoreFuture<'_, ()> {
		Box::pin(async { Err(StoreError::Backend { message: "read-only".into() }) })
	}

	fn delete<'a>(&'a self, _kind: &'a TokenKind) -> StoreFuture<'a, ()> {
		Box::pin(async { Err(StoreError::Backend { message: "read-only".into() }) })
	}
}

/// Everything a pipeline test needs to inspect afterwards.
pub struct Harness {
	pub transport: Arc<ScriptedTransport>,
	pub refresher: Arc<ScriptedRefresher>,
	pub store: Arc<CountingStore>,
	pub coordinator: Arc<TokenCoordinator<BearerToken>>,
	pub client: AuthorizedClient<ScriptedTransport, BearerToken>,
}

pub fn harness(
	stored: &str,
	transport: ScriptedTransport,
	refresher: ScriptedRefresher,
	validator: Option<Arc<dyn CredentialValidator<BearerToken>>>,
) -> Harness {
	let transport = Arc::new(transport);
	let refresher = Arc::new(refresher);
	let store = Arc::new(CountingStore::with_credential(token(stored)));
	let shared_store: Arc<dyn CredentialStore<BearerToken>> = store.clone();
	let shared_refresher: Arc<dyn RefreshRequester<BearerToken>> = refresher.clone();
	let builder = TokenCoordinator::builder(kind(), shared_store, shared_refresher);
	let builder = match validator {
		Some(validator) => builder.validator(validator),
		None => builder,
	};
	let coordinator = Arc::new(builder.build());
	let client =
		AuthorizedClient::new(transport.clone(), coordinator.clone(), Arc::new(BearerAuthorizer));

	Harness { transport, refresher, store, coordinator, client }
}

pub fn api_request() -> HttpRequest {
	HttpRequest::get("https://api.example.com/me".parse().expect("URL fixture should parse."))
}
