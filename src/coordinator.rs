//! Single-flight credential refresh shared by every caller of one credential kind.
//!
//! The coordinator owns no credential copy. [`TokenCoordinator::current_credential`] always reads
//! the store, and [`TokenCoordinator::refresh`] runs at most one refresh session at a time:
//!
//! 1. A caller subscribes to the session outcome and fires the single-flight gate. If a session is
//!    already running the trigger is dropped and the caller simply waits for that session.
//! 2. The session loads the stale credential, calls the [`RefreshRequester`], and persists the
//!    result. Its outcome is materialized, so a failure is an ordinary event that reopens the gate
//!    instead of tearing it down.
//! 3. The outcome is broadcast to every subscribed caller, which then races "first success"
//!    against "first failure" and returns whichever arrives.
//!
//! No task is spawned. Each waiting caller races its outcome subscription against *driving* the
//! gate, and only the caller holding the driver lock polls the session. When that caller is
//! dropped, the next waiter picks the session up where it stopped.

mod metrics;

pub use metrics::RefreshMetrics;

// crates.io
use futures::{future, stream};
use tokio::sync::broadcast::{self, Receiver, Sender, error::RecvError};
// self
use crate::{
	_prelude::*,
	auth::Credential,
	error::CredentialErrorKind,
	ext::{AlwaysValid, CredentialValidator},
	obs::{self, FlowKind},
	reactive::{Event, GateTrigger, ReactiveExt, SingleFlightGate, race},
	store::CredentialStore,
};

type Session<C> = BoxStream<'static, Event<C, Error>>;

/// Boxed future returned by [`RefreshRequester::refresh`].
pub type RefreshFuture<'a, C> = Pin<Box<dyn Future<Output = Result<C>> + 'a + Send>>;

/// Exchanges a stale credential for a fresh one.
pub trait RefreshRequester<C>
where
	Self: Send + Sync,
	C: Credential,
{
	/// Performs the remote refresh call for `stale`.
	fn refresh(&self, stale: C) -> RefreshFuture<'_, C>;
}
impl<C, F, Fut> RefreshRequester<C> for F
where
	C: Credential,
	F: Send + Sync + Fn(C) -> Fut,
	Fut: 'static + Send + Future<Output = Result<C>>,
{
	fn refresh(&self, stale: C) -> RefreshFuture<'_, C> {
		Box::pin(self(stale))
	}
}

/// Serializes credential refreshes for one credential kind.
pub struct TokenCoordinator<C>
where
	C: Credential,
{
	kind: C::Kind,
	store: Arc<dyn CredentialStore<C>>,
	refresher: Arc<dyn RefreshRequester<C>>,
	validator: Arc<dyn CredentialValidator<C>>,
	outcomes: Mutex<Outcomes<C>>,
	trigger: GateTrigger<Session<C>>,
	driver: AsyncMutex<SingleFlightGate<Session<C>>>,
	metrics: Arc<RefreshMetrics>,
}
impl<C> TokenCoordinator<C>
where
	C: Credential,
{
	const DEFAULT_BROADCAST_CAPACITY: usize = 16;

	/// Creates a coordinator that accepts every stored credential as valid.
	pub fn new(
		kind: C::Kind,
		store: Arc<dyn CredentialStore<C>>,
		refresher: Arc<dyn RefreshRequester<C>>,
	) -> Self {
		Self::builder(kind, store, refresher).build()
	}

	/// Starts a builder for a coordinator over `kind`.
	pub fn builder(
		kind: C::Kind,
		store: Arc<dyn CredentialStore<C>>,
		refresher: Arc<dyn RefreshRequester<C>>,
	) -> TokenCoordinatorBuilder<C> {
		TokenCoordinatorBuilder {
			kind,
			store,
			refresher,
			validator: None,
			broadcast_capacity: Self::DEFAULT_BROADCAST_CAPACITY,
		}
	}

	/// Storage discriminator this coordinator manages.
	pub fn kind(&self) -> &C::Kind {
		&self.kind
	}

	/// Shared refresh counters.
	pub fn metrics(&self) -> Arc<RefreshMetrics> {
		self.metrics.clone()
	}

	/// Returns `true` while a refresh session is in flight.
	pub fn is_refreshing(&self) -> bool {
		self.trigger.is_running()
	}

	/// Loads the persisted credential and checks it with the configured validator.
	///
	/// While a refresh is in flight this waits for its outcome first (without starting a new
	/// session), so callers never read a credential that is about to be replaced.
	pub async fn current_credential(&self) -> Result<C> {
		obs::observe(FlowKind::CurrentCredential, "current_credential", async {
			if let Some((succeeded, failed)) = self.observe_session() {
				obs::debug_event!("Waiting for the in-flight refresh before loading.");

				// Either outcome means the store is settled; the load below decides.
				let _ = race(self.outcome(succeeded, failed), self.drive()).await;
			}

			let credential = self
				.store
				.load(&self.kind)
				.await
				.map_err(|e| Error::from(e).context(CredentialErrorKind::LoadFailed))?;

			if self.validator.is_valid(&credential).await {
				Ok(credential)
			} else {
				Err(Error::new(CredentialErrorKind::LocalInvalid))
			}
		})
		.await
	}

	/// Refreshes the credential, joining the in-flight session if there is one.
	///
	/// Every caller that joined the same session receives the same outcome: either the new
	/// credential or the session's error, which is classified as
	/// [`CredentialErrorKind::LoadFailed`], [`CredentialErrorKind::RefreshFailed`], or
	/// [`CredentialErrorKind::StoreFailed`] wrapping the underlying cause.
	pub async fn refresh(&self) -> Result<C> {
		obs::observe(FlowKind::Refresh, "refresh", async {
			let (succeeded, failed) = self.join_session();

			race(self.outcome(succeeded, failed), self.drive()).await
		})
		.await
	}

	/// Deletes the persisted credential.
	pub async fn clear(&self) -> Result<()> {
		self.store
			.delete(&self.kind)
			.await
			.map_err(|e| Error::from(e).context(CredentialErrorKind::DeleteFailed))
	}

	// Subscribing and firing the gate happen under the outcome lock, so a session can never
	// publish between the two steps.
	fn join_session(&self) -> (Receiver<C>, Receiver<Error>) {
		let outcomes = self.outcomes.lock();
		let receivers = (outcomes.succeeded.subscribe(), outcomes.failed.subscribe());

		if self.trigger.trigger(|| self.session()) {
			self.metrics.record_attempt();

			obs::debug_event!(kind = ?self.kind, "Started a refresh session.");
		} else {
			self.metrics.record_join();

			obs::debug_event!(kind = ?self.kind, "Joined the in-flight refresh session.");
		}

		receivers
	}

	fn observe_session(&self) -> Option<(Receiver<C>, Receiver<Error>)> {
		let outcomes = self.outcomes.lock();

		self.trigger
			.is_running()
			.then(|| (outcomes.succeeded.subscribe(), outcomes.failed.subscribe()))
	}

	fn session(&self) -> Session<C> {
		let kind = self.kind.clone();
		let store = self.store.clone();
		let refresher = self.refresher.clone();

		stream::once(async move {
			let stale = store
				.load(&kind)
				.await
				.map_err(|e| Error::from(e).context(CredentialErrorKind::LoadFailed))?;
			let fresh = refresher
				.refresh(stale)
				.await
				.map_err(|e| e.context(CredentialErrorKind::RefreshFailed))?;

			store
				.store(fresh.clone())
				.await
				.map_err(|e| Error::from(e).context(CredentialErrorKind::StoreFailed))?;

			Ok::<_, Error>(fresh)
		})
		.materialize()
		.boxed()
	}

	async fn outcome(&self, succeeded: Receiver<C>, failed: Receiver<Error>) -> Result<C> {
		race(first_success(succeeded), first_failure(failed)).await
	}

	async fn drive<T>(&self) -> T {
		let mut gate = self.driver.lock().await;

		loop {
			match gate.next().await {
				Some(event) => self.publish(event, gate.generation()),
				None => future::pending::<()>().await,
			}
		}
	}

	// Reopening the gate and broadcasting happen under the outcome lock, so a caller that joins
	// after the broadcast always starts a new session instead of waiting on a finished one.
	fn publish(&self, event: Event<C, Error>, generation: u64) {
		let outcomes = self.outcomes.lock();

		if event.is_outcome() {
			self.trigger.release(generation);
		}

		match event {
			Event::Value(credential) => {
				self.metrics.record_success();

				obs::debug_event!(kind = ?self.kind, "Refresh session succeeded.");

				let _ = outcomes.succeeded.send(credential);
			},
			Event::Failure(err) => {
				self.metrics.record_failure();

				obs::debug_event!(kind = ?self.kind, error = %err, "Refresh session failed.");

				let _ = outcomes.failed.send(err);
			},
			Event::Finished => {},
		}
	}
}
impl<C> Debug for TokenCoordinator<C>
where
	C: Credential,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenCoordinator")
			.field("kind", &self.kind)
			.field("refreshing", &self.is_refreshing())
			.field("metrics", &self.metrics)
			.finish()
	}
}

/// Builder for [`TokenCoordinator`].
pub struct TokenCoordinatorBuilder<C>
where
	C: Credential,
{
	kind: C::Kind,
	store: Arc<dyn CredentialStore<C>>,
	refresher: Arc<dyn RefreshRequester<C>>,
	validator: Option<Arc<dyn CredentialValidator<C>>>,
	broadcast_capacity: usize,
}
impl<C> TokenCoordinatorBuilder<C>
where
	C: Credential,
{
	/// Sets the validator consulted by [`TokenCoordinator::current_credential`].
	pub fn validator(mut self, validator: Arc<dyn CredentialValidator<C>>) -> Self {
		self.validator = Some(validator);

		self
	}

	/// Overrides the outcome channel capacity (defaults to 16, minimum 1).
	pub fn broadcast_capacity(mut self, capacity: usize) -> Self {
		self.broadcast_capacity = capacity.max(1);

		self
	}

	/// Builds the coordinator.
	pub fn build(self) -> TokenCoordinator<C> {
		let (trigger, gate) = SingleFlightGate::new();

		TokenCoordinator {
			kind: self.kind,
			store: self.store,
			refresher: self.refresher,
			validator: self.validator.unwrap_or_else(|| Arc::new(AlwaysValid)),
			outcomes: Mutex::new(Outcomes::new(self.broadcast_capacity)),
			trigger,
			driver: AsyncMutex::new(gate),
			metrics: Default::default(),
		}
	}
}
impl<C> Debug for TokenCoordinatorBuilder<C>
where
	C: Credential,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenCoordinatorBuilder")
			.field("kind", &self.kind)
			.field("custom_validator", &self.validator.is_some())
			.field("broadcast_capacity", &self.broadcast_capacity)
			.finish()
	}
}

struct Outcomes<C> {
	succeeded: Sender<C>,
	failed: Sender<Error>,
}
impl<C> Outcomes<C>
where
	C: Clone,
{
	fn new(capacity: usize) -> Self {
		Self { succeeded: broadcast::channel(capacity).0, failed: broadcast::channel(capacity).0 }
	}
}

async fn first_success<C>(mut succeeded: Receiver<C>) -> Result<C>
where
	C: Clone,
{
	loop {
		match succeeded.recv().await {
			Ok(credential) => return Ok(credential),
			Err(RecvError::Lagged(_)) => continue,
			Err(RecvError::Closed) => return future::pending().await,
		}
	}
}

async fn first_failure<C>(mut failed: Receiver<Error>) -> Result<C> {
	loop {
		match failed.recv().await {
			Ok(err) => return Err(err),
			Err(RecvError::Lagged(_)) => continue,
			Err(RecvError::Closed) => return future::pending().await,
		}
	}
}
