//! The authorized request pipeline built on the transport, coordinator, and authorizer.

pub mod common;

mod authorized;

pub use common::*;

// crates.io
use tokio::sync::broadcast;
// self
use crate::{
	_prelude::*,
	auth::Credential,
	coordinator::TokenCoordinator,
	ext::RequestAuthorizer,
	http::Transport,
};
#[cfg(feature = "reqwest")] use crate::{auth::BearerToken, http::ReqwestTransport};

/// Predicate deciding whether a terminal error is swallowed.
pub type IgnoreOnError = Arc<dyn Fn(&Error) -> bool + Send + Sync>;

#[cfg(feature = "reqwest")]
/// Pipeline specialized for the crate's default reqwest transport and bearer tokens.
pub type ReqwestAuthorizedClient = AuthorizedClient<ReqwestTransport, BearerToken>;

/// Sends requests with the current credential and recovers from authorization failures.
///
/// A failed send whose error chain holds a 401 or a locally invalid credential triggers a
/// coordinated refresh followed by a resend, bounded by [`RetryPolicy`]. Every other failure is
/// returned as is, wrapped in a [`Stage`](crate::error::Stage) marker that names where it
/// happened. Each call keeps its own attempt counters, so concurrent requests never share retry
/// budgets while still sharing one refresh session through the coordinator.
pub struct AuthorizedClient<T, C>
where
	T: ?Sized + Transport,
	C: Credential,
{
	/// Transport used for every outbound request.
	pub transport: Arc<T>,
	/// Coordinator that owns the credential lifecycle.
	pub coordinator: Arc<TokenCoordinator<C>>,
	/// Attaches the credential to outbound requests.
	pub authorizer: Arc<dyn RequestAuthorizer<C>>,
	/// Retry bounds for sends and refreshes.
	pub retry_policy: RetryPolicy,
	ignore_output_on_error: Option<IgnoreOnError>,
	errors: broadcast::Sender<Error>,
}
impl<T, C> AuthorizedClient<T, C>
where
	T: ?Sized + Transport,
	C: Credential,
{
	const ERROR_CHANNEL_CAPACITY: usize = 32;

	/// Creates a pipeline with the default [`RetryPolicy`] and no ignore predicate.
	pub fn new(
		transport: impl Into<Arc<T>>,
		coordinator: Arc<TokenCoordinator<C>>,
		authorizer: Arc<dyn RequestAuthorizer<C>>,
	) -> Self {
		Self {
			transport: transport.into(),
			coordinator,
			authorizer,
			retry_policy: RetryPolicy::default(),
			ignore_output_on_error: None,
			errors: broadcast::channel(Self::ERROR_CHANNEL_CAPACITY).0,
		}
	}

	/// Replaces the retry bounds.
	pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
		self.retry_policy = policy;

		self
	}

	/// Completes with no output, instead of failing, when `predicate` matches the terminal error.
	///
	/// Subscribers registered through [`AuthorizedClient::subscribe_errors`] still observe the
	/// error.
	pub fn ignore_output_on_error(
		mut self,
		predicate: impl Fn(&Error) -> bool + Send + Sync + 'static,
	) -> Self {
		self.ignore_output_on_error = Some(Arc::new(predicate));

		self
	}

	/// Subscribes to every terminal error this pipeline produces, ignored ones included.
	pub fn subscribe_errors(&self) -> broadcast::Receiver<Error> {
		self.errors.subscribe()
	}
}
#[cfg(feature = "reqwest")]
impl ReqwestAuthorizedClient {
	/// Creates a pipeline over a default reqwest transport that sends bearer tokens.
	pub fn with_reqwest(coordinator: Arc<TokenCoordinator<BearerToken>>) -> Self {
		Self::new(ReqwestTransport::default(), coordinator, Arc::new(crate::ext::BearerAuthorizer))
	}
}
impl<T, C> Clone for AuthorizedClient<T, C>
where
	T: ?Sized + Transport,
	C: Credential,
{
	fn clone(&self) -> Self {
		Self {
			transport: self.transport.clone(),
			coordinator: self.coordinator.clone(),
			authorizer: self.authorizer.clone(),
			retry_policy: self.retry_policy,
			ignore_output_on_error: self.ignore_output_on_error.clone(),
			errors: self.errors.clone(),
		}
	}
}
impl<T, C> Debug for AuthorizedClient<T, C>
where
	T: ?Sized + Transport,
	C: Credential,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthorizedClient")
			.field("coordinator", &self.coordinator)
			.field("retry_policy", &self.retry_policy)
			.field("ignores_errors", &self.ignore_output_on_error.is_some())
			.finish()
	}
}
