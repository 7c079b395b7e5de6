//! Request execution: credential lookup, send, classification, and bounded recovery.
//!
//! Two nested [`retry_when`] loops drive recovery. The outer loop resends the request while the
//! failure is an authorization problem (a 401 or a locally invalid credential) and fewer than
//! [`RetryPolicy::max_attempts`] sends have failed. Before each resend it runs the inner loop,
//! which asks the coordinator for a refresh and retries that refresh while the failure looks
//! transient and fewer than [`RetryPolicy::max_refresh_attempts`] refreshes have failed. A refresh
//! failure that ends the inner loop ends the outer loop too.

// std
use std::pin::pin;
// crates.io
use futures::{future, stream};
// self
use crate::{
	_prelude::*,
	auth::Credential,
	error::{ErrorKind, Stage},
	flows::{AttemptLog, AuthorizedClient},
	http::{HttpRequest, HttpResponse, Transport},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	reactive::{ErrorHistory, retry_when},
};

impl<T, C> AuthorizedClient<T, C>
where
	T: ?Sized + Transport,
	C: Credential,
{
	/// Sends `request` with the current credential, refreshing and resending on 401.
	///
	/// Resolves to `Ok(None)` only when the terminal error matched the predicate installed with
	/// [`AuthorizedClient::ignore_output_on_error`].
	pub async fn authorized_request(&self, request: HttpRequest) -> Result<Option<HttpResponse>> {
		const KIND: FlowKind = FlowKind::AuthorizedRequest;
		const STAGE: &str = "authorized_request";

		let span = FlowSpan::new(KIND, STAGE);

		obs::record_flow_outcome(KIND, STAGE, FlowOutcome::Attempt);

		let outcome = span.instrument(self.run(request)).await;

		match outcome {
			Ok(response) => {
				obs::record_flow_outcome(KIND, STAGE, FlowOutcome::Success);

				Ok(response)
			},
			Err(err) => {
				span.record_failure(&err);

				let _ = self.errors.send(err.clone());

				if self.ignore_output_on_error.as_ref().is_some_and(|ignore| ignore(&err)) {
					obs::record_flow_outcome(KIND, STAGE, FlowOutcome::Ignored);
					obs::debug_event!(error = %err, "Terminal error ignored by predicate.");

					Ok(None)
				} else {
					obs::record_flow_outcome(KIND, STAGE, FlowOutcome::Failure);

					Err(err)
				}
			},
		}
	}

	/// Like [`AuthorizedClient::authorized_request`], then decodes the body as JSON.
	///
	/// Decoding failures are reported under the network stage.
	pub async fn authorized_json<D>(&self, request: HttpRequest) -> Result<Option<D>>
	where
		D: DeserializeOwned,
	{
		let Some(response) = self.authorized_request(request).await? else {
			return Ok(None);
		};

		response.json().map(Some).map_err(|e| e.context(ErrorKind::Composite(Stage::Network)))
	}

	/// Sends `request` through the transport without attaching a credential.
	pub async fn request(&self, request: HttpRequest) -> Result<HttpResponse> {
		self.transport.send(request).await
	}

	async fn run(&self, request: HttpRequest) -> Result<Option<HttpResponse>> {
		let mut sends = pin!(retry_when(
			move || stream::once(self.attempt(request.clone())),
			|history| self.authorization_permits(history),
		));

		sends.next().await.transpose()
	}

	async fn attempt(&self, request: HttpRequest) -> Result<HttpResponse> {
		let credential = self
			.coordinator
			.current_credential()
			.await
			.map_err(|e| e.context(ErrorKind::Composite(Stage::LocalCredential)))?;
		let request = self.authorizer.authorize(request, &credential);

		self.transport.send(request).await.map_err(|e| e.context(ErrorKind::Composite(Stage::Network)))
	}

	fn authorization_permits(
		&self,
		history: ErrorHistory<Error>,
	) -> impl Stream<Item = Result<()>> + Send + '_ {
		let max_attempts = self.retry_policy.max_attempts;

		history
			.scan(AttemptLog::default(), |log, err| future::ready(Some(log.record(err))))
			.then(move |(failures, err)| async move {
				let recoverable = err.is_unauthorized() || err.is_locally_invalid();

				if recoverable && failures < max_attempts {
					obs::debug_event!(failures, error = %err, "Refreshing before resending.");

					self.refresh_with_retries().await
				} else {
					Err(err)
				}
			})
	}

	async fn refresh_with_retries(&self) -> Result<()> {
		let max_refresh_attempts = self.retry_policy.max_refresh_attempts;
		let coordinator = &self.coordinator;
		let mut refreshes = pin!(retry_when(
			move || {
				stream::once(async move {
					coordinator
						.refresh()
						.await
						.map(drop)
						.map_err(|e| e.context(ErrorKind::Composite(Stage::Refresh)))
				})
			},
			move |history: ErrorHistory<Error>| {
				history
					.scan(AttemptLog::default(), |log, err| future::ready(Some(log.record(err))))
					.map(move |(failures, err)| {
						let fatal =
							err.is_unauthorized() || err.is_client_error() || err.is_locally_invalid();

						if fatal || failures >= max_refresh_attempts { Err(err) } else { Ok(()) }
					})
			},
		));

		refreshes.next().await.unwrap_or(Ok(()))
	}
}
