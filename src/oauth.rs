//! OAuth 2.0 `refresh_token` grant implemented on top of any [`Transport`].

// self
use crate::{
	_prelude::*,
	auth::{BearerToken, ClientId, TokenSecret},
	coordinator::{RefreshFuture, RefreshRequester},
	error::{CredentialErrorKind, ErrorKind},
	http::{HttpRequest, Transport},
};

/// Token endpoint response fields consumed by [`OAuthRefreshRequester`].
#[derive(Clone, Debug, Deserialize)]
struct TokenEndpointResponse {
	access_token: String,
	#[serde(default)]
	refresh_token: Option<String>,
	#[serde(default)]
	expires_in: Option<i64>,
}

/// Refreshes [`BearerToken`]s by posting `grant_type=refresh_token` to a token endpoint.
///
/// When the response omits `refresh_token`, the stale refresh secret is kept. A stale token that
/// has no refresh secret fails with [`CredentialErrorKind::RefreshFailed`] before any request is
/// sent.
pub struct OAuthRefreshRequester<T>
where
	T: ?Sized + Transport,
{
	transport: Arc<T>,
	token_endpoint: Url,
	client_id: ClientId,
	client_secret: Option<TokenSecret>,
	scope: Option<String>,
}
impl<T> OAuthRefreshRequester<T>
where
	T: ?Sized + Transport,
{
	/// Creates a requester for a public client.
	pub fn new(transport: impl Into<Arc<T>>, token_endpoint: Url, client_id: ClientId) -> Self {
		Self {
			transport: transport.into(),
			token_endpoint,
			client_id,
			client_secret: None,
			scope: None,
		}
	}

	/// Sends `client_secret` in the form body (`client_secret_post`).
	pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
		self.client_secret = Some(TokenSecret::new(secret));

		self
	}

	/// Requests a specific scope on every refresh.
	pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
		self.scope = Some(scope.into());

		self
	}

	/// Token endpoint the requester posts to.
	pub fn token_endpoint(&self) -> &Url {
		&self.token_endpoint
	}

	async fn exchange(&self, stale: BearerToken) -> Result<BearerToken> {
		let refresh_token = stale
			.refresh_token
			.clone()
			.ok_or_else(|| Error::new(CredentialErrorKind::RefreshFailed))?;
		let mut pairs = vec![
			("grant_type", "refresh_token"),
			("refresh_token", refresh_token.expose()),
			("client_id", self.client_id.as_ref()),
		];

		if let Some(secret) = &self.client_secret {
			pairs.push(("client_secret", secret.expose()));
		}
		if let Some(scope) = &self.scope {
			pairs.push(("scope", scope.as_str()));
		}

		let request = HttpRequest::post(self.token_endpoint.clone())
			.header("Accept", "application/json")
			.form(pairs);
		let response = self.transport.send(request).await?;
		let body = response.json::<TokenEndpointResponse>()?;
		let builder = BearerToken::builder(stale.kind.clone())
			.access_token(body.access_token)
			.issued_at(OffsetDateTime::now_utc())
			.maybe_refresh_token(body.refresh_token.map(TokenSecret::new).or(Some(refresh_token)));
		let builder = match body.expires_in {
			Some(seconds) if seconds <= 0 =>
				return Err(Error::new(ErrorKind::Decoding(format!(
					"expires_in: expected a positive number of seconds, got {seconds}"
				)))),
			Some(seconds) => builder.expires_in(Duration::seconds(seconds)),
			None => builder,
		};

		builder.build().map_err(|e| Error::new(ErrorKind::Decoding(e.to_string())))
	}
}
impl<T> RefreshRequester<BearerToken> for OAuthRefreshRequester<T>
where
	T: ?Sized + Transport,
{
	fn refresh(&self, stale: BearerToken) -> RefreshFuture<'_, BearerToken> {
		Box::pin(self.exchange(stale))
	}
}
impl<T> Debug for OAuthRefreshRequester<T>
where
	T: ?Sized + Transport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OAuthRefreshRequester")
			.field("token_endpoint", &self.token_endpoint.as_str())
			.field("client_id", &self.client_id)
			.field("client_secret_set", &self.client_secret.is_some())
			.field("scope", &self.scope)
			.finish()
	}
}
