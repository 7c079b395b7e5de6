//! Immutable bearer token records and their builder.

// self
use crate::{
	_prelude::*,
	auth::{Credential, TokenKind, TokenSecret},
};

/// Errors produced by [`BearerTokenBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum BearerTokenBuilderError {
	/// Issued when no access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Issued when the access token value is empty.
	#[error("Access token cannot be empty.")]
	EmptyAccessToken,
}

/// Bearer credential with an optional refresh secret and expiry.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BearerToken {
	/// Storage discriminator.
	pub kind: TokenKind,
	/// Access token secret attached to outbound requests.
	pub access_token: TokenSecret,
	/// Refresh token secret, if the authority issued one.
	pub refresh_token: Option<TokenSecret>,
	/// Instant the token was issued.
	pub issued_at: OffsetDateTime,
	/// Expiry instant; `None` means the authority did not advertise one.
	pub expires_at: Option<OffsetDateTime>,
}
impl BearerToken {
	/// Returns a builder for the provided storage kind.
	pub fn builder(kind: TokenKind) -> BearerTokenBuilder {
		BearerTokenBuilder::new(kind)
	}

	/// Returns `true` once `instant` reaches the expiry.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		self.expires_at.is_some_and(|expires_at| instant >= expires_at)
	}

	/// Returns `true` if the token expires within `window` of `instant`.
	pub fn expires_within(&self, instant: OffsetDateTime, window: Duration) -> bool {
		self.expires_at.is_some_and(|expires_at| expires_at - instant <= window)
	}

	/// Time left before expiry at `instant`, clamped at zero.
	pub fn remaining_at(&self, instant: OffsetDateTime) -> Option<Duration> {
		self.expires_at.map(|expires_at| (expires_at - instant).max(Duration::ZERO))
	}
}
impl Credential for BearerToken {
	type Kind = TokenKind;

	fn kind(&self) -> Self::Kind {
		self.kind.clone()
	}
}
impl Debug for BearerToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BearerToken")
			.field("kind", &self.kind)
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Builder for [`BearerToken`].
#[derive(Clone, Debug)]
pub struct BearerTokenBuilder {
	kind: TokenKind,
	access_token: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	issued_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
}
impl BearerTokenBuilder {
	fn new(kind: TokenKind) -> Self {
		Self {
			kind,
			access_token: None,
			refresh_token: None,
			issued_at: None,
			expires_at: None,
			expires_in: None,
		}
	}

	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Provides the refresh token value.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Sets the refresh secret from an optional existing value.
	pub fn maybe_refresh_token(mut self, token: Option<TokenSecret>) -> Self {
		self.refresh_token = token;

		self
	}

	/// Sets the issued-at instant.
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets a relative expiry measured from the issued instant.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Consumes the builder and produces a [`BearerToken`].
	pub fn build(self) -> Result<BearerToken, BearerTokenBuilderError> {
		let access_token = self.access_token.ok_or(BearerTokenBuilderError::MissingAccessToken)?;

		if access_token.is_empty() {
			return Err(BearerTokenBuilderError::EmptyAccessToken);
		}

		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		let expires_at = self.expires_at.or_else(|| self.expires_in.map(|delta| issued_at + delta));

		Ok(BearerToken {
			kind: self.kind,
			access_token,
			refresh_token: self.refresh_token,
			issued_at,
			expires_at,
		})
	}
}
