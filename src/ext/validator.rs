//! Local credential validation consulted before every authorized request.

// self
use crate::{
	_prelude::*,
	auth::{BearerToken, Credential},
};

/// Boxed future returned by [`CredentialValidator::is_valid`].
pub type ValidatorFuture<'a> = Pin<Box<dyn Future<Output = bool> + 'a + Send>>;

/// Decides whether a persisted credential is still usable without contacting the server.
///
/// A `false` answer surfaces as
/// [`CredentialErrorKind::LocalInvalid`](crate::error::CredentialErrorKind::LocalInvalid), which
/// the pipeline treats like a 401 and answers with a refresh.
pub trait CredentialValidator<C>
where
	Self: Send + Sync,
	C: Credential,
{
	/// Resolves to `true` while `credential` may be attached to requests.
	fn is_valid<'a>(&'a self, credential: &'a C) -> ValidatorFuture<'a>;
}
impl<C, F> CredentialValidator<C> for F
where
	C: Credential,
	F: Send + Sync + Fn(&C) -> bool,
{
	fn is_valid<'a>(&'a self, credential: &'a C) -> ValidatorFuture<'a> {
		let valid = self(credential);

		Box::pin(async move { valid })
	}
}

/// Accepts every credential.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlwaysValid;
impl<C> CredentialValidator<C> for AlwaysValid
where
	C: Credential,
{
	fn is_valid<'a>(&'a self, _: &'a C) -> ValidatorFuture<'a> {
		Box::pin(async { true })
	}
}

/// Rejects bearer tokens that expire within `leeway` of the current time.
///
/// Tokens without an advertised expiry are always valid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExpiryValidator {
	/// Safety margin subtracted from the expiry.
	pub leeway: Duration,
}
impl ExpiryValidator {
	const DEFAULT_LEEWAY: Duration = Duration::seconds(30);

	/// Creates a validator with a custom leeway; negative values are clamped to zero.
	pub fn new(leeway: Duration) -> Self {
		Self { leeway: if leeway.is_negative() { Duration::ZERO } else { leeway } }
	}

	/// Synchronous check against an explicit instant.
	pub fn is_valid_at(&self, token: &BearerToken, now: OffsetDateTime) -> bool {
		token.expires_at.is_none_or(|expires_at| now + self.leeway < expires_at)
	}
}
impl Default for ExpiryValidator {
	fn default() -> Self {
		Self::new(Self::DEFAULT_LEEWAY)
	}
}
impl CredentialValidator<BearerToken> for ExpiryValidator {
	fn is_valid<'a>(&'a self, credential: &'a BearerToken) -> ValidatorFuture<'a> {
		let valid = self.is_valid_at(credential, OffsetDateTime::now_utc());

		Box::pin(async move { valid })
	}
}
