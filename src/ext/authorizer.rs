//! Contracts for attaching a credential to an outbound request.

// self
use crate::{
	_prelude::*,
	auth::{BearerToken, Credential},
	http::HttpRequest,
};

/// Describes how to attach a credential to an outbound [`HttpRequest`].
///
/// Authorization is a pure transformation: it never performs I/O and never fails, so the pipeline
/// can re-authorize the same request after every refresh.
pub trait RequestAuthorizer<C>
where
	Self: Send + Sync,
	C: Credential,
{
	/// Returns `request` with authorization state derived from `credential`.
	fn authorize(&self, request: HttpRequest, credential: &C) -> HttpRequest;
}
impl<C, F> RequestAuthorizer<C> for F
where
	C: Credential,
	F: Send + Sync + Fn(HttpRequest, &C) -> HttpRequest,
{
	fn authorize(&self, request: HttpRequest, credential: &C) -> HttpRequest {
		self(request, credential)
	}
}

/// Sets `Authorization: Bearer <access token>` on every request.
#[derive(Clone, Copy, Debug, Default)]
pub struct BearerAuthorizer;
impl RequestAuthorizer<BearerToken> for BearerAuthorizer {
	fn authorize(&self, request: HttpRequest, credential: &BearerToken) -> HttpRequest {
		request.bearer_auth(credential.access_token.expose())
	}
}
