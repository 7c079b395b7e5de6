//! Transport primitives: plain request/response values, status classification, and the
//! [`Transport`] contract the pipeline sends through.
//!
//! A [`Transport`] returns `Ok` only for responses whose status classifies as success; every other
//! outcome is an [`Error`] whose [`ErrorKind`](crate::error::ErrorKind) drives the pipeline's
//! retry decisions. Implementations should finish with [`check_response`] so the classification
//! stays identical across transports.

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// self
use crate::{
	_prelude::*,
	error::{ErrorKind, StatusErrorKind, TransportErrorKind},
};

/// Response header carrying the server-side request identifier.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Boxed future returned by [`Transport::send`].
pub type TransportFuture<'a> = Pin<Box<dyn Future<Output = Result<HttpResponse>> + 'a + Send>>;

/// Executes HTTP requests and classifies their outcome.
pub trait Transport
where
	Self: 'static + Send + Sync,
{
	/// Sends `request`, resolving to the response for success statuses and to a classified error
	/// for everything else.
	fn send(&self, request: HttpRequest) -> TransportFuture<'_>;
}
impl<T> Transport for Arc<T>
where
	T: ?Sized + Transport,
{
	fn send(&self, request: HttpRequest) -> TransportFuture<'_> {
		(**self).send(request)
	}
}

/// Yes/no connectivity signal consulted before a request leaves the process.
pub trait Reachability
where
	Self: Send + Sync,
{
	/// Returns `true` while a network path is available.
	fn is_reachable(&self) -> bool;
}
impl<F> Reachability for F
where
	F: Send + Sync + Fn() -> bool,
{
	fn is_reachable(&self) -> bool {
		self()
	}
}

/// HTTP request methods supported by the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
	/// `GET`.
	Get,
	/// `POST`.
	Post,
	/// `PUT`.
	Put,
	/// `PATCH`.
	Patch,
	/// `DELETE`.
	Delete,
	/// `HEAD`.
	Head,
}
impl Method {
	/// Returns the method token as sent on the wire.
	pub const fn as_str(self) -> &'static str {
		match self {
			Method::Get => "GET",
			Method::Post => "POST",
			Method::Put => "PUT",
			Method::Patch => "PATCH",
			Method::Delete => "DELETE",
			Method::Head => "HEAD",
		}
	}
}
impl Display for Method {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Single header name/value pair. Names compare case-insensitively on lookup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpHeader {
	/// Header name.
	pub name: String,
	/// Header value.
	pub value: String,
}
impl HttpHeader {
	/// Creates a header pair.
	pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
		Self { name: name.into(), value: value.into() }
	}
}

fn find_header<'a>(headers: &'a [HttpHeader], name: &str) -> Option<&'a str> {
	headers
		.iter()
		.find(|header| header.name.eq_ignore_ascii_case(name))
		.map(|header| header.value.as_str())
}

/// Outbound HTTP request built with chained setters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpRequest {
	/// Request method.
	pub method: Method,
	/// Absolute target URL.
	pub url: Url,
	/// Request headers in insertion order.
	pub headers: Vec<HttpHeader>,
	/// Raw request body.
	pub body: Vec<u8>,
}
impl HttpRequest {
	/// Creates a request without headers or body.
	pub fn new(method: Method, url: Url) -> Self {
		Self { method, url, headers: Vec::new(), body: Vec::new() }
	}

	/// Shorthand for a `GET` request.
	pub fn get(url: Url) -> Self {
		Self::new(Method::Get, url)
	}

	/// Shorthand for a `POST` request.
	pub fn post(url: Url) -> Self {
		Self::new(Method::Post, url)
	}

	/// Sets `name`, replacing any existing header with the same name.
	pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		let header = HttpHeader::new(name, value);

		self.headers.retain(|existing| !existing.name.eq_ignore_ascii_case(&header.name));
		self.headers.push(header);

		self
	}

	/// Sets `Authorization: Bearer <token>`.
	pub fn bearer_auth(self, token: &str) -> Self {
		self.header("authorization", format!("Bearer {token}"))
	}

	/// Replaces the body.
	pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = body.into();

		self
	}

	/// Replaces the body with an `application/x-www-form-urlencoded` payload.
	pub fn form<'a>(self, pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
		let encoded = url::form_urlencoded::Serializer::new(String::new())
			.extend_pairs(pairs)
			.finish();

		self.header("content-type", "application/x-www-form-urlencoded").body(encoded)
	}

	/// Returns the value of the first header named `name`.
	pub fn header_value(&self, name: &str) -> Option<&str> {
		find_header(&self.headers, name)
	}
}

/// Response returned by a [`Transport`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpResponse {
	/// HTTP status code.
	pub status: u16,
	/// Response headers in wire order.
	pub headers: Vec<HttpHeader>,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl HttpResponse {
	/// Creates a response with no headers.
	pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
		Self { status, headers: Vec::new(), body: body.into() }
	}

	/// Appends a header.
	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push(HttpHeader::new(name, value));

		self
	}

	/// Returns the value of the first header named `name`.
	pub fn header(&self, name: &str) -> Option<&str> {
		find_header(&self.headers, name)
	}

	/// Decodes the body as JSON, reporting the failing field path as [`ErrorKind::Decoding`].
	pub fn json<D>(&self) -> Result<D>
	where
		D: DeserializeOwned,
	{
		let mut deserializer = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut deserializer).map_err(|e| {
			let err = Error::new(ErrorKind::Decoding(format!("{}: {}", e.path(), e.inner())));

			match self.header(REQUEST_ID_HEADER) {
				Some(request_id) => err.with_request_id(request_id),
				None => err,
			}
		})
	}
}

/// Maps a status code onto the error taxonomy; `Ok` means the status counts as success.
pub fn classify_status(status: u16) -> Result<(), ErrorKind> {
	match status {
		401 => Err(StatusErrorKind::Unauthorized.into()),
		408 => Err(TransportErrorKind::Timeout.into()),
		400 | 402..=499 => Err(StatusErrorKind::Client(status).into()),
		500..=599 => Err(StatusErrorKind::Server(status).into()),
		_ => Ok(()),
	}
}

/// Applies [`classify_status`] to a received response, attaching its request id on failure.
pub fn check_response(response: HttpResponse) -> Result<HttpResponse> {
	match classify_status(response.status) {
		Ok(()) => Ok(response),
		Err(kind) => {
			let err = Error::new(kind);

			match response.header(REQUEST_ID_HEADER) {
				Some(request_id) => Err(err.with_request_id(request_id)),
				None => Err(err),
			}
		},
	}
}

/// Transport wrapper that fails fast with `NoConnection` while the network is unreachable.
pub struct ReachabilityTransport<T>
where
	T: Transport,
{
	inner: T,
	reachability: Arc<dyn Reachability>,
}
impl<T> ReachabilityTransport<T>
where
	T: Transport,
{
	/// Wraps `inner`, consulting `reachability` before each send.
	pub fn new(inner: T, reachability: Arc<dyn Reachability>) -> Self {
		Self { inner, reachability }
	}

	/// Returns the wrapped transport.
	pub fn inner(&self) -> &T {
		&self.inner
	}
}
impl<T> Transport for ReachabilityTransport<T>
where
	T: Transport,
{
	fn send(&self, request: HttpRequest) -> TransportFuture<'_> {
		if !self.reachability.is_reachable() {
			return Box::pin(async { Err(Error::new(TransportErrorKind::NoConnection)) });
		}

		self.inner.send(request)
	}
}
impl<T> Debug for ReachabilityTransport<T>
where
	T: Transport + Debug,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ReachabilityTransport")
			.field("inner", &self.inner)
			.field("reachable", &self.reachability.is_reachable())
			.finish()
	}
}

/// Thin wrapper around [`ReqwestClient`] implementing [`Transport`].
///
/// Redirect handling, proxies, and TLS settings come from the wrapped client, so configure a
/// custom [`ReqwestClient`] and pass it to [`ReqwestTransport::with_client`] when the defaults do
/// not fit.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	async fn execute(client: ReqwestClient, request: HttpRequest) -> Result<HttpResponse> {
		let mut builder = client.request(reqwest_method(request.method), request.url);

		for header in &request.headers {
			builder = builder.header(header.name.as_str(), header.value.as_str());
		}
		if !request.body.is_empty() {
			builder = builder.body(request.body);
		}

		let response = builder.send().await.map_err(map_reqwest_error)?;
		let status = response.status().as_u16();
		let headers = response
			.headers()
			.iter()
			.filter_map(|(name, value)| {
				value.to_str().ok().map(|value| HttpHeader::new(name.as_str(), value))
			})
			.collect();
		let body = response.bytes().await.map_err(map_reqwest_error)?.to_vec();

		check_response(HttpResponse { status, headers, body })
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestTransport {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Transport for ReqwestTransport {
	fn send(&self, request: HttpRequest) -> TransportFuture<'_> {
		Box::pin(Self::execute(self.0.clone(), request))
	}
}

#[cfg(feature = "reqwest")]
fn reqwest_method(method: Method) -> reqwest::Method {
	match method {
		Method::Get => reqwest::Method::GET,
		Method::Post => reqwest::Method::POST,
		Method::Put => reqwest::Method::PUT,
		Method::Patch => reqwest::Method::PATCH,
		Method::Delete => reqwest::Method::DELETE,
		Method::Head => reqwest::Method::HEAD,
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(err: ReqwestError) -> Error {
	if err.is_timeout() {
		TransportErrorKind::Timeout.into()
	} else if err.is_connect() {
		TransportErrorKind::NoConnection.into()
	} else if err.is_decode() || err.is_body() {
		TransportErrorKind::InvalidResponse.into()
	} else {
		TransportErrorKind::Url(err.to_string()).into()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
	// self
	use super::*;

	fn url(value: &str) -> Url {
		Url::parse(value).expect("Test URL should parse.")
	}

	#[test]
	fn status_classification_matches_the_taxonomy() {
		assert_eq!(classify_status(200), Ok(()));
		assert_eq!(classify_status(304), Ok(()));
		assert_eq!(classify_status(401), Err(StatusErrorKind::Unauthorized.into()));
		assert_eq!(classify_status(408), Err(TransportErrorKind::Timeout.into()));
		assert_eq!(classify_status(400), Err(StatusErrorKind::Client(400).into()));
		assert_eq!(classify_status(429), Err(StatusErrorKind::Client(429).into()));
		assert_eq!(classify_status(503), Err(StatusErrorKind::Server(503).into()));
	}

	#[test]
	fn check_response_attaches_request_id() {
		let err = check_response(HttpResponse::new(500, "oops").with_header("X-Request-Id", "r-1"))
			.expect_err("A 500 must be classified as a failure.");

		assert_eq!(err.kind(), &ErrorKind::Status(StatusErrorKind::Server(500)));
		assert_eq!(err.request_id(), Some("r-1"));
		assert_eq!(err, Error::new(StatusErrorKind::Server(500)));
	}

	#[test]
	fn json_decoding_reports_the_failing_path() {
		#[derive(Debug, Deserialize)]
		struct Profile {
			#[allow(dead_code)]
			id: u64,
		}

		let ok = HttpResponse::new(200, r#"{"id":7}"#).json::<Profile>();

		assert!(ok.is_ok());

		let err = HttpResponse::new(200, r#"{"id":"seven"}"#)
			.json::<Profile>()
			.expect_err("A string id must fail to decode.");

		match err.kind() {
			ErrorKind::Decoding(message) => assert!(message.starts_with("id:")),
			other => panic!("Unexpected error kind: {other:?}."),
		}
	}

	#[test]
	fn request_builder_replaces_headers_case_insensitively() {
		let request = HttpRequest::get(url("https://api.example.com/me"))
			.header("Authorization", "Basic abc")
			.bearer_auth("token-1");

		assert_eq!(request.headers.len(), 1);
		assert_eq!(request.header_value("AUTHORIZATION"), Some("Bearer token-1"));
	}

	#[test]
	fn form_bodies_are_url_encoded() {
		let request = HttpRequest::post(url("https://auth.example.com/token"))
			.form([("grant_type", "refresh_token"), ("refresh_token", "a b&c")]);

		assert_eq!(request.header_value("content-type"), Some("application/x-www-form-urlencoded"));
		assert_eq!(request.body, b"grant_type=refresh_token&refresh_token=a+b%26c".to_vec());
	}

	#[derive(Default)]
	struct CountingTransport(AtomicUsize);
	impl Transport for CountingTransport {
		fn send(&self, _request: HttpRequest) -> TransportFuture<'_> {
			self.0.fetch_add(1, Ordering::SeqCst);

			Box::pin(async { Ok(HttpResponse::new(204, Vec::new())) })
		}
	}

	#[tokio::test]
	async fn unreachable_network_short_circuits_the_inner_transport() {
		let online = Arc::new(AtomicBool::new(false));
		let flag = online.clone();
		let transport = ReachabilityTransport::new(
			CountingTransport::default(),
			Arc::new(move || flag.load(Ordering::SeqCst)),
		);
		let request = HttpRequest::get(url("https://api.example.com/me"));
		let err = transport.send(request.clone()).await.expect_err("Offline send must fail.");

		assert_eq!(err.kind(), &ErrorKind::Transport(TransportErrorKind::NoConnection));
		assert_eq!(transport.inner().0.load(Ordering::SeqCst), 0);

		online.store(true, Ordering::SeqCst);

		let response = transport.send(request).await.expect("Online send should succeed.");

		assert_eq!(response.status, 204);
		assert_eq!(transport.inner().0.load(Ordering::SeqCst), 1);
	}
}
