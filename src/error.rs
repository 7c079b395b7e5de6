//! Failure classifications and cause chains shared by every pipeline stage.
//!
//! Each [`Error`] carries one [`ErrorKind`] plus an optional lower-level cause, forming a singly
//! linked chain that ends at the root failure. Wrapping an error with [`Error::context`] keeps the
//! wrapped error's correlation id, so the whole chain can be traced under one identifier. Equality
//! compares the classifications of the full chain and ignores correlation ids, which makes two
//! independently produced failures with the same shape compare equal.

// crates.io
use uuid::Uuid;
// self
use crate::{_prelude::*, store::StoreError};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures raised before or while talking to the remote host.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum TransportErrorKind {
	/// The request did not complete in time.
	#[error("The request timed out.")]
	Timeout,
	/// No network path is currently available.
	#[error("No network connection is available.")]
	NoConnection,
	/// The transport rejected the request or failed mid-flight.
	#[error("The request could not be performed: {0}.")]
	Url(String),
	/// The remote host answered with something that is not an HTTP response.
	#[error("The server returned an invalid response.")]
	InvalidResponse,
}

/// Failures derived from a non-success HTTP status code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ThisError)]
pub enum StatusErrorKind {
	/// HTTP 401.
	#[error("The server rejected the credential (401).")]
	Unauthorized,
	/// Any other 4xx status except 408.
	#[error("The server reported a client error ({0}).")]
	Client(u16),
	/// Any 5xx status.
	#[error("The server reported a server error ({0}).")]
	Server(u16),
}

/// Failures raised while loading, validating, persisting, or refreshing credentials.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ThisError)]
pub enum CredentialErrorKind {
	/// The persisted credential failed local validation.
	#[error("The stored credential is no longer valid.")]
	LocalInvalid,
	/// The credential could not be loaded from its store.
	#[error("The credential could not be loaded.")]
	LoadFailed,
	/// The refreshed credential could not be persisted.
	#[error("The credential could not be stored.")]
	StoreFailed,
	/// The credential could not be removed from its store.
	#[error("The credential could not be deleted.")]
	DeleteFailed,
	/// The remote refresh call failed.
	#[error("The credential could not be refreshed.")]
	RefreshFailed,
}

/// Pipeline stage that wrapped a lower-level failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
	/// Sending the authorized request.
	Network,
	/// Reading the current credential.
	LocalCredential,
	/// Refreshing the credential after an authorization failure.
	Refresh,
}
impl Stage {
	/// Returns a stable label suitable for logs.
	pub const fn as_str(self) -> &'static str {
		match self {
			Stage::Network => "network",
			Stage::LocalCredential => "local_credential",
			Stage::Refresh => "refresh",
		}
	}
}
impl Display for Stage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Classification of a single link in an error chain.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ErrorKind {
	/// Transport-level failure.
	#[error(transparent)]
	Transport(#[from] TransportErrorKind),
	/// Non-success HTTP status.
	#[error(transparent)]
	Status(#[from] StatusErrorKind),
	/// Response body did not match the expected shape.
	#[error("Response body could not be decoded: {0}.")]
	Decoding(String),
	/// Credential lifecycle failure.
	#[error(transparent)]
	Credential(#[from] CredentialErrorKind),
	/// Storage backend failure.
	#[error(transparent)]
	Storage(#[from] StoreError),
	/// Pipeline-level wrapper naming the stage that failed.
	#[error("Authorized request failed during the {0} stage.")]
	Composite(Stage),
}

/// Classified failure with an optional cause and a correlation id.
#[derive(Clone)]
pub struct Error {
	kind: ErrorKind,
	cause: Option<Arc<Error>>,
	correlation_id: Uuid,
	request_id: Option<String>,
}
impl Error {
	/// Creates a root error with a fresh correlation id.
	pub fn new(kind: impl Into<ErrorKind>) -> Self {
		Self { kind: kind.into(), cause: None, correlation_id: Uuid::new_v4(), request_id: None }
	}

	/// Wraps `self` as the cause of a new error classified as `kind`.
	///
	/// The new error inherits the correlation id of `self`.
	pub fn context(self, kind: impl Into<ErrorKind>) -> Self {
		let correlation_id = self.correlation_id;

		Self { kind: kind.into(), cause: Some(Arc::new(self)), correlation_id, request_id: None }
	}

	/// Attaches the server-side request identifier, if one was reported.
	pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
		self.request_id = Some(request_id.into());

		self
	}

	/// Classification of this link.
	pub fn kind(&self) -> &ErrorKind {
		&self.kind
	}

	/// Lower-level error this one wraps.
	pub fn cause(&self) -> Option<&Error> {
		self.cause.as_deref()
	}

	/// Identifier shared by every link created through [`Error::context`].
	pub fn correlation_id(&self) -> Uuid {
		self.correlation_id
	}

	/// Server-side request identifier captured from the response, if any.
	pub fn request_id(&self) -> Option<&str> {
		self.request_id.as_deref()
	}

	/// Iterates the chain starting with `self`.
	pub fn chain(&self) -> Chain<'_> {
		Chain(Some(self))
	}

	/// Deepest error in the chain.
	pub fn root_cause(&self) -> &Error {
		self.chain().last().unwrap_or(self)
	}

	/// Returns the first link (including `self`) that satisfies `predicate`.
	pub fn find(&self, predicate: impl Fn(&Error) -> bool) -> Option<&Error> {
		self.chain().find(|link| predicate(link))
	}

	/// Returns `true` if any link (including `self`) satisfies `predicate`.
	pub fn contains(&self, predicate: impl Fn(&Error) -> bool) -> bool {
		self.find(predicate).is_some()
	}

	/// Returns `true` if any link carries exactly `kind`.
	pub fn contains_kind(&self, kind: &ErrorKind) -> bool {
		self.contains(|link| link.kind() == kind)
	}

	/// Returns `true` if the chain contains an HTTP 401.
	pub fn is_unauthorized(&self) -> bool {
		self.contains_kind(&ErrorKind::Status(StatusErrorKind::Unauthorized))
	}

	/// Returns `true` if the chain contains a locally invalid credential.
	pub fn is_locally_invalid(&self) -> bool {
		self.contains_kind(&ErrorKind::Credential(CredentialErrorKind::LocalInvalid))
	}

	/// Returns `true` if the chain contains a 4xx status other than 401.
	pub fn is_client_error(&self) -> bool {
		self.contains(|link| matches!(link.kind(), ErrorKind::Status(StatusErrorKind::Client(_))))
	}

	/// Renders the chain one link per line, outermost first.
	pub fn report(&self) -> String {
		let mut out = String::new();

		for (depth, link) in self.chain().enumerate() {
			if depth == 0 {
				out.push_str(&format!("[{}] {}", self.correlation_id, link.kind));
			} else {
				out.push_str(&format!("\n{} |_ {}", "  ".repeat(depth - 1), link.kind));
			}
			if let Some(request_id) = &link.request_id {
				out.push_str(&format!(" (request id: {request_id})"));
			}
		}

		out
	}
}
impl PartialEq for Error {
	fn eq(&self, other: &Self) -> bool {
		self.kind == other.kind && self.cause == other.cause
	}
}
impl Eq for Error {}
impl Debug for Error {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Error")
			.field("kind", &self.kind)
			.field("correlation_id", &self.correlation_id)
			.field("request_id", &self.request_id)
			.field("cause", &self.cause)
			.finish()
	}
}
impl Display for Error {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		Display::fmt(&self.kind, f)
	}
}
impl StdError for Error {
	fn source(&self) -> Option<&(dyn StdError + 'static)> {
		self.cause.as_deref().map(|cause| cause as &(dyn StdError + 'static))
	}
}

macro_rules! impl_from_kind {
	($($kind:ty),+ $(,)?) => {
		$(
			impl From<$kind> for Error {
				fn from(kind: $kind) -> Self {
					Self::new(kind)
				}
			}
		)+
	};
}

impl_from_kind!(ErrorKind, TransportErrorKind, StatusErrorKind, CredentialErrorKind, StoreError);

/// Iterator over an error chain, outermost first.
#[derive(Clone, Debug)]
pub struct Chain<'a>(Option<&'a Error>);
impl<'a> Iterator for Chain<'a> {
	type Item = &'a Error;

	fn next(&mut self) -> Option<Self::Item> {
		let current = self.0?;

		self.0 = current.cause();

		Some(current)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn refresh_failure(status: u16) -> Error {
		Error::new(StatusErrorKind::Client(status))
			.context(CredentialErrorKind::RefreshFailed)
			.context(ErrorKind::Composite(Stage::Refresh))
	}

	#[test]
	fn equality_ignores_correlation_id() {
		let a = refresh_failure(400);
		let b = refresh_failure(400);

		assert_ne!(a.correlation_id(), b.correlation_id());
		assert_eq!(a, b);
	}

	#[test]
	fn changing_any_cause_breaks_equality() {
		let a = refresh_failure(400);
		let b = refresh_failure(403);
		let c = Error::new(StatusErrorKind::Client(400))
			.context(CredentialErrorKind::StoreFailed)
			.context(ErrorKind::Composite(Stage::Refresh));
		let d = Error::new(CredentialErrorKind::RefreshFailed)
			.context(ErrorKind::Composite(Stage::Refresh));

		assert_ne!(a, b);
		assert_ne!(a, c);
		assert_ne!(a, d);
	}

	#[test]
	fn context_keeps_correlation_id_across_the_chain() {
		let root = Error::new(TransportErrorKind::Timeout);
		let id = root.correlation_id();
		let wrapped = root.context(ErrorKind::Composite(Stage::Network));

		assert_eq!(wrapped.correlation_id(), id);
		assert!(wrapped.chain().all(|link| link.correlation_id() == id));
		assert_eq!(wrapped.chain().count(), 2);
	}

	#[test]
	fn classification_search_covers_the_whole_chain() {
		let err = Error::new(StatusErrorKind::Unauthorized)
			.context(ErrorKind::Composite(Stage::Network));

		assert!(err.is_unauthorized());
		assert!(!err.is_client_error());
		assert!(!err.is_locally_invalid());
		assert_eq!(err.root_cause().kind(), &ErrorKind::Status(StatusErrorKind::Unauthorized));

		let found = err
			.find(|link| matches!(link.kind(), ErrorKind::Status(_)))
			.expect("Status link should be found below the composite wrapper.");

		assert_eq!(found.kind(), &ErrorKind::Status(StatusErrorKind::Unauthorized));
	}

	#[test]
	fn source_walks_the_cause_chain() {
		let err = refresh_failure(400);
		let source = StdError::source(&err).expect("Composite error should expose its cause.");

		assert_eq!(source.to_string(), CredentialErrorKind::RefreshFailed.to_string());
		assert!(StdError::source(err.root_cause()).is_none());
	}

	#[test]
	fn report_lists_every_link_and_request_id() {
		let err = Error::new(StatusErrorKind::Server(502))
			.with_request_id("req-7")
			.context(ErrorKind::Composite(Stage::Network));
		let report = err.report();

		assert!(report.starts_with(&format!("[{}]", err.correlation_id())));
		assert!(report.contains("network stage"));
		assert!(report.contains("server error (502)"));
		assert!(report.contains("request id: req-7"));
	}
}
