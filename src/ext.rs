//! Pluggable contracts for attaching and validating credentials.
//!
//! Both traits have blanket implementations for closures so callers can wire quick adapters
//! without declaring new types. [`BearerAuthorizer`] and [`ExpiryValidator`] cover the common
//! bearer-token case.

pub mod authorizer;
pub mod validator;

pub use authorizer::*;
pub use validator::*;
