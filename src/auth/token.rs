//! Bearer token records and redacted secrets.

pub mod bearer;
pub mod secret;
