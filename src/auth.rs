//! Credential contract, bearer token model, and validated identifiers.

pub mod credential;
pub mod id;
pub mod token;

pub use credential::*;
pub use id::*;
pub use token::{bearer::*, secret::*};
