//! Authorized HTTP pipeline that attaches bearer credentials, refreshes them exactly once for any
//! number of concurrent callers, and bounds retries so a broken credential never loops forever.
//!
//! The coordination is built from four reusable stream combinators in [`reactive`]: race,
//! single-flight gate, materialize, and retry-when.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod coordinator;
pub mod error;
pub mod ext;
pub mod flows;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod reactive;
pub mod store;

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		hash::Hash,
		pin::Pin,
		str::FromStr,
		sync::Arc,
		task::{Context, Poll},
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use futures::{Stream, StreamExt, stream::BoxStream};
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize, de::DeserializeOwned};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
