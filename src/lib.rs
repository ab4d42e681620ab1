//! Scripted OAuth 2.0 / OpenID Connect / UMA conformance driver: execute typed request/response
//! phases against a live server, validate every exchange, and thread tokens, tickets, and
//! provider metadata from one phase to the next.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod check;
pub mod config;
pub mod conversation;
pub mod error;
pub mod ext;
pub mod handler;
pub mod http;
pub mod obs;
pub mod orchestrator;
pub mod phase;
pub mod provider;
pub mod registry;
pub mod store;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		config::ClientConfig,
		conversation::Conversation,
		http::ReqwestHttpClient,
		orchestrator::Orchestrator,
		store::{MemoryStore, TokenStore},
	};

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		ReqwestHttpClient::with_builder(|builder| {
			builder.danger_accept_invalid_certs(true).danger_accept_invalid_hostnames(true)
		})
		.expect("Failed to build insecure Reqwest client for tests.")
	}

	/// Constructs an [`Orchestrator`] backed by an in-memory token store and the reqwest
	/// transport used across integration tests.
	pub fn build_test_orchestrator() -> (Orchestrator, Arc<MemoryStore>) {
		let store_backend = Arc::new(MemoryStore::default());
		let store: Arc<dyn TokenStore> = store_backend.clone();
		let orchestrator = Orchestrator::new(Arc::new(test_reqwest_http_client()), store);

		(orchestrator, store_backend)
	}

	/// Starts a conversation whose issuer scheme check is relaxed, since mock servers are
	/// reachable over plain HTTP.
	pub fn relaxed_conversation(config: ClientConfig) -> Conversation {
		Conversation::new(config.allow_no_https_issuer(true))
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use serde_json::Value;
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};

	/// JSON object used for request arguments, configuration layers, and metadata documents.
	pub type JsonMap = serde_json::Map<String, Value>;
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
