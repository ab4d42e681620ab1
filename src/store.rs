//! Persistence contract for PAT/AAT snapshots carried across separate runs.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE};
// self
use crate::{
	_prelude::*,
	auth::{TokenClass, TokenSecret},
	provider::ProviderInfo,
};

/// Boxed future returned by [`TokenStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract for cached tokens.
pub trait TokenStore
where
	Self: Send + Sync,
{
	/// Persists or replaces the snapshot stored under `key`.
	fn save<'a>(&'a self, key: &'a StoreKey, token: CachedToken) -> StoreFuture<'a, ()>;

	/// Loads the snapshot stored under `key`, if present.
	fn load<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, Option<CachedToken>>;
}

/// Error type produced by [`TokenStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Snapshot persisted per (token class, issuer).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CachedToken {
	/// Bearer token value.
	pub token: TokenSecret,
	/// Provider metadata in effect when the token was issued.
	pub provider_info: ProviderInfo,
}

/// Unique key identifying a cached token.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoreKey {
	/// Token class component.
	pub class: TokenClass,
	/// Issuer URL the token was obtained from.
	pub issuer: String,
}
impl StoreKey {
	/// Builds a key for the provided class and issuer.
	pub fn new(class: TokenClass, issuer: impl Into<String>) -> Self {
		Self { class, issuer: issuer.into() }
	}

	/// File name used by [`FileStore`]: the class label followed by the URL-safe base64 of
	/// the issuer, so the name never contains a path separator.
	pub fn file_name(&self) -> String {
		format!("{}{}", self.class, URL_SAFE.encode(self.issuer.as_bytes()))
	}
}
