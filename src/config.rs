//! Static client configuration loaded once per conversation.
//!
//! The configuration mirrors the layered maps the phases consult while resolving request
//! arguments (`provider_info`, `preferences`, `client_info`, `client_registration`) plus a
//! handful of run-level switches. It is parsed with `serde_path_to_error` so a malformed
//! document reports the exact failing path.

// std
use std::{fs, path::PathBuf, time::Duration as StdDuration};
// self
use crate::{_prelude::*, error::ConfigError};

/// Relaxations of protocol rules explicitly granted by the run configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Allowances {
	/// Accept provider metadata whose issuer is not an `https` URL.
	pub no_https_issuer: bool,
}

/// Static configuration for one conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
	/// Issuer URL used for discovery and as the token-cache key.
	pub srv_discovery_url: Option<String>,
	/// Principal (`acct:` URI, e-mail style identifier, or URL) resolved via webfinger.
	pub principal: Option<String>,
	/// Static provider metadata that overrides (and may replace) discovered metadata.
	pub provider_info: JsonMap,
	/// Client preferences consulted during request-argument resolution.
	pub preferences: JsonMap,
	/// Pre-provisioned client information (`client_id`, `client_secret`, `redirect_uris`, ...).
	pub client_info: JsonMap,
	/// Metadata sent during dynamic client registration.
	pub client_registration: JsonMap,
	/// Protocol relaxations.
	pub allow: Allowances,
	/// Send a PKCE S256 challenge with authorization requests.
	pub pkce: bool,
	/// Upper bound for each network round trip, in seconds.
	pub request_timeout_secs: u64,
	/// Length of the `intermission` phase, in seconds.
	pub intermission_secs: u64,
	/// Directory holding persisted PAT/AAT snapshots.
	pub cache_dir: PathBuf,
	/// File the trace is written to when the run ends.
	pub trace_path: Option<PathBuf>,
}
impl ClientConfig {
	const DEFAULT_DELAY_SECS: u64 = 30;
	const DEFAULT_TIMEOUT_SECS: u64 = 30;

	/// Creates a configuration targeting the provided issuer.
	pub fn new(issuer: impl Into<String>) -> Self {
		Self { srv_discovery_url: Some(issuer.into()), ..Self::default() }
	}

	/// Parses a JSON configuration document.
	pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
		let mut de = serde_json::Deserializer::from_slice(bytes);

		serde_path_to_error::deserialize(&mut de)
			.map_err(|e| ConfigError::InvalidConfig { message: e.to_string() }.into())
	}

	/// Reads and parses a JSON configuration file.
	pub fn from_path(path: impl Into<PathBuf>) -> Result<Self> {
		let path = path.into();
		let bytes = fs::read(&path).map_err(|e| ConfigError::InvalidConfig {
			message: format!("failed to read {}: {e}", path.display()),
		})?;

		Self::from_json_slice(&bytes)
	}

	/// Replaces the static provider metadata override.
	pub fn with_provider_info(mut self, provider_info: JsonMap) -> Self {
		self.provider_info = provider_info;

		self
	}

	/// Replaces the client preferences layer.
	pub fn with_preferences(mut self, preferences: JsonMap) -> Self {
		self.preferences = preferences;

		self
	}

	/// Replaces the pre-provisioned client information layer.
	pub fn with_client_info(mut self, client_info: JsonMap) -> Self {
		self.client_info = client_info;

		self
	}

	/// Replaces the registration metadata layer.
	pub fn with_client_registration(mut self, client_registration: JsonMap) -> Self {
		self.client_registration = client_registration;

		self
	}

	/// Toggles acceptance of non-HTTPS issuers.
	pub fn allow_no_https_issuer(mut self, allow: bool) -> Self {
		self.allow.no_https_issuer = allow;

		self
	}

	/// Toggles PKCE on authorization requests.
	pub fn with_pkce(mut self, pkce: bool) -> Self {
		self.pkce = pkce;

		self
	}

	/// Overrides the intermission length.
	pub fn with_intermission_secs(mut self, secs: u64) -> Self {
		self.intermission_secs = secs;

		self
	}

	/// Overrides the token cache directory.
	pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
		self.cache_dir = dir.into();

		self
	}

	/// Sets the file the trace is flushed to at run end.
	pub fn with_trace_path(mut self, path: impl Into<PathBuf>) -> Self {
		self.trace_path = Some(path.into());

		self
	}

	/// Per-request timeout as a std duration for transport builders.
	pub fn request_timeout(&self) -> StdDuration {
		StdDuration::from_secs(self.request_timeout_secs)
	}

	/// Issuer used as the token-cache key.
	pub fn issuer(&self) -> Result<&str> {
		self.srv_discovery_url
			.as_deref()
			.ok_or_else(|| Error::requirements_not_met("srv_discovery_url in client configuration"))
	}

	/// First configured redirect URI, looked up in `client_info`, then `client_registration`.
	pub fn redirect_uri(&self) -> Option<&str> {
		[&self.client_info, &self.client_registration].into_iter().find_map(|layer| {
			match layer.get("redirect_uris")? {
				Value::Array(uris) => uris.first()?.as_str(),
				Value::String(uri) => Some(uri.as_str()),
				_ => None,
			}
		})
	}
}
impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			srv_discovery_url: None,
			principal: None,
			provider_info: JsonMap::new(),
			preferences: JsonMap::new(),
			client_info: JsonMap::new(),
			client_registration: JsonMap::new(),
			allow: Allowances::default(),
			pkce: false,
			request_timeout_secs: Self::DEFAULT_TIMEOUT_SECS,
			intermission_secs: Self::DEFAULT_DELAY_SECS,
			cache_dir: PathBuf::from("."),
			trace_path: None,
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn parses_partial_documents_with_defaults() {
		let config = ClientConfig::from_json_slice(
			br#"{
				"srv_discovery_url": "https://op.example.com",
				"allow": { "no_https_issuer": true },
				"client_info": { "redirect_uris": ["https://rp.example.com/cb"] }
			}"#,
		)
		.expect("Configuration fixture should parse.");

		assert_eq!(config.issuer().expect("Issuer should be configured."), "https://op.example.com");
		assert!(config.allow.no_https_issuer);
		assert_eq!(config.intermission_secs, 30);
		assert_eq!(config.request_timeout(), StdDuration::from_secs(30));
		assert_eq!(config.redirect_uri(), Some("https://rp.example.com/cb"));
	}

	#[test]
	fn reports_failing_path() {
		let err = ClientConfig::from_json_slice(br#"{ "allow": { "no_https_issuer": "yes" } }"#)
			.expect_err("A string is not a boolean.");

		assert!(err.to_string().contains("allow.no_https_issuer"), "{err}");
	}

	#[test]
	fn missing_issuer_is_a_requirement_failure() {
		let err = ClientConfig::default().issuer().expect_err("Issuer is not configured.");

		assert!(matches!(err, Error::Config(ConfigError::RequirementsNotMet { .. })));
	}
}
