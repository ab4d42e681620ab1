//! Provider metadata documents and the discovery rules for each protocol.

// self
use crate::{
	_prelude::*,
	error::{ConfigError, SchemeError, ValidationFailure},
};

/// Discovery flavour; each one has its own well-known location and required keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
	/// OpenID Connect Discovery 1.0.
	Oidc,
	/// UMA 1.0 configuration.
	Uma,
}
impl Protocol {
	/// Returns a stable label suitable for traces.
	pub const fn as_str(self) -> &'static str {
		match self {
			Protocol::Oidc => "oidc",
			Protocol::Uma => "uma",
		}
	}

	/// Well-known path appended to the normalized issuer.
	pub const fn well_known_path(self) -> &'static str {
		match self {
			Protocol::Oidc => "/.well-known/openid-configuration",
			Protocol::Uma => "/.well-known/uma-configuration",
		}
	}

	/// Metadata keys a conforming document must carry.
	pub const fn required_keys(self) -> &'static [&'static str] {
		match self {
			Protocol::Oidc => &[
				"issuer",
				"authorization_endpoint",
				"jwks_uri",
				"response_types_supported",
				"subject_types_supported",
				"id_token_signing_alg_values_supported",
			],
			Protocol::Uma => &["issuer", "authorization_endpoint", "token_endpoint"],
		}
	}

	/// Builds the metadata URL for `issuer`, dropping one trailing slash first.
	pub fn configuration_url(self, issuer: &str) -> String {
		let base = issuer.strip_suffix('/').unwrap_or(issuer);

		format!("{base}{}", self.well_known_path())
	}
}
impl Display for Protocol {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Provider metadata: endpoints, supported methods, and any other advertised keys.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderInfo(JsonMap);
impl ProviderInfo {
	/// Wraps a metadata object.
	pub fn new(document: JsonMap) -> Self {
		Self(document)
	}

	/// Returns the underlying object.
	pub fn as_map(&self) -> &JsonMap {
		&self.0
	}

	/// Consumes the wrapper, returning the underlying object.
	pub fn into_map(self) -> JsonMap {
		self.0
	}

	/// Returns `true` when the document has no keys.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Raw metadata value.
	pub fn get(&self, key: &str) -> Option<&Value> {
		self.0.get(key)
	}

	/// String-valued metadata entry.
	pub fn string(&self, key: &str) -> Option<&str> {
		self.0.get(key).and_then(Value::as_str)
	}

	/// List-valued metadata entry; non-string members are skipped.
	pub fn strings(&self, key: &str) -> Option<Vec<String>> {
		let Value::Array(values) = self.0.get(key)? else {
			return None;
		};

		Some(values.iter().filter_map(Value::as_str).map(str::to_owned).collect())
	}

	/// Advertised issuer.
	pub fn issuer(&self) -> Option<&str> {
		self.string("issuer")
	}

	/// Resolves an endpoint URL; absence is an unmet requirement, never a guess.
	pub fn endpoint(&self, key: &str) -> Result<Url> {
		let raw = self
			.string(key)
			.ok_or_else(|| Error::requirements_not_met(format!("provider_info[\"{key}\"]")))?;

		Url::parse(raw).map_err(|e| ConfigError::invalid_url(raw, e).into())
	}

	/// Writes every override key on top of this document; keys absent from the override are
	/// left untouched, so applying the same override twice is a no-op.
	pub fn merge_override(&mut self, over_ride: &JsonMap) {
		for (key, value) in over_ride {
			self.0.insert(key.clone(), value.clone());
		}
	}

	/// Verifies the document against the protocol schema.
	///
	/// Missing keys and unparsable endpoint URLs are fatal validation failures. A non-HTTPS
	/// issuer is reported as [`SchemeError`], suppressed when `allow_no_https_issuer` is set;
	/// the returned flag tells the caller a suppression happened.
	pub fn verify(&self, protocol: Protocol, allow_no_https_issuer: bool) -> Result<bool> {
		let check = format!("{protocol}-provider-configuration");

		for key in protocol.required_keys() {
			if !self.0.contains_key(*key) {
				return Err(ValidationFailure::fatal(&check, format!("missing `{key}`")).into());
			}
		}
		for (key, value) in &self.0 {
			if !(key.ends_with("_endpoint") || key == "jwks_uri") {
				continue;
			}

			let valid = value.as_str().is_some_and(|raw| Url::parse(raw).is_ok());

			if !valid {
				return Err(
					ValidationFailure::fatal(&check, format!("`{key}` is not a URL")).into()
				);
			}
		}

		let issuer = self
			.issuer()
			.ok_or_else(|| ValidationFailure::fatal(&check, "`issuer` is not a string"))?;
		let parsed = Url::parse(issuer)
			.map_err(|_| ValidationFailure::fatal(&check, "`issuer` is not a URL"))?;

		if parsed.scheme() == "https" {
			return Ok(false);
		}
		if allow_no_https_issuer {
			return Ok(true);
		}

		Err(SchemeError::InsecureIssuer { issuer: issuer.to_owned() }.into())
	}
}
impl From<JsonMap> for ProviderInfo {
	fn from(document: JsonMap) -> Self {
		Self(document)
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;

	fn document(value: Value) -> ProviderInfo {
		match value {
			Value::Object(map) => ProviderInfo::new(map),
			_ => panic!("Metadata fixture must be a JSON object."),
		}
	}

	fn uma_document(issuer: &str) -> ProviderInfo {
		document(json!({
			"issuer": issuer,
			"authorization_endpoint": "https://op.example.com/authz",
			"token_endpoint": "https://op.example.com/token",
			"resource_set_registration_endpoint": "https://op.example.com/rs",
		}))
	}

	#[test]
	fn configuration_url_normalizes_trailing_slash() {
		assert_eq!(
			Protocol::Oidc.configuration_url("https://op.example.com/"),
			"https://op.example.com/.well-known/openid-configuration"
		);
		assert_eq!(
			Protocol::Uma.configuration_url("https://op.example.com/tenant"),
			"https://op.example.com/tenant/.well-known/uma-configuration"
		);
	}

	#[test]
	fn override_wins_and_merge_is_idempotent() {
		let mut info = uma_document("https://op.example.com");
		let over_ride = json!({ "token_endpoint": "https://alt.example.com/token", "extra": 1 });
		let Value::Object(over_ride) = over_ride else { unreachable!() };

		info.merge_override(&over_ride);

		let once = info.clone();

		info.merge_override(&over_ride);

		assert_eq!(info, once);
		assert_eq!(info.string("token_endpoint"), Some("https://alt.example.com/token"));
		assert_eq!(info.string("authorization_endpoint"), Some("https://op.example.com/authz"));
		assert_eq!(info.get("extra"), Some(&json!(1)));
	}

	#[test]
	fn missing_endpoint_is_requirements_not_met() {
		let err = uma_document("https://op.example.com")
			.endpoint("rpt_endpoint")
			.expect_err("Endpoint is not advertised.");

		assert!(matches!(err, Error::Config(ConfigError::RequirementsNotMet { .. })));
	}

	#[test]
	fn insecure_issuer_is_a_scheme_error_unless_relaxed() {
		let info = uma_document("http://op.example.com");
		let err = info.verify(Protocol::Uma, false).expect_err("HTTP issuer must be rejected.");

		assert!(matches!(err, Error::Scheme(SchemeError::InsecureIssuer { .. })));
		assert!(info.verify(Protocol::Uma, true).expect("Relaxation should suppress the error."));
		assert!(
			!uma_document("https://op.example.com")
				.verify(Protocol::Uma, false)
				.expect("HTTPS issuer should verify.")
		);
	}

	#[test]
	fn relaxation_never_hides_other_failures() {
		let info = document(json!({ "issuer": "http://op.example.com" }));
		let err = info.verify(Protocol::Uma, true).expect_err("Missing keys must still fail.");

		assert!(matches!(err, Error::Validation(_)));

		let info = document(json!({
			"issuer": "https://op.example.com",
			"authorization_endpoint": "not a url",
			"token_endpoint": "https://op.example.com/token",
		}));

		assert!(matches!(info.verify(Protocol::Uma, false), Err(Error::Validation(_))));
	}
}
