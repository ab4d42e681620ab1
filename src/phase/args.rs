//! Layered request-argument resolution.
//!
//! A phase declares the fields it sends as an [`ArgSchema`]. Each field is looked up in the
//! fixed [`ArgLayer::ORDER`] and the first layer holding it wins. Optional fields found
//! nowhere are omitted; required ones raise `MissingField`.

// self
use crate::{_prelude::*, config::ClientConfig, error::ConfigError};

/// Source consulted while resolving a request argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArgLayer {
	/// Explicit arguments of the script step (over the phase's own defaults).
	Static,
	/// Static provider metadata override from the client configuration.
	ProviderInfo,
	/// Client preferences.
	Preferences,
	/// Pre-provisioned client information.
	ClientInfo,
	/// Client registration metadata.
	ClientRegistration,
}
impl ArgLayer {
	/// Lookup priority, highest first.
	pub const ORDER: [ArgLayer; 5] = [
		ArgLayer::Static,
		ArgLayer::ProviderInfo,
		ArgLayer::Preferences,
		ArgLayer::ClientInfo,
		ArgLayer::ClientRegistration,
	];

	/// Returns a stable label suitable for traces.
	pub const fn as_str(self) -> &'static str {
		match self {
			ArgLayer::Static => "static",
			ArgLayer::ProviderInfo => "provider_info",
			ArgLayer::Preferences => "preferences",
			ArgLayer::ClientInfo => "client_info",
			ArgLayer::ClientRegistration => "client_registration",
		}
	}

	fn source<'a>(self, statics: &'a JsonMap, config: &'a ClientConfig) -> &'a JsonMap {
		match self {
			ArgLayer::Static => statics,
			ArgLayer::ProviderInfo => &config.provider_info,
			ArgLayer::Preferences => &config.preferences,
			ArgLayer::ClientInfo => &config.client_info,
			ArgLayer::ClientRegistration => &config.client_registration,
		}
	}
}

/// A field a phase may send.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArgField {
	/// Parameter name.
	pub name: &'static str,
	/// Whether resolution fails when no layer holds the field.
	pub required: bool,
}
impl ArgField {
	/// Declares a required field.
	pub const fn required(name: &'static str) -> Self {
		Self { name, required: true }
	}

	/// Declares an optional field.
	pub const fn optional(name: &'static str) -> Self {
		Self { name, required: false }
	}
}

/// Declared argument schema of one phase type.
#[derive(Clone, Copy, Debug)]
pub struct ArgSchema {
	phase: &'static str,
	fields: &'static [ArgField],
}
impl ArgSchema {
	/// Declares the schema for `phase`.
	pub const fn new(phase: &'static str, fields: &'static [ArgField]) -> Self {
		Self { phase, fields }
	}

	/// Phase the schema belongs to.
	pub const fn phase(&self) -> &'static str {
		self.phase
	}

	/// Finds `name` in the first layer that holds it.
	pub fn lookup<'a>(
		name: &str,
		statics: &'a JsonMap,
		config: &'a ClientConfig,
	) -> Option<(ArgLayer, &'a Value)> {
		ArgLayer::ORDER
			.into_iter()
			.find_map(|layer| layer.source(statics, config).get(name).map(|value| (layer, value)))
	}

	/// Resolves every declared field.
	///
	/// Static arguments that the schema does not declare are passed through unchanged, since
	/// the script author asked for them explicitly.
	pub fn resolve(&self, statics: &JsonMap, config: &ClientConfig) -> Result<JsonMap> {
		let mut resolved = JsonMap::new();

		for field in self.fields {
			match Self::lookup(field.name, statics, config) {
				Some((_, value)) => {
					resolved.insert(field.name.to_owned(), value.clone());
				},
				None if field.required =>
					return Err(
						ConfigError::MissingField { phase: self.phase, field: field.name }.into()
					),
				None => {},
			}
		}
		for (key, value) in statics {
			if !resolved.contains_key(key) {
				resolved.insert(key.clone(), value.clone());
			}
		}

		Ok(resolved)
	}
}

/// Overlays the step's explicit arguments on a phase's built-in defaults.
pub fn with_defaults(defaults: &[(&str, Value)], explicit: &JsonMap) -> JsonMap {
	let mut merged =
		defaults.iter().map(|(key, value)| ((*key).to_owned(), value.clone())).collect::<JsonMap>();

	for (key, value) in explicit {
		merged.insert(key.clone(), value.clone());
	}

	merged
}
