//! Static phase registry: script names mapped to (phase, response handler) constructors.

// self
use crate::{
	_prelude::*,
	auth::TokenClass,
	error::ConfigError,
	handler::*,
	phase::*,
	provider::Protocol,
};

macro_rules! entry {
	($name:literal, |$step:pat_param| $phase:expr, $handler:expr) => {
		PhaseDescriptor {
			name: $name,
			phase: |$step: &ScriptStep| -> Box<dyn Phase> { Box::new($phase) },
			handler: || -> Box<dyn ResponseHandler> { Box::new($handler) },
		}
	};
}

/// Every phase the driver knows, in registry order.
pub static STANDARD_PHASES: &[PhaseDescriptor] = &[
	entry!(
		"oic-discovery",
		|_| Discovery::new(Protocol::Oidc),
		ProviderConfiguration::new(Protocol::Oidc)
	),
	entry!(
		"uma-discovery",
		|_| Discovery::new(Protocol::Uma),
		ProviderConfiguration::new(Protocol::Uma)
	),
	entry!("webfinger", |step| WebFinger::new(step), WebFingerResponse),
	entry!(
		"oic-registration",
		|step| Registration::new(RegistrationFlavor::Oidc, step),
		RegistrationResponse
	),
	entry!(
		"oauth-registration",
		|step| Registration::new(RegistrationFlavor::OAuth, step),
		RegistrationResponse
	),
	entry!(
		"oauth-read-registration",
		|step| ManageRegistration::new(RegistrationOp::Read, step),
		RegistrationResponse
	),
	entry!(
		"modify-registration",
		|step| ManageRegistration::new(RegistrationOp::Modify, step),
		RegistrationResponse
	),
	entry!(
		"delete-registration",
		|step| ManageRegistration::new(RegistrationOp::Delete, step),
		RegistrationDeleted
	),
	entry!("oic-login", |step| AuthorizationRequest::new(step), AuthorizationResponse),
	entry!("access-token-request", |step| AccessTokenRequest::new(step), AccessTokenResponse),
	entry!("refresh-access-token", |step| RefreshAccessToken::new(step), AccessTokenResponse),
	entry!("userinfo", |_| UserInfoRequest, Archive::new("OpenIDSchema")),
	entry!(
		"create_resource_set",
		|step| ResourceSetRequest::new(ResourceSetOp::Create, step),
		StatusResponse
	),
	entry!(
		"update_resource_set",
		|step| ResourceSetRequest::new(ResourceSetOp::Update, step),
		StatusResponse
	),
	entry!(
		"read_resource_set",
		|step| ResourceSetRequest::new(ResourceSetOp::Read, step),
		Archive::new("ResourceSetDescription")
	),
	entry!(
		"list_resource_set",
		|step| ResourceSetRequest::new(ResourceSetOp::List, step),
		Archive::new("ResourceSetList")
	),
	entry!(
		"delete_resource_set",
		|step| ResourceSetRequest::new(ResourceSetOp::Delete, step),
		ResourceSetDeleted
	),
	entry!("register_request", |step| PermissionRegistration::new(step), PermissionResponse),
	entry!("authzdata_request", |step| AuthzDataRequest::new(step), AuthzDataResponse),
	entry!("intermission", |step| Intermission::new(step), NoResponse),
	entry!("note", |step| Note::new(step), NoResponse),
	entry!("rm_cookie", |_| RmCookie, NoResponse),
	entry!("expect_err", |step| ExpectErr::new(step), NoResponse),
	entry!("fetch_keys", |_| FetchKeys, KeySetResponse),
	entry!("display_idtoken", |_| DisplayIdToken, Archive::new("IdToken")),
	entry!("cache-id_token", |_| CacheIdToken, NoResponse),
	entry!("store_pat", |_| TokenCache::new(CacheOp::Store, TokenClass::Pat), NoResponse),
	entry!("retrieve_pat", |_| TokenCache::new(CacheOp::Retrieve, TokenClass::Pat), NoResponse),
	entry!("store_aat", |_| TokenCache::new(CacheOp::Store, TokenClass::Aat), NoResponse),
	entry!("retrieve_aat", |_| TokenCache::new(CacheOp::Retrieve, TokenClass::Aat), NoResponse),
];

/// Registry entry: a phase constructor paired with its response-handler constructor.
#[derive(Clone, Copy, Debug)]
pub struct PhaseDescriptor {
	/// Script name.
	pub name: &'static str,
	/// Builds the phase for one script step.
	pub phase: fn(&ScriptStep) -> Box<dyn Phase>,
	/// Builds the paired handler.
	pub handler: fn() -> Box<dyn ResponseHandler>,
}
impl PhaseDescriptor {
	/// Instantiates the phase and its handler for `step`.
	pub fn instantiate(&self, step: &ScriptStep) -> (Box<dyn Phase>, Box<dyn ResponseHandler>) {
		((self.phase)(step), (self.handler)())
	}
}

/// Read-only lookup table over phase descriptors.
#[derive(Clone, Copy, Debug)]
pub struct PhaseRegistry {
	entries: &'static [PhaseDescriptor],
}
impl PhaseRegistry {
	/// Registry over a custom table.
	pub const fn new(entries: &'static [PhaseDescriptor]) -> Self {
		Self { entries }
	}

	/// Registry over [`STANDARD_PHASES`].
	pub fn standard() -> Self {
		Self::new(STANDARD_PHASES)
	}

	/// All entries.
	pub fn entries(&self) -> &'static [PhaseDescriptor] {
		self.entries
	}

	/// Finds the descriptor registered under `name`.
	pub fn lookup(&self, name: &str) -> Result<&'static PhaseDescriptor> {
		self.entries
			.iter()
			.find(|descriptor| descriptor.name == name)
			.ok_or_else(|| ConfigError::UnknownPhase { name: name.to_owned() }.into())
	}

	/// Checks every step of a script before anything runs.
	pub fn validate_script(&self, script: &[ScriptStep]) -> Result<()> {
		for step in script {
			self.lookup(&step.phase)?;
		}

		Ok(())
	}
}
impl Default for PhaseRegistry {
	fn default() -> Self {
		Self::standard()
	}
}
