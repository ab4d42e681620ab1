//! Dynamic client registration and registration management phases.

// crates.io
use oauth2::http::Method;
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	check::{Check, CheckHttpResponse, RegistrationInfo},
	conversation::Conversation,
	error::ConfigError,
	phase::{ArgField, ArgSchema, Phase, PreparedRequest, ScriptStep},
};

const OIDC_REGISTRATION: ArgSchema = ArgSchema::new("oic-registration", &[
	ArgField::required("redirect_uris"),
	ArgField::optional("response_types"),
	ArgField::optional("grant_types"),
	ArgField::optional("application_type"),
	ArgField::optional("contacts"),
	ArgField::optional("client_name"),
	ArgField::optional("logo_uri"),
	ArgField::optional("client_uri"),
	ArgField::optional("policy_uri"),
	ArgField::optional("tos_uri"),
	ArgField::optional("jwks_uri"),
	ArgField::optional("jwks"),
	ArgField::optional("sector_identifier_uri"),
	ArgField::optional("subject_type"),
	ArgField::optional("id_token_signed_response_alg"),
	ArgField::optional("id_token_encrypted_response_alg"),
	ArgField::optional("id_token_encrypted_response_enc"),
	ArgField::optional("userinfo_signed_response_alg"),
	ArgField::optional("userinfo_encrypted_response_alg"),
	ArgField::optional("userinfo_encrypted_response_enc"),
	ArgField::optional("request_object_signing_alg"),
	ArgField::optional("token_endpoint_auth_method"),
	ArgField::optional("token_endpoint_auth_signing_alg"),
	ArgField::optional("default_max_age"),
	ArgField::optional("require_auth_time"),
	ArgField::optional("default_acr_values"),
	ArgField::optional("initiate_login_uri"),
	ArgField::optional("request_uris"),
	ArgField::optional("post_logout_redirect_uris"),
]);
const OAUTH_REGISTRATION: ArgSchema = ArgSchema::new("oauth-registration", &[
	ArgField::required("redirect_uris"),
	ArgField::optional("token_endpoint_auth_method"),
	ArgField::optional("grant_types"),
	ArgField::optional("response_types"),
	ArgField::optional("client_name"),
	ArgField::optional("client_uri"),
	ArgField::optional("logo_uri"),
	ArgField::optional("scope"),
	ArgField::optional("contacts"),
	ArgField::optional("tos_uri"),
	ArgField::optional("policy_uri"),
	ArgField::optional("jwks_uri"),
	ArgField::optional("jwks"),
	ArgField::optional("software_id"),
	ArgField::optional("software_version"),
]);
const SERVER_MANAGED: [&str; 4] = [
	"registration_access_token",
	"registration_client_uri",
	"client_id_issued_at",
	"client_secret_expires_at",
];

/// Which registration profile a [`Registration`] phase speaks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegistrationFlavor {
	/// OpenID Connect Dynamic Registration against `registration_endpoint`.
	Oidc,
	/// OAuth 2.0 Dynamic Client Registration against `dynamic_client_endpoint`.
	OAuth,
}
impl RegistrationFlavor {
	/// Provider metadata key holding the registration endpoint.
	pub const fn endpoint_key(self) -> &'static str {
		match self {
			RegistrationFlavor::Oidc => "registration_endpoint",
			RegistrationFlavor::OAuth => "dynamic_client_endpoint",
		}
	}

	const fn schema(self) -> ArgSchema {
		match self {
			RegistrationFlavor::Oidc => OIDC_REGISTRATION,
			RegistrationFlavor::OAuth => OAUTH_REGISTRATION,
		}
	}
}

/// `oic-registration` / `oauth-registration`: register the client.
#[derive(Clone, Debug)]
pub struct Registration {
	flavor: RegistrationFlavor,
	args: JsonMap,
}
impl Registration {
	/// Builds the phase from a script step.
	pub fn new(flavor: RegistrationFlavor, step: &ScriptStep) -> Self {
		Self { flavor, args: step.args.clone() }
	}
}
impl Phase for Registration {
	fn prepare(&self, conversation: &mut Conversation) -> Result<Option<PreparedRequest>> {
		let endpoint = conversation.provider_info()?.endpoint(self.flavor.endpoint_key())?;
		let mut args = self.flavor.schema().resolve(&self.args, conversation.config())?;

		args.remove("key_export_url");

		Ok(Some(PreparedRequest::new(Method::POST, endpoint).with_args(args).json()))
	}

	fn post_checks(&self) -> Vec<Box<dyn Check>> {
		vec![Box::new(RegistrationInfo), Box::new(CheckHttpResponse)]
	}
}

/// Management operations on the registration created earlier in the conversation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegistrationOp {
	/// `oauth-read-registration`.
	Read,
	/// `modify-registration`.
	Modify,
	/// `delete-registration`.
	Delete,
}

/// Reads, updates, or deletes the stored registration at its `registration_client_uri`,
/// authenticating with its `registration_access_token`.
#[derive(Clone, Debug)]
pub struct ManageRegistration {
	op: RegistrationOp,
	args: JsonMap,
}
impl ManageRegistration {
	/// Builds the phase from a script step.
	pub fn new(op: RegistrationOp, step: &ScriptStep) -> Self {
		Self { op, args: step.args.clone() }
	}
}
impl Phase for ManageRegistration {
	fn prepare(&self, conversation: &mut Conversation) -> Result<Option<PreparedRequest>> {
		let registration = conversation.registration()?;
		let uri = registration
			.get("registration_client_uri")
			.and_then(Value::as_str)
			.ok_or_else(|| Error::requirements_not_met("registration_client_uri"))?;
		let token = registration
			.get("registration_access_token")
			.and_then(Value::as_str)
			.ok_or_else(|| Error::requirements_not_met("registration_access_token"))?;
		let endpoint = Url::parse(uri).map_err(|e| ConfigError::invalid_url(uri, e))?;
		let bearer = TokenSecret::new(token);
		let request = match self.op {
			RegistrationOp::Read => PreparedRequest::new(Method::GET, endpoint),
			RegistrationOp::Delete => PreparedRequest::new(Method::DELETE, endpoint),
			RegistrationOp::Modify => {
				let mut body = registration.clone();

				for key in SERVER_MANAGED {
					body.remove(key);
				}
				for (key, value) in &self.args {
					body.insert(key.clone(), value.clone());
				}

				PreparedRequest::new(Method::PUT, endpoint).with_args(body).json()
			},
		};

		Ok(Some(request.with_bearer(bearer)))
	}

	fn post_checks(&self) -> Vec<Box<dyn Check>> {
		match self.op {
			RegistrationOp::Delete => vec![Box::new(CheckHttpResponse)],
			_ => vec![Box::new(RegistrationInfo), Box::new(CheckHttpResponse)],
		}
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;
	use crate::{
		config::ClientConfig,
		provider::{ProviderInfo, Protocol},
	};

	fn object(value: Value) -> JsonMap {
		match value {
			Value::Object(map) => map,
			_ => panic!("Fixture must be a JSON object."),
		}
	}

	#[test]
	fn registration_requires_provider_info() {
		let mut conversation = Conversation::new(ClientConfig::default());
		let err = Registration::new(RegistrationFlavor::Oidc, &ScriptStep::new("oic-registration"))
			.prepare(&mut conversation)
			.expect_err("No provider metadata yet.");

		assert!(matches!(err, Error::Config(ConfigError::RequirementsNotMet { .. })));
	}

	#[test]
	fn registration_body_is_layered_json() {
		let config = ClientConfig::default()
			.with_client_registration(object(json!({ "redirect_uris": ["https://rp/cb"] })));
		let mut conversation = Conversation::new(config);

		conversation.set_provider_info(
			Protocol::Oidc,
			ProviderInfo::new(object(json!({ "registration_endpoint": "https://op/register" }))),
		);

		let step = ScriptStep::new("oic-registration").with_arg("client_name", "conformance");
		let request = Registration::new(RegistrationFlavor::Oidc, &step)
			.prepare(&mut conversation)
			.expect("Registration should prepare.")
			.expect("Registration sends a request.");

		assert_eq!(request.method, Method::POST);
		assert_eq!(request.endpoint.as_str(), "https://op/register");
		assert_eq!(request.args["redirect_uris"], json!(["https://rp/cb"]));
		assert_eq!(request.args["client_name"], json!("conformance"));
	}

	#[test]
	fn modify_strips_server_managed_fields() {
		let mut conversation = Conversation::new(ClientConfig::default());

		conversation.store_registration(object(json!({
			"client_id": "c1",
			"redirect_uris": ["https://rp/cb"],
			"registration_access_token": "rat",
			"registration_client_uri": "https://op/register/c1",
			"client_id_issued_at": 1,
		})));

		let step = ScriptStep::new("modify-registration").with_arg("contacts", json!(["ops@rp"]));
		let request = ManageRegistration::new(RegistrationOp::Modify, &step)
			.prepare(&mut conversation)
			.expect("Update should prepare.")
			.expect("Update sends a request.");

		assert_eq!(request.method, Method::PUT);
		assert_eq!(request.bearer.as_ref().map(TokenSecret::expose), Some("rat"));
		assert_eq!(
			Value::Object(request.args),
			json!({ "client_id": "c1", "redirect_uris": ["https://rp/cb"], "contacts": ["ops@rp"] })
		);
	}
}
