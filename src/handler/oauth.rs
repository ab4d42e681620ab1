//! OAuth 2.0 / OpenID Connect response handlers.

// crates.io
use oauth2::{ExtraTokenFields, StandardTokenResponse, TokenResponse, basic::BasicTokenType};
// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, TokenClass, TokenSecret},
	conversation::{Conversation, IssuedTokens},
	error::{ConfigError, ValidationFailure},
	handler::{ERROR_RESPONSE, ResponseHandler, archive_error, parse_json, parse_object},
	phase::{Exchange, PhaseOutput, WEBFINGER_ISSUER_REL},
	provider::{ProviderInfo, Protocol},
};

/// Token endpoint fields beyond RFC 6749.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdTokenFields {
	/// OpenID Connect ID token.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id_token: Option<String>,
}
impl ExtraTokenFields for IdTokenFields {}

/// Token endpoint response carrying an optional ID token.
pub type IdTokenResponse = StandardTokenResponse<IdTokenFields, BasicTokenType>;

/// Overwrites the provider metadata with a discovered document.
#[derive(Clone, Copy, Debug)]
pub struct ProviderConfiguration {
	protocol: Protocol,
}
impl ProviderConfiguration {
	/// Handler for `protocol` discovery.
	pub const fn new(protocol: Protocol) -> Self {
		Self { protocol }
	}
}
impl ResponseHandler for ProviderConfiguration {
	fn handle(&self, conversation: &mut Conversation, exchange: &Exchange) -> Result<()> {
		let PhaseOutput::Document(Value::Object(document)) = &exchange.output else {
			return Ok(());
		};

		conversation.push_protocol_response(
			"ProviderConfigurationResponse",
			Value::Object(document.clone()),
		);
		conversation.set_provider_info(self.protocol, ProviderInfo::new(document.clone()));

		Ok(())
	}
}

/// Persists a registration response and the client credentials it carries.
///
/// Serves registration as well as the read and update management phases.
#[derive(Clone, Copy, Debug, Default)]
pub struct RegistrationResponse;
impl ResponseHandler for RegistrationResponse {
	fn handle(&self, conversation: &mut Conversation, exchange: &Exchange) -> Result<()> {
		if archive_error(conversation, &exchange.output) {
			return Ok(());
		}

		let registration = parse_object(&exchange.output, "registration response")?;

		conversation.push_protocol_response("RegistrationResponse", registration.clone().into());
		conversation.store_registration(registration);

		if let Some(client_id) = conversation.client_id() {
			let message = format!("Registered client `{client_id}`.");

			conversation.trace_mut().info(message);
		}

		Ok(())
	}
}

/// Drops the stored registration once the server confirmed its deletion.
#[derive(Clone, Copy, Debug, Default)]
pub struct RegistrationDeleted;
impl ResponseHandler for RegistrationDeleted {
	fn handle(&self, conversation: &mut Conversation, exchange: &Exchange) -> Result<()> {
		if archive_error(conversation, &exchange.output) {
			return Ok(());
		}
		if exchange.output.status().is_some_and(|status| (200..300).contains(&status)) {
			conversation.clear_registration();
			conversation.trace_mut().info("Registration deleted.");
		}

		Ok(())
	}
}

/// Reads the authorization response from the redirect `Location`.
///
/// Parameters are taken from the query and the fragment. The returned `state` must match the
/// one sent; the `code` (and any implicit-flow tokens) are recorded. An `error` parameter is
/// accepted only when an error was armed, and must then match the armed code.
#[derive(Clone, Copy, Debug, Default)]
pub struct AuthorizationResponse;
impl AuthorizationResponse {
	const CHECK: &str = "authorization-response";

	fn redirect_params(exchange: &Exchange) -> Result<JsonMap> {
		let location = exchange.output.header("location").ok_or_else(|| {
			ValidationFailure::fatal(
				Self::CHECK,
				format!(
					"expected a redirect carrying the response, got HTTP status {}",
					exchange.output.status().unwrap_or_default()
				),
			)
		})?;
		let url = Url::parse(location).map_err(|e| ConfigError::invalid_url(location, e))?;
		let fragment = url.fragment().unwrap_or_default();
		let params = url
			.query_pairs()
			.chain(url::form_urlencoded::parse(fragment.as_bytes()))
			.map(|(key, value)| (key.into_owned(), Value::String(value.into_owned())))
			.collect();

		Ok(params)
	}
}
impl ResponseHandler for AuthorizationResponse {
	fn handle(&self, conversation: &mut Conversation, exchange: &Exchange) -> Result<()> {
		if archive_error(conversation, &exchange.output) {
			return Ok(());
		}

		let params = Self::redirect_params(exchange)?;
		let param = |key: &str| params.get(key).and_then(Value::as_str);

		match (param("error"), conversation.expected_error()) {
			(Some(code), Some(expected)) => {
				if let Some(wanted) = expected.error.as_deref().filter(|wanted| *wanted != code) {
					return Err(ValidationFailure::fatal(
						Self::CHECK,
						format!("expected error `{wanted}`, got `{code}`"),
					)
					.into());
				}

				conversation.push_protocol_response(ERROR_RESPONSE, params.into());

				return Ok(());
			},
			(Some(code), None) =>
				return Err(ValidationFailure::fatal(
					Self::CHECK,
					format!("authorization failed with `{code}`"),
				)
				.into()),
			(None, Some(_)) =>
				return Err(ValidationFailure::fatal(
					Self::CHECK,
					"expected an error response, got a successful authorization response",
				)
				.into()),
			(None, None) => (),
		}

		let session = conversation.authorization_mut()?;

		if param("state") != Some(session.state.as_str()) {
			return Err(ValidationFailure::fatal(
				Self::CHECK,
				format!("state mismatch: got {:?}", param("state")),
			)
			.into());
		}

		session.code = param("code").map(str::to_owned);

		if let Some(access_token) = param("access_token") {
			let issued = IssuedTokens {
				access_token: TokenSecret::new(access_token),
				refresh_token: None,
				id_token: param("id_token").map(str::to_owned),
				class: None,
			};

			conversation.set_issued(issued);
		}

		conversation.push_protocol_response("AuthorizationResponse", params.into());

		Ok(())
	}
}

/// Records a token-endpoint response.
///
/// The token is classified by the scope that was requested: the token request's own `scope`
/// argument when it sent one, else the scope of the pending authorization request. A PAT or
/// AAT is filed under its class together with the full response.
#[derive(Clone, Copy, Debug, Default)]
pub struct AccessTokenResponse;
impl ResponseHandler for AccessTokenResponse {
	fn handle(&self, conversation: &mut Conversation, exchange: &Exchange) -> Result<()> {
		if archive_error(conversation, &exchange.output) {
			return Ok(());
		}

		let body = exchange.output.body().unwrap_or_default();
		let response: IdTokenResponse = parse_json(body, "access token response")?;
		let raw: JsonMap = parse_json(body, "access token response")?;
		let requested = exchange.request.as_ref().and_then(|request| request.args.get("scope"));
		let scope = match requested {
			Some(value) => Some(ScopeSet::from_value(value).map_err(ConfigError::from)?),
			None => conversation.requested_scope().cloned(),
		};
		let class = scope.as_ref().and_then(TokenClass::classify);
		let access_token = TokenSecret::new(response.access_token().secret());

		conversation.set_issued(IssuedTokens {
			access_token: access_token.clone(),
			refresh_token: response.refresh_token().map(|token| TokenSecret::new(token.secret())),
			id_token: response.extra_fields().id_token.clone(),
			class,
		});

		if let Some(class) = class {
			conversation.store_token(class, access_token, raw.clone());
			conversation.trace_mut().info(format!("Stored {class} from the token endpoint."));
		}

		conversation.push_protocol_response("AccessTokenResponse", raw.into());

		Ok(())
	}
}

#[derive(Deserialize)]
struct Jrd {
	#[serde(default)]
	links: Vec<JrdLink>,
}

#[derive(Deserialize)]
struct JrdLink {
	rel: String,
	href: Option<String>,
}

/// Takes the issuer from a webfinger JRD.
#[derive(Clone, Copy, Debug, Default)]
pub struct WebFingerResponse;
impl ResponseHandler for WebFingerResponse {
	fn handle(&self, conversation: &mut Conversation, exchange: &Exchange) -> Result<()> {
		if archive_error(conversation, &exchange.output) {
			return Ok(());
		}

		let body = exchange.output.body().unwrap_or_default();
		let jrd: Jrd = parse_json(body, "webfinger response")?;
		let issuer = jrd
			.links
			.into_iter()
			.find(|link| link.rel == WEBFINGER_ISSUER_REL)
			.and_then(|link| link.href)
			.ok_or_else(|| ValidationFailure::fatal("webfinger", "no issuer link in response"))?;

		conversation.trace_mut().info(format!("Webfinger resolved issuer `{issuer}`."));
		conversation.set_issuer(issuer);

		Ok(())
	}
}

/// Stores a fetched JSON Web Key Set.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeySetResponse;
impl ResponseHandler for KeySetResponse {
	fn handle(&self, conversation: &mut Conversation, exchange: &Exchange) -> Result<()> {
		if archive_error(conversation, &exchange.output) {
			return Ok(());
		}

		let body = exchange.output.body().unwrap_or_default();
		let keys: Value = parse_json(body, "JSON Web Key Set")?;

		if !keys.get("keys").is_some_and(Value::is_array) {
			return Err(ValidationFailure::fatal("key-set", "document has no `keys` array").into());
		}

		conversation.push_protocol_response("JWKS", keys.clone());
		conversation.set_keys(keys);

		Ok(())
	}
}
