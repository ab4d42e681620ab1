//! Authorization, token, and userinfo phases.

// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use oauth2::http::Method;
use rand::{Rng, distr::Alphanumeric};
use serde_json::json;
use sha2::{Digest, Sha256};
// self
use crate::{
	_prelude::*,
	auth::ScopeSet,
	check::{Check, CheckResponseType},
	conversation::{AuthorizationSession, Conversation},
	error::ConfigError,
	phase::{ArgField, ArgSchema, Phase, PreparedRequest, ScriptStep, with_defaults},
	provider::{AuthMethod, select_token_auth_method},
};

const AUTHORIZATION: ArgSchema = ArgSchema::new("oic-login", &[
	ArgField::required("response_type"),
	ArgField::required("scope"),
	ArgField::optional("response_mode"),
	ArgField::optional("display"),
	ArgField::optional("prompt"),
	ArgField::optional("max_age"),
	ArgField::optional("ui_locales"),
	ArgField::optional("id_token_hint"),
	ArgField::optional("login_hint"),
	ArgField::optional("acr_values"),
	ArgField::optional("claims"),
]);
const RANDOM_LEN: usize = 32;
const VERIFIER_LEN: usize = 64;

fn random_token(len: usize) -> String {
	rand::rng().sample_iter(&Alphanumeric).take(len).map(char::from).collect()
}

/// S256 code challenge for a PKCE verifier.
pub fn pkce_challenge(verifier: &str) -> String {
	URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// `oic-login`: send the authorization request.
///
/// Defaults to `response_type=code` and `scope=openid`; the step's arguments override both.
/// A fresh `state` and `nonce` (plus a PKCE verifier when enabled) are generated and recorded
/// in the conversation so the response and the token exchange can be verified.
#[derive(Clone, Debug)]
pub struct AuthorizationRequest {
	args: JsonMap,
}
impl AuthorizationRequest {
	/// Builds the phase from a script step.
	pub fn new(step: &ScriptStep) -> Self {
		let args = with_defaults(
			&[("response_type", json!("code")), ("scope", json!(["openid"]))],
			&step.args,
		);

		Self { args }
	}
}
impl Phase for AuthorizationRequest {
	fn prepare(&self, conversation: &mut Conversation) -> Result<Option<PreparedRequest>> {
		let endpoint = conversation.provider_info()?.endpoint("authorization_endpoint")?;
		let client_id = conversation
			.client_id()
			.ok_or_else(|| Error::requirements_not_met("a client_id"))?
			.to_owned();
		let mut args = AUTHORIZATION.resolve(&self.args, conversation.config())?;
		let scope = args
			.get("scope")
			.map(ScopeSet::from_value)
			.transpose()
			.map_err(ConfigError::from)?
			.unwrap_or_default();
		let redirect_uri = match args.get("redirect_uri").and_then(Value::as_str) {
			Some(uri) => Some(uri.to_owned()),
			None => conversation.config().redirect_uri().map(str::to_owned),
		};
		let state = random_token(RANDOM_LEN);
		let nonce = random_token(RANDOM_LEN);
		let code_verifier = conversation.config().pkce.then(|| random_token(VERIFIER_LEN));

		args.insert("client_id".into(), client_id.into());
		args.insert("state".into(), state.clone().into());
		args.insert("nonce".into(), nonce.clone().into());

		if let Some(uri) = &redirect_uri {
			args.insert("redirect_uri".into(), uri.clone().into());
		}
		if let Some(verifier) = &code_verifier {
			args.insert("code_challenge".into(), pkce_challenge(verifier).into());
			args.insert("code_challenge_method".into(), "S256".into());
		}

		conversation.begin_authorization(AuthorizationSession {
			state,
			nonce,
			code_verifier,
			scope,
			redirect_uri,
			code: None,
		});

		Ok(Some(PreparedRequest::new(Method::GET, endpoint).with_args(args)))
	}

	fn pre_checks(&self) -> Vec<Box<dyn Check>> {
		vec![Box::new(CheckResponseType)]
	}
}

/// Resolves the token-endpoint request: endpoint plus the negotiated client authentication.
fn token_request(
	conversation: &Conversation,
	preferred: Option<AuthMethod>,
	mut args: JsonMap,
) -> Result<PreparedRequest> {
	let info = conversation.provider_info()?;
	let endpoint = info.endpoint("token_endpoint")?;
	let supported = info.strings("token_endpoint_auth_methods_supported");
	let method = select_token_auth_method(supported.as_deref(), preferred)?;

	if method == AuthMethod::None {
		let client_id =
			conversation.client_id().ok_or_else(|| Error::requirements_not_met("a client_id"))?;

		args.entry("client_id").or_insert_with(|| client_id.into());
	}

	Ok(PreparedRequest::new(Method::POST, endpoint).with_args(args).with_auth(method))
}

/// `access-token-request`: exchange the authorization code (or run the grant named in the
/// step's `grant_type` argument) at the token endpoint.
#[derive(Clone, Debug)]
pub struct AccessTokenRequest {
	args: JsonMap,
	auth_method: Option<AuthMethod>,
}
impl AccessTokenRequest {
	/// Builds the phase from a script step.
	pub fn new(step: &ScriptStep) -> Self {
		Self { args: step.args.clone(), auth_method: step.options.auth_method }
	}
}
impl Phase for AccessTokenRequest {
	fn prepare(&self, conversation: &mut Conversation) -> Result<Option<PreparedRequest>> {
		let mut args = with_defaults(&[("grant_type", json!("authorization_code"))], &self.args);

		if args.get("grant_type").and_then(Value::as_str) == Some("authorization_code") {
			let session = conversation.authorization()?;
			let code = session
				.code
				.as_deref()
				.ok_or_else(|| Error::requirements_not_met("an authorization code"))?;

			args.entry("code").or_insert_with(|| code.into());

			if let Some(uri) = &session.redirect_uri {
				args.entry("redirect_uri").or_insert_with(|| uri.as_str().into());
			}
			if let Some(verifier) = &session.code_verifier {
				args.entry("code_verifier").or_insert_with(|| verifier.as_str().into());
			}
		}

		Ok(Some(token_request(conversation, self.auth_method, args)?))
	}
}

/// `refresh-access-token`: redeem the last issued refresh token.
#[derive(Clone, Debug)]
pub struct RefreshAccessToken {
	args: JsonMap,
	auth_method: Option<AuthMethod>,
}
impl RefreshAccessToken {
	/// Builds the phase from a script step.
	pub fn new(step: &ScriptStep) -> Self {
		Self { args: step.args.clone(), auth_method: step.options.auth_method }
	}
}
impl Phase for RefreshAccessToken {
	fn prepare(&self, conversation: &mut Conversation) -> Result<Option<PreparedRequest>> {
		let refresh_token = conversation
			.issued()?
			.refresh_token
			.as_ref()
			.map(|token| token.expose().to_owned())
			.ok_or_else(|| Error::requirements_not_met("a refresh token"))?;
		let mut args = with_defaults(&[("grant_type", json!("refresh_token"))], &self.args);

		args.entry("refresh_token").or_insert_with(|| refresh_token.into());

		Ok(Some(token_request(conversation, self.auth_method, args)?))
	}
}

/// `userinfo`: GET the userinfo endpoint with the last access token as a bearer header.
#[derive(Clone, Copy, Debug, Default)]
pub struct UserInfoRequest;
impl Phase for UserInfoRequest {
	fn prepare(&self, conversation: &mut Conversation) -> Result<Option<PreparedRequest>> {
		let endpoint = conversation.provider_info()?.endpoint("userinfo_endpoint")?;
		let token = conversation.issued()?.access_token.clone();

		Ok(Some(PreparedRequest::new(Method::GET, endpoint).with_bearer(token)))
	}
}
