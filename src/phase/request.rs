//! Prepared requests and their encoding into wire requests.

// crates.io
use base64::{Engine, engine::general_purpose::STANDARD};
use oauth2::{
	HttpRequest,
	http::{
		HeaderName, Method,
		header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, IF_MATCH},
	},
};
use url::form_urlencoded;
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	conversation::Conversation,
	error::ConfigError,
	ext::{AssertionRequest, ClientAssertionSigner, JWT_BEARER_ASSERTION_TYPE},
	provider::AuthMethod,
};

/// Body encoding for POST and PUT requests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ContentType {
	/// `application/x-www-form-urlencoded`.
	#[default]
	Form,
	/// `application/json`.
	Json,
}
impl ContentType {
	/// MIME type sent in `Content-Type`.
	pub const fn mime(self) -> &'static str {
		match self {
			ContentType::Form => "application/x-www-form-urlencoded",
			ContentType::Json => "application/json",
		}
	}
}

/// Request resolved by a phase and ready for dispatch.
#[derive(Clone, Debug)]
pub struct PreparedRequest {
	/// HTTP method.
	pub method: Method,
	/// Resolved endpoint.
	pub endpoint: Url,
	/// Resolved request arguments (query for GET/DELETE, body otherwise).
	pub args: JsonMap,
	/// Body encoding.
	pub content_type: ContentType,
	/// Client authentication applied on encode.
	pub auth: AuthMethod,
	/// Token sent with [`AuthMethod::BearerHeader`].
	pub bearer: Option<TokenSecret>,
	/// Extra headers such as `If-Match`.
	pub headers: Vec<(HeaderName, String)>,
}
impl PreparedRequest {
	/// Creates an unauthenticated request without arguments.
	pub fn new(method: Method, endpoint: Url) -> Self {
		Self {
			method,
			endpoint,
			args: JsonMap::new(),
			content_type: ContentType::Form,
			auth: AuthMethod::None,
			bearer: None,
			headers: Vec::new(),
		}
	}

	/// Replaces the arguments.
	pub fn with_args(mut self, args: JsonMap) -> Self {
		self.args = args;

		self
	}

	/// Sends the body as JSON.
	pub fn json(mut self) -> Self {
		self.content_type = ContentType::Json;

		self
	}

	/// Sets the client authentication method.
	pub fn with_auth(mut self, auth: AuthMethod) -> Self {
		self.auth = auth;

		self
	}

	/// Authenticates with a bearer token in the `Authorization` header.
	pub fn with_bearer(mut self, token: TokenSecret) -> Self {
		self.auth = AuthMethod::BearerHeader;
		self.bearer = Some(token);

		self
	}

	/// Sends `If-Match` with the provided entity tag.
	pub fn with_if_match(mut self, etag: impl Into<String>) -> Self {
		self.headers.push((IF_MATCH, etag.into()));

		self
	}

	/// Argument value flattened to its wire form (arrays are space-joined).
	pub fn arg_string(&self, key: &str) -> Option<String> {
		self.args.get(key).and_then(wire_value)
	}

	/// Short description for the trace.
	pub fn summary(&self) -> String {
		format!("{} {} ({})", self.method, self.endpoint, self.auth)
	}

	/// Encodes the request, applying client authentication.
	///
	/// Secret-based methods read the client credentials from the conversation; JWT-based
	/// methods delegate to `signer`. Missing inputs raise `RequirementsNotMet`.
	pub fn encode(
		&self,
		conversation: &Conversation,
		signer: Option<&dyn ClientAssertionSigner>,
	) -> Result<HttpRequest> {
		let mut args = self.args.clone();
		let mut builder = oauth2::http::Request::builder()
			.method(self.method.clone())
			.header(ACCEPT, "application/json");

		match self.auth {
			AuthMethod::None => {},
			AuthMethod::ClientSecretBasic => {
				let (client_id, client_secret) = client_credentials(conversation)?;
				let encoded = STANDARD.encode(format!(
					"{}:{}",
					form_urlencoded::byte_serialize(client_id.as_bytes()).collect::<String>(),
					form_urlencoded::byte_serialize(client_secret.as_bytes()).collect::<String>(),
				));

				builder = builder.header(AUTHORIZATION, format!("Basic {encoded}"));
			},
			AuthMethod::ClientSecretPost => {
				let (client_id, client_secret) = client_credentials(conversation)?;

				args.insert("client_id".into(), client_id.into());
				args.insert("client_secret".into(), client_secret.into());
			},
			AuthMethod::ClientSecretJwt | AuthMethod::PrivateKeyJwt => {
				let signer = signer
					.ok_or_else(|| Error::requirements_not_met("a client assertion signer"))?;
				let client_id = conversation
					.client_id()
					.ok_or_else(|| Error::requirements_not_met("a client_id"))?;
				let assertion = signer.sign(&AssertionRequest {
					method: self.auth,
					client_id,
					client_secret: conversation.client_secret(),
					audience: &self.endpoint,
				})?;

				args.insert("client_assertion_type".into(), JWT_BEARER_ASSERTION_TYPE.into());
				args.insert("client_assertion".into(), assertion.into());
			},
			AuthMethod::BearerHeader => {
				let token = self
					.bearer
					.as_ref()
					.ok_or_else(|| Error::requirements_not_met("a bearer token"))?;

				builder = builder.header(AUTHORIZATION, token.bearer_header());
			},
		}
		for (name, value) in &self.headers {
			builder = builder.header(name, value);
		}

		let mut url = self.endpoint.clone();
		let body = if matches!(self.method, Method::GET | Method::DELETE) {
			if !args.is_empty() {
				let mut pairs = url.query_pairs_mut();

				for (key, value) in &args {
					if let Some(value) = wire_value(value) {
						pairs.append_pair(key, &value);
					}
				}
			}

			Vec::new()
		} else {
			builder = builder.header(CONTENT_TYPE, self.content_type.mime());

			match self.content_type {
				ContentType::Form => {
					let mut serializer = form_urlencoded::Serializer::new(String::new());

					for (key, value) in &args {
						if let Some(value) = wire_value(value) {
							serializer.append_pair(key, &value);
						}
					}

					serializer.finish().into_bytes()
				},
				ContentType::Json => Value::Object(args).to_string().into_bytes(),
			}
		};

		builder.uri(url.as_str()).body(body).map_err(|e| ConfigError::from(e).into())
	}
}

fn client_credentials(conversation: &Conversation) -> Result<(&str, &str)> {
	let client_id =
		conversation.client_id().ok_or_else(|| Error::requirements_not_met("a client_id"))?;
	let client_secret = conversation
		.client_secret()
		.ok_or_else(|| Error::requirements_not_met("a client_secret"))?;

	Ok((client_id, client_secret))
}

fn wire_value(value: &Value) -> Option<String> {
	match value {
		Value::Null => None,
		Value::String(s) => Some(s.clone()),
		Value::Array(items) => Some(
			items
				.iter()
				.filter_map(|item| match item {
					Value::String(s) => Some(s.clone()),
					Value::Null => None,
					other => Some(other.to_string()),
				})
				.collect::<Vec<_>>()
				.join(" "),
		),
		other => Some(other.to_string()),
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;
	use crate::config::ClientConfig;

	fn conversation() -> Conversation {
		let Value::Object(client_info) = json!({ "client_id": "c 1", "client_secret": "s:1" })
		else {
			unreachable!()
		};

		Conversation::new(ClientConfig::default().with_client_info(client_info))
	}

	fn endpoint() -> Url {
		Url::parse("https://op.example.com/token").expect("Endpoint fixture should parse.")
	}

	fn header<'a>(request: &'a HttpRequest, name: HeaderName) -> Option<&'a str> {
		request.headers().get(name).and_then(|value| value.to_str().ok())
	}

	#[test]
	fn basic_auth_form_encodes_credentials() {
		let mut args = JsonMap::new();

		args.insert("grant_type".into(), json!("authorization_code"));
		args.insert("scope".into(), json!(["openid", "profile"]));

		let request = PreparedRequest::new(Method::POST, endpoint())
			.with_args(args)
			.with_auth(AuthMethod::ClientSecretBasic)
			.encode(&conversation(), None)
			.expect("Request should encode.");
		let expected = format!("Basic {}", STANDARD.encode("c+1:s%3A1"));

		assert_eq!(header(&request, AUTHORIZATION), Some(expected.as_str()));
		assert_eq!(header(&request, CONTENT_TYPE), Some("application/x-www-form-urlencoded"));
		assert_eq!(request.body(), b"grant_type=authorization_code&scope=openid+profile");
	}

	#[test]
	fn post_auth_moves_credentials_into_body() {
		let request = PreparedRequest::new(Method::POST, endpoint())
			.with_auth(AuthMethod::ClientSecretPost)
			.encode(&conversation(), None)
			.expect("Request should encode.");

		assert!(header(&request, AUTHORIZATION).is_none());
		assert_eq!(request.body(), b"client_id=c+1&client_secret=s%3A1");
	}

	#[test]
	fn get_arguments_go_to_the_query() {
		let mut args = JsonMap::new();

		args.insert("state".into(), json!("xyz"));

		let request = PreparedRequest::new(Method::GET, endpoint())
			.with_args(args)
			.with_bearer(TokenSecret::new("pat-1"))
			.with_if_match("\"v2\"")
			.encode(&conversation(), None)
			.expect("Request should encode.");

		assert_eq!(request.uri().to_string(), "https://op.example.com/token?state=xyz");
		assert_eq!(header(&request, AUTHORIZATION), Some("Bearer pat-1"));
		assert_eq!(header(&request, IF_MATCH), Some("\"v2\""));
		assert!(request.body().is_empty());
	}

	#[test]
	fn missing_inputs_are_unmet_requirements() {
		let bare = Conversation::new(ClientConfig::default());

		for auth in [AuthMethod::ClientSecretBasic, AuthMethod::PrivateKeyJwt] {
			let err = PreparedRequest::new(Method::POST, endpoint())
				.with_auth(auth)
				.encode(&bare, None)
				.expect_err("Credentials are missing.");

			assert!(matches!(err, Error::Config(ConfigError::RequirementsNotMet { .. })));
		}
	}
}
