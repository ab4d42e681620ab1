//! Client authentication methods and token-endpoint method selection.

// self
use crate::_prelude::*;

/// Authentication applied to an outbound request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
	/// No client authentication.
	None,
	/// HTTP Basic with `client_id`/`client_secret`.
	ClientSecretBasic,
	/// Form body parameters for `client_id`/`client_secret`.
	ClientSecretPost,
	/// HMAC-signed client assertion.
	ClientSecretJwt,
	/// Asymmetrically signed client assertion.
	PrivateKeyJwt,
	/// `Authorization: Bearer` header carrying a previously issued token.
	BearerHeader,
}
impl AuthMethod {
	/// Fixed preference order used when the caller did not pick a method.
	pub const TOKEN_ENDPOINT_PREFERENCE: [AuthMethod; 4] = [
		AuthMethod::ClientSecretBasic,
		AuthMethod::ClientSecretPost,
		AuthMethod::ClientSecretJwt,
		AuthMethod::PrivateKeyJwt,
	];

	/// Returns the registered identifier for the method.
	pub const fn as_str(self) -> &'static str {
		match self {
			AuthMethod::None => "none",
			AuthMethod::ClientSecretBasic => "client_secret_basic",
			AuthMethod::ClientSecretPost => "client_secret_post",
			AuthMethod::ClientSecretJwt => "client_secret_jwt",
			AuthMethod::PrivateKeyJwt => "private_key_jwt",
			AuthMethod::BearerHeader => "bearer_header",
		}
	}

	/// Returns `true` for methods that send a signed client assertion.
	pub const fn uses_assertion(self) -> bool {
		matches!(self, AuthMethod::ClientSecretJwt | AuthMethod::PrivateKeyJwt)
	}
}
impl Display for AuthMethod {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Picks the token-endpoint authentication method.
///
/// Without a caller preference the first entry of
/// [`AuthMethod::TOKEN_ENDPOINT_PREFERENCE`] present in `supported` wins; with nothing
/// advertised, or when nothing advertised is recognised, the RFC 6749 default
/// `client_secret_basic` applies. A caller preference that the server does not advertise is an
/// [`Error::UnsupportedMethod`] and is never substituted.
pub fn select_token_auth_method(
	supported: Option<&[String]>,
	preferred: Option<AuthMethod>,
) -> Result<AuthMethod> {
	let supported = supported.filter(|methods| !methods.is_empty());
	let advertised = |method: AuthMethod| {
		supported.is_none_or(|methods| methods.iter().any(|m| m == method.as_str()))
	};

	match preferred {
		Some(method) if advertised(method) => Ok(method),
		Some(method) => Err(unsupported(method.as_str(), supported)),
		None => {
			let Some(methods) = supported else {
				return Ok(AuthMethod::ClientSecretBasic);
			};

			Ok(AuthMethod::TOKEN_ENDPOINT_PREFERENCE
				.into_iter()
				.find(|method| methods.iter().any(|m| m == method.as_str()))
				.or_else(|| methods.iter().any(|m| m == "none").then_some(AuthMethod::None))
				.unwrap_or(AuthMethod::ClientSecretBasic))
		},
	}
}

fn unsupported(method: &str, supported: Option<&[String]>) -> Error {
	Error::UnsupportedMethod {
		method: method.to_owned(),
		supported: supported.map(<[String]>::to_vec).unwrap_or_default(),
	}
}
