//! Client assertion contracts used by JWT-based client authentication.

// self
use crate::{_prelude::*, provider::AuthMethod};

/// Assertion type sent alongside `client_assertion`.
pub const JWT_BEARER_ASSERTION_TYPE: &str =
	"urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// Inputs for one client assertion.
#[derive(Clone, Copy, Debug)]
pub struct AssertionRequest<'a> {
	/// `client_secret_jwt` or `private_key_jwt`.
	pub method: AuthMethod,
	/// Client identifier, used as `iss` and `sub`.
	pub client_id: &'a str,
	/// Client secret, available to HMAC-based signers.
	pub client_secret: Option<&'a str>,
	/// Endpoint the assertion is addressed to, used as `aud`.
	pub audience: &'a Url,
}

/// Produces signed client assertion JWTs.
///
/// Implementations own the key material; the driver only places the compact serialization
/// into the request body.
pub trait ClientAssertionSigner
where
	Self: Send + Sync,
{
	/// Returns the compact JWS for `request`.
	fn sign(&self, request: &AssertionRequest<'_>) -> Result<String>;
}
