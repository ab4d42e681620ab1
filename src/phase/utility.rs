//! Side-effect phases: delays, notes, cookie resets, error arming, and key/ID-token helpers.

// std
use std::time::Duration as StdDuration;
// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use oauth2::http::Method;
// self
use crate::{
	_prelude::*,
	conversation::{Conversation, ExpectedError},
	error::ValidationFailure,
	phase::{Phase, PhaseFuture, PhaseOutput, PreparedRequest, ScriptStep, Services},
};

/// `intermission`: deliberate wait, by default the configured intermission length.
#[derive(Clone, Copy, Debug)]
pub struct Intermission {
	delay_secs: Option<u64>,
}
impl Intermission {
	/// Builds the phase from a script step.
	pub fn new(step: &ScriptStep) -> Self {
		Self { delay_secs: step.options.delay_secs }
	}
}
impl Phase for Intermission {
	fn execute_local<'a>(
		&'a self,
		conversation: &'a mut Conversation,
		_: &'a Services,
	) -> PhaseFuture<'a> {
		Box::pin(async move {
			let secs = self.delay_secs.unwrap_or(conversation.config().intermission_secs);

			conversation.trace_mut().info(format!("Waiting {secs} seconds."));
			tokio::time::sleep(StdDuration::from_secs(secs)).await;

			Ok(PhaseOutput::Empty)
		})
	}
}

/// `note`: append an operator-facing note to the trace.
#[derive(Clone, Debug)]
pub struct Note {
	message: Option<String>,
}
impl Note {
	/// Builds the phase from a script step.
	pub fn new(step: &ScriptStep) -> Self {
		Self { message: step.options.message.clone() }
	}
}
impl Phase for Note {
	fn execute_local<'a>(
		&'a self,
		conversation: &'a mut Conversation,
		_: &'a Services,
	) -> PhaseFuture<'a> {
		Box::pin(async move {
			conversation.trace_mut().note(self.message.clone().unwrap_or_default());

			Ok(PhaseOutput::Empty)
		})
	}
}

/// `rm_cookie`: drop every cookie held by the transport.
#[derive(Clone, Copy, Debug, Default)]
pub struct RmCookie;
impl Phase for RmCookie {
	fn execute_local<'a>(
		&'a self,
		conversation: &'a mut Conversation,
		services: &'a Services,
	) -> PhaseFuture<'a> {
		Box::pin(async move {
			services.transport.reset_cookies()?;
			conversation.trace_mut().info("Cookies removed.");

			Ok(PhaseOutput::Empty)
		})
	}
}

/// `expect_err`: arm an expected error response for the next HTTP exchange.
#[derive(Clone, Debug)]
pub struct ExpectErr {
	error: Option<String>,
}
impl ExpectErr {
	/// Builds the phase from a script step.
	pub fn new(step: &ScriptStep) -> Self {
		Self { error: step.options.error.clone() }
	}
}
impl Phase for ExpectErr {
	fn execute_local<'a>(
		&'a self,
		conversation: &'a mut Conversation,
		_: &'a Services,
	) -> PhaseFuture<'a> {
		Box::pin(async move {
			let description = self.error.as_deref().unwrap_or("any error");

			conversation.trace_mut().info(format!("Expecting an error response ({description})."));
			conversation.expect_error(ExpectedError { error: self.error.clone() });

			Ok(PhaseOutput::Empty)
		})
	}
}

/// `fetch_keys`: GET the provider's `jwks_uri`.
#[derive(Clone, Copy, Debug, Default)]
pub struct FetchKeys;
impl Phase for FetchKeys {
	fn prepare(&self, conversation: &mut Conversation) -> Result<Option<PreparedRequest>> {
		let endpoint = conversation.provider_info()?.endpoint("jwks_uri")?;

		Ok(Some(PreparedRequest::new(Method::GET, endpoint)))
	}
}

/// Decodes the claims segment of a compact JWT without verifying it.
pub fn decode_jwt_claims(token: &str) -> Result<Value> {
	let malformed = |message: &str| ValidationFailure::fatal("id-token-format", message);
	let payload = token.split('.').nth(1).ok_or_else(|| malformed("not a compact JWT"))?;
	let bytes = URL_SAFE_NO_PAD
		.decode(payload.trim_end_matches('='))
		.map_err(|_| malformed("claims segment is not base64url"))?;

	serde_json::from_slice(&bytes).map_err(|_| malformed("claims segment is not JSON").into())
}

/// `display_idtoken`: write the claims of the cached (or last issued) ID token to the trace.
#[derive(Clone, Copy, Debug, Default)]
pub struct DisplayIdToken;
impl Phase for DisplayIdToken {
	fn execute_local<'a>(
		&'a self,
		conversation: &'a mut Conversation,
		_: &'a Services,
	) -> PhaseFuture<'a> {
		Box::pin(async move {
			let token = match conversation.cached_id_token() {
				Some(token) => token.to_owned(),
				None => conversation
					.issued()
					.ok()
					.and_then(|issued| issued.id_token.clone())
					.ok_or_else(|| Error::requirements_not_met("an ID token"))?,
			};
			let claims = decode_jwt_claims(&token)?;

			conversation.trace_mut().info(format!("ID token claims: {claims}"));

			Ok(PhaseOutput::Document(claims))
		})
	}
}

/// `cache-id_token`: keep the last issued ID token for later phases.
#[derive(Clone, Copy, Debug, Default)]
pub struct CacheIdToken;
impl Phase for CacheIdToken {
	fn execute_local<'a>(
		&'a self,
		conversation: &'a mut Conversation,
		_: &'a Services,
	) -> PhaseFuture<'a> {
		Box::pin(async move {
			let id_token = conversation
				.issued()?
				.id_token
				.clone()
				.ok_or_else(|| Error::requirements_not_met("an ID token in the token response"))?;

			conversation.cache_id_token(id_token);

			Ok(PhaseOutput::Empty)
		})
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;

	#[test]
	fn decodes_claims_segment() {
		let claims = URL_SAFE_NO_PAD.encode(br#"{"sub":"alice","iss":"https://op.example.com"}"#);
		let token = format!("eyJhbGciOiJub25lIn0.{claims}.");

		assert_eq!(
			decode_jwt_claims(&token).expect("Claims should decode."),
			json!({ "sub": "alice", "iss": "https://op.example.com" })
		);
		assert!(matches!(decode_jwt_claims("opaque"), Err(Error::Validation(_))));
	}
}
