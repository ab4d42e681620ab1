//! Response handlers: typed interpretation of a phase result plus its state mutation.
//!
//! Every registry entry pairs a phase with exactly one handler; side-effect-only phases use
//! [`NoResponse`]. Handlers see the executed [`Exchange`] (step, sent request, raw output)
//! and apply only the mutation documented for their response kind. Error statuses are
//! archived through [`archive_error`] and never mutate state.

pub mod oauth;
pub mod uma;

pub use oauth::*;
pub use uma::*;

// crates.io
use oauth2::basic::BasicErrorResponse;
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	conversation::Conversation,
	error::TransportError,
	phase::{Exchange, PhaseOutput},
};

/// Archive kind used for error responses.
pub const ERROR_RESPONSE: &str = "ErrorResponse";

/// Interprets one phase result.
pub trait ResponseHandler
where
	Self: Send + Sync,
{
	/// Parses the raw result and applies the documented state mutation.
	fn handle(&self, conversation: &mut Conversation, exchange: &Exchange) -> Result<()>;
}

/// Handler for phases whose result needs no interpretation.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoResponse;
impl ResponseHandler for NoResponse {
	fn handle(&self, _: &mut Conversation, _: &Exchange) -> Result<()> {
		Ok(())
	}
}

/// Archives the decoded body under `kind` without touching any other state.
#[derive(Clone, Copy, Debug)]
pub struct Archive {
	kind: &'static str,
}
impl Archive {
	/// Archive handler for responses of `kind`.
	pub const fn new(kind: &'static str) -> Self {
		Self { kind }
	}
}
impl ResponseHandler for Archive {
	fn handle(&self, conversation: &mut Conversation, exchange: &Exchange) -> Result<()> {
		if archive_error(conversation, &exchange.output) {
			return Ok(());
		}

		let body = match &exchange.output {
			PhaseOutput::Http(response) => raw_value(response.body()),
			PhaseOutput::Document(document) => document.clone(),
			PhaseOutput::Empty => return Ok(()),
		};

		conversation.push_protocol_response(self.kind, body);

		Ok(())
	}
}

/// Decodes a JSON body, reporting the failing path on error.
pub fn parse_json<T>(body: &[u8], message: &'static str) -> Result<T>
where
	T: DeserializeOwned,
{
	let mut de = serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(&mut de)
		.map_err(|source| TransportError::MalformedBody { message, source }.into())
}

/// Decodes a JSON object body; an empty body decodes to an empty object.
pub fn parse_object(output: &PhaseOutput, message: &'static str) -> Result<JsonMap> {
	match output.body() {
		Some(body) if !body.iter().all(u8::is_ascii_whitespace) => parse_json(body, message),
		_ => Ok(JsonMap::new()),
	}
}

/// Archives an error status response; returns `true` when the output was one.
///
/// OAuth error objects are archived in their standard shape, anything else as text.
pub fn archive_error(conversation: &mut Conversation, output: &PhaseOutput) -> bool {
	if !output.is_error() {
		return false;
	}

	let body = output.body().unwrap_or_default();
	let archived = serde_json::from_slice::<BasicErrorResponse>(body)
		.ok()
		.and_then(|error| serde_json::to_value(error).ok())
		.unwrap_or_else(|| raw_value(body));

	conversation.push_protocol_response(ERROR_RESPONSE, archived);

	true
}

fn raw_value(body: &[u8]) -> Value {
	serde_json::from_slice(body)
		.unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
}
