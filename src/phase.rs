//! Phase contract, script steps, and the concrete phases.
//!
//! A phase is one typed unit of interaction. It either prepares exactly one HTTP request
//! (resolved from conversation state and static configuration) or performs a local
//! computation such as discovery or a deliberate delay. The orchestrator drives each phase
//! through [`PhaseStage`] and hands the raw result to the paired response handler.

pub mod args;
pub mod authorization;
pub mod cache;
pub mod discovery;
pub mod registration;
pub mod request;
pub mod uma;
pub mod utility;

pub use args::*;
pub use authorization::*;
pub use cache::*;
pub use discovery::*;
pub use registration::*;
pub use request::*;
pub use uma::*;
pub use utility::*;

// crates.io
use oauth2::HttpResponse;
// self
use crate::{
	_prelude::*,
	auth::LocalId,
	check::{Check, CheckHttpResponse},
	conversation::Conversation,
	ext::ClientAssertionSigner,
	http::HttpTransport,
	provider::AuthMethod,
	store::TokenStore,
};

/// Boxed future returned by [`Phase::execute_local`].
pub type PhaseFuture<'a> = Pin<Box<dyn Future<Output = Result<PhaseOutput>> + 'a + Send>>;

/// Position of a phase instance in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStage {
	/// Instantiated from the registry.
	Created,
	/// Request prepared and pre-checks passed.
	PreChecked,
	/// Request dispatched (or local computation done) and the response handled.
	Executed,
	/// Post-checks evaluated.
	PostChecked,
	/// Completed.
	Done,
	/// Failed; the error carries the detail.
	Error,
}
impl PhaseStage {
	/// Returns a stable label suitable for span fields and reports.
	pub const fn as_str(self) -> &'static str {
		match self {
			PhaseStage::Created => "created",
			PhaseStage::PreChecked => "pre_checked",
			PhaseStage::Executed => "executed",
			PhaseStage::PostChecked => "post_checked",
			PhaseStage::Done => "done",
			PhaseStage::Error => "error",
		}
	}
}
impl Display for PhaseStage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Per-step knobs that are not request arguments.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepOptions {
	/// Local resource identifier the step operates on.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub lid: Option<LocalId>,
	/// Client authentication method chosen by the script author.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub auth_method: Option<AuthMethod>,
	/// Text for `note`.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
	/// Length of `intermission`, overriding the configured default.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub delay_secs: Option<u64>,
	/// Error code armed by `expect_err`.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

/// One entry of a test script.
///
/// Deserializes from either a bare phase name or an object carrying `phase`, optional
/// static `args`, and the [`StepOptions`] fields.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawStep")]
pub struct ScriptStep {
	/// Registry key.
	pub phase: String,
	/// Explicit static request arguments; the highest-priority lookup layer.
	#[serde(skip_serializing_if = "JsonMap::is_empty")]
	pub args: JsonMap,
	/// Step options.
	#[serde(flatten)]
	pub options: StepOptions,
}
impl ScriptStep {
	/// Creates a step without arguments or options.
	pub fn new(phase: impl Into<String>) -> Self {
		Self { phase: phase.into(), args: JsonMap::new(), options: StepOptions::default() }
	}

	/// Adds one static request argument.
	pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
		self.args.insert(key.into(), value.into());

		self
	}

	/// Sets the local resource identifier.
	pub fn with_lid(mut self, lid: LocalId) -> Self {
		self.options.lid = Some(lid);

		self
	}

	/// Pre-selects the client authentication method.
	pub fn with_auth_method(mut self, method: AuthMethod) -> Self {
		self.options.auth_method = Some(method);

		self
	}

	/// Sets the `note` text.
	pub fn with_message(mut self, message: impl Into<String>) -> Self {
		self.options.message = Some(message.into());

		self
	}

	/// Overrides the `intermission` length.
	pub fn with_delay_secs(mut self, secs: u64) -> Self {
		self.options.delay_secs = Some(secs);

		self
	}

	/// Sets the error code armed by `expect_err`.
	pub fn with_error(mut self, error: impl Into<String>) -> Self {
		self.options.error = Some(error.into());

		self
	}
}
impl From<&str> for ScriptStep {
	fn from(phase: &str) -> Self {
		Self::new(phase)
	}
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawStep {
	Name(String),
	Full {
		phase: String,
		#[serde(default)]
		args: JsonMap,
		#[serde(flatten)]
		options: StepOptions,
	},
}
impl From<RawStep> for ScriptStep {
	fn from(raw: RawStep) -> Self {
		match raw {
			RawStep::Name(phase) => Self::new(phase),
			RawStep::Full { phase, args, options } => Self { phase, args, options },
		}
	}
}

/// Raw result of executing a phase.
#[derive(Clone, Debug)]
pub enum PhaseOutput {
	/// Response of the single HTTP round trip.
	Http(HttpResponse),
	/// Document produced by a local computation (discovery).
	Document(Value),
	/// Nothing to hand over.
	Empty,
}
impl PhaseOutput {
	/// HTTP status, for HTTP outputs.
	pub fn status(&self) -> Option<u16> {
		match self {
			PhaseOutput::Http(response) => Some(response.status().as_u16()),
			_ => None,
		}
	}

	/// Header value, for HTTP outputs.
	pub fn header(&self, name: &str) -> Option<&str> {
		match self {
			PhaseOutput::Http(response) =>
				response.headers().get(name).and_then(|value| value.to_str().ok()),
			_ => None,
		}
	}

	/// Raw body bytes, for HTTP outputs.
	pub fn body(&self) -> Option<&[u8]> {
		match self {
			PhaseOutput::Http(response) => Some(response.body()),
			_ => None,
		}
	}

	/// Body decoded as JSON when possible.
	pub fn json(&self) -> Option<Value> {
		match self {
			PhaseOutput::Http(response) => serde_json::from_slice(response.body()).ok(),
			PhaseOutput::Document(document) => Some(document.clone()),
			PhaseOutput::Empty => None,
		}
	}

	/// Returns `true` for HTTP error statuses.
	pub fn is_error(&self) -> bool {
		self.status().is_some_and(|status| status >= 400)
	}
}

/// Everything a response handler sees about one executed phase.
#[derive(Clone, Debug)]
pub struct Exchange {
	/// Step that produced the exchange.
	pub step: ScriptStep,
	/// Request that was sent, if the phase issued one.
	pub request: Option<PreparedRequest>,
	/// Raw result.
	pub output: PhaseOutput,
}

/// Collaborators available to phases during execution.
#[derive(Clone)]
pub struct Services {
	/// HTTP transport.
	pub transport: Arc<dyn HttpTransport>,
	/// Token cache.
	pub store: Arc<dyn TokenStore>,
	/// Client assertion signer for JWT-based client authentication.
	pub signer: Option<Arc<dyn ClientAssertionSigner>>,
}
impl Debug for Services {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Services").field("signer", &self.signer.is_some()).finish_non_exhaustive()
	}
}

/// One typed unit of interaction.
///
/// Phases that talk HTTP return a [`PreparedRequest`] from [`Phase::prepare`]; the
/// orchestrator dispatches it. Phases returning `None` run [`Phase::execute_local`] instead.
pub trait Phase
where
	Self: Send + Sync,
{
	/// Resolves the request (arguments, endpoint, authentication) right before dispatch.
	///
	/// Phases may record request-scoped secrets (state, nonce, PKCE verifier) here.
	fn prepare(&self, conversation: &mut Conversation) -> Result<Option<PreparedRequest>> {
		let _ = conversation;

		Ok(None)
	}

	/// Performs the local computation of a phase that issues no prepared request.
	fn execute_local<'a>(
		&'a self,
		conversation: &'a mut Conversation,
		services: &'a Services,
	) -> PhaseFuture<'a> {
		let _ = (conversation, services);

		Box::pin(async { Ok(PhaseOutput::Empty) })
	}

	/// Validators run against the prepared request.
	fn pre_checks(&self) -> Vec<Box<dyn Check>> {
		Vec::new()
	}

	/// Validators run against the raw result once the handler ran.
	fn post_checks(&self) -> Vec<Box<dyn Check>> {
		vec![Box::new(CheckHttpResponse)]
	}
}
