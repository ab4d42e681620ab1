//! Sequential script interpreter over one conversation.
//!
//! The orchestrator validates a whole script against the registry before any network
//! activity, then drives each step through the phase lifecycle:
//! prepare → pre-checks → dispatch (or local computation) → handler → post-checks. Every
//! error is attributed to its phase and appended to the trace. Fatal errors halt the run;
//! warning-level post-check failures are recorded as defects and the run continues. There is
//! no retry: a failed round trip surfaces immediately.

// self
use crate::{
	_prelude::*,
	check::{CheckContext, run_post_checks, run_pre_checks},
	conversation::Conversation,
	error::{ConfigError, ValidationFailure},
	ext::ClientAssertionSigner,
	http::{HttpTransport, ResponseMetadata},
	obs::{self, PhaseOutcome, PhaseSpan},
	phase::{Exchange, PhaseOutput, PhaseStage, PreparedRequest, ScriptStep, Services},
	registry::{PhaseDescriptor, PhaseRegistry},
	store::TokenStore,
};
#[cfg(feature = "reqwest")]
use crate::{config::ClientConfig, http::ReqwestHttpClient, store::FileStore};

/// Fatal error attributed to the phase that raised it.
#[derive(Debug, ThisError)]
#[error("Phase `{phase}` failed at stage `{stage}`: {error}")]
pub struct PhaseFailure {
	/// Registry name of the failing phase (or the unknown name a script referenced).
	pub phase: String,
	/// Stage the phase had reached when it failed.
	pub stage: PhaseStage,
	/// Underlying error.
	#[source]
	pub error: Error,
}
impl PhaseFailure {
	fn new(phase: impl Into<String>, stage: PhaseStage, error: Error) -> Self {
		Self { phase: phase.into(), stage, error }
	}
}

/// Summary of one completed step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepOutcome {
	/// Registry name of the phase.
	pub phase: String,
	/// HTTP status of the exchange, for phases that sent a request.
	pub status: Option<u16>,
	/// Warning-level post-check failures recorded for this step.
	pub defects: Vec<ValidationFailure>,
}

/// Result of a scripted run.
#[derive(Debug)]
pub struct RunReport {
	/// Final conversation state, including the trace.
	pub conversation: Conversation,
	/// Steps that reached `Done`, in order.
	pub completed: Vec<StepOutcome>,
	/// Fatal failure that halted the run, if any.
	pub failure: Option<PhaseFailure>,
	/// Failure to flush the trace to `trace_path`, if one occurred.
	pub flush_error: Option<Error>,
}
impl RunReport {
	/// Returns `true` when every step completed.
	pub fn is_success(&self) -> bool {
		self.failure.is_none()
	}
}

/// Drives scripts against the collaborators in [`Services`].
#[derive(Clone, Debug)]
pub struct Orchestrator {
	/// Transport, token cache, and optional assertion signer shared by every phase.
	pub services: Services,
	/// Phase lookup table.
	pub registry: PhaseRegistry,
}
impl Orchestrator {
	/// Creates an orchestrator over the standard registry.
	pub fn new(transport: Arc<dyn HttpTransport>, store: Arc<dyn TokenStore>) -> Self {
		Self {
			services: Services { transport, store, signer: None },
			registry: PhaseRegistry::standard(),
		}
	}

	/// Builds the default stack for `config`: reqwest transport bounded by the configured
	/// timeout and a file-backed token cache under `cache_dir`.
	#[cfg(feature = "reqwest")]
	pub fn from_config(config: &ClientConfig) -> Result<Self> {
		let transport = ReqwestHttpClient::new(config.request_timeout())?;
		let store = FileStore::new(config.cache_dir.clone());

		Ok(Self::new(Arc::new(transport), Arc::new(store)))
	}

	/// Installs the signer used for `client_secret_jwt` / `private_key_jwt`.
	pub fn with_signer(mut self, signer: Arc<dyn ClientAssertionSigner>) -> Self {
		self.services.signer = Some(signer);

		self
	}

	/// Replaces the phase registry.
	pub fn with_registry(mut self, registry: PhaseRegistry) -> Self {
		self.registry = registry;

		self
	}

	/// Runs `script` to completion or to the first fatal error.
	pub async fn run(&self, script: &[ScriptStep], mut conversation: Conversation) -> RunReport {
		let mut completed = Vec::with_capacity(script.len());
		let mut failure = None;

		if let Err(error) = self.registry.validate_script(script) {
			let phase = match &error {
				Error::Config(ConfigError::UnknownPhase { name }) => name.clone(),
				_ => String::from("script"),
			};

			conversation.trace_mut().error(format!("Script rejected: {error}"));
			failure = Some(PhaseFailure::new(phase, PhaseStage::Created, error));
		} else {
			for step in script {
				match self.run_step(step, &mut conversation).await {
					Ok(outcome) => completed.push(outcome),
					Err(e) => {
						failure = Some(e);

						break;
					},
				}
			}
		}

		let flush_error = flush_trace(&conversation);

		RunReport { conversation, completed, failure, flush_error }
	}

	/// Runs a single step against `conversation`.
	pub async fn run_step(
		&self,
		step: &ScriptStep,
		conversation: &mut Conversation,
	) -> Result<StepOutcome, PhaseFailure> {
		let descriptor = match self.registry.lookup(&step.phase) {
			Ok(descriptor) => descriptor,
			Err(e) => {
				let failure = PhaseFailure::new(&step.phase, PhaseStage::Created, e);

				conversation.trace_mut().error(failure.to_string());

				return Err(failure);
			},
		};
		let span = PhaseSpan::new(descriptor.name);

		obs::record_phase_outcome(descriptor.name, PhaseOutcome::Attempt);
		conversation.trace_mut().begin_phase(descriptor.name);

		let result = span.instrument(self.drive(descriptor, step, conversation, &span)).await;

		match &result {
			Ok(outcome) => {
				for _ in &outcome.defects {
					obs::record_phase_outcome(descriptor.name, PhaseOutcome::Defect);
				}

				obs::record_phase_outcome(descriptor.name, PhaseOutcome::Success);
			},
			Err(failure) => {
				span.record_stage(PhaseStage::Error);
				conversation.trace_mut().error(failure.to_string());
				obs::record_phase_outcome(descriptor.name, PhaseOutcome::Failure);
			},
		}

		conversation.trace_mut().end_phase();

		result
	}

	async fn drive(
		&self,
		descriptor: &'static PhaseDescriptor,
		step: &ScriptStep,
		conversation: &mut Conversation,
		span: &PhaseSpan,
	) -> Result<StepOutcome, PhaseFailure> {
		let name = descriptor.name;
		let mut stage = PhaseStage::Created;
		let fail = |stage, error| PhaseFailure::new(name, stage, error);
		let (phase, handler) = descriptor.instantiate(step);
		let request = phase.prepare(conversation).map_err(|e| fail(stage, e))?;

		run_pre_checks(&phase.pre_checks(), &CheckContext {
			phase: name,
			conversation,
			request: request.as_ref(),
			output: None,
		})
		.map_err(|e| fail(stage, e))?;

		stage = PhaseStage::PreChecked;
		span.record_stage(stage);

		let output = match &request {
			Some(request) => self.dispatch(request, conversation).await,
			None => phase.execute_local(conversation, &self.services).await,
		}
		.map_err(|e| fail(stage, e))?;
		let exchange = Exchange { step: step.clone(), request, output };

		handler.handle(conversation, &exchange).map_err(|e| fail(stage, e))?;

		stage = PhaseStage::Executed;
		span.record_stage(stage);

		let checked = run_post_checks(&phase.post_checks(), &CheckContext {
			phase: name,
			conversation,
			request: exchange.request.as_ref(),
			output: Some(&exchange.output),
		});

		if matches!(exchange.output, PhaseOutput::Http(_)) {
			conversation.clear_expected_error();
		}

		let defects = match checked {
			Ok(defects) => defects,
			Err((defects, fatal)) => {
				for defect in defects {
					conversation.trace_mut().defect(name, defect);
				}

				return Err(fail(stage, fatal.into()));
			},
		};

		for defect in &defects {
			conversation.trace_mut().defect(name, defect.clone());
		}

		span.record_stage(PhaseStage::PostChecked);
		span.record_stage(PhaseStage::Done);

		Ok(StepOutcome { phase: name.to_owned(), status: exchange.output.status(), defects })
	}

	async fn dispatch(
		&self,
		request: &PreparedRequest,
		conversation: &mut Conversation,
	) -> Result<PhaseOutput> {
		let encoded = request.encode(conversation, self.services.signer.as_deref())?;

		conversation.trace_mut().request(request.summary());

		let response = self.services.transport.execute(encoded).await?;
		let metadata = ResponseMetadata::from_response(&response);

		conversation.trace_mut().response(metadata.to_string());
		conversation.set_last_response(metadata);

		Ok(PhaseOutput::Http(response))
	}
}

fn flush_trace(conversation: &Conversation) -> Option<Error> {
	let path = conversation.config().trace_path.as_ref()?;

	conversation.trace().write_to(path).err().map(Error::from)
}

#[cfg(test)]
mod tests {
	// crates.io
	use oauth2::{
		HttpRequest, HttpResponse,
		http::{Response, StatusCode},
	};
	use serde_json::json;
	// self
	use super::*;
	use crate::{
		auth::{TokenClass, TokenSecret},
		config::ClientConfig,
		conversation::trace::TraceKind,
		http::HttpFuture,
		store::MemoryStore,
	};

	struct Scripted {
		responses: Mutex<Vec<HttpResponse>>,
		seen: Mutex<Vec<HttpRequest>>,
	}
	impl Scripted {
		fn replying(replies: Vec<(u16, Value)>) -> Arc<Self> {
			let responses = replies
				.into_iter()
				.rev()
				.map(|(status, body)| {
					let mut response = Response::new(body.to_string().into_bytes());

					*response.status_mut() =
						StatusCode::from_u16(status).expect("Status fixture should be valid.");

					response
				})
				.collect();

			Arc::new(Self { responses: Mutex::new(responses), seen: Mutex::default() })
		}
	}
	impl HttpTransport for Scripted {
		fn execute(&self, request: HttpRequest) -> HttpFuture<'_> {
			self.seen.lock().push(request);

			let response = self.responses.lock().pop();

			Box::pin(async move {
				response.ok_or_else(|| Error::requirements_not_met("a scripted response"))
			})
		}
	}

	fn uma_config() -> ClientConfig {
		let Value::Object(provider_info) = json!({
			"issuer": "https://as.example.com",
			"resource_set_registration_endpoint": "https://as.example.com/rsr",
			"permission_registration_endpoint": "https://as.example.com/perm",
			"rpt_endpoint": "https://as.example.com/rpt",
		}) else {
			unreachable!()
		};

		ClientConfig::new("https://as.example.com").with_provider_info(provider_info)
	}

	fn orchestrator(transport: Arc<Scripted>) -> Orchestrator {
		Orchestrator::new(transport, Arc::new(MemoryStore::default()))
	}

	#[tokio::test]
	async fn unknown_phases_halt_before_any_request() {
		let transport = Scripted::replying(vec![(200, json!({}))]);
		let report = orchestrator(transport.clone())
			.run(
				&[ScriptStep::new("note"), ScriptStep::new("warp")],
				Conversation::new(ClientConfig::default()),
			)
			.await;
		let failure = report.failure.expect("Unknown phase should fail the run.");

		assert_eq!(failure.phase, "warp");
		assert!(report.completed.is_empty());
		assert!(transport.seen.lock().is_empty());
	}

	#[tokio::test]
	async fn phases_requiring_provider_info_fail_without_it() {
		let transport = Scripted::replying(Vec::new());
		let step = ScriptStep::new("list_resource_set");
		let failure = orchestrator(transport.clone())
			.run_step(&step, &mut Conversation::new(ClientConfig::default()))
			.await
			.expect_err("No provider metadata is available.");

		assert!(matches!(failure.error, Error::Config(ConfigError::RequirementsNotMet { .. })));
		assert_eq!(failure.stage, PhaseStage::Created);
		assert!(transport.seen.lock().is_empty());
	}

	#[tokio::test]
	async fn unknown_phase_in_a_single_step_is_traced() {
		let transport = Scripted::replying(Vec::new());
		let mut conversation = Conversation::new(ClientConfig::default());
		let failure = orchestrator(transport.clone())
			.run_step(&ScriptStep::new("teleport"), &mut conversation)
			.await
			.expect_err("Unknown phase should fail the step.");

		assert_eq!(failure.phase, "teleport");
		assert_eq!(failure.stage, PhaseStage::Created);
		assert!(conversation.trace().events().iter().any(|event| {
			event.kind == TraceKind::Error && event.message.contains("teleport")
		}));
		assert!(transport.seen.lock().is_empty());
	}

	#[tokio::test]
	async fn failed_pre_check_withholds_the_request() {
		let transport = Scripted::replying(vec![(302, json!({}))]);
		let Value::Object(provider_info) = json!({
			"issuer": "https://op.example.com",
			"authorization_endpoint": "https://op.example.com/authz",
			"response_types_supported": ["code"],
		}) else {
			unreachable!()
		};
		let Value::Object(client_info) =
			json!({ "client_id": "c1", "redirect_uris": ["https://rp.example.com/cb"] })
		else {
			unreachable!()
		};
		let config =
			ClientConfig::default().with_provider_info(provider_info).with_client_info(client_info);
		let mut conversation = Conversation::new(config);
		let step = ScriptStep::new("oic-login").with_arg("response_type", "id_token");
		let failure = orchestrator(transport.clone())
			.run_step(&step, &mut conversation)
			.await
			.expect_err("An unadvertised response_type should fail the pre-check.");

		assert_eq!(failure.phase, "oic-login");
		assert_eq!(failure.stage, PhaseStage::Created);
		assert!(matches!(
			&failure.error,
			Error::Validation(validation) if validation.check == "check-response-type"
		));
		assert!(transport.seen.lock().is_empty());
		assert!(conversation.trace().events().iter().all(|event| event.kind != TraceKind::Request));
	}

	#[tokio::test]
	async fn uma_state_threads_through_phases() {
		let transport = Scripted::replying(vec![
			(201, json!({ "_id": "rs-42" })),
			(201, json!({ "ticket": "T1" })),
			(200, json!({ "rpt": "R1" })),
		]);
		let mut conversation = Conversation::new(uma_config());

		conversation.store_token(
			TokenClass::Pat,
			TokenSecret::new("pat"),
			JsonMap::new(),
		);
		conversation.store_token(
			TokenClass::Aat,
			TokenSecret::new("aat"),
			JsonMap::new(),
		);

		let script: Vec<ScriptStep> = serde_json::from_value(json!([
			{ "phase": "create_resource_set", "lid": "desk-1",
				"args": { "name": "Desk", "scopes": ["read"] } },
			{ "phase": "register_request", "lid": "desk-1", "args": { "scopes": ["read"] } },
			{ "phase": "authzdata_request", "lid": "desk-1" },
		]))
		.expect("Script fixture should parse.");
		let report = orchestrator(transport.clone()).run(&script, conversation).await;

		assert!(report.is_success(), "{:?}", report.failure);
		assert_eq!(report.completed.len(), 3);
		assert_eq!(report.conversation.ticket("rs-42").map(|ticket| ticket.as_str()), Some("T1"));
		assert_eq!(
			report.conversation.rpt("T1").map(TokenSecret::expose),
			Some("R1")
		);

		let seen = transport.seen.lock();

		assert_eq!(seen[0].uri().to_string(), "https://as.example.com/rsr/resource_set");
		assert_eq!(
			seen[2].headers().get("authorization").and_then(|value| value.to_str().ok()),
			Some("Bearer aat")
		);
	}

	#[tokio::test]
	async fn expected_errors_pass_and_are_consumed() {
		let transport = Scripted::replying(vec![
			(400, json!({ "error": "invalid_request" })),
			(400, json!({ "error": "invalid_request" })),
		]);
		let mut conversation = Conversation::new(uma_config());

		conversation.store_token(
			TokenClass::Pat,
			TokenSecret::new("pat"),
			JsonMap::new(),
		);

		let script = vec![
			ScriptStep::new("expect_err").with_error("invalid_request"),
			ScriptStep::new("list_resource_set"),
			ScriptStep::new("list_resource_set"),
		];
		let report = orchestrator(transport).run(&script, conversation).await;
		let failure = report.failure.expect("The unexpected error should halt the run.");

		assert_eq!(report.completed.len(), 2);
		assert_eq!(failure.phase, "list_resource_set");
		assert!(matches!(failure.error, Error::Validation(_)));
		assert!(report.conversation.expected_error().is_none());
	}

	#[tokio::test]
	async fn warning_checks_become_defects() {
		let transport = Scripted::replying(vec![(201, json!({ "client_secret": "s1" }))]);
		let Value::Object(provider_info) =
			json!({ "registration_endpoint": "https://op.example.com/register" })
		else {
			unreachable!()
		};
		let Value::Object(registration) = json!({ "redirect_uris": ["https://rp/cb"] }) else {
			unreachable!()
		};
		let config = ClientConfig::default()
			.with_provider_info(provider_info)
			.with_client_registration(registration);
		let report = orchestrator(transport)
			.run(&[ScriptStep::new("oic-registration")], Conversation::new(config))
			.await;

		assert!(report.is_success());
		assert_eq!(report.completed[0].defects.len(), 1);
		assert_eq!(report.conversation.trace().defects()[0].phase, "oic-registration");
	}
}
