// crates.io
use httpmock::prelude::*;
use serde_json::json;
// self
use oauth2_conformance::{
	_preludet::*,
	config::ClientConfig,
	conversation::Conversation,
	error::SchemeError,
	phase::{PhaseStage, ScriptStep},
	provider::Protocol,
};

fn object(value: Value) -> JsonMap {
	match value {
		Value::Object(map) => map,
		_ => panic!("Fixture must be a JSON object."),
	}
}

fn uma_configuration(server: &MockServer) -> String {
	json!({
		"issuer": server.base_url(),
		"authorization_endpoint": server.url("/authorize"),
		"token_endpoint": server.url("/token"),
		"resource_set_registration_endpoint": server.url("/rsr"),
		"permission_registration_endpoint": server.url("/perm"),
		"rpt_endpoint": server.url("/rpt"),
	})
	.to_string()
}

fn oidc_configuration(server: &MockServer) -> String {
	json!({
		"issuer": server.base_url(),
		"authorization_endpoint": server.url("/authorize"),
		"token_endpoint": server.url("/token"),
		"jwks_uri": server.url("/jwks"),
		"response_types_supported": ["code"],
		"subject_types_supported": ["public"],
		"id_token_signing_alg_values_supported": ["RS256"],
	})
	.to_string()
}

#[tokio::test]
async fn plain_http_issuer_is_rejected_unless_allowed() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/.well-known/uma-configuration");
			then.status(200)
				.header("content-type", "application/json")
				.body(uma_configuration(&server));
		})
		.await;
	let (orchestrator, _store) = build_test_orchestrator();
	let script = [ScriptStep::new("uma-discovery")];
	let strict = orchestrator
		.run(&script, Conversation::new(ClientConfig::new(server.base_url())))
		.await;
	let failure = strict.failure.expect("A plain http issuer should halt a strict run.");

	assert_eq!(failure.phase, "uma-discovery");
	assert_eq!(failure.stage, PhaseStage::PreChecked);
	assert!(matches!(failure.error, Error::Scheme(SchemeError::InsecureIssuer { .. })));
	assert!(strict.conversation.provider_info_opt().is_none());

	let relaxed = orchestrator
		.run(&script, relaxed_conversation(ClientConfig::new(server.base_url())))
		.await;

	assert!(relaxed.is_success(), "Relaxed run should succeed: {:?}", relaxed.failure);

	let info = relaxed
		.conversation
		.protocol_provider_info(Protocol::Uma)
		.expect("UMA metadata should be recorded.");

	assert_eq!(info.string("rpt_endpoint"), Some(server.url("/rpt").as_str()));
	assert_eq!(
		relaxed.conversation.protocol_responses()[0].kind,
		"ProviderConfigurationResponse"
	);

	mock.assert_calls_async(2).await;
}

#[tokio::test]
async fn static_override_wins_over_discovered_metadata() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/.well-known/openid-configuration");
			then.status(200)
				.header("content-type", "application/json")
				.body(oidc_configuration(&server));
		})
		.await;
	let (orchestrator, _store) = build_test_orchestrator();
	let config = ClientConfig::new(format!("{}/", server.base_url())).with_provider_info(object(
		json!({
			"token_endpoint": "https://override.example.com/token",
			"userinfo_endpoint": "https://override.example.com/userinfo",
		}),
	));
	let report =
		orchestrator.run(&[ScriptStep::new("oic-discovery")], relaxed_conversation(config)).await;

	assert!(report.is_success(), "Discovery should succeed: {:?}", report.failure);

	let info = report.conversation.provider_info().expect("Provider info should be recorded.");

	assert_eq!(info.string("token_endpoint"), Some("https://override.example.com/token"));
	assert_eq!(info.string("userinfo_endpoint"), Some("https://override.example.com/userinfo"));
	assert_eq!(info.string("jwks_uri"), Some(server.url("/jwks").as_str()));

	mock.assert_async().await;
}

#[tokio::test]
async fn incomplete_metadata_fails_validation() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/.well-known/uma-configuration");
			then.status(200)
				.header("content-type", "application/json")
				.body(json!({ "issuer": server.base_url() }).to_string());
		})
		.await;

	let (orchestrator, _store) = build_test_orchestrator();
	let report = orchestrator
		.run(
			&[ScriptStep::new("uma-discovery"), ScriptStep::new("note").with_message("unreached")],
			relaxed_conversation(ClientConfig::new(server.base_url())),
		)
		.await;
	let failure = report.failure.expect("Metadata without endpoints should be rejected.");

	assert!(matches!(failure.error, Error::Validation(_)));
	assert!(report.completed.is_empty());
}

#[tokio::test]
async fn webfinger_resolves_the_issuer_used_for_discovery() {
	let server = MockServer::start_async().await;
	let principal = server.url("/alice");
	let webfinger = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/.well-known/webfinger")
				.query_param("resource", principal.as_str())
				.query_param("rel", "http://openid.net/specs/connect/1.0/issuer");
			then.status(200).header("content-type", "application/jrd+json").body(
				json!({
					"subject": principal.as_str(),
					"links": [{
						"rel": "http://openid.net/specs/connect/1.0/issuer",
						"href": server.url("/op"),
					}],
				})
				.to_string(),
			);
		})
		.await;
	let discovery = server
		.mock_async(|when, then| {
			when.method(GET).path("/op/.well-known/openid-configuration");
			then.status(200)
				.header("content-type", "application/json")
				.body(oidc_configuration(&server));
		})
		.await;
	let (orchestrator, _store) = build_test_orchestrator();
	let script = [
		ScriptStep::new("webfinger").with_arg("principal", principal.as_str()),
		ScriptStep::new("oic-discovery"),
	];
	let report = orchestrator.run(&script, relaxed_conversation(ClientConfig::default())).await;

	assert!(report.is_success(), "Webfinger and discovery should succeed: {:?}", report.failure);
	assert_eq!(
		report.conversation.discovery_issuer().expect("Issuer should be resolved."),
		server.url("/op")
	);

	webfinger.assert_async().await;
	discovery.assert_async().await;
}
