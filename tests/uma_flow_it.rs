// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use serde_json::json;
// self
use oauth2_conformance::{
	_preludet::*,
	auth::{LocalId, PAT_SCOPE, TokenClass, TokenSecret},
	config::ClientConfig,
	phase::ScriptStep,
	store::{CachedToken, StoreKey, TokenStore},
};

const CLIENT_ID: &str = "uma-client";
const CLIENT_SECRET: &str = "uma-secret";

fn lid() -> LocalId {
	LocalId::new("desk-1").expect("Local id fixture should be valid.")
}

fn client_config(server: &MockServer) -> ClientConfig {
	let Value::Object(client_info) = json!({
		"client_id": CLIENT_ID,
		"client_secret": CLIENT_SECRET,
		"redirect_uris": ["https://rp.example.com/cb"],
	}) else {
		unreachable!()
	};

	ClientConfig::new(server.base_url()).with_client_info(client_info)
}

async fn mock_configuration(server: &MockServer) {
	server
		.mock_async(|when, then| {
			when.method(GET).path("/.well-known/uma-configuration");
			then.status(200).header("content-type", "application/json").body(
				json!({
					"issuer": server.base_url(),
					"authorization_endpoint": server.url("/authorize"),
					"token_endpoint": server.url("/token"),
					"resource_set_registration_endpoint": server.url("/rsr"),
					"permission_registration_endpoint": server.url("/perm"),
					"rpt_endpoint": server.url("/rpt"),
				})
				.to_string(),
			);
		})
		.await;
}

#[tokio::test]
async fn protection_and_authorization_state_threads_across_phases() -> Result<()> {
	let server = MockServer::start_async().await;

	mock_configuration(&server).await;

	let token = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"pat-1\",\"token_type\":\"bearer\"}");
		})
		.await;
	let create = server
		.mock_async(|when, then| {
			when.method(POST).path("/rsr/resource_set").header("authorization", "Bearer pat-1");
			then.status(201)
				.header("content-type", "application/json")
				.header("etag", "\"v1\"")
				.body("{\"_id\":\"rs-42\"}");
		})
		.await;
	let update = server
		.mock_async(|when, then| {
			when.method(PUT)
				.path("/rsr/resource_set/rs-42")
				.header("authorization", "Bearer pat-1")
				.header("if-match", "\"v1\"");
			then.status(200)
				.header("content-type", "application/json")
				.header("etag", "\"v2\"")
				.body("{\"_id\":\"rs-42\"}");
		})
		.await;
	let permission = server
		.mock_async(|when, then| {
			when.method(POST).path("/perm").header("authorization", "Bearer pat-1");
			then.status(201).header("content-type", "application/json").body("{\"ticket\":\"T1\"}");
		})
		.await;
	let (orchestrator, store) = build_test_orchestrator();
	let protection = [
		ScriptStep::new("uma-discovery"),
		ScriptStep::new("access-token-request")
			.with_arg("grant_type", "client_credentials")
			.with_arg("scope", PAT_SCOPE),
		ScriptStep::new("create_resource_set")
			.with_lid(lid())
			.with_arg("name", "Desk")
			.with_arg("scopes", json!(["http://photoz.example.com/dev/scopes/view"])),
		ScriptStep::new("update_resource_set")
			.with_lid(lid())
			.with_arg("name", "Standing desk")
			.with_arg("scopes", json!(["http://photoz.example.com/dev/scopes/view"])),
		ScriptStep::new("register_request")
			.with_lid(lid())
			.with_arg("scopes", json!(["http://photoz.example.com/dev/scopes/view"])),
	];
	let report = orchestrator.run(&protection, relaxed_conversation(client_config(&server))).await;

	assert!(report.is_success(), "Protection phases should succeed: {:?}", report.failure);
	assert_eq!(report.completed.len(), protection.len());

	let conversation = report.conversation;

	assert_eq!(
		conversation.token(TokenClass::Pat).expect("PAT should be stored.").expose(),
		"pat-1"
	);
	assert_eq!(conversation.resource_set_id("desk-1").map(|rsid| rsid.as_str()), Some("rs-42"));
	assert_eq!(conversation.etag("desk-1"), Some("\"v2\""));
	assert_eq!(conversation.ticket("rs-42").map(|ticket| ticket.as_str()), Some("T1"));

	token.assert_async().await;
	create.assert_async().await;
	update.assert_async().await;
	permission.assert_async().await;

	let provider_info = conversation.provider_info()?.clone();

	store
		.save(&StoreKey::new(TokenClass::Aat, server.base_url()), CachedToken {
			token: TokenSecret::new("aat-1"),
			provider_info,
		})
		.await?;

	let rpt = server
		.mock_async(|when, then| {
			when.method(POST).path("/rpt").header("authorization", "Bearer aat-1");
			then.status(200).header("content-type", "application/json").body("{\"rpt\":\"R1\"}");
		})
		.await;
	let delete = server
		.mock_async(|when, then| {
			when.method(DELETE)
				.path("/rsr/resource_set/rs-42")
				.header("authorization", "Bearer pat-1");
			then.status(204);
		})
		.await;
	let authorization = [
		ScriptStep::new("retrieve_aat"),
		ScriptStep::new("authzdata_request").with_lid(lid()),
		ScriptStep::new("delete_resource_set").with_lid(lid()),
	];
	let report = orchestrator.run(&authorization, conversation).await;

	assert!(report.is_success(), "Authorization phases should succeed: {:?}", report.failure);
	assert_eq!(report.conversation.rpt("T1").map(TokenSecret::expose), Some("R1"));
	assert!(report.conversation.resource_set_id("desk-1").is_none());

	rpt.assert_async().await;
	delete.assert_async().await;

	Ok(())
}

#[tokio::test]
async fn resource_set_phases_require_a_pat() {
	let server = MockServer::start_async().await;

	mock_configuration(&server).await;

	let create = server
		.mock_async(|when, then| {
			when.method(POST).path("/rsr/resource_set");
			then.status(201).body("{\"_id\":\"rs-1\"}");
		})
		.await;
	let (orchestrator, _store) = build_test_orchestrator();
	let script = [
		ScriptStep::new("uma-discovery"),
		ScriptStep::new("create_resource_set")
			.with_lid(lid())
			.with_arg("name", "Desk")
			.with_arg("scopes", json!(["view"])),
	];
	let report = orchestrator.run(&script, relaxed_conversation(client_config(&server))).await;
	let failure = report.failure.expect("Creating a resource set without a PAT should fail.");

	assert_eq!(failure.phase, "create_resource_set");
	assert!(matches!(failure.error, Error::Config(_)));
	assert_eq!(report.completed.len(), 1);

	create.assert_calls_async(0).await;
}

#[tokio::test]
async fn denied_authorization_data_is_archived_and_halts() {
	let server = MockServer::start_async().await;
	let Value::Object(provider_info) = json!({
		"issuer": server.base_url(),
		"rpt_endpoint": server.url("/rpt"),
	}) else {
		unreachable!()
	};
	let rpt = server
		.mock_async(|when, then| {
			when.method(POST).path("/rpt");
			then.status(403)
				.header("content-type", "application/json")
				.body("{\"error\":\"not_authorized\"}");
		})
		.await;
	let (orchestrator, store) = build_test_orchestrator();
	let config = client_config(&server).with_provider_info(provider_info.clone());

	store
		.save(&StoreKey::new(TokenClass::Aat, server.base_url()), CachedToken {
			token: TokenSecret::new("aat-1"),
			provider_info: provider_info.into(),
		})
		.await
		.expect("Seeding the AAT should succeed.");

	let script = [
		ScriptStep::new("retrieve_aat"),
		ScriptStep::new("authzdata_request").with_arg("ticket", "T9"),
	];
	let report = orchestrator.run(&script, relaxed_conversation(config)).await;
	let failure = report.failure.expect("A 403 without an expected error should halt the run.");

	assert_eq!(failure.phase, "authzdata_request");
	assert!(matches!(failure.error, Error::Validation(_)));
	assert!(report.conversation.rpt("T9").is_none());
	assert_eq!(report.conversation.protocol_responses()[0].kind, "ErrorResponse");

	rpt.assert_async().await;
}
