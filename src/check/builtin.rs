//! Built-in checks shared by the standard phases.

// self
use crate::{
	_prelude::*,
	check::{Check, CheckContext, CheckOutcome, Severity},
};

/// Fails on HTTP error statuses, honouring an error armed by the `expect_err` phase.
///
/// When an error is expected the polarity flips: an error status passes (provided the
/// `error` code matches, if one was named) and a success status fails.
#[derive(Clone, Copy, Debug, Default)]
pub struct CheckHttpResponse;
impl Check for CheckHttpResponse {
	fn name(&self) -> &'static str {
		"check-http-response"
	}

	fn severity(&self) -> Severity {
		Severity::Fatal
	}

	fn check(&self, cx: &CheckContext<'_>) -> CheckOutcome {
		let Some(status) = cx.output.and_then(|output| output.status()) else {
			return CheckOutcome::Passed;
		};
		let expected = cx.conversation.expected_error();

		match (status >= 400, expected) {
			(false, None) => CheckOutcome::Passed,
			(true, None) => CheckOutcome::failed(format!(
				"HTTP status {status}{}",
				error_code(cx).map(|code| format!(" ({code})")).unwrap_or_default()
			)),
			// Authorization errors arrive as redirects; the handler judges the parameters.
			(false, Some(_)) if (300..400).contains(&status) => CheckOutcome::Passed,
			(false, Some(_)) =>
				CheckOutcome::failed(format!("expected an error response, got status {status}")),
			(true, Some(expected)) => match (expected.error.as_deref(), error_code(cx)) {
				(Some(wanted), Some(got)) if wanted != got =>
					CheckOutcome::failed(format!("expected error `{wanted}`, got `{got}`")),
				(Some(wanted), None) => CheckOutcome::failed(format!(
					"expected error `{wanted}`, response carries no error code"
				)),
				_ => CheckOutcome::Passed,
			},
		}
	}
}

/// Verifies a registration response carries the issued `client_id`.
#[derive(Clone, Copy, Debug, Default)]
pub struct RegistrationInfo;
impl Check for RegistrationInfo {
	fn name(&self) -> &'static str {
		"registration-info"
	}

	fn check(&self, cx: &CheckContext<'_>) -> CheckOutcome {
		let Some(output) = cx.output.filter(|output| !output.is_error()) else {
			return CheckOutcome::Passed;
		};
		let client_id = output.json().and_then(|body| body.get("client_id").cloned());

		match client_id {
			Some(Value::String(id)) if !id.is_empty() => CheckOutcome::Passed,
			_ => CheckOutcome::failed("registration response lacks a client_id"),
		}
	}
}

/// Pre-check: the requested `response_type` must be advertised by the provider, when the
/// provider advertises anything at all.
#[derive(Clone, Copy, Debug, Default)]
pub struct CheckResponseType;
impl Check for CheckResponseType {
	fn name(&self) -> &'static str {
		"check-response-type"
	}

	fn check(&self, cx: &CheckContext<'_>) -> CheckOutcome {
		let Some(requested) = cx.request.and_then(|request| request.arg_string("response_type"))
		else {
			return CheckOutcome::failed("no response_type in the authorization request");
		};
		let Some(supported) = cx
			.conversation
			.provider_info_opt()
			.and_then(|info| info.strings("response_types_supported"))
		else {
			return CheckOutcome::Passed;
		};
		let mut wanted = requested.split_whitespace().collect::<Vec<_>>();

		wanted.sort_unstable();

		let advertised = supported.iter().any(|candidate| {
			let mut parts = candidate.split_whitespace().collect::<Vec<_>>();

			parts.sort_unstable();

			parts == wanted
		});

		if advertised {
			CheckOutcome::Passed
		} else {
			CheckOutcome::failed(format!("response_type `{requested}` is not supported"))
		}
	}
}

fn error_code(cx: &CheckContext<'_>) -> Option<String> {
	let body = cx.output?.json()?;

	body.get("error")?.as_str().map(str::to_owned)
}

#[cfg(test)]
mod tests {
	// crates.io
	use oauth2::http::{Method, Response, StatusCode};
	use serde_json::json;
	// self
	use super::*;
	use crate::{
		config::ClientConfig,
		conversation::{Conversation, ExpectedError},
		phase::{PhaseOutput, PreparedRequest},
	};

	fn http(status: u16, body: Value) -> PhaseOutput {
		let mut response = Response::new(body.to_string().into_bytes());

		*response.status_mut() =
			StatusCode::from_u16(status).expect("Status fixture should be valid.");

		PhaseOutput::Http(response)
	}

	fn evaluate(check: &dyn Check, conversation: &Conversation, output: &PhaseOutput) -> CheckOutcome {
		check.check(&CheckContext {
			phase: "test",
			conversation,
			request: None,
			output: Some(output),
		})
	}

	#[test]
	fn http_response_check_flips_when_an_error_is_expected() {
		let mut conversation = Conversation::new(ClientConfig::default());
		let ok = http(200, json!({}));
		let bad = http(400, json!({ "error": "invalid_request" }));

		assert_eq!(evaluate(&CheckHttpResponse, &conversation, &ok), CheckOutcome::Passed);
		assert!(matches!(
			evaluate(&CheckHttpResponse, &conversation, &bad),
			CheckOutcome::Failed(message) if message.contains("invalid_request")
		));

		conversation.expect_error(ExpectedError { error: Some("invalid_request".into()) });

		assert_eq!(evaluate(&CheckHttpResponse, &conversation, &bad), CheckOutcome::Passed);
		assert!(matches!(evaluate(&CheckHttpResponse, &conversation, &ok), CheckOutcome::Failed(_)));

		conversation.expect_error(ExpectedError { error: Some("invalid_client".into()) });

		assert!(matches!(
			evaluate(&CheckHttpResponse, &conversation, &bad),
			CheckOutcome::Failed(_)
		));
	}

	#[test]
	fn registration_info_requires_client_id() {
		let conversation = Conversation::new(ClientConfig::default());

		assert_eq!(
			evaluate(&RegistrationInfo, &conversation, &http(201, json!({ "client_id": "c1" }))),
			CheckOutcome::Passed
		);
		assert!(matches!(
			evaluate(&RegistrationInfo, &conversation, &http(201, json!({}))),
			CheckOutcome::Failed(_)
		));
		assert_eq!(RegistrationInfo.severity(), Severity::Warning);
	}

	fn authorization_request(response_type: &str) -> PreparedRequest {
		let Value::Object(args) = json!({ "response_type": response_type, "scope": "openid" })
		else {
			unreachable!()
		};

		PreparedRequest::new(
			Method::GET,
			Url::parse("https://op.example.com/authz").expect("Endpoint fixture should parse."),
		)
		.with_args(args)
	}

	fn pre_check(conversation: &Conversation, request: &PreparedRequest) -> CheckOutcome {
		CheckResponseType.check(&CheckContext {
			phase: "oic-login",
			conversation,
			request: Some(request),
			output: None,
		})
	}

	#[test]
	fn response_type_must_be_advertised() {
		let Value::Object(provider_info) =
			json!({ "response_types_supported": ["code", "id_token token"] })
		else {
			unreachable!()
		};
		let conversation =
			Conversation::new(ClientConfig::default().with_provider_info(provider_info));

		assert_eq!(pre_check(&conversation, &authorization_request("code")), CheckOutcome::Passed);
		assert_eq!(
			pre_check(&conversation, &authorization_request("token id_token")),
			CheckOutcome::Passed
		);
		assert!(matches!(
			pre_check(&conversation, &authorization_request("id_token")),
			CheckOutcome::Failed(message) if message.contains("id_token")
		));
	}

	#[test]
	fn response_type_passes_when_nothing_is_advertised() {
		let conversation = Conversation::new(ClientConfig::default());

		assert_eq!(
			pre_check(&conversation, &authorization_request("id_token")),
			CheckOutcome::Passed
		);
	}
}
