//! UMA response handlers: resource-set status, permission tickets, and RPTs.

// self
use crate::{
	_prelude::*,
	auth::{LocalId, ResourceSetId, Ticket, TokenSecret},
	conversation::Conversation,
	error::{ConfigError, ValidationFailure},
	handler::{ResponseHandler, archive_error, parse_object},
	phase::Exchange,
};

fn step_lid(exchange: &Exchange) -> Result<&LocalId> {
	exchange
		.step
		.options
		.lid
		.as_ref()
		.ok_or_else(|| Error::requirements_not_met("a local resource id (`lid`)"))
}

fn request_arg<'a>(exchange: &'a Exchange, key: &str) -> Option<&'a str> {
	exchange.request.as_ref()?.args.get(key)?.as_str()
}

fn required_str<'a>(body: &'a JsonMap, check: &'static str, key: &str) -> Result<&'a str> {
	body.get(key).and_then(Value::as_str).ok_or_else(|| {
		ValidationFailure::fatal(check, format!("response carries no `{key}`")).into()
	})
}

/// Resource-set create/update status.
///
/// A `201 Created` binds the step's local id to the returned `_id`; any other success leaves
/// the binding alone. An `ETag` header, when present, becomes the set's concurrency tag.
#[derive(Clone, Copy, Debug, Default)]
pub struct StatusResponse;
impl ResponseHandler for StatusResponse {
	fn handle(&self, conversation: &mut Conversation, exchange: &Exchange) -> Result<()> {
		if archive_error(conversation, &exchange.output) {
			return Ok(());
		}

		let lid = step_lid(exchange)?;
		let body = parse_object(&exchange.output, "resource set status")?;

		if exchange.output.status() == Some(201) {
			let id = required_str(&body, "status-response", "_id")?;
			let rsid = ResourceSetId::new(id).map_err(ConfigError::from)?;

			conversation.trace_mut().info(format!("Bound `{lid}` to resource set `{rsid}`."));
			conversation.bind_resource_set(lid.clone(), rsid);
		}
		if let Some(etag) = exchange.output.header("etag") {
			conversation.set_etag(lid.clone(), etag);
		}

		conversation.push_protocol_response("StatusResponse", body.into());

		Ok(())
	}
}

/// Forgets a resource set the server confirmed as deleted.
#[derive(Clone, Copy, Debug, Default)]
pub struct ResourceSetDeleted;
impl ResponseHandler for ResourceSetDeleted {
	fn handle(&self, conversation: &mut Conversation, exchange: &Exchange) -> Result<()> {
		if archive_error(conversation, &exchange.output) {
			return Ok(());
		}
		if exchange.output.status().is_some_and(|status| (200..300).contains(&status)) {
			conversation.forget_resource_set(step_lid(exchange)?.as_str());
		}

		Ok(())
	}
}

/// Stores the permission ticket under the resource-set id the request registered.
#[derive(Clone, Copy, Debug, Default)]
pub struct PermissionResponse;
impl ResponseHandler for PermissionResponse {
	fn handle(&self, conversation: &mut Conversation, exchange: &Exchange) -> Result<()> {
		if archive_error(conversation, &exchange.output) {
			return Ok(());
		}

		let body = parse_object(&exchange.output, "permission registration response")?;
		let ticket = Ticket::new(required_str(&body, "permission-response", "ticket")?)
			.map_err(ConfigError::from)?;
		let rsid = request_arg(exchange, "resource_set_id")
			.ok_or_else(|| Error::requirements_not_met("the requested resource_set_id"))?;
		let rsid = ResourceSetId::new(rsid).map_err(ConfigError::from)?;

		conversation.push_protocol_response("PermissionRegistrationResponse", body.into());
		conversation.store_ticket(rsid, ticket);

		Ok(())
	}
}

/// Stores the RPT under the ticket the request presented.
#[derive(Clone, Copy, Debug, Default)]
pub struct AuthzDataResponse;
impl ResponseHandler for AuthzDataResponse {
	fn handle(&self, conversation: &mut Conversation, exchange: &Exchange) -> Result<()> {
		if archive_error(conversation, &exchange.output) {
			return Ok(());
		}

		let body = parse_object(&exchange.output, "authorization data response")?;
		let rpt = TokenSecret::new(required_str(&body, "authz-data-response", "rpt")?);
		let ticket = request_arg(exchange, "ticket")
			.ok_or_else(|| Error::requirements_not_met("the requested ticket"))?;
		let ticket = Ticket::new(ticket).map_err(ConfigError::from)?;

		conversation.trace_mut().info(format!("Stored RPT for ticket `{ticket}`."));
		conversation.store_rpt(ticket, rpt);
		conversation.push_protocol_response("AuthorizationDataResponse", body.into());

		Ok(())
	}
}
