//! UMA protection-API and authorization-API phases.
//!
//! Resource-set and permission phases authenticate with the PAT; the RPT request
//! authenticates with the AAT. Resource-set registration lives under
//! `{resource_set_registration_endpoint}/resource_set`, individual sets under
//! `/resource_set/{rsid}` where `rsid` is resolved from the step's local id.

// crates.io
use oauth2::http::Method;
// self
use crate::{
	_prelude::*,
	auth::{LocalId, TokenClass},
	conversation::Conversation,
	error::ConfigError,
	phase::{ArgField, ArgSchema, Phase, PreparedRequest, ScriptStep},
};

const RESOURCE_SET: ArgSchema = ArgSchema::new("create_resource_set", &[
	ArgField::required("name"),
	ArgField::required("scopes"),
	ArgField::optional("uri"),
	ArgField::optional("type"),
	ArgField::optional("icon_uri"),
]);

/// Operation performed by a [`ResourceSetRequest`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceSetOp {
	/// `create_resource_set`: POST a description.
	Create,
	/// `update_resource_set`: PUT a description with `If-Match`.
	Update,
	/// `read_resource_set`: GET one set.
	Read,
	/// `list_resource_set`: GET all set ids.
	List,
	/// `delete_resource_set`: DELETE one set.
	Delete,
}
impl ResourceSetOp {
	fn method(self) -> Method {
		match self {
			ResourceSetOp::Create => Method::POST,
			ResourceSetOp::Update => Method::PUT,
			ResourceSetOp::Read | ResourceSetOp::List => Method::GET,
			ResourceSetOp::Delete => Method::DELETE,
		}
	}

	const fn needs_lid(self) -> bool {
		!matches!(self, ResourceSetOp::List)
	}

	const fn addresses_set(self) -> bool {
		matches!(self, ResourceSetOp::Update | ResourceSetOp::Read | ResourceSetOp::Delete)
	}
}

/// Resolves the resource-set collection URL, optionally addressing one set.
pub fn resource_set_url(base: &Url, rsid: Option<&str>) -> Result<Url> {
	let mut url = base.clone();

	url.path_segments_mut()
		.map_err(|()| ConfigError::InvalidConfig {
			message: format!("`{base}` cannot be used as a resource set registration endpoint"),
		})?
		.pop_if_empty()
		.push("resource_set")
		.extend(rsid);

	Ok(url)
}

/// Resource-set registration phases.
#[derive(Clone, Debug)]
pub struct ResourceSetRequest {
	op: ResourceSetOp,
	lid: Option<LocalId>,
	args: JsonMap,
}
impl ResourceSetRequest {
	/// Builds the phase from a script step.
	pub fn new(op: ResourceSetOp, step: &ScriptStep) -> Self {
		Self { op, lid: step.options.lid.clone(), args: step.args.clone() }
	}

	fn lid(&self) -> Result<&LocalId> {
		self.lid.as_ref().ok_or_else(|| Error::requirements_not_met("a local resource id (`lid`)"))
	}
}
impl Phase for ResourceSetRequest {
	fn prepare(&self, conversation: &mut Conversation) -> Result<Option<PreparedRequest>> {
		let base = conversation.provider_info()?.endpoint("resource_set_registration_endpoint")?;
		let token = conversation.token(TokenClass::Pat)?.clone();
		let lid = if self.op.needs_lid() { Some(self.lid()?) } else { None };
		let rsid = match lid {
			Some(lid) if self.op.addresses_set() =>
				Some(conversation.require_resource_set_id(lid.as_str())?.as_str()),
			_ => None,
		};
		let endpoint = resource_set_url(&base, rsid)?;
		let mut request = PreparedRequest::new(self.op.method(), endpoint).with_bearer(token);

		if matches!(self.op, ResourceSetOp::Create | ResourceSetOp::Update) {
			let args = RESOURCE_SET.resolve(&self.args, conversation.config())?;

			request = request.with_args(args).json();
		}
		if let (ResourceSetOp::Update, Some(lid)) = (self.op, lid)
			&& let Some(etag) = conversation.etag(lid.as_str())
		{
			request = request.with_if_match(etag);
		}

		Ok(Some(request))
	}
}

/// `register_request`: register a permission for a resource set and obtain a ticket.
///
/// `resource_set_id` comes from the step's arguments or from the step's local id.
#[derive(Clone, Debug)]
pub struct PermissionRegistration {
	lid: Option<LocalId>,
	args: JsonMap,
}
impl PermissionRegistration {
	/// Builds the phase from a script step.
	pub fn new(step: &ScriptStep) -> Self {
		Self { lid: step.options.lid.clone(), args: step.args.clone() }
	}
}
impl Phase for PermissionRegistration {
	fn prepare(&self, conversation: &mut Conversation) -> Result<Option<PreparedRequest>> {
		let endpoint =
			conversation.provider_info()?.endpoint("permission_registration_endpoint")?;
		let token = conversation.token(TokenClass::Pat)?.clone();
		let mut args = self.args.clone();

		if !args.contains_key("resource_set_id") {
			let lid = self.lid.as_ref().ok_or(ConfigError::MissingField {
				phase: "register_request",
				field: "resource_set_id",
			})?;
			let rsid = conversation.require_resource_set_id(lid.as_str())?;

			args.insert("resource_set_id".into(), rsid.as_str().into());
		}

		let request = PreparedRequest::new(Method::POST, endpoint).with_args(args).json();

		Ok(Some(request.with_bearer(token)))
	}
}

/// `authzdata_request`: exchange a permission ticket for an RPT, authenticating with the AAT.
///
/// `ticket` comes from the step's arguments or from the ticket issued for the resource set
/// bound to the step's local id.
#[derive(Clone, Debug)]
pub struct AuthzDataRequest {
	lid: Option<LocalId>,
	args: JsonMap,
}
impl AuthzDataRequest {
	/// Builds the phase from a script step.
	pub fn new(step: &ScriptStep) -> Self {
		Self { lid: step.options.lid.clone(), args: step.args.clone() }
	}
}
impl Phase for AuthzDataRequest {
	fn prepare(&self, conversation: &mut Conversation) -> Result<Option<PreparedRequest>> {
		let endpoint = conversation.provider_info()?.endpoint("rpt_endpoint")?;
		let token = conversation.token(TokenClass::Aat)?.clone();
		let mut args = self.args.clone();

		if !args.contains_key("ticket") {
			let lid = self
				.lid
				.as_ref()
				.ok_or(ConfigError::MissingField { phase: "authzdata_request", field: "ticket" })?;
			let rsid = conversation.require_resource_set_id(lid.as_str())?;
			let ticket = conversation.ticket(rsid.as_str()).ok_or_else(|| {
				Error::requirements_not_met(format!("a permission ticket for resource set `{rsid}`"))
			})?;

			args.insert("ticket".into(), ticket.as_str().into());
		}

		let request = PreparedRequest::new(Method::POST, endpoint).with_args(args).json();

		Ok(Some(request.with_bearer(token)))
	}
}
