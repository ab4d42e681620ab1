//! Mutable state shared by every phase of one test run.
//!
//! A [`Conversation`] owns the static client configuration, the provider metadata learned
//! so far, every credential derived from earlier responses, and the protocol trace. Maps are
//! append/overwrite-only; the only removals are the explicit revocations
//! ([`Conversation::clear_registration`], [`Conversation::forget_resource_set`]). Accessors
//! for values a phase depends on return `RequirementsNotMet` instead of inventing a value.

pub mod trace;

pub use trace::*;

// self
use crate::{
	_prelude::*,
	auth::{LocalId, ResourceSetId, ScopeSet, Ticket, TokenClass, TokenSecret},
	config::ClientConfig,
	http::ResponseMetadata,
	provider::{ProviderInfo, Protocol},
};

/// Error response armed by the `expect_err` phase for the next HTTP exchange.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedError {
	/// OAuth `error` code the response must carry, if any.
	pub error: Option<String>,
}

/// Authorization request parameters remembered until the token exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizationSession {
	/// Opaque `state` sent with the request.
	pub state: String,
	/// `nonce` sent with the request.
	pub nonce: String,
	/// PKCE verifier, when PKCE is enabled.
	pub code_verifier: Option<String>,
	/// Scopes requested.
	pub scope: ScopeSet,
	/// Redirect URI sent with the request.
	pub redirect_uri: Option<String>,
	/// Authorization code returned by the server.
	pub code: Option<String>,
}

/// Most recent successful token-endpoint response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IssuedTokens {
	/// Access token.
	pub access_token: TokenSecret,
	/// Refresh token, when issued.
	pub refresh_token: Option<TokenSecret>,
	/// Raw ID token, when issued.
	pub id_token: Option<String>,
	/// Class the token was filed under, if the requested scope identified one.
	pub class: Option<TokenClass>,
}

/// Parsed response archived in arrival order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProtocolResponse {
	/// Message kind (`ProviderConfiguration`, `StatusResponse`, ...).
	pub kind: String,
	/// Decoded body.
	pub body: Value,
}

/// Conversation state for one scripted run.
#[derive(Debug)]
pub struct Conversation {
	config: Arc<ClientConfig>,
	provider_info: Option<ProviderInfo>,
	oidc_provider_info: Option<ProviderInfo>,
	uma_provider_info: Option<ProviderInfo>,
	issuer: Option<String>,
	client_id: Option<String>,
	client_secret: Option<TokenSecret>,
	registration: Option<JsonMap>,
	authorization: Option<AuthorizationSession>,
	tokens: BTreeMap<TokenClass, TokenSecret>,
	access_token_responses: BTreeMap<TokenClass, JsonMap>,
	issued: Option<IssuedTokens>,
	cached_id_token: Option<String>,
	keys: Option<Value>,
	lid2rsid: HashMap<LocalId, ResourceSetId>,
	etag: HashMap<LocalId, String>,
	ticket: HashMap<ResourceSetId, Ticket>,
	rpt: HashMap<Ticket, TokenSecret>,
	expected_error: Option<ExpectedError>,
	protocol_responses: Vec<ProtocolResponse>,
	last_response: Option<ResponseMetadata>,
	trace: Trace,
}
impl Conversation {
	/// Starts a conversation; a non-empty static `provider_info` override seeds the metadata.
	pub fn new(config: ClientConfig) -> Self {
		let provider_info = (!config.provider_info.is_empty())
			.then(|| ProviderInfo::new(config.provider_info.clone()));

		Self {
			config: Arc::new(config),
			provider_info,
			oidc_provider_info: None,
			uma_provider_info: None,
			issuer: None,
			client_id: None,
			client_secret: None,
			registration: None,
			authorization: None,
			tokens: BTreeMap::new(),
			access_token_responses: BTreeMap::new(),
			issued: None,
			cached_id_token: None,
			keys: None,
			lid2rsid: HashMap::new(),
			etag: HashMap::new(),
			ticket: HashMap::new(),
			rpt: HashMap::new(),
			expected_error: None,
			protocol_responses: Vec::new(),
			last_response: None,
			trace: Trace::default(),
		}
	}

	/// Static client configuration.
	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	/// Provider metadata; required by every phase that resolves an endpoint.
	pub fn provider_info(&self) -> Result<&ProviderInfo> {
		self.provider_info.as_ref().ok_or_else(|| {
			Error::requirements_not_met("provider_info (run a discovery phase or configure it)")
		})
	}

	/// Provider metadata, if any has been learned.
	pub fn provider_info_opt(&self) -> Option<&ProviderInfo> {
		self.provider_info.as_ref()
	}

	/// Protocol-specific mirror of the provider metadata.
	pub fn protocol_provider_info(&self, protocol: Protocol) -> Option<&ProviderInfo> {
		match protocol {
			Protocol::Oidc => self.oidc_provider_info.as_ref(),
			Protocol::Uma => self.uma_provider_info.as_ref(),
		}
	}

	/// Overwrites the provider metadata wholesale, along with the protocol mirror.
	pub fn set_provider_info(&mut self, protocol: Protocol, info: ProviderInfo) {
		match protocol {
			Protocol::Oidc => self.oidc_provider_info = Some(info.clone()),
			Protocol::Uma => self.uma_provider_info = Some(info.clone()),
		}

		self.provider_info = Some(info);
	}

	/// Replaces the provider metadata without touching the protocol mirrors.
	pub fn replace_provider_info(&mut self, info: ProviderInfo) {
		self.provider_info = Some(info);
	}

	/// Issuer to discover: the webfinger result when present, else the configured issuer.
	pub fn discovery_issuer(&self) -> Result<&str> {
		match self.issuer.as_deref() {
			Some(issuer) => Ok(issuer),
			None => self.config.issuer(),
		}
	}

	/// Records the issuer learned through webfinger.
	pub fn set_issuer(&mut self, issuer: impl Into<String>) {
		self.issuer = Some(issuer.into());
	}

	/// Client identifier: the registered one, else the pre-provisioned one.
	pub fn client_id(&self) -> Option<&str> {
		self.client_id
			.as_deref()
			.or_else(|| self.config.client_info.get("client_id").and_then(Value::as_str))
	}

	/// Client secret: the registered one, else the pre-provisioned one.
	pub fn client_secret(&self) -> Option<&str> {
		self.client_secret
			.as_ref()
			.map(TokenSecret::expose)
			.or_else(|| self.config.client_info.get("client_secret").and_then(Value::as_str))
	}

	/// Sets the client identifier issued by registration.
	pub fn set_client_id(&mut self, client_id: impl Into<String>) {
		self.client_id = Some(client_id.into());
	}

	/// Persists the full registration response and the credentials it carries.
	pub fn store_registration(&mut self, registration: JsonMap) {
		if let Some(client_id) = registration.get("client_id").and_then(Value::as_str) {
			self.client_id = Some(client_id.to_owned());
		}
		if let Some(secret) = registration.get("client_secret").and_then(Value::as_str) {
			self.client_secret = Some(TokenSecret::new(secret));
		}

		self.registration = Some(registration);
	}

	/// Stored registration response; required by read/update/delete registration phases.
	pub fn registration(&self) -> Result<&JsonMap> {
		self.registration
			.as_ref()
			.ok_or_else(|| Error::requirements_not_met("a registration response"))
	}

	/// Drops the registration after the server confirmed its deletion.
	pub fn clear_registration(&mut self) {
		self.registration = None;
		self.client_id = None;
		self.client_secret = None;
	}

	/// Remembers the authorization request parameters.
	pub fn begin_authorization(&mut self, session: AuthorizationSession) {
		self.authorization = Some(session);
	}

	/// Pending authorization session.
	pub fn authorization(&self) -> Result<&AuthorizationSession> {
		self.authorization
			.as_ref()
			.ok_or_else(|| Error::requirements_not_met("an authorization request"))
	}

	/// Mutable access to the pending authorization session.
	pub fn authorization_mut(&mut self) -> Result<&mut AuthorizationSession> {
		self.authorization
			.as_mut()
			.ok_or_else(|| Error::requirements_not_met("an authorization request"))
	}

	/// Scope of the last authorization request, if one was sent.
	pub fn requested_scope(&self) -> Option<&ScopeSet> {
		self.authorization.as_ref().map(|session| &session.scope)
	}

	/// Bearer token of the given class; required by phases that authenticate with it.
	pub fn token(&self, class: TokenClass) -> Result<&TokenSecret> {
		self.tokens
			.get(&class)
			.ok_or_else(|| Error::requirements_not_met(format!("a {class} token")))
	}

	/// Files a token (and the response that carried it) under its class.
	pub fn store_token(&mut self, class: TokenClass, token: TokenSecret, response: JsonMap) {
		self.tokens.insert(class, token);
		self.access_token_responses.insert(class, response);
	}

	/// Restores a token read back from the token cache.
	pub fn restore_token(&mut self, class: TokenClass, token: TokenSecret) {
		self.tokens.insert(class, token);
	}

	/// Archived token response for a class.
	pub fn access_token_response(&self, class: TokenClass) -> Option<&JsonMap> {
		self.access_token_responses.get(&class)
	}

	/// Records the most recent token-endpoint result.
	pub fn set_issued(&mut self, issued: IssuedTokens) {
		self.issued = Some(issued);
	}

	/// Most recent token-endpoint result.
	pub fn issued(&self) -> Result<&IssuedTokens> {
		self.issued.as_ref().ok_or_else(|| Error::requirements_not_met("an access token response"))
	}

	/// Stores the ID token for later display or reuse.
	pub fn cache_id_token(&mut self, id_token: impl Into<String>) {
		self.cached_id_token = Some(id_token.into());
	}

	/// ID token cached by the `cache-id_token` phase.
	pub fn cached_id_token(&self) -> Option<&str> {
		self.cached_id_token.as_deref()
	}

	/// Stores a fetched JSON Web Key Set.
	pub fn set_keys(&mut self, keys: Value) {
		self.keys = Some(keys);
	}

	/// Last fetched JSON Web Key Set.
	pub fn keys(&self) -> Option<&Value> {
		self.keys.as_ref()
	}

	/// Binds a local identifier to the server-assigned resource-set id.
	pub fn bind_resource_set(&mut self, lid: LocalId, rsid: ResourceSetId) {
		self.lid2rsid.insert(lid, rsid);
	}

	/// Server-assigned id bound to a local identifier, if any.
	pub fn resource_set_id(&self, lid: &str) -> Option<&ResourceSetId> {
		self.lid2rsid.get(lid)
	}

	/// Like [`Conversation::resource_set_id`], raising `RequirementsNotMet` when unbound.
	pub fn require_resource_set_id(&self, lid: &str) -> Result<&ResourceSetId> {
		self.resource_set_id(lid).ok_or_else(|| {
			Error::requirements_not_met(format!("a resource set bound to local id `{lid}`"))
		})
	}

	/// Local-id to resource-set-id bindings.
	pub fn lid2rsid(&self) -> &HashMap<LocalId, ResourceSetId> {
		&self.lid2rsid
	}

	/// Records the concurrency tag of a resource set.
	pub fn set_etag(&mut self, lid: LocalId, etag: impl Into<String>) {
		self.etag.insert(lid, etag.into());
	}

	/// Concurrency tag of a resource set, if known.
	pub fn etag(&self, lid: &str) -> Option<&str> {
		self.etag.get(lid).map(String::as_str)
	}

	/// Drops the binding and tag of a resource set the server deleted.
	pub fn forget_resource_set(&mut self, lid: &str) {
		self.lid2rsid.remove(lid);
		self.etag.remove(lid);
	}

	/// Stores a permission ticket issued for a resource set.
	pub fn store_ticket(&mut self, rsid: ResourceSetId, ticket: Ticket) {
		self.ticket.insert(rsid, ticket);
	}

	/// Ticket issued for a resource set, if any.
	pub fn ticket(&self, rsid: &str) -> Option<&Ticket> {
		self.ticket.get(rsid)
	}

	/// Stores an RPT issued in exchange for a ticket.
	pub fn store_rpt(&mut self, ticket: Ticket, rpt: TokenSecret) {
		self.rpt.insert(ticket, rpt);
	}

	/// RPT issued for a ticket, if any.
	pub fn rpt(&self, ticket: &str) -> Option<&TokenSecret> {
		self.rpt.get(ticket)
	}

	/// Arms an expected error for the next HTTP exchange.
	pub fn expect_error(&mut self, expected: ExpectedError) {
		self.expected_error = Some(expected);
	}

	/// Currently armed expected error.
	pub fn expected_error(&self) -> Option<&ExpectedError> {
		self.expected_error.as_ref()
	}

	/// Disarms the expected error once an exchange consumed it.
	pub fn clear_expected_error(&mut self) -> Option<ExpectedError> {
		self.expected_error.take()
	}

	/// Archives a decoded response.
	pub fn push_protocol_response(&mut self, kind: impl Into<String>, body: Value) {
		self.protocol_responses.push(ProtocolResponse { kind: kind.into(), body });
	}

	/// Decoded responses in arrival order.
	pub fn protocol_responses(&self) -> &[ProtocolResponse] {
		&self.protocol_responses
	}

	/// Records the metadata of the last HTTP response.
	pub fn set_last_response(&mut self, metadata: ResponseMetadata) {
		self.last_response = Some(metadata);
	}

	/// Metadata of the last HTTP response.
	pub fn last_response(&self) -> Option<&ResponseMetadata> {
		self.last_response.as_ref()
	}

	/// Protocol trace.
	pub fn trace(&self) -> &Trace {
		&self.trace
	}

	/// Mutable protocol trace.
	pub fn trace_mut(&mut self) -> &mut Trace {
		&mut self.trace
	}
}
