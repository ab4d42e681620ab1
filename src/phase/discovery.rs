//! Provider discovery and webfinger issuer resolution.

// crates.io
use oauth2::http::Method;
// self
use crate::{
	_prelude::*,
	conversation::Conversation,
	error::{ConfigError, TransportError},
	handler,
	phase::{Phase, PhaseFuture, PhaseOutput, PreparedRequest, ScriptStep, Services},
	provider::{ProviderInfo, Protocol},
};

/// Link relation identifying an OpenID Connect issuer in a webfinger response.
pub const WEBFINGER_ISSUER_REL: &str = "http://openid.net/specs/connect/1.0/issuer";

/// `oic-discovery` / `uma-discovery`: fetch, merge, and verify provider metadata.
///
/// The document is fetched from the protocol's well-known location under the issuer (the
/// webfinger result when one was resolved, else the configured issuer). The static
/// `provider_info` override is merged on top, then the result is verified. A non-HTTPS issuer
/// is tolerated only when the run configuration allows it.
#[derive(Clone, Copy, Debug)]
pub struct Discovery {
	protocol: Protocol,
}
impl Discovery {
	/// Discovery for `protocol`.
	pub fn new(protocol: Protocol) -> Self {
		Self { protocol }
	}

	async fn discover(
		&self,
		conversation: &mut Conversation,
		services: &Services,
	) -> Result<Value> {
		let issuer = conversation.discovery_issuer()?.to_owned();
		let url = self.protocol.configuration_url(&issuer);

		conversation.trace_mut().info(format!("Provider info discover from `{issuer}`."));
		conversation.trace_mut().request(format!("GET {url}"));

		let request = oauth2::http::Request::builder()
			.method(Method::GET)
			.uri(&url)
			.header(oauth2::http::header::ACCEPT, "application/json")
			.body(Vec::new())
			.map_err(ConfigError::from)?;
		let response = services.transport.execute(request).await?;
		let status = response.status().as_u16();

		conversation.trace_mut().response(format!("HTTP {status}"));

		if status != 200 {
			return Err(TransportError::UnexpectedStatus { url, status }.into());
		}

		let document: JsonMap =
			handler::parse_json(response.body(), "provider configuration document")?;
		let mut info = ProviderInfo::new(document);

		info.merge_override(&conversation.config().provider_info);

		let allow = conversation.config().allow.no_https_issuer;

		if info.verify(self.protocol, allow)? {
			conversation.trace_mut().note(format!(
				"Accepted non-https issuer `{}` as allowed by configuration.",
				info.issuer().unwrap_or_default()
			));
		}

		Ok(Value::Object(info.into_map()))
	}
}
impl Phase for Discovery {
	fn execute_local<'a>(
		&'a self,
		conversation: &'a mut Conversation,
		services: &'a Services,
	) -> PhaseFuture<'a> {
		Box::pin(async move {
			let document = self.discover(conversation, services).await?;

			Ok(PhaseOutput::Document(document))
		})
	}
}

/// `webfinger`: resolve the issuer of a principal.
///
/// The principal comes from the step's `principal` argument or the configuration. URL
/// principals are queried on their own scheme and authority; `acct:` and e-mail style
/// principals are queried over HTTPS on their host part.
#[derive(Clone, Debug)]
pub struct WebFinger {
	principal: Option<String>,
}
impl WebFinger {
	/// Builds the phase from a script step.
	pub fn new(step: &ScriptStep) -> Self {
		Self { principal: step.args.get("principal").and_then(Value::as_str).map(str::to_owned) }
	}

	/// Builds the webfinger query URL for `principal`.
	pub fn query_url(principal: &str) -> Result<Url> {
		let is_url = principal.starts_with("http://") || principal.starts_with("https://");
		let (resource, base) = if is_url {
			let parsed =
				Url::parse(principal).map_err(|e| ConfigError::invalid_url(principal, e))?;
			let authority = match parsed.port() {
				Some(port) => format!("{}:{port}", parsed.host_str().unwrap_or_default()),
				None => parsed.host_str().unwrap_or_default().to_owned(),
			};

			(principal.to_owned(), format!("{}://{authority}", parsed.scheme()))
		} else {
			let resource = if principal.starts_with("acct:") {
				principal.to_owned()
			} else {
				format!("acct:{principal}")
			};
			let host = resource
				.rsplit_once('@')
				.map(|(_, host)| host)
				.filter(|host| !host.is_empty())
				.ok_or_else(|| {
					Error::from(ConfigError::InvalidConfig {
						message: format!("principal `{principal}` has no host part"),
					})
				})?;

			(resource.clone(), format!("https://{host}"))
		};
		let mut url = Url::parse(&format!("{base}/.well-known/webfinger"))
			.map_err(|e| ConfigError::invalid_url(base.clone(), e))?;

		url.query_pairs_mut()
			.append_pair("resource", &resource)
			.append_pair("rel", WEBFINGER_ISSUER_REL);

		Ok(url)
	}
}
impl Phase for WebFinger {
	fn prepare(&self, conversation: &mut Conversation) -> Result<Option<PreparedRequest>> {
		let principal = self
			.principal
			.as_deref()
			.or(conversation.config().principal.as_deref())
			.ok_or_else(|| Error::requirements_not_met("a principal to resolve"))?;

		Ok(Some(PreparedRequest::new(Method::GET, Self::query_url(principal)?)))
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn webfinger_urls_follow_the_principal_shape() {
		let acct = WebFinger::query_url("alice@op.example.com")
			.expect("Account principal should resolve.");

		assert_eq!(acct.host_str(), Some("op.example.com"));
		assert_eq!(acct.scheme(), "https");
		assert_eq!(
			acct.query_pairs().collect::<Vec<_>>(),
			vec![
				("resource".into(), "acct:alice@op.example.com".into()),
				("rel".into(), WEBFINGER_ISSUER_REL.into()),
			]
		);

		let url = WebFinger::query_url("http://127.0.0.1:8080/alice")
			.expect("URL principal should resolve.");

		assert_eq!(
			url.as_str().split('?').next(),
			Some("http://127.0.0.1:8080/.well-known/webfinger")
		);
		assert!(WebFinger::query_url("no-host").is_err());
	}
}
