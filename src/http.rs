//! Transport primitives for phase exchanges.
//!
//! The module exposes [`HttpTransport`], the driver's only dependency on an HTTP stack, and
//! [`ResponseMetadata`], the summary of a response that is recorded in the conversation and
//! the trace. Every phase performs at most one round trip through the transport; there is no
//! retry at this layer.

// std
use std::time::Duration as StdDuration;
// crates.io
use oauth2::{
	HttpRequest, HttpResponse,
	http::header::{CONTENT_TYPE, ETAG, HeaderName, LOCATION},
};
#[cfg(feature = "reqwest")] use reqwest::{ClientBuilder, redirect::Policy};
// self
use crate::{_prelude::*, error::TransportError};

/// Boxed future returned by [`HttpTransport::execute`].
pub type HttpFuture<'a> = Pin<Box<dyn Future<Output = Result<HttpResponse>> + 'a + Send>>;

/// Abstraction over HTTP transports able to run one request/response round trip.
///
/// Implementations must not follow redirects: authorization responses are delivered through
/// the `Location` header and are interpreted by the phase that issued the request. The
/// returned future must own whatever it needs so it stays `Send` while in flight.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Executes exactly one request, bounded by the transport's timeout.
	fn execute(&self, request: HttpRequest) -> HttpFuture<'_>;

	/// Drops every cookie collected so far.
	fn reset_cookies(&self) -> Result<()> {
		Ok(())
	}
}

/// Summary of the most recent HTTP response.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMetadata {
	/// HTTP status code.
	pub status: u16,
	/// `ETag` header, if present.
	pub etag: Option<String>,
	/// `Location` header, if present.
	pub location: Option<String>,
	/// `Content-Type` header, if present.
	pub content_type: Option<String>,
}
impl ResponseMetadata {
	/// Extracts the summary from a response.
	pub fn from_response(response: &HttpResponse) -> Self {
		let header = |name: HeaderName| {
			response.headers().get(name).and_then(|value| value.to_str().ok()).map(str::to_owned)
		};

		Self {
			status: response.status().as_u16(),
			etag: header(ETAG),
			location: header(LOCATION),
			content_type: header(CONTENT_TYPE),
		}
	}
}
impl Display for ResponseMetadata {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "HTTP {}", self.status)?;

		if let Some(content_type) = &self.content_type {
			write!(f, " ({content_type})")?;
		}
		if let Some(location) = &self.location {
			write!(f, " Location: {location}")?;
		}
		if let Some(etag) = &self.etag {
			write!(f, " ETag: {etag}")?;
		}

		Ok(())
	}
}

#[cfg(feature = "reqwest")]
type Configure = dyn Fn(ClientBuilder) -> ClientBuilder + Send + Sync;

/// Reqwest-backed [`HttpTransport`] with a cookie jar that can be reset between phases.
///
/// Redirects are disabled and every request is bounded by the configured timeout. Resetting
/// cookies rebuilds the inner client, which discards its jar.
#[cfg(feature = "reqwest")]
pub struct ReqwestHttpClient {
	client: RwLock<ReqwestClient>,
	timeout: StdDuration,
	configure: Arc<Configure>,
}
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	const DEFAULT_TIMEOUT: StdDuration = StdDuration::from_secs(30);

	/// Builds a client with the provided per-request timeout.
	pub fn new(timeout: StdDuration) -> Result<Self> {
		Self::build(timeout, Arc::new(|builder| builder))
	}

	/// Builds a client with the default timeout, letting `configure` adjust the builder
	/// (TLS roots, proxies, ...). The hook is replayed whenever the client is rebuilt.
	pub fn with_builder<F>(configure: F) -> Result<Self>
	where
		F: 'static + Fn(ClientBuilder) -> ClientBuilder + Send + Sync,
	{
		Self::build(Self::DEFAULT_TIMEOUT, Arc::new(configure))
	}

	fn build(timeout: StdDuration, configure: Arc<Configure>) -> Result<Self> {
		let client = Self::make_client(timeout, &*configure)?;

		Ok(Self { client: RwLock::new(client), timeout, configure })
	}

	fn make_client(timeout: StdDuration, configure: &Configure) -> Result<ReqwestClient> {
		let builder =
			ReqwestClient::builder().redirect(Policy::none()).cookie_store(true).timeout(timeout);

		configure(builder).build().map_err(|e| crate::error::ConfigError::from(e).into())
	}
}
#[cfg(feature = "reqwest")]
impl Debug for ReqwestHttpClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ReqwestHttpClient").field("timeout", &self.timeout).finish_non_exhaustive()
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestHttpClient {
	fn execute(&self, request: HttpRequest) -> HttpFuture<'_> {
		let client = self.client.read().clone();

		Box::pin(async move {
			let url = request.uri().to_string();
			let request: reqwest::Request =
				request.try_into().map_err(|e: ReqwestError| TransportError::network(&url, e))?;
			let response =
				client.execute(request).await.map_err(|e| TransportError::network(&url, e))?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let body = response.bytes().await.map_err(|e| TransportError::network(&url, e))?;
			let mut response_new = HttpResponse::new(body.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}

	fn reset_cookies(&self) -> Result<()> {
		let client = Self::make_client(self.timeout, &*self.configure)?;

		*self.client.write() = client;

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use oauth2::http::{HeaderValue, StatusCode};
	// self
	use super::*;

	#[test]
	fn metadata_summarizes_headers() {
		let mut response = HttpResponse::new(Vec::new());

		*response.status_mut() = StatusCode::CREATED;
		response.headers_mut().insert(ETAG, HeaderValue::from_static("\"v1\""));
		response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

		let metadata = ResponseMetadata::from_response(&response);

		assert_eq!(metadata.status, 201);
		assert_eq!(metadata.etag.as_deref(), Some("\"v1\""));
		assert!(metadata.location.is_none());
		assert_eq!(metadata.to_string(), "HTTP 201 (application/json) ETag: \"v1\"");
	}
}
