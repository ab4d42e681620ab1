//! Driver-level error types shared across phases, handlers, and stores.

// self
use crate::{_prelude::*, check::Severity};

/// Driver-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical driver error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Token cache failure.
	#[error("{0}")]
	Store(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem or unmet phase requirement.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Provider metadata failed the issuer scheme check.
	#[error(transparent)]
	Scheme(#[from] SchemeError),
	/// A pre-check, post-check, or metadata verification failed.
	#[error(transparent)]
	Validation(#[from] ValidationFailure),
	/// Transport failure (DNS, TCP, TLS, timeout, unreadable body).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Requested client authentication method is not advertised by the server.
	#[error("Authentication method `{method}` is not supported; server advertises {supported:?}.")]
	UnsupportedMethod {
		/// Method the caller selected.
		method: String,
		/// Methods advertised in `token_endpoint_auth_methods_supported`.
		supported: Vec<String>,
	},
}
impl Error {
	/// Returns `true` when the error must terminate the run.
	///
	/// Only validation failures carrying [`Severity::Warning`] are recoverable.
	pub fn is_fatal(&self) -> bool {
		!matches!(self, Error::Validation(failure) if failure.severity == Severity::Warning)
	}

	/// Shorthand for [`ConfigError::RequirementsNotMet`].
	pub fn requirements_not_met(what: impl Into<String>) -> Self {
		ConfigError::RequirementsNotMet { what: what.into() }.into()
	}
}

/// Configuration and requirement failures raised before any request is sent.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// A value the phase depends on has not been produced by an earlier phase or configured.
	#[error("Requirements not met: {what}.")]
	RequirementsNotMet {
		/// Description of the missing value.
		what: String,
	},
	/// Script references a phase name the registry does not know.
	#[error("Unknown phase `{name}`.")]
	UnknownPhase {
		/// Offending phase name.
		name: String,
	},
	/// A request argument declared as required could not be resolved from any layer.
	#[error("Phase `{phase}` requires the `{field}` request argument.")]
	MissingField {
		/// Phase that declared the field.
		phase: &'static str,
		/// Field name.
		field: &'static str,
	},
	/// An endpoint or issuer value could not be parsed as a URL.
	#[error("Value `{value}` is not a valid URL.")]
	InvalidUrl {
		/// Raw value that failed to parse.
		value: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Configuration document could not be parsed.
	#[error("Configuration is invalid: {message}.")]
	InvalidConfig {
		/// Parser message including the failing path.
		message: String,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Identifier supplied by the script or server is malformed.
	#[error(transparent)]
	InvalidIdentifier(#[from] crate::auth::IdentifierError),
	/// Scope value supplied by the script or configuration is malformed.
	#[error(transparent)]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}

	/// Builds an [`ConfigError::InvalidUrl`] for the provided raw value.
	pub fn invalid_url(value: impl Into<String>, source: url::ParseError) -> Self {
		Self::InvalidUrl { value: value.into(), source }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Issuer scheme violations; suppressible through `allow.no_https_issuer`.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum SchemeError {
	/// The issuer does not use HTTPS.
	#[error("Issuer `{issuer}` does not use the https scheme.")]
	InsecureIssuer {
		/// Issuer value found in the metadata.
		issuer: String,
	},
}

/// A failed validation check, attributed to the check that produced it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
#[error("Check `{check}` failed: {message}.")]
pub struct ValidationFailure {
	/// Name of the failing check.
	pub check: String,
	/// Diagnostic detail.
	pub message: String,
	/// Severity declared by the check.
	pub severity: Severity,
}
impl ValidationFailure {
	/// Builds a fatal failure.
	pub fn fatal(check: impl Into<String>, message: impl Into<String>) -> Self {
		Self { check: check.into(), message: message.into(), severity: Severity::Fatal }
	}
}

/// Transport-level failures (network, IO, unusable responses).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure or timeout.
	#[error("Network error occurred while calling {url}.")]
	Network {
		/// Target URL.
		url: String,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred during transport.")]
	Io(#[from] std::io::Error),
	/// A local computation fetched a document and got an unusable status.
	#[error("{url} answered with unexpected HTTP status {status}.")]
	UnexpectedStatus {
		/// Target URL.
		url: String,
		/// HTTP status code.
		status: u16,
	},
	/// Response body could not be decoded into the expected message.
	#[error("Response body is not a valid {message}.")]
	MalformedBody {
		/// Expected message kind.
		message: &'static str,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(url: impl Into<String>, src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { url: url.into(), source: Box::new(src) }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn only_warning_validations_are_recoverable() {
		let warning = Error::Validation(ValidationFailure {
			check: "registration-info".into(),
			message: "client_id missing".into(),
			severity: Severity::Warning,
		});
		let fatal = Error::Validation(ValidationFailure::fatal("check-http-response", "500"));

		assert!(!warning.is_fatal());
		assert!(fatal.is_fatal());
		assert!(Error::requirements_not_met("provider info").is_fatal());
	}

	#[test]
	fn requirements_not_met_mentions_what_is_missing() {
		let err = Error::requirements_not_met("token for class PAT");

		assert!(matches!(err, Error::Config(ConfigError::RequirementsNotMet { .. })));
		assert_eq!(err.to_string(), "Requirements not met: token for class PAT.");
	}
}
