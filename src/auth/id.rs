//! Identifiers threaded between UMA phases: script-side local ids, server-side resource-set ids,
//! and permission tickets.
//!
//! All three are opaque tokens that end up in URL paths or form bodies, so they must be
//! non-empty and free of whitespace.

// std
use std::borrow::Borrow;
// self
use crate::_prelude::*;

/// Error returned when an identifier is malformed.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} cannot be empty.")]
	Empty {
		/// Which identifier was rejected.
		kind: &'static str,
	},
	/// The identifier contains whitespace.
	#[error("{kind} `{value}` contains whitespace.")]
	ContainsWhitespace {
		/// Which identifier was rejected.
		kind: &'static str,
		/// Rejected value.
		value: String,
	},
}

macro_rules! opaque_id {
	($(#[$meta:meta])* $name:ident => $kind:literal) => {
		$(#[$meta])*
		#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Validates and wraps `value`.
			pub fn new(value: impl Into<String>) -> Result<Self, IdentifierError> {
				Self::try_from(value.into())
			}

			/// Raw identifier.
			pub fn as_str(&self) -> &str {
				&self.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				check_opaque($kind, value).map(Self)
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
	};
}

opaque_id! {
	/// Script-chosen name for a resource before the server assigns it an id.
	LocalId => "local id"
}
opaque_id! {
	/// Server-assigned resource-set id (`_id`).
	ResourceSetId => "resource set id"
}
opaque_id! {
	/// Permission ticket issued by the permission-registration endpoint.
	Ticket => "permission ticket"
}

fn check_opaque(kind: &'static str, value: String) -> Result<String, IdentifierError> {
	if value.is_empty() {
		Err(IdentifierError::Empty { kind })
	} else if value.chars().any(char::is_whitespace) {
		Err(IdentifierError::ContainsWhitespace { kind, value })
	} else {
		Ok(value)
	}
}
