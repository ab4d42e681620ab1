//! UMA token classes and their scope markers.

// self
use crate::{_prelude::*, auth::ScopeSet};

/// Scope requested when acquiring a Protection API Token.
pub const PAT_SCOPE: &str = "http://docs.kantarainitiative.org/uma/scopes/prot.json";
/// Scope requested when acquiring an Authorization API Token.
pub const AAT_SCOPE: &str = "http://docs.kantarainitiative.org/uma/scopes/authz.json";

/// Class of bearer token kept by the conversation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TokenClass {
	/// Protection API Token used against the resource-set and permission endpoints.
	#[serde(rename = "PAT")]
	Pat,
	/// Authorization API Token used by the client against the RPT endpoint.
	#[serde(rename = "AAT")]
	Aat,
}
impl TokenClass {
	/// Returns the label used in cache file names and traces.
	pub const fn as_str(self) -> &'static str {
		match self {
			TokenClass::Pat => "PAT",
			TokenClass::Aat => "AAT",
		}
	}

	/// Returns the scope value that marks a token request as belonging to this class.
	pub const fn scope(self) -> &'static str {
		match self {
			TokenClass::Pat => PAT_SCOPE,
			TokenClass::Aat => AAT_SCOPE,
		}
	}

	/// Classifies a requested scope set; PAT wins when both markers are present.
	pub fn classify(scope: &ScopeSet) -> Option<Self> {
		[TokenClass::Pat, TokenClass::Aat].into_iter().find(|class| scope.contains(class.scope()))
	}
}
impl Display for TokenClass {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
