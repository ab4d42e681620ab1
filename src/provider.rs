//! Provider-facing metadata (data) and client authentication selection (behavior).
//!
//! `metadata` wraps the discovered or statically configured provider configuration
//! ([`ProviderInfo`]) together with the protocol-specific discovery rules ([`Protocol`]).
//! `auth_method` enumerates client authentication methods and picks the one a token
//! request should use given what the server advertises.

pub mod auth_method;
pub mod metadata;

pub use auth_method::*;
pub use metadata::*;
