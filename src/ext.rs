//! Public extension contracts for collaborators the driver does not implement itself.
//!
//! Key management is out of scope, so signed client assertions (`client_secret_jwt`,
//! `private_key_jwt`) are produced by a caller-supplied [`ClientAssertionSigner`].

pub mod assertion;

pub use assertion::*;
