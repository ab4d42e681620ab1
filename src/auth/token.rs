//! Token classes and redacted token values.

pub mod class;
pub mod secret;
