//! Auth-domain identifiers, scope sets, and token classes.

pub mod id;
pub mod scope;
pub mod token;

pub use id::*;
pub use scope::*;
pub use token::{class::*, secret::*};
