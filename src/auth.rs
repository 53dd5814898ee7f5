//! Identifiers, redacted secrets, and HTTP Basic client credentials.

pub mod basic;
pub mod id;
pub mod secret;

pub use basic::*;
pub use id::*;
pub use secret::*;
