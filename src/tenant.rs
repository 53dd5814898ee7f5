//! Phone-number validation and phone-to-telco routing.
//!
//! `phone` validates E.164-shaped input, `descriptor` holds the static per-prefix telco
//! metadata, and `router` resolves a number to its telco by longest-prefix match.

pub mod descriptor;
pub mod phone;
pub mod router;

pub use descriptor::*;
pub use phone::*;
pub use router::*;
