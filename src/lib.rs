//! Guestlab library crate.
//!
//! Resolves per-guest VM configuration for an integration-test environment
//! from an optional JSON settings document plus environment-variable
//! overrides, and maps each machine onto a declarative guest definition
//! consumed by the virtualization front-end.

mod context;
mod error;
mod guest;
mod machine;
mod settings;

pub use context::*;
pub use error::*;
pub use guest::*;
pub use machine::*;
pub use settings::*;
