//! Utility types and functions shared by every exporter component.
//!
//! - [`Error`] / [`Result`] - Error handling
//! - [`sanitize`] - Plugin name sanitization
//! - Math type re-exports from glam

mod error;
mod math;
mod names;

pub use error::*;
pub use math::*;
pub use names::*;
