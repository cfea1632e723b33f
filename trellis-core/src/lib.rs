//! Shared building blocks for the Trellis management core.
//!
//! - [`ManagementError`]: the error taxonomy every operation returns
//! - [`ServiceContainer`]: type-keyed services resolved inside a tenant context
//! - [`names`]: trimming, de-duplication and set reconciliation of names

pub mod container;
pub mod error;
pub mod names;

pub use container::ServiceContainer;
pub use error::{Details, ManagementError, Result};
