//! DriftDB — change tracking and flush orchestration for data-mapper
//! persistence layers.
//!
//! ## Crate layout
//! - `core`: value model, schema descriptors, codec boundary, the entry
//!   state machine with its unit-of-work registry, the flush processor, the
//!   store contract, and observability.
//!
//! The `prelude` module mirrors the runtime surface used by embedding code.

pub use driftdb_core as core;

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//
// Errors
//

pub use driftdb_core::error::{ErrorClass, ErrorOrigin, InternalError};

///
/// Prelude
///

pub mod prelude {
    pub use crate::core::prelude::*;
}
