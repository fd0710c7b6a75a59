//! Row transformation.
//!
//! - Projector: approved mapping applied to raw rows
//! - Pipeline: end-to-end import, reconciliation and bulk action runs

pub mod pipeline;
pub mod projector;

pub use pipeline::*;
pub use projector::*;
