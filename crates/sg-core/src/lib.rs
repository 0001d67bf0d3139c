//! sg-core: shared error type, configuration, source-file handling and the
//! segment planner.
//!
//! This crate is the foundational dependency for the other sg-* crates. It
//! never shells out to external tools.

pub mod config;
pub mod error;
pub mod media;
pub mod plan;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use media::SourceFile;
pub use plan::SegmentPlan;
