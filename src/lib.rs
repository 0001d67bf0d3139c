//! segforge - parallel segment-based video transcoder
//!
//! This library crate exposes the binary's support code for integration
//! testing. The pipeline itself lives in the `sg-*` crates.

pub mod discover;
pub mod logging;
