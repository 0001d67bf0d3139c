//! # sg-pipeline
//!
//! Orchestration of the parallel segment transcode.
//!
//! This crate provides:
//!
//! - **[`WorkerPool`]** -- bounded, nestable pool for tool jobs.
//! - **[`PipelineContext`]** -- tools, inspector, settings, cancellation and
//!   stage observer shared by a run.
//! - **[`segmenter`]** -- duration probe, segment plan and split.
//! - **[`PipelineExecutor`]** -- the per-file split / encode / concat / mux
//!   sequence with eager intermediate cleanup.
//! - **[`run_batch`]** -- many files under an outer pool.

pub mod batch;
pub mod context;
pub mod executor;
pub mod pool;
pub mod segmenter;

pub use batch::{run_batch, BatchReport};
pub use context::{PipelineContext, PipelineSettings, Stage, StageObserver};
pub use executor::PipelineExecutor;
pub use pool::{PoolHandle, WorkerPool};
