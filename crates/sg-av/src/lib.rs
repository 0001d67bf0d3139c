//! # sg-av
//!
//! External tool management and ffmpeg/ffprobe invocations for the segforge
//! pipeline.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache paths to ffmpeg
//!   and ffprobe.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout,
//!   cancellation and exit status checking for external processes.
//! - **Stream inspection** ([`MediaInspector`]) -- duration, frame count,
//!   audio presence and the full stream listing via ffprobe.
//! - **Audio rules** ([`AudioRules`]) -- which audio stream to encode and
//!   when to copy it instead.
//! - **Intermediate naming** ([`naming`]) and **lifecycle** ([`Workspace`]).
//! - **Action functions** ([`actions`]) -- segment split, audio and video
//!   encodes, concat, mux.

pub mod actions;
pub mod command;
pub mod naming;
pub mod probe;
pub mod streams;
pub mod tools;
pub mod workspace;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutput};
pub use probe::{MediaInspector, MediaSummary};
pub use streams::{AudioRules, StreamInfo};
pub use tools::{ToolConfig, ToolInfo, ToolRegistry};
pub use workspace::Workspace;

pub use actions::{
    concat, encode_audio, encode_video, mux, remux_video_only, split_video, RunOptions,
    AUDIO_COPY_FLAGS,
};
