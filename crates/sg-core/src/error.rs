//! Unified error type for segforge.
//!
//! Every crate in the workspace funnels its failures into [`Error`]. Input
//! and precondition violations get their own variants so callers (and tests)
//! can tell a bad source path apart from a failed ffmpeg invocation.

use std::path::{Path, PathBuf};

/// Unified error type covering all failure modes in segforge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The source path does not exist.
    #[error("file not found: {}", path.display())]
    FileNotFound {
        /// The path that was looked up.
        path: PathBuf,
    },

    /// The source path exists but is a directory or other non-file entry.
    #[error("not a regular file: {}", path.display())]
    NotARegularFile {
        /// The offending path.
        path: PathBuf,
    },

    /// Tool output could not be parsed as the expected value.
    #[error("Parse error: {0}")]
    Parse(String),

    /// An operation that needs at least one input received none.
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// Inputs that must agree on directory and extension do not.
    #[error("Inconsistent input: {0}")]
    InconsistentInput(String),

    /// Video and audio inputs of a mux live in different directories.
    #[error("directory mismatch: video in {}, audio in {}", video.display(), audio.display())]
    DirectoryMismatch {
        /// Directory of the video input.
        video: PathBuf,
        /// Directory of the audio input.
        audio: PathBuf,
    },

    /// An external tool (ffmpeg, ffprobe) failed to run or returned an error.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// A pipeline step failed.
    #[error("Pipeline error [{step}]: {message}")]
    Pipeline {
        /// The pipeline step that failed.
        step: String,
        /// Human-readable error description.
        message: String,
    },

    /// Configuration or request data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Pipeline`].
    pub fn pipeline(step: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Pipeline {
            step: step.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::DirectoryMismatch`].
    pub fn directory_mismatch(video: &Path, audio: &Path) -> Self {
        Error::DirectoryMismatch {
            video: video.to_path_buf(),
            audio: audio.to_path_buf(),
        }
    }

    /// Whether this error was raised by a cancelled or timed out tool run.
    pub fn is_interrupted(&self) -> bool {
        match self {
            Error::Tool { message, .. } => {
                message.starts_with("timed out") || message == "cancelled"
            }
            _ => false,
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
