//! ffmpeg invocations: segment split, audio and video encodes, concat and
//! mux.
//!
//! Every action builds one argument list, runs it through
//! [`ToolCommand`](crate::ToolCommand) (which fails on a non-zero exit), and
//! then checks that the file it promised actually exists.

mod concat;
mod encode;
mod mux;
mod split;

use std::path::Path;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::command::ToolCommand;
use crate::tools::ToolRegistry;

pub use concat::concat;
pub use encode::{encode_audio, encode_video, AUDIO_COPY_FLAGS};
pub use mux::{mux, remux_video_only};
pub use split::split_video;

/// Input-side flags shared by every ffmpeg invocation.
const INPUT_FLAGS: [&str; 5] = ["-hide_banner", "-loglevel", "warning", "-y", "-nostdin"];

/// Output-side flag for encodes whose packet queues can grow large.
const MUXING_QUEUE_FLAGS: [&str; 2] = ["-max_muxing_queue_size", "4096"];

/// Limits applied to each ffmpeg process an action starts.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Kill the process after this long.
    pub timeout: Duration,
    /// Kill the process when this token is cancelled.
    pub cancellation: CancellationToken,
}

impl RunOptions {
    pub fn new(timeout: Duration, cancellation: CancellationToken) -> Self {
        Self {
            timeout,
            cancellation,
        }
    }
}

/// An ffmpeg command with the shared input flags and `opts` applied.
fn ffmpeg(tools: &ToolRegistry, opts: &RunOptions) -> sg_core::Result<ToolCommand> {
    let mut cmd = tools.command("ffmpeg")?;
    cmd.timeout(opts.timeout);
    cmd.cancel_on(opts.cancellation.clone());
    cmd.args(INPUT_FLAGS);
    Ok(cmd)
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// Fail `step` if ffmpeg reported success without writing `output`.
fn ensure_output(step: &str, output: &Path) -> sg_core::Result<()> {
    if output.is_file() {
        Ok(())
    } else {
        Err(sg_core::Error::pipeline(
            step,
            format!("ffmpeg succeeded but {} was not written", output.display()),
        ))
    }
}
