//! Stream-copy split of the first video stream into fixed-length segments.

use std::path::Path;

use super::{ffmpeg, path_arg, RunOptions};
use crate::tools::ToolRegistry;

/// Split the first video stream of `source` into `unit_duration`-second
/// pieces named after `pattern` (which must contain `%d`).
///
/// Audio is dropped, packets are copied and timestamps restart at zero in
/// each segment. Segments are cut at the first keyframe after each boundary,
/// so fewer files than planned may appear; the caller decides which are
/// present.
pub async fn split_video(
    tools: &ToolRegistry,
    opts: &RunOptions,
    source: &Path,
    pattern: &Path,
    unit_duration: u64,
) -> sg_core::Result<()> {
    tracing::info!("split {:?} every {unit_duration}s -> {:?}", source, pattern);

    let mut cmd = ffmpeg(tools, opts)?;
    cmd.arg("-i");
    cmd.arg(path_arg(source));
    cmd.args(["-f", "segment", "-segment_time"]);
    cmd.arg(unit_duration.to_string());
    cmd.args(["-reset_timestamps", "1", "-c:v", "copy", "-an", "-map", "0:v:0"]);
    cmd.arg(path_arg(pattern));
    cmd.execute().await?;

    Ok(())
}
