//! Final container assembly from the concatenated video and the audio.

use std::path::{Path, PathBuf};

use sg_core::media::{join_path, split_path};
use sg_core::Error;

use super::{ensure_output, ffmpeg, path_arg, RunOptions};
use crate::naming;
use crate::tools::ToolRegistry;

/// Combine the first video stream of `video` with the first audio stream of
/// `audio`, both stream-copied, into the final output.
///
/// The output keeps the video's directory and extension; its stem is the
/// video stem without the `_video` role suffix, the run id and the leading
/// `.`, so `dir/.name_<id>_video.webm` becomes `dir/name.webm`.
///
/// # Errors
///
/// [`Error::DirectoryMismatch`] if the inputs are in different directories.
pub async fn mux(
    tools: &ToolRegistry,
    opts: &RunOptions,
    video: &Path,
    audio: &Path,
) -> sg_core::Result<PathBuf> {
    let output = mux_output_path(video, audio)?;
    tracing::info!("mux {:?} + {:?} -> {:?}", video, audio, output);

    let mut cmd = ffmpeg(tools, opts)?;
    cmd.arg("-i");
    cmd.arg(path_arg(video));
    cmd.arg("-i");
    cmd.arg(path_arg(audio));
    cmd.args(["-c:v", "copy", "-c:a", "copy", "-map", "0:v:0", "-map", "1:a:0"]);
    cmd.arg(path_arg(&output));
    cmd.execute().await?;

    ensure_output("mux", &output)?;
    Ok(output)
}

/// Copy the first video stream of `video` into the final output, for
/// sources that have no audio. Output naming matches [`mux`].
pub async fn remux_video_only(
    tools: &ToolRegistry,
    opts: &RunOptions,
    video: &Path,
) -> sg_core::Result<PathBuf> {
    let output = final_output_path(video)?;
    tracing::info!("remux video only {:?} -> {:?}", video, output);

    let mut cmd = ffmpeg(tools, opts)?;
    cmd.arg("-i");
    cmd.arg(path_arg(video));
    cmd.args(["-c:v", "copy", "-map", "0:v:0"]);
    cmd.arg(path_arg(&output));
    cmd.execute().await?;

    ensure_output("remux", &output)?;
    Ok(output)
}

/// Check the mux precondition and derive the output path.
pub fn mux_output_path(video: &Path, audio: &Path) -> sg_core::Result<PathBuf> {
    let (video_dir, _, _) = split_path(video)?;
    let (audio_dir, _, _) = split_path(audio)?;
    if video_dir != audio_dir {
        return Err(Error::directory_mismatch(&video_dir, &audio_dir));
    }
    final_output_path(video)
}

fn final_output_path(video: &Path) -> sg_core::Result<PathBuf> {
    let (dir, stem, ext) = split_path(video)?;
    let stem = naming::strip_run_id(naming::strip_role_suffix(&stem));
    Ok(join_path(&dir, stem, &ext))
}
