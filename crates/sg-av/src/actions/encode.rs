//! Re-encoding of the audio track and of individual video segments.

use std::path::{Path, PathBuf};

use super::{ensure_output, ffmpeg, path_arg, RunOptions, MUXING_QUEUE_FLAGS};
use crate::naming;
use crate::tools::ToolRegistry;

/// Output flags that copy the audio stream instead of re-encoding it.
pub const AUDIO_COPY_FLAGS: [&str; 2] = ["-c:a", "copy"];

/// Re-encode one audio stream of `source` into `output` using the given
/// ffmpeg output flags (codec, bitrate, or [`AUDIO_COPY_FLAGS`]).
///
/// `stream` is the absolute stream index to take. Without one the first
/// audio stream is mapped optionally (`0:a:0?`), so a source without audio
/// does not make ffmpeg fail; it simply writes no usable file, which
/// [`ensure_output`] then reports.
pub async fn encode_audio(
    tools: &ToolRegistry,
    opts: &RunOptions,
    source: &Path,
    output: &Path,
    stream: Option<usize>,
    audio_flags: &[String],
) -> sg_core::Result<PathBuf> {
    tracing::info!("encode audio {:?} -> {:?}", source, output);
    let map = match stream {
        Some(index) => format!("0:{index}"),
        None => "0:a:0?".to_string(),
    };

    let mut cmd = ffmpeg(tools, opts)?;
    cmd.arg("-i");
    cmd.arg(path_arg(source));
    cmd.args(MUXING_QUEUE_FLAGS);
    cmd.arg("-vn");
    cmd.args(audio_flags.iter().cloned());
    cmd.args(["-map", map.as_str()]);
    cmd.arg(path_arg(output));
    cmd.execute().await?;

    ensure_output("encode audio", output)?;
    Ok(output.to_path_buf())
}

/// Re-encode one video segment with the given ffmpeg output flags.
///
/// The output sits next to the segment, named `<segment stem>_encoded` with
/// `output_extension`. Segments are independent, so any number of these may
/// run at once.
pub async fn encode_video(
    tools: &ToolRegistry,
    opts: &RunOptions,
    segment: &Path,
    output_extension: &str,
    video_flags: &[String],
) -> sg_core::Result<PathBuf> {
    let output = naming::encoded_segment_path(segment, output_extension)?;
    tracing::info!("encode video {:?} -> {:?}", segment, output);

    let mut cmd = ffmpeg(tools, opts)?;
    cmd.args(["-threads", "0", "-i"]);
    cmd.arg(path_arg(segment));
    cmd.args(MUXING_QUEUE_FLAGS);
    cmd.args(video_flags.iter().cloned());
    cmd.args(["-an", "-map", "0:v:0"]);
    cmd.arg(path_arg(&output));
    cmd.execute().await?;

    ensure_output("encode video", &output)?;
    Ok(output)
}
