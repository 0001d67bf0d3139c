//! Stream-copy concatenation of transcoded segments.

use std::path::{Path, PathBuf};

use sg_core::media::{join_path, split_path};
use sg_core::Error;

use super::{ensure_output, ffmpeg, path_arg, RunOptions};
use crate::naming;
use crate::tools::ToolRegistry;

/// Concatenate `segments`, in order, into one video-only file without
/// re-encoding.
///
/// The output is named after the shared segment stem with the per-segment
/// `_<index>_encoded` suffix removed, in the segments' directory, with
/// `output_extension`. A manifest (`<output stem>.txt`) is written for
/// ffmpeg's concat demuxer and removed again whether or not ffmpeg
/// succeeds.
///
/// # Errors
///
/// - [`Error::EmptyInput`] if `segments` is empty.
/// - [`Error::InconsistentInput`] if the segments do not all share one
///   directory and extension, if the first stem has no per-segment suffix,
///   or if the derived output is one of the segments.
pub async fn concat(
    tools: &ToolRegistry,
    opts: &RunOptions,
    segments: &[PathBuf],
    output_extension: &str,
) -> sg_core::Result<PathBuf> {
    let (output, manifest) = concat_paths(segments, output_extension)?;
    tracing::info!("concat {} segments -> {:?}", segments.len(), output);

    if let Err(e) = tokio::fs::write(&manifest, manifest_contents(segments)).await {
        let _ = tokio::fs::remove_file(&manifest).await;
        return Err(e.into());
    }

    let result = async {
        let mut cmd = ffmpeg(tools, opts)?;
        cmd.args(["-f", "concat", "-safe", "0", "-i"]);
        cmd.arg(path_arg(&manifest));
        cmd.args(["-c:v", "copy", "-map", "0:v:0"]);
        cmd.arg(path_arg(&output));
        cmd.execute().await
    }
    .await;

    if let Err(e) = tokio::fs::remove_file(&manifest).await {
        tracing::warn!("failed to remove concat manifest {}: {e}", manifest.display());
    }

    result?;
    ensure_output("concat", &output)?;
    Ok(output)
}

/// Validate `segments` and derive `(output, manifest)` paths.
pub fn concat_paths(segments: &[PathBuf], output_extension: &str) -> sg_core::Result<(PathBuf, PathBuf)> {
    let first = segments
        .first()
        .ok_or_else(|| Error::EmptyInput("no segments to concatenate".into()))?;
    let (dir, stem, ext) = split_path(first)?;

    for seg in &segments[1..] {
        let (seg_dir, _, seg_ext) = split_path(seg)?;
        if seg_dir != dir || seg_ext != ext {
            return Err(Error::InconsistentInput(format!(
                "{} does not match directory {} and extension '{ext}' of {}",
                seg.display(),
                dir.display(),
                first.display()
            )));
        }
    }

    let common = naming::strip_segment_suffix(&stem).ok_or_else(|| {
        Error::InconsistentInput(format!(
            "{} has no per-segment suffix to strip",
            first.display()
        ))
    })?;
    let output = join_path(&dir, common, output_extension);
    let manifest = join_path(&dir, common, ".txt");
    if segments.contains(&output) || segments.contains(&manifest) {
        return Err(Error::InconsistentInput(format!(
            "concatenated output {} would overwrite one of its inputs",
            output.display()
        )));
    }
    Ok((output, manifest))
}

/// One `file '<path>'` line per segment, with single quotes escaped the way
/// the concat demuxer expects.
fn manifest_contents(segments: &[PathBuf]) -> String {
    segments
        .iter()
        .map(|p| format!("file '{}'\n", quote(p)))
        .collect()
}

fn quote(path: &Path) -> String {
    path.to_string_lossy().replace('\'', r"'\''")
}
