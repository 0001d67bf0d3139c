//! Deterministic names for every intermediate file of a run.
//!
//! All intermediates sit next to the source and carry a leading `.` so that
//! directory scans can tell them apart from user files. Their stem also
//! carries the source's [`run_id`], so `a.mp4` and `a.mkv` in one directory
//! never share an intermediate. For a source `dir/name.ext` with run id
//! `id` the names are:
//!
//! | Artifact            | Path                                  |
//! |---------------------|---------------------------------------|
//! | split pattern       | `dir/.name_id_video_%d.ext`           |
//! | segment `i`         | `dir/.name_id_video_{i}.ext`          |
//! | transcoded segment  | `dir/.name_id_video_{i}_encoded.oext` |
//! | concat manifest     | `dir/.name_id_video.txt`              |
//! | concatenated video  | `dir/.name_id_video.oext`             |
//! | transcoded audio    | `dir/.name_id_audio.aext`             |
//! | final output        | `dir/name.oext`                       |

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use sg_core::media::{join_path, split_path};
use sg_core::SourceFile;

const VIDEO_ROLE: &str = "_video";
const AUDIO_ROLE: &str = "_audio";
const ENCODED_SUFFIX: &str = "_encoded";

/// Hex digits in a run id.
pub const RUN_ID_LEN: usize = 16;

/// Short hex digest of the source's absolute path.
///
/// Two sources that differ only in extension (or directory) get different
/// ids, which keeps their intermediates apart.
pub fn run_id(source: &SourceFile) -> String {
    let digest = Sha256::digest(source.path().as_os_str().as_encoded_bytes());
    hex::encode(&digest[..RUN_ID_LEN / 2])
}

fn hidden_stem(source: &SourceFile) -> String {
    format!(".{}_{}", source.stem(), run_id(source))
}

/// Hidden stem shared by the video intermediates of `source`.
fn video_stem(source: &SourceFile) -> String {
    format!("{}{VIDEO_ROLE}", hidden_stem(source))
}

/// ffmpeg segment muxer output template (`%d` is the segment index).
pub fn segment_pattern(source: &SourceFile) -> PathBuf {
    join_path(
        source.dir(),
        &format!("{}_%d", video_stem(source)),
        source.extension(),
    )
}

/// Path of split segment `index`.
pub fn segment_path(source: &SourceFile, index: usize) -> PathBuf {
    join_path(
        source.dir(),
        &format!("{}_{index}", video_stem(source)),
        source.extension(),
    )
}

/// Path of the transcoded form of `segment`, in the same directory.
pub fn encoded_segment_path(segment: &Path, output_extension: &str) -> sg_core::Result<PathBuf> {
    let (dir, stem, _) = split_path(segment)?;
    Ok(join_path(&dir, &format!("{stem}{ENCODED_SUFFIX}"), output_extension))
}

/// Path of the transcoded audio track of `source`.
pub fn audio_path(source: &SourceFile, audio_extension: &str) -> PathBuf {
    join_path(
        source.dir(),
        &format!("{}{AUDIO_ROLE}", hidden_stem(source)),
        audio_extension,
    )
}

/// Path of the concatenated video of `source`.
pub fn concat_path(source: &SourceFile, output_extension: &str) -> PathBuf {
    join_path(source.dir(), &video_stem(source), output_extension)
}

/// Path of the final muxed output of `source`.
pub fn output_path(source: &SourceFile, output_extension: &str) -> PathBuf {
    join_path(source.dir(), source.stem(), output_extension)
}

/// Strip the per-segment `_<digits>` or `_<digits>_encoded` suffix from a
/// segment stem. `None` when the stem has no such suffix.
pub fn strip_segment_suffix(stem: &str) -> Option<&str> {
    let rest = stem.strip_suffix(ENCODED_SUFFIX).unwrap_or(stem);
    let base = rest.trim_end_matches(|c: char| c.is_ascii_digit());
    if base.len() == rest.len() {
        return None;
    }
    base.strip_suffix('_').filter(|s| !s.is_empty())
}

/// Strip a trailing `_video`/`_audio` role and one leading `.` from a stem.
pub fn strip_role_suffix(stem: &str) -> &str {
    let stem = stem
        .strip_suffix(VIDEO_ROLE)
        .or_else(|| stem.strip_suffix(AUDIO_ROLE))
        .unwrap_or(stem);
    stem.strip_prefix('.').unwrap_or(stem)
}

/// Strip a trailing `_<run id>` from a stem.
pub fn strip_run_id(stem: &str) -> &str {
    let Some(split) = stem.len().checked_sub(RUN_ID_LEN + 1) else {
        return stem;
    };
    if !stem.is_char_boundary(split) {
        return stem;
    }
    let (base, tail) = stem.split_at(split);
    let is_id = tail
        .strip_prefix('_')
        .is_some_and(|id| id.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)));
    if is_id && !base.is_empty() {
        base
    } else {
        stem
    }
}

/// Whether a file name looks like a pipeline intermediate.
pub fn is_intermediate(file_name: &str) -> bool {
    file_name.starts_with('.')
}
