//! Stream inspection via the `ffprobe` CLI.
//!
//! The scalar queries restrict ffprobe to a single stream and a single entry
//! so that stdout is one value (or nothing), which keeps parsing trivial.
//! The full stream listing comes back as JSON and is read by
//! [`streams`](crate::streams).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::command::ToolCommand;
use crate::streams::{parse_streams, StreamInfo};
use crate::tools::ToolRegistry;

#[rustfmt::skip]
const DURATION_ARGS: [&str; 8] = [
    "-v", "error",
    "-select_streams", "v:0",
    "-show_entries", "format=duration",
    "-of", "default=noprint_wrappers=1:nokey=1",
];

#[rustfmt::skip]
const FRAME_COUNT_ARGS: [&str; 9] = [
    "-v", "error",
    "-select_streams", "v:0",
    "-count_packets",
    "-show_entries", "stream=nb_read_packets",
    "-of", "csv=p=0",
];

#[rustfmt::skip]
const HAS_AUDIO_ARGS: [&str; 8] = [
    "-v", "error",
    "-select_streams", "a:0",
    "-show_entries", "stream=index",
    "-of", "csv=p=0",
];

#[rustfmt::skip]
const STREAMS_ARGS: [&str; 5] = [
    "-v", "error",
    "-print_format", "json",
    "-show_streams",
];

/// The facts about a source that segmentation needs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MediaSummary {
    /// Container duration in seconds.
    pub duration: f64,
    /// Packet count of the first video stream.
    pub frame_count: u64,
    /// Whether the source carries at least one audio stream.
    pub has_audio: bool,
}

/// Queries stream metadata through ffprobe.
#[derive(Debug, Clone)]
pub struct MediaInspector {
    ffprobe_path: PathBuf,
    timeout: Duration,
    cancellation: CancellationToken,
}

impl MediaInspector {
    /// Create an inspector using the ffprobe resolved by `tools`.
    pub fn new(tools: &ToolRegistry, timeout: Duration) -> sg_core::Result<Self> {
        Ok(Self {
            ffprobe_path: tools.require("ffprobe")?.path.clone(),
            timeout,
            cancellation: CancellationToken::new(),
        })
    }

    /// Builder: kill outstanding queries when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Duration of `file` in seconds.
    ///
    /// # Errors
    ///
    /// [`sg_core::Error::Parse`] when ffprobe prints nothing usable (for
    /// example `N/A`).
    pub async fn probe_duration(&self, file: &Path) -> sg_core::Result<f64> {
        let stdout = self.query(file, &DURATION_ARGS).await?;
        parse_duration(&stdout)
    }

    /// Number of packets in the first video stream.
    ///
    /// This demuxes the whole file, so it is much slower than
    /// [`probe_duration`](Self::probe_duration).
    ///
    /// # Errors
    ///
    /// [`sg_core::Error::Parse`] when the file has no video stream.
    pub async fn probe_frame_count(&self, file: &Path) -> sg_core::Result<u64> {
        let stdout = self.query(file, &FRAME_COUNT_ARGS).await?;
        parse_frame_count(&stdout)
    }

    /// Whether `file` has an audio stream.
    pub async fn probe_has_audio(&self, file: &Path) -> sg_core::Result<bool> {
        let stdout = self.query(file, &HAS_AUDIO_ARGS).await?;
        Ok(!stdout.trim().is_empty())
    }

    /// Every stream of `file`, in file order.
    ///
    /// # Errors
    ///
    /// [`sg_core::Error::Parse`] when ffprobe's JSON cannot be read.
    pub async fn probe_streams(&self, file: &Path) -> sg_core::Result<Vec<StreamInfo>> {
        let stdout = self.query(file, &STREAMS_ARGS).await?;
        parse_streams(&stdout)
    }

    /// Run the duration, frame count and audio queries.
    pub async fn probe(&self, file: &Path) -> sg_core::Result<MediaSummary> {
        Ok(MediaSummary {
            duration: self.probe_duration(file).await?,
            frame_count: self.probe_frame_count(file).await?,
            has_audio: self.probe_has_audio(file).await?,
        })
    }

    async fn query(&self, file: &Path, args: &[&str]) -> sg_core::Result<String> {
        let mut cmd = ToolCommand::new(self.ffprobe_path.clone());
        cmd.timeout(self.timeout);
        cmd.cancel_on(self.cancellation.clone());
        cmd.args(args.iter().copied());
        cmd.arg(file.to_string_lossy().as_ref());
        Ok(cmd.execute().await?.stdout)
    }
}

fn first_value(stdout: &str) -> &str {
    stdout
        .lines()
        .map(|l| l.trim().trim_end_matches(','))
        .find(|l| !l.is_empty())
        .unwrap_or("")
}

/// Parse ffprobe's duration output: one non-negative float.
pub fn parse_duration(stdout: &str) -> sg_core::Result<f64> {
    let value = first_value(stdout);
    match value.parse::<f64>() {
        Ok(d) if d.is_finite() && d >= 0.0 => Ok(d),
        _ => Err(sg_core::Error::Parse(format!(
            "expected a duration in seconds, got {value:?}"
        ))),
    }
}

/// Parse ffprobe's packet count output: one non-negative integer. Integral
/// floats such as `2280.0` are accepted.
pub fn parse_frame_count(stdout: &str) -> sg_core::Result<u64> {
    let value = first_value(stdout);
    if let Ok(n) = value.parse::<u64>() {
        return Ok(n);
    }
    match value.parse::<f64>() {
        Ok(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 => Ok(f as u64),
        _ => Err(sg_core::Error::Parse(format!(
            "expected a frame count, got {value:?}"
        ))),
    }
}
