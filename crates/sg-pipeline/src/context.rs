//! Execution context shared by every stage of a pipeline run.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use sg_av::{AudioRules, MediaInspector, RunOptions, ToolRegistry};
use sg_core::config::Config;

/// Named points of a single file's run, reported to the [`StageObserver`]
/// in this order. `AudioDispatched`, `AwaitAudio` and the audio half of
/// `CleanupVideoAndAudio` are skipped for sources without audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Start,
    AudioDispatched,
    VideoSplit,
    VideoTranscode,
    CleanupSegments,
    Concat,
    CleanupTranscodedSegments,
    AwaitAudio,
    Mux,
    CleanupVideoAndAudio,
    Done,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Start => "start",
            Stage::AudioDispatched => "audio dispatched",
            Stage::VideoSplit => "video split",
            Stage::VideoTranscode => "video transcode",
            Stage::CleanupSegments => "cleanup segments",
            Stage::Concat => "concat",
            Stage::CleanupTranscodedSegments => "cleanup transcoded segments",
            Stage::AwaitAudio => "await audio",
            Stage::Mux => "mux",
            Stage::CleanupVideoAndAudio => "cleanup video and audio",
            Stage::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives a notification each time a run enters a [`Stage`].
///
/// Wraps a callback taking the stage and the source path being processed.
pub struct StageObserver {
    callback: Box<dyn Fn(Stage, &Path) + Send + Sync>,
}

impl StageObserver {
    /// Create a new observer from the given callback.
    pub fn new(callback: impl Fn(Stage, &Path) + Send + Sync + 'static) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }

    /// Create an observer that ignores every notification.
    pub fn noop() -> Self {
        Self {
            callback: Box::new(|_, _| {}),
        }
    }

    /// Report that `source` entered `stage`.
    pub fn notify(&self, stage: Stage, source: &Path) {
        (self.callback)(stage, source);
    }
}

impl fmt::Debug for StageObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageObserver").finish_non_exhaustive()
    }
}

/// The resolved knobs a run needs, derived once from [`Config`].
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub output_extension: String,
    pub audio_extension: String,
    pub video_flags: Vec<String>,
    pub audio_flags: Vec<String>,
    pub min_segment_secs: u64,
    /// Inner pool size and target segment count.
    pub parallelism: usize,
    pub copy_timeout: Duration,
    pub encode_timeout: Duration,
    /// Audio stream selection and stream-copy rules.
    pub audio_rules: AudioRules,
}

impl PipelineSettings {
    /// # Errors
    ///
    /// [`sg_core::Error::Validation`] if an audio rule pattern is invalid.
    pub fn from_config(config: &Config) -> sg_core::Result<Self> {
        let transcode = &config.transcode;
        Ok(Self {
            output_extension: transcode.output_extension.clone(),
            audio_extension: transcode.audio_extension.clone(),
            video_flags: transcode.video_flags(),
            audio_flags: transcode.audio_flags(),
            min_segment_secs: transcode.min_segment_secs.max(1),
            parallelism: transcode.parallelism(),
            copy_timeout: config.tools.copy_timeout(),
            encode_timeout: config.tools.encode_timeout(),
            audio_rules: AudioRules::from_config(&transcode.audio)?,
        })
    }
}

/// Everything a run needs besides the source path.
///
/// Cheap to clone; a batch run hands one clone to each file.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    /// Resolved ffmpeg and ffprobe locations.
    pub tools: Arc<ToolRegistry>,
    /// Stream queries against the source.
    pub inspector: Arc<MediaInspector>,
    pub settings: Arc<PipelineSettings>,
    /// Cancelling this token kills in-flight tools and stops the run at the
    /// next stage boundary.
    pub cancellation: CancellationToken,
    /// Stage notifications.
    pub observer: Arc<StageObserver>,
}

impl PipelineContext {
    /// Discover tools and derive settings from `config`.
    ///
    /// # Errors
    ///
    /// [`sg_core::Error::Tool`] if ffprobe cannot be found. A missing ffmpeg
    /// is only reported when the first action needs it.
    /// [`sg_core::Error::Validation`] for an invalid audio rule pattern.
    pub fn new(config: &Config) -> sg_core::Result<Self> {
        let tools = ToolRegistry::discover(&config.tools);
        let cancellation = CancellationToken::new();
        let inspector = MediaInspector::new(&tools, config.tools.probe_timeout())?
            .with_cancellation(cancellation.clone());
        Ok(Self {
            tools: Arc::new(tools),
            inspector: Arc::new(inspector),
            settings: Arc::new(PipelineSettings::from_config(config)?),
            cancellation,
            observer: Arc::new(StageObserver::noop()),
        })
    }

    /// Builder: attach a cancellation token (also used for probes).
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.inspector = Arc::new(
            self.inspector
                .as_ref()
                .clone()
                .with_cancellation(token.clone()),
        );
        self.cancellation = token;
        self
    }

    /// Builder: attach a stage observer.
    pub fn with_observer(mut self, observer: StageObserver) -> Self {
        self.observer = Arc::new(observer);
        self
    }

    /// Limits for stream-copy invocations (split, concat, mux).
    pub fn copy_options(&self) -> RunOptions {
        RunOptions::new(self.settings.copy_timeout, self.cancellation.clone())
    }

    /// Limits for audio and segment encodes.
    pub fn encode_options(&self) -> RunOptions {
        RunOptions::new(self.settings.encode_timeout, self.cancellation.clone())
    }
}
