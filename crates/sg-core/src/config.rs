//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries the
//! tool, transcode and batch settings. Every section defaults sensibly so a
//! completely empty `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tools: ToolsConfig,
    pub transcode: TranscodeConfig,
    pub batch: BatchConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from `path` if one is given, otherwise use the
    /// defaults. An explicitly named file must exist and parse.
    pub fn load_optional(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration strictly: a missing or malformed file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_json(&contents)?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        for (name, path) in [
            ("tools.ffmpeg_path", &self.tools.ffmpeg_path),
            ("tools.ffprobe_path", &self.tools.ffprobe_path),
        ] {
            if let Some(p) = path {
                if !p.exists() {
                    warnings.push(format!(
                        "{name} {} does not exist; falling back to PATH",
                        p.display()
                    ));
                }
            }
        }

        for (name, secs) in [
            ("tools.probe_timeout_secs", self.tools.probe_timeout_secs),
            ("tools.copy_timeout_secs", self.tools.copy_timeout_secs),
            ("tools.encode_timeout_secs", self.tools.encode_timeout_secs),
        ] {
            if secs == 0 {
                warnings.push(format!("{name} is 0; every invocation will time out"));
            }
        }

        for (name, ext) in [
            ("transcode.output_extension", &self.transcode.output_extension),
            ("transcode.audio_extension", &self.transcode.audio_extension),
        ] {
            if !ext.starts_with('.') || ext.len() < 2 {
                warnings.push(format!("{name} '{ext}' should look like '.webm'"));
            }
        }

        if self.transcode.min_segment_secs == 0 {
            warnings.push("transcode.min_segment_secs is 0; it will be treated as 1".into());
        }
        if self.transcode.parallelism_divisor == 0 {
            warnings.push("transcode.parallelism_divisor is 0; it will be treated as 1".into());
        }
        if self.transcode.workers == Some(0) {
            warnings.push("transcode.workers is 0; it will be treated as 1".into());
        }
        if self.transcode.video_args.trim().is_empty() {
            warnings.push("transcode.video_args is empty; ffmpeg defaults will apply".into());
        }
        warnings.extend(self.transcode.audio.validate());
        if self.batch.concurrency == 0 {
            warnings.push("batch.concurrency is 0; it will be treated as 1".into());
        }
        if let Some(ref root) = self.batch.root {
            if !root.is_dir() {
                warnings.push(format!("batch.root {} is not a directory", root.display()));
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// External tool paths and per-invocation time limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
    /// Limit for a single ffprobe query.
    pub probe_timeout_secs: u64,
    /// Limit for stream-copy invocations (split, concat, mux).
    pub copy_timeout_secs: u64,
    /// Limit for one audio encode or one segment encode.
    pub encode_timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            ffprobe_path: None,
            probe_timeout_secs: 60,
            copy_timeout_secs: 600,
            encode_timeout_secs: 4 * 60 * 60,
        }
    }
}

impl ToolsConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn copy_timeout(&self) -> Duration {
        Duration::from_secs(self.copy_timeout_secs)
    }

    pub fn encode_timeout(&self) -> Duration {
        Duration::from_secs(self.encode_timeout_secs)
    }
}

/// Encoder settings and segmentation heuristics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscodeConfig {
    /// Container extension of transcoded segments and the final output.
    pub output_extension: String,
    /// Container extension of the transcoded audio intermediate.
    pub audio_extension: String,
    /// ffmpeg output flags for each video segment encode.
    pub video_args: String,
    /// ffmpeg output flags for the audio encode.
    pub audio_args: String,
    /// Lower bound on a segment's duration in seconds.
    pub min_segment_secs: u64,
    /// Inner pool size and target segment count are `ceil(cpus / divisor)`.
    pub parallelism_divisor: usize,
    /// Explicit inner pool size; overrides the CPU-derived value.
    pub workers: Option<usize>,
    /// Audio stream selection and stream-copy rules.
    pub audio: AudioStreamConfig,
}

/// Default minimum segment duration in seconds.
pub const MIN_SEGMENT_SECONDS: u64 = 20;

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            output_extension: ".webm".into(),
            audio_extension: ".ogg".into(),
            video_args: "-c:v libvpx-vp9 -b:v 0 -pix_fmt:v yuv420p -cpu-used:v 4 -crf:v 27".into(),
            audio_args: "-c:a libopus -b:a 128k".into(),
            min_segment_secs: MIN_SEGMENT_SECONDS,
            parallelism_divisor: 4,
            workers: None,
            audio: AudioStreamConfig::default(),
        }
    }
}

impl TranscodeConfig {
    /// `ceil(available_parallelism / divisor)`, or the explicit override.
    ///
    /// Used both as the inner worker pool size and as the target segment
    /// count handed to the planner.
    pub fn parallelism(&self) -> usize {
        if let Some(workers) = self.workers {
            return workers.max(1);
        }
        parallelism_for(num_cpus::get(), self.parallelism_divisor)
    }

    /// Split [`video_args`](Self::video_args) into individual ffmpeg flags.
    pub fn video_flags(&self) -> Vec<String> {
        self.video_args.split_whitespace().map(String::from).collect()
    }

    /// Split [`audio_args`](Self::audio_args) into individual ffmpeg flags.
    pub fn audio_flags(&self) -> Vec<String> {
        self.audio_args.split_whitespace().map(String::from).collect()
    }
}

/// Which audio stream a run encodes, and when it is copied instead.
///
/// Keys are ffprobe stream fields, nested ones joined with `.` (for example
/// `codec_name` or `tags.language`). Values are regular expressions matched
/// anywhere in the field's value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioStreamConfig {
    /// Copy the selected stream instead of re-encoding it when every listed
    /// field the stream carries matches, e.g. `{"codec_name": "^opus$"}`.
    pub skip_if: BTreeMap<String, String>,
    /// Field patterns a preferred stream matches, used when the source has
    /// more than one audio stream.
    pub selection_prefer: BTreeMap<String, String>,
    /// Keys of `selection_prefer`, most important first.
    pub selection_priority: Vec<String>,
}

impl AudioStreamConfig {
    fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        for (section, rules) in [
            ("skip_if", &self.skip_if),
            ("selection_prefer", &self.selection_prefer),
        ] {
            for (key, pattern) in rules {
                if let Err(e) = regex::Regex::new(pattern) {
                    warnings.push(format!("transcode.audio.{section}.{key} is not a valid pattern: {e}"));
                }
            }
        }
        for key in &self.selection_priority {
            if !self.selection_prefer.contains_key(key) {
                warnings.push(format!(
                    "transcode.audio.selection_priority lists '{key}' with no selection_prefer pattern"
                ));
            }
        }
        warnings
    }
}

/// `ceil(cpus / divisor)`, never less than one.
pub fn parallelism_for(cpus: usize, divisor: usize) -> usize {
    cpus.max(1).div_ceil(divisor.max(1))
}

/// Batch directory processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Directory scanned recursively by `segforge batch`.
    pub root: Option<PathBuf>,
    /// Extensions (without the dot, case-insensitive) to include. Empty
    /// means every non-hidden regular file.
    pub extensions: Vec<String>,
    /// Number of source files processed at the same time.
    pub concurrency: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            root: None,
            extensions: Vec::new(),
            concurrency: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_is_default() {
        let cfg = Config::from_json("{}").unwrap();
        assert_eq!(cfg.transcode.output_extension, ".webm");
        assert_eq!(cfg.transcode.audio_extension, ".ogg");
        assert_eq!(cfg.transcode.min_segment_secs, 20);
        assert_eq!(cfg.transcode.parallelism_divisor, 4);
        assert_eq!(cfg.batch.concurrency, 1);
        assert!(cfg.tools.ffmpeg_path.is_none());
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let cfg = Config::from_json(
            r#"{"transcode": {"output_extension": ".mkv", "workers": 3}, "tools": {"copy_timeout_secs": 30}}"#,
        )
        .unwrap();
        assert_eq!(cfg.transcode.output_extension, ".mkv");
        assert_eq!(cfg.transcode.audio_extension, ".ogg");
        assert_eq!(cfg.transcode.parallelism(), 3);
        assert_eq!(cfg.tools.copy_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.tools.encode_timeout(), Duration::from_secs(14400));
    }

    #[test]
    fn malformed_json_is_validation_error() {
        let err = Config::from_json("{not json").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn load_optional_without_path_is_default() {
        let cfg = Config::load_optional(None).unwrap();
        assert_eq!(cfg.transcode.output_extension, ".webm");
    }

    #[test]
    fn load_optional_named_file_must_parse() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load_optional(Some(&dir.path().join("nope.json"))).is_err());

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "{ not json").unwrap();
        let err = Config::load_optional(Some(&broken)).unwrap_err();
        assert!(matches!(err, Error::Validation(_)), "{err}");
    }

    #[test]
    fn load_strict_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(&dir.path().join("nope.json")).is_err());
    }

    #[test]
    fn parallelism_rounds_up() {
        assert_eq!(parallelism_for(16, 4), 4);
        assert_eq!(parallelism_for(6, 4), 2);
        assert_eq!(parallelism_for(1, 4), 1);
        assert_eq!(parallelism_for(0, 4), 1);
        assert_eq!(parallelism_for(8, 0), 8);
    }

    #[test]
    fn zero_workers_clamped() {
        let cfg = TranscodeConfig {
            workers: Some(0),
            ..TranscodeConfig::default()
        };
        assert_eq!(cfg.parallelism(), 1);
    }

    #[test]
    fn flags_split_on_whitespace() {
        let cfg = TranscodeConfig::default();
        let flags = cfg.video_flags();
        assert_eq!(flags[0], "-c:v");
        assert_eq!(flags[1], "libvpx-vp9");
        assert!(flags.contains(&"-crf:v".to_string()));
        assert_eq!(cfg.audio_flags(), vec!["-c:a", "libopus", "-b:a", "128k"]);
    }

    #[test]
    fn audio_rules_from_json() {
        let cfg = Config::from_json(
            r#"{"transcode": {"audio": {
                "skip_if": {"codec_name": "^opus$"},
                "selection_prefer": {"tags.language": "jpn"},
                "selection_priority": ["tags.language"]
            }}}"#,
        )
        .unwrap();
        assert_eq!(cfg.transcode.audio.skip_if["codec_name"], "^opus$");
        assert_eq!(cfg.transcode.audio.selection_priority, vec!["tags.language"]);
        assert!(cfg.validate().is_empty());
        assert!(Config::default().transcode.audio.skip_if.is_empty());
    }

    #[test]
    fn audio_rule_warnings() {
        let mut cfg = Config::default();
        cfg.transcode.audio.skip_if.insert("codec_name".into(), "(opus".into());
        cfg.transcode.audio.selection_priority = vec!["tags.language".into()];
        let warnings = cfg.validate();
        assert_eq!(warnings.len(), 2, "{warnings:?}");
        assert!(warnings.iter().any(|w| w.contains("skip_if.codec_name")));
        assert!(warnings.iter().any(|w| w.contains("'tags.language'")));
    }

    #[test]
    fn validate_warnings() {
        let mut cfg = Config::default();
        cfg.transcode.output_extension = "webm".into();
        cfg.batch.concurrency = 0;
        cfg.tools.ffmpeg_path = Some(PathBuf::from("/definitely/not/ffmpeg"));
        cfg.tools.encode_timeout_secs = 0;
        let warnings = cfg.validate();
        assert_eq!(warnings.len(), 4, "{warnings:?}");
        assert!(warnings.iter().any(|w| w.contains("output_extension")));
        assert!(warnings.iter().any(|w| w.contains("concurrency")));
        assert!(warnings.iter().any(|w| w.contains("ffmpeg_path")));
        assert!(warnings.iter().any(|w| w.contains("encode_timeout_secs")));
    }
}
