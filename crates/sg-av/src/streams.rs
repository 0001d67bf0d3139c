//! Per-stream metadata and the audio selection / stream-copy rules.
//!
//! ffprobe's `-show_streams` JSON is flattened into one string map per
//! stream (`tags.language`, `disposition.default`, ...) so that rules from
//! the config can address any field by a dotted key.

use std::collections::BTreeMap;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use sg_core::config::AudioStreamConfig;
use sg_core::Error;

/// One stream of a media file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    /// Absolute stream index within the file (`0:<index>` in ffmpeg maps).
    pub index: usize,
    /// Scalar fields keyed by their dotted path.
    pub fields: BTreeMap<String, String>,
}

impl StreamInfo {
    /// Value of the field at `key`, if the stream carries it.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn is_audio(&self) -> bool {
        self.get("codec_type") == Some("audio")
    }

    pub fn codec_name(&self) -> &str {
        self.get("codec_name").unwrap_or("unknown")
    }
}

#[derive(Deserialize)]
struct ShowStreams {
    #[serde(default)]
    streams: Vec<serde_json::Map<String, Value>>,
}

/// Parse the output of `ffprobe -print_format json -show_streams`.
///
/// # Errors
///
/// [`Error::Parse`] for output that is not the expected JSON or a stream
/// without an `index`.
pub fn parse_streams(stdout: &str) -> sg_core::Result<Vec<StreamInfo>> {
    let parsed: ShowStreams = serde_json::from_str(stdout)
        .map_err(|e| Error::Parse(format!("invalid ffprobe stream listing: {e}")))?;

    parsed
        .streams
        .into_iter()
        .map(|stream| {
            let index = stream
                .get("index")
                .and_then(Value::as_u64)
                .ok_or_else(|| Error::Parse("ffprobe stream without an index".into()))?;
            let mut fields = BTreeMap::new();
            flatten("", &stream, &mut fields);
            Ok(StreamInfo {
                index: index as usize,
                fields,
            })
        })
        .collect()
}

fn flatten(prefix: &str, object: &serde_json::Map<String, Value>, out: &mut BTreeMap<String, String>) {
    for (key, value) in object {
        let key = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(nested) => flatten(&key, nested, out),
            Value::String(s) => {
                out.insert(key, s.clone());
            }
            Value::Number(n) => {
                out.insert(key, n.to_string());
            }
            Value::Bool(b) => {
                out.insert(key, b.to_string());
            }
            Value::Array(_) | Value::Null => {}
        }
    }
}

/// Compiled form of [`AudioStreamConfig`].
#[derive(Debug, Clone, Default)]
pub struct AudioRules {
    skip_if: Vec<(String, Regex)>,
    /// Preference patterns, most important first.
    prefer: Vec<(String, Regex)>,
}

impl AudioRules {
    /// Compile the patterns of `config`.
    ///
    /// Preferences are ranked by `selection_priority`; preferred keys the
    /// priority list leaves out rank after it, in key order.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] if a pattern does not compile.
    pub fn from_config(config: &AudioStreamConfig) -> sg_core::Result<Self> {
        let skip_if = config
            .skip_if
            .iter()
            .map(|(key, pattern)| compile("skip_if", key, pattern))
            .collect::<sg_core::Result<Vec<_>>>()?;

        let ranked = config
            .selection_priority
            .iter()
            .filter(|key| config.selection_prefer.contains_key(*key))
            .chain(
                config
                    .selection_prefer
                    .keys()
                    .filter(|key| !config.selection_priority.contains(*key)),
            );
        let mut prefer: Vec<(String, Regex)> = Vec::new();
        for key in ranked {
            if prefer.iter().any(|(k, _)| k == key) {
                continue;
            }
            prefer.push(compile("selection_prefer", key, &config.selection_prefer[key])?);
        }

        Ok(Self { skip_if, prefer })
    }

    /// The audio stream to encode, or `None` if there is no audio.
    ///
    /// With several audio streams, the one matching the most important
    /// preference wins (then the next preference breaks ties, and so on);
    /// remaining ties go to the earliest stream.
    pub fn select<'a>(&self, streams: &'a [StreamInfo]) -> Option<&'a StreamInfo> {
        let mut best: Option<(&StreamInfo, Vec<bool>)> = None;
        for stream in streams.iter().filter(|s| s.is_audio()) {
            let score: Vec<bool> = self
                .prefer
                .iter()
                .map(|(key, re)| stream.get(key).is_some_and(|v| re.is_match(v)))
                .collect();
            if best.as_ref().map_or(true, |(_, top)| score > *top) {
                best = Some((stream, score));
            }
        }
        best.map(|(stream, _)| stream)
    }

    /// Whether `stream` already satisfies `skip_if` and can be copied.
    ///
    /// Fields the stream lacks are not checked, but at least one listed
    /// field must be present and every present one must match.
    pub fn is_skippable(&self, stream: &StreamInfo) -> bool {
        let mut checked = false;
        for (key, re) in &self.skip_if {
            if let Some(value) = stream.get(key) {
                if !re.is_match(value) {
                    return false;
                }
                checked = true;
            }
        }
        checked
    }
}

fn compile(section: &str, key: &str, pattern: &str) -> sg_core::Result<(String, Regex)> {
    let re = Regex::new(pattern).map_err(|e| {
        Error::Validation(format!("transcode.audio.{section}.{key}: {e}"))
    })?;
    Ok((key.to_string(), re))
}
