//! Shared test harness for integration tests.
//!
//! Provides [`FakeTools`], a pair of shell scripts standing in for ffmpeg
//! and ffprobe. The fake ffmpeg writes whatever file its last argument
//! names (or the numbered files of a `%d` segment pattern) and logs every
//! invocation, so pipeline runs can be checked without a real encoder.
//!
//! Tests using the harness must be `#[serial]`: writing an executable while
//! another test forks can make the exec fail with ETXTBSY.

#![cfg(unix)]
#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use sg_core::config::Config;
use tempfile::TempDir;

/// What the fake tools report and do.
#[derive(Debug, Clone)]
pub struct FakeBehaviour {
    /// Printed for the duration query.
    pub duration: String,
    /// Printed for the packet count query.
    pub frames: String,
    /// Printed for the duration query of a split segment.
    pub segment_duration: String,
    /// Whether the source has audio streams at all.
    pub has_audio: bool,
    /// `(codec_name, language)` of each audio stream, listed after the
    /// video stream (so the first one is stream 1).
    pub audio_streams: Vec<(String, String)>,
    /// Segment indices the split writes.
    pub split_indices: Vec<usize>,
    /// ffmpeg exits 1 when its arguments contain this text.
    pub fail_on: Option<String>,
    /// ffmpeg sleeps this many seconds when its arguments contain the text.
    pub delay_on: Option<(String, u32)>,
}

impl Default for FakeBehaviour {
    fn default() -> Self {
        Self {
            duration: "95.000000".into(),
            frames: "2280".into(),
            segment_duration: "23.750000".into(),
            has_audio: true,
            audio_streams: vec![("aac".into(), "eng".into())],
            split_indices: vec![0, 1, 2, 3],
            fail_on: None,
            delay_on: None,
        }
    }
}

/// Fake ffmpeg/ffprobe installed in a temp directory.
pub struct FakeTools {
    dir: TempDir,
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
    pub log: PathBuf,
}

impl FakeTools {
    pub fn new(behaviour: FakeBehaviour) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = dir.path().join("calls.log");
        let ffmpeg = dir.path().join("ffmpeg");
        let ffprobe = dir.path().join("ffprobe");

        write_script(&ffprobe, &ffprobe_script(&log, &behaviour));
        write_script(&ffmpeg, &ffmpeg_script(&log, &behaviour));

        Self {
            dir,
            ffmpeg,
            ffprobe,
            log,
        }
    }

    /// Config pointing at the fakes, with four workers so a 95 s source is
    /// planned as 4 x 24 s.
    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.tools.ffmpeg_path = Some(self.ffmpeg.clone());
        config.tools.ffprobe_path = Some(self.ffprobe.clone());
        config.transcode.workers = Some(4);
        config
    }

    /// Write `config` as JSON into the fake tools directory.
    pub fn config_file(&self, config: &Config) -> PathBuf {
        let path = self.dir.path().join("segforge.json");
        fs::write(&path, serde_json::to_string_pretty(config).unwrap()).unwrap();
        path
    }

    /// Logged invocations, one line each, prefixed with the tool name.
    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(&self.log)
            .unwrap_or_default()
            .lines()
            .map(String::from)
            .collect()
    }
}

/// Create `name` in `dir` with some placeholder bytes.
pub fn source_file(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, b"source").unwrap();
    path
}

/// Sorted file names in `dir`.
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    names.sort();
    names
}

fn write_script(path: &Path, body: &str) {
    fs::write(path, body).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

/// `-show_streams` JSON: one video stream, then the audio streams.
fn streams_json(b: &FakeBehaviour) -> String {
    let mut streams = vec![r#"{"index":0,"codec_type":"video","codec_name":"h264"}"#.to_string()];
    if b.has_audio {
        for (i, (codec, language)) in b.audio_streams.iter().enumerate() {
            streams.push(format!(
                r#"{{"index":{},"codec_type":"audio","codec_name":"{codec}","tags":{{"language":"{language}"}}}}"#,
                i + 1
            ));
        }
    }
    format!(r#"{{"streams":[{}]}}"#, streams.join(","))
}

fn ffprobe_script(log: &Path, b: &FakeBehaviour) -> String {
    let audio = if b.has_audio { "echo 1" } else { ":" };
    format!(
        r#"#!/bin/sh
echo "ffprobe $*" >> '{log}'
case "$1" in -version) echo "ffprobe version fake"; exit 0;; esac
case "$*" in
  *show_streams*) echo '{streams}' ;;
  *format=duration*_video_*) echo '{segment_duration}' ;;
  *format=duration*) echo '{duration}' ;;
  *nb_read_packets*) echo '{frames}' ;;
  *a:0*) {audio} ;;
esac
"#,
        log = log.display(),
        streams = streams_json(b),
        segment_duration = b.segment_duration,
        duration = b.duration,
        frames = b.frames,
    )
}

fn ffmpeg_script(log: &Path, b: &FakeBehaviour) -> String {
    let fail = match &b.fail_on {
        Some(text) => format!(
            "case \"$*\" in *'{text}'*) echo \"fake failure on {text}\" >&2; exit 1;; esac\n"
        ),
        None => String::new(),
    };
    let delay = match &b.delay_on {
        Some((text, secs)) => format!("case \"$*\" in *'{text}'*) sleep {secs};; esac\n"),
        None => String::new(),
    };
    let indices: Vec<String> = b.split_indices.iter().map(|i| i.to_string()).collect();
    format!(
        r#"#!/bin/sh
echo "ffmpeg $*" >> '{log}'
case "$1" in -version) echo "ffmpeg version fake"; exit 0;; esac
{fail}{delay}for last; do :; done
case "$last" in
  *%d*) for i in {indices}; do printf seg > "$(printf "$last" "$i")"; done ;;
  *) printf out > "$last" ;;
esac
"#,
        log = log.display(),
        indices = indices.join(" "),
    )
}
