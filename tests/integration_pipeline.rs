//! Pipeline integration tests
//!
//! Full runs of the split / encode / concat / mux sequence against fake
//! ffmpeg and ffprobe scripts.

#![cfg(unix)]

mod common;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use common::{file_names, source_file, FakeBehaviour, FakeTools};
use serial_test::serial;
use sg_av::naming;
use sg_core::config::Config;
use sg_core::{Error, SourceFile};
use sg_pipeline::{run_batch, PipelineContext, PipelineExecutor, Stage, StageObserver};

/// Executor plus the stages it reported.
fn executor(tools: &FakeTools) -> (PipelineExecutor, Arc<Mutex<Vec<Stage>>>) {
    executor_with(&tools.config())
}

fn executor_with(config: &Config) -> (PipelineExecutor, Arc<Mutex<Vec<Stage>>>) {
    let stages = Arc::new(Mutex::new(Vec::new()));
    let sink = stages.clone();
    let ctx = PipelineContext::new(config)
        .unwrap()
        .with_observer(StageObserver::new(move |stage, _| {
            sink.lock().unwrap().push(stage);
        }));
    (PipelineExecutor::new(ctx), stages)
}

#[tokio::test]
#[serial]
async fn test_full_run_leaves_only_source_and_output() {
    let tools = FakeTools::new(FakeBehaviour::default());
    let media = tempfile::tempdir().unwrap();
    let input = source_file(media.path(), "clip.mp4");

    let (exec, stages) = executor(&tools);
    let output = exec.run(&input).await.unwrap();

    assert_eq!(output, media.path().join("clip.webm"));
    assert_eq!(file_names(media.path()), vec!["clip.mp4", "clip.webm"]);
    assert_eq!(std::fs::read(&input).unwrap(), b"source");
    assert_eq!(
        *stages.lock().unwrap(),
        vec![
            Stage::Start,
            Stage::AudioDispatched,
            Stage::VideoSplit,
            Stage::VideoTranscode,
            Stage::CleanupSegments,
            Stage::Concat,
            Stage::CleanupTranscodedSegments,
            Stage::AwaitAudio,
            Stage::Mux,
            Stage::CleanupVideoAndAudio,
            Stage::Done,
        ]
    );
}

#[tokio::test]
#[serial]
async fn test_full_run_invokes_ffmpeg_as_planned() {
    let tools = FakeTools::new(FakeBehaviour::default());
    let media = tempfile::tempdir().unwrap();
    let input = source_file(media.path(), "clip.mp4");

    let (exec, _) = executor(&tools);
    exec.run(&input).await.unwrap();
    let src = SourceFile::open(&input).unwrap();

    let ffmpeg: Vec<String> = tools
        .calls()
        .into_iter()
        .filter(|c| c.starts_with("ffmpeg "))
        .collect();

    // One split, four segment encodes, one audio encode, one concat, one mux.
    assert_eq!(ffmpeg.len(), 8, "{ffmpeg:#?}");

    let split: Vec<_> = ffmpeg.iter().filter(|c| c.contains("-f segment")).collect();
    assert_eq!(split.len(), 1);
    assert!(split[0].contains("-segment_time 24"), "{}", split[0]);
    let pattern = naming::segment_pattern(&src);
    assert!(split[0].ends_with(pattern.to_str().unwrap()));

    let encodes = ffmpeg.iter().filter(|c| c.contains("_encoded.webm")).count();
    assert_eq!(encodes, 4);
    for i in 0..4 {
        let encoded = naming::encoded_segment_path(&naming::segment_path(&src, i), ".webm").unwrap();
        assert!(ffmpeg.iter().any(|c| c.ends_with(encoded.to_str().unwrap())));
    }

    let audio: Vec<_> = ffmpeg.iter().filter(|c| c.contains(" -vn ")).collect();
    assert_eq!(audio.len(), 1);
    assert!(audio[0].contains("libopus"));
    assert!(audio[0].contains("-map 0:1 "));
    assert!(audio[0].ends_with(naming::audio_path(&src, ".ogg").to_str().unwrap()));

    let concat = naming::concat_path(&src, ".webm");
    assert!(ffmpeg
        .iter()
        .any(|c| c.contains("-f concat -safe 0") && c.ends_with(concat.to_str().unwrap())));
    assert!(ffmpeg
        .iter()
        .any(|c| c.contains("-map 1:a:0") && c.ends_with("clip.webm")));
}

#[tokio::test]
#[serial]
async fn test_source_without_audio_is_remuxed_video_only() {
    let tools = FakeTools::new(FakeBehaviour {
        has_audio: false,
        ..FakeBehaviour::default()
    });
    let media = tempfile::tempdir().unwrap();
    let input = source_file(media.path(), "silent.mkv");

    let (exec, stages) = executor(&tools);
    let output = exec.run(&input).await.unwrap();

    assert_eq!(output, media.path().join("silent.webm"));
    assert_eq!(file_names(media.path()), vec!["silent.mkv", "silent.webm"]);

    let stages = stages.lock().unwrap();
    assert!(!stages.contains(&Stage::AudioDispatched));
    assert!(!stages.contains(&Stage::AwaitAudio));
    assert_eq!(stages.last(), Some(&Stage::Done));

    let calls = tools.calls();
    assert!(!calls.iter().any(|c| c.contains(" -vn ")));
    assert!(!calls.iter().any(|c| c.contains("1:a:0")));
}

#[tokio::test]
#[serial]
async fn test_trailing_segment_shortfall_is_accepted() {
    // Three segments that still cover all 95 s.
    let tools = FakeTools::new(FakeBehaviour {
        split_indices: vec![0, 1, 2],
        segment_duration: "31.666667".into(),
        ..FakeBehaviour::default()
    });
    let media = tempfile::tempdir().unwrap();
    let input = source_file(media.path(), "clip.mp4");

    let (exec, _) = executor(&tools);
    exec.run(&input).await.unwrap();

    let encodes = tools
        .calls()
        .iter()
        .filter(|c| c.contains("_encoded.webm") && !c.contains("-f concat"))
        .count();
    assert_eq!(encodes, 3);
    assert_eq!(file_names(media.path()), vec!["clip.mp4", "clip.webm"]);
}

#[tokio::test]
#[serial]
async fn test_shortfall_that_loses_content_fails() {
    // Three 23.75 s segments cover only 71.25 of 95 s.
    let tools = FakeTools::new(FakeBehaviour {
        split_indices: vec![0, 1, 2],
        ..FakeBehaviour::default()
    });
    let media = tempfile::tempdir().unwrap();
    let input = source_file(media.path(), "clip.mp4");

    let (exec, stages) = executor(&tools);
    let err = exec.run(&input).await.unwrap_err();

    assert!(matches!(err, Error::Pipeline { ref step, .. } if step == "split"), "{err}");
    assert!(err.to_string().contains("cover only 71.250s of 95.000s"), "{err}");
    assert_eq!(file_names(media.path()), vec!["clip.mp4"]);
    assert!(!stages.lock().unwrap().contains(&Stage::VideoTranscode));
}

#[tokio::test]
#[serial]
async fn test_segment_gap_fails_and_cleans_up() {
    let tools = FakeTools::new(FakeBehaviour {
        split_indices: vec![0, 2, 3],
        ..FakeBehaviour::default()
    });
    let media = tempfile::tempdir().unwrap();
    let input = source_file(media.path(), "clip.mp4");

    let (exec, stages) = executor(&tools);
    let err = exec.run(&input).await.unwrap_err();

    assert!(matches!(err, Error::Pipeline { ref step, .. } if step == "split"), "{err}");
    assert_eq!(file_names(media.path()), vec!["clip.mp4"]);
    assert!(!stages.lock().unwrap().contains(&Stage::VideoTranscode));
}

#[tokio::test]
#[serial]
async fn test_failed_segment_encode_removes_intermediates() {
    let tools = FakeTools::new(FakeBehaviour {
        fail_on: Some("_video_2_encoded".into()),
        ..FakeBehaviour::default()
    });
    let media = tempfile::tempdir().unwrap();
    let input = source_file(media.path(), "clip.mp4");

    let (exec, stages) = executor(&tools);
    let err = exec.run(&input).await.unwrap_err();

    assert!(matches!(err, Error::Tool { .. }), "{err}");
    assert!(err.to_string().contains("fake failure"), "{err}");
    assert_eq!(file_names(media.path()), vec!["clip.mp4"]);
    assert!(!stages.lock().unwrap().contains(&Stage::Concat));
}

#[tokio::test]
#[serial]
async fn test_failed_audio_encode_fails_run() {
    let tools = FakeTools::new(FakeBehaviour {
        fail_on: Some("_audio.ogg".into()),
        ..FakeBehaviour::default()
    });
    let media = tempfile::tempdir().unwrap();
    let input = source_file(media.path(), "clip.mp4");

    let (exec, stages) = executor(&tools);
    assert!(exec.run(&input).await.is_err());
    assert_eq!(file_names(media.path()), vec!["clip.mp4"]);
    assert!(!stages.lock().unwrap().contains(&Stage::Mux));
}

#[tokio::test]
#[serial]
async fn test_unparseable_duration_fails_before_split() {
    let tools = FakeTools::new(FakeBehaviour {
        duration: "N/A".into(),
        ..FakeBehaviour::default()
    });
    let media = tempfile::tempdir().unwrap();
    let input = source_file(media.path(), "clip.mp4");

    let (exec, _) = executor(&tools);
    let err = exec.run(&input).await.unwrap_err();

    assert!(matches!(err, Error::Parse(_)), "{err}");
    assert!(!tools.calls().iter().any(|c| c.contains("-f segment")));
    assert_eq!(file_names(media.path()), vec!["clip.mp4"]);
}

#[tokio::test]
#[serial]
async fn test_batch_processes_every_file() {
    let tools = FakeTools::new(FakeBehaviour::default());
    let media = tempfile::tempdir().unwrap();
    let files: Vec<PathBuf> = ["a.mp4", "b.mp4", "c.mkv"]
        .iter()
        .map(|n| source_file(media.path(), n))
        .collect();

    let ctx = PipelineContext::new(&tools.config()).unwrap();
    let report = run_batch(ctx, files, 2).await;

    assert!(report.is_success(), "{:?}", report.failed);
    assert_eq!(report.succeeded.len(), 3);
    assert_eq!(
        file_names(media.path()),
        vec!["a.mp4", "a.webm", "b.mp4", "b.webm", "c.mkv", "c.webm"]
    );
}

#[tokio::test]
#[serial]
async fn test_batch_continues_past_failures() {
    let tools = FakeTools::new(FakeBehaviour {
        fail_on: Some(".bad_".into()),
        ..FakeBehaviour::default()
    });
    let media = tempfile::tempdir().unwrap();
    let files = vec![
        source_file(media.path(), "bad.mp4"),
        source_file(media.path(), "good.mp4"),
    ];

    let ctx = PipelineContext::new(&tools.config()).unwrap();
    let report = run_batch(ctx, files, 1).await;

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, media.path().join("bad.mp4"));
    assert_eq!(report.succeeded.len(), 1);
    assert_eq!(
        file_names(media.path()),
        vec!["bad.mp4", "good.mp4", "good.webm"]
    );
}

#[tokio::test]
#[serial]
async fn test_audio_failure_stops_segment_encodes() {
    let tools = FakeTools::new(FakeBehaviour {
        fail_on: Some("_audio.ogg".into()),
        delay_on: Some(("_encoded".into(), 30)),
        ..FakeBehaviour::default()
    });
    let media = tempfile::tempdir().unwrap();
    let input = source_file(media.path(), "clip.mp4");

    let (exec, stages) = executor(&tools);
    let started = Instant::now();
    let err = exec.run(&input).await.unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(10), "{:?}", started.elapsed());
    assert!(err.to_string().contains("fake failure on _audio.ogg"), "{err}");
    assert!(!stages.lock().unwrap().contains(&Stage::Concat));
    assert_eq!(file_names(media.path()), vec!["clip.mp4"]);
}

#[tokio::test]
#[serial]
async fn test_matching_audio_stream_is_copied() {
    let tools = FakeTools::new(FakeBehaviour {
        audio_streams: vec![("opus".into(), "eng".into())],
        ..FakeBehaviour::default()
    });
    let mut config = tools.config();
    config
        .transcode
        .audio
        .skip_if
        .insert("codec_name".into(), "^opus$".into());
    let media = tempfile::tempdir().unwrap();
    let input = source_file(media.path(), "clip.mkv");

    let (exec, _) = executor_with(&config);
    exec.run(&input).await.unwrap();

    let audio: Vec<String> = tools
        .calls()
        .into_iter()
        .filter(|c| c.starts_with("ffmpeg ") && c.contains(" -vn "))
        .collect();
    assert_eq!(audio.len(), 1);
    assert!(audio[0].contains("-c:a copy -map 0:1 "), "{}", audio[0]);
    assert!(!audio[0].contains("libopus"));
}

#[tokio::test]
#[serial]
async fn test_preferred_audio_stream_is_encoded() {
    let tools = FakeTools::new(FakeBehaviour {
        audio_streams: vec![
            ("aac".into(), "eng".into()),
            ("ac3".into(), "jpn".into()),
        ],
        ..FakeBehaviour::default()
    });
    let mut config = tools.config();
    let audio = &mut config.transcode.audio;
    audio
        .selection_prefer
        .insert("tags.language".into(), "^jpn$".into());
    audio.selection_priority = vec!["tags.language".into()];
    let media = tempfile::tempdir().unwrap();
    let input = source_file(media.path(), "clip.mkv");

    let (exec, _) = executor_with(&config);
    exec.run(&input).await.unwrap();

    let calls = tools.calls();
    let audio: Vec<&String> = calls.iter().filter(|c| c.contains(" -vn ")).collect();
    assert_eq!(audio.len(), 1);
    assert!(audio[0].contains("libopus"));
    assert!(audio[0].contains("-map 0:2 "), "{}", audio[0]);
}

#[tokio::test]
#[serial]
async fn test_same_stem_sources_run_side_by_side() {
    let tools = FakeTools::new(FakeBehaviour::default());
    let media = tempfile::tempdir().unwrap();
    let mp4 = source_file(media.path(), "a.mp4");
    let mkv = source_file(media.path(), "a.mkv");

    let (to_webm, _) = executor(&tools);
    let mut config = tools.config();
    config.transcode.output_extension = ".mov".into();
    let (to_mov, _) = executor_with(&config);

    let (webm, mov) = tokio::join!(to_webm.run(&mp4), to_mov.run(&mkv));
    assert_eq!(webm.unwrap(), media.path().join("a.webm"));
    assert_eq!(mov.unwrap(), media.path().join("a.mov"));
    assert_eq!(
        file_names(media.path()),
        vec!["a.mkv", "a.mov", "a.mp4", "a.webm"]
    );
}

#[tokio::test]
#[serial]
async fn test_batch_rejects_sources_sharing_an_output() {
    let tools = FakeTools::new(FakeBehaviour::default());
    let media = tempfile::tempdir().unwrap();
    let files = vec![
        source_file(media.path(), "a.mp4"),
        source_file(media.path(), "a.mkv"),
        source_file(media.path(), "b.mp4"),
    ];

    let ctx = PipelineContext::new(&tools.config()).unwrap();
    let report = run_batch(ctx, files, 2).await;

    let succeeded: Vec<_> = report.succeeded.iter().map(|(f, _)| f.clone()).collect();
    assert_eq!(
        succeeded,
        vec![media.path().join("a.mp4"), media.path().join("b.mp4")]
    );
    assert_eq!(report.failed.len(), 1);
    let (file, err) = &report.failed[0];
    assert_eq!(file, &media.path().join("a.mkv"));
    assert!(matches!(err, Error::Validation(_)), "{err}");
    assert!(!tools.calls().iter().any(|c| c.contains("a.mkv")));
    assert_eq!(
        file_names(media.path()),
        vec!["a.mkv", "a.mp4", "a.webm", "b.mp4", "b.webm"]
    );
}
