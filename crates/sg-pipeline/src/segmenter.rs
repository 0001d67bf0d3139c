//! Cut the source's video into roughly equal segments.

use std::path::PathBuf;

use sg_av::{naming, split_video, Workspace};
use sg_core::{Error, Result, SegmentPlan, SourceFile};

use crate::context::PipelineContext;

const STEP: &str = "split";

/// Probe the source, plan the cut, run the split and return the segment
/// paths in index order.
///
/// Every path the split may write is registered with `workspace` before
/// ffmpeg runs, so a failed split leaves nothing behind.
///
/// The segment muxer cuts on keyframes, so it can produce fewer segments
/// than planned when the last cut point falls past the end. A shortfall at
/// the end is accepted only when the segments that exist still cover the
/// source's duration; see [`collect_segments`] for the other checks.
pub async fn split(
    ctx: &PipelineContext,
    workspace: &mut Workspace,
    target_count: usize,
) -> Result<Vec<PathBuf>> {
    let source = workspace.source().clone();
    let duration = ctx.inspector.probe_duration(source.path()).await?;
    let plan = SegmentPlan::compute(duration, target_count, ctx.settings.min_segment_secs)?;
    tracing::info!(
        "splitting {} ({duration:.3}s) into {} x {}s segments",
        source.path().display(),
        plan.segment_count,
        plan.unit_duration
    );

    workspace.track_all((0..plan.segment_count).map(|i| naming::segment_path(&source, i)));
    let split = split_video(
        &ctx.tools,
        &ctx.copy_options(),
        source.path(),
        &naming::segment_pattern(&source),
        plan.unit_duration,
    )
    .await;
    track_overflow(workspace, &source, plan.segment_count);
    split?;

    let segments = collect_segments(&source, &plan)?;
    if segments.len() < plan.segment_count {
        check_coverage(ctx, &segments, duration, &plan).await?;
    }
    Ok(segments)
}

/// Fail unless `segments` add up to (nearly) `duration` seconds.
async fn check_coverage(
    ctx: &PipelineContext,
    segments: &[PathBuf],
    duration: f64,
    plan: &SegmentPlan,
) -> Result<()> {
    let mut covered = 0.0;
    for segment in segments {
        covered += ctx.inspector.probe_duration(segment).await?;
    }
    if covered + coverage_slack(duration) < duration {
        return Err(Error::pipeline(
            STEP,
            format!(
                "{} of {} planned segments cover only {covered:.3}s of {duration:.3}s",
                segments.len(),
                plan.segment_count
            ),
        ));
    }
    tracing::debug!(
        "{} of {} planned segments cover {covered:.3}s of {duration:.3}s",
        segments.len(),
        plan.segment_count
    );
    Ok(())
}

/// How far the summed segment durations may fall short of the source.
fn coverage_slack(duration: f64) -> f64 {
    (duration * 0.01).max(1.0)
}

/// Register any segments written past the planned count.
fn track_overflow(workspace: &mut Workspace, source: &SourceFile, planned: usize) {
    let mut index = planned;
    loop {
        let path = naming::segment_path(source, index);
        if !path.is_file() {
            break;
        }
        workspace.track(path);
        index += 1;
    }
}

/// The segments the split actually produced.
///
/// # Errors
///
/// [`Error::Pipeline`] when no segment exists, when a segment is missing
/// while a later one exists, or when more segments exist than planned. A
/// shortfall at the end is returned as is.
pub fn collect_segments(source: &SourceFile, plan: &SegmentPlan) -> Result<Vec<PathBuf>> {
    let paths: Vec<PathBuf> = (0..plan.segment_count)
        .map(|i| naming::segment_path(source, i))
        .collect();
    let found = paths.iter().take_while(|p| p.is_file()).count();

    if found == 0 {
        return Err(Error::pipeline(STEP, "no segments were produced"));
    }
    if let Some(later) = paths[found..].iter().position(|p| p.is_file()) {
        return Err(Error::pipeline(
            STEP,
            format!(
                "segment {found} is missing but segment {} exists",
                found + later
            ),
        ));
    }
    if naming::segment_path(source, plan.segment_count).is_file() {
        return Err(Error::pipeline(
            STEP,
            format!("more than the planned {} segments were produced", plan.segment_count),
        ));
    }
    let mut paths = paths;
    paths.truncate(found);
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    fn source(dir: &Path) -> SourceFile {
        let path = dir.join("clip.mp4");
        fs::write(&path, b"src").unwrap();
        SourceFile::open(&path).unwrap()
    }

    fn write_segments(src: &SourceFile, indices: &[usize]) {
        for &i in indices {
            fs::write(naming::segment_path(src, i), b"seg").unwrap();
        }
    }

    fn plan(count: usize) -> SegmentPlan {
        SegmentPlan {
            unit_duration: 24,
            segment_count: count,
        }
    }

    #[test]
    fn all_planned_segments() {
        let tmp = tempfile::tempdir().unwrap();
        let src = source(tmp.path());
        write_segments(&src, &[0, 1, 2, 3]);

        let segs = collect_segments(&src, &plan(4)).unwrap();
        assert_eq!(segs.len(), 4);
        assert_eq!(segs[3], naming::segment_path(&src, 3));
    }

    #[test]
    fn trailing_shortfall_is_accepted() {
        let tmp = tempfile::tempdir().unwrap();
        let src = source(tmp.path());
        write_segments(&src, &[0, 1, 2]);

        let segs = collect_segments(&src, &plan(4)).unwrap();
        assert_eq!(segs.len(), 3);
    }

    #[test]
    fn slack_grows_with_long_sources() {
        assert_eq!(coverage_slack(95.0), 1.0);
        assert_eq!(coverage_slack(7200.0), 72.0);
    }

    #[test]
    fn gap_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let src = source(tmp.path());
        write_segments(&src, &[0, 2, 3]);

        let err = collect_segments(&src, &plan(4)).unwrap_err();
        assert!(err.to_string().contains("segment 1 is missing"), "{err}");
    }

    #[test]
    fn nothing_produced_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let src = source(tmp.path());

        let err = collect_segments(&src, &plan(4)).unwrap_err();
        assert!(matches!(err, Error::Pipeline { .. }));
    }

    #[test]
    fn overflow_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let src = source(tmp.path());
        write_segments(&src, &[0, 1, 2, 3, 4]);

        let err = collect_segments(&src, &plan(4)).unwrap_err();
        assert!(err.to_string().contains("planned 4"), "{err}");
    }

    #[test]
    fn overflow_segments_are_tracked_for_cleanup() {
        let tmp = tempfile::tempdir().unwrap();
        let src = source(tmp.path());
        write_segments(&src, &[0, 1, 2, 3, 4, 5]);

        let mut ws = Workspace::new(src.clone(), ".webm", ".ogg");
        track_overflow(&mut ws, &src, 4);
        assert!(!ws.is_tracked(&naming::segment_path(&src, 3)));
        assert!(ws.is_tracked(&naming::segment_path(&src, 4)));
        assert!(ws.is_tracked(&naming::segment_path(&src, 5)));
        drop(ws);
        assert!(!naming::segment_path(&src, 5).exists());
        assert!(naming::segment_path(&src, 3).exists());
    }
}
