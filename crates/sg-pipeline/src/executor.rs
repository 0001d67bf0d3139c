//! Pipeline executor: transcodes one source file end to end.
//!
//! The run is a fixed sequence of [`Stage`]s:
//!
//! 1. dispatch the audio encode to the worker pool (if the source has audio)
//! 2. split the video into segments
//! 3. encode every segment on the pool, in parallel with the audio
//! 4. concat the encoded segments
//! 5. wait for the audio, then mux it with the video
//!
//! Intermediates are deleted as soon as the next stage has consumed them.
//! A failing audio encode stops the video stages right away. On failure or
//! cancellation the audio job is aborted and every intermediate still on
//! disk is removed; the source is never touched.

use std::future::Future;
use std::path::{Path, PathBuf};

use sg_av::{
    concat, encode_audio, encode_video, mux, naming, remux_video_only, Workspace,
    AUDIO_COPY_FLAGS,
};
use sg_core::{Error, Result, SourceFile};

use crate::context::{PipelineContext, Stage};
use crate::pool::{PoolHandle, WorkerPool};
use crate::segmenter;

/// Runs the split / encode / concat / mux pipeline for single files.
#[derive(Debug, Clone)]
pub struct PipelineExecutor {
    ctx: PipelineContext,
}

impl PipelineExecutor {
    pub fn new(ctx: PipelineContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &PipelineContext {
        &self.ctx
    }

    /// Transcode `source` and return the path of the final output, which is
    /// written next to the source as `<stem><output_extension>`.
    ///
    /// # Errors
    ///
    /// - [`Error::FileNotFound`] / [`Error::NotARegularFile`] for a bad source.
    /// - [`Error::Validation`] when the output would overwrite the source.
    /// - Any tool or pipeline error from the stages; intermediates are
    ///   removed before it is returned.
    pub async fn run(&self, source: &Path) -> Result<PathBuf> {
        let source = SourceFile::open(source)?;
        let settings = &self.ctx.settings;
        let mut workspace = Workspace::new(
            source.clone(),
            settings.output_extension.as_str(),
            settings.audio_extension.as_str(),
        );
        if workspace.output() == source.path() {
            return Err(Error::Validation(format!(
                "output extension {} would overwrite the source {}",
                settings.output_extension,
                source.path().display()
            )));
        }

        // Child token: stopping this run's tools leaves sibling runs alone.
        let ctx = self
            .ctx
            .clone()
            .with_cancellation(self.ctx.cancellation.child_token());

        enter(&ctx, Stage::Start, &source)?;
        let mut audio_job = None;
        let result = run_stages(&ctx, &mut workspace, &mut audio_job).await;

        if let Err(ref e) = result {
            tracing::error!("transcode of {} failed: {e}", source.path().display());
            if let Some(job) = audio_job.take() {
                job.cancel().await;
            }
            workspace.cleanup();
        }
        result
    }
}

async fn run_stages(
    ctx: &PipelineContext,
    workspace: &mut Workspace,
    audio_job: &mut Option<PoolHandle<PathBuf>>,
) -> Result<PathBuf> {
    let settings = &ctx.settings;
    let source = workspace.source().clone();
    let pool = WorkerPool::new(settings.parallelism);

    let streams = ctx.inspector.probe_streams(source.path()).await?;
    match settings.audio_rules.select(&streams) {
        Some(stream) => {
            enter(ctx, Stage::AudioDispatched, &source)?;
            let flags = if settings.audio_rules.is_skippable(stream) {
                tracing::info!(
                    "audio stream {} ({}) already matches; copying it",
                    stream.index,
                    stream.codec_name()
                );
                AUDIO_COPY_FLAGS.iter().map(|f| f.to_string()).collect::<Vec<_>>()
            } else {
                settings.audio_flags.clone()
            };
            let index = stream.index;
            let audio = workspace.audio();
            let tools = ctx.tools.clone();
            let opts = ctx.encode_options();
            let input = source.path().to_path_buf();
            *audio_job = Some(pool.spawn(async move {
                encode_audio(&tools, &opts, &input, &audio, Some(index), &flags).await
            }));
        }
        None => {
            tracing::info!(
                "{} has no audio stream; skipping audio encode",
                source.path().display()
            );
        }
    }

    enter(ctx, Stage::VideoSplit, &source)?;
    let segments = race_audio(
        ctx,
        audio_job,
        segmenter::split(ctx, workspace, settings.parallelism),
    )
    .await?;

    enter(ctx, Stage::VideoTranscode, &source)?;
    let planned = segments
        .iter()
        .map(|s| naming::encoded_segment_path(s, &settings.output_extension))
        .collect::<Result<Vec<_>>>()?;
    workspace.track_all(planned);
    let transcode = pool.map(segments.iter().cloned(), |segment| {
        let tools = ctx.tools.clone();
        let opts = ctx.encode_options();
        let ext = settings.output_extension.clone();
        let flags = settings.video_flags.clone();
        async move { encode_video(&tools, &opts, &segment, &ext, &flags).await }
    });
    let encoded = race_audio(ctx, audio_job, transcode).await?;

    enter(ctx, Stage::CleanupSegments, &source)?;
    workspace.release(segments)?;

    enter(ctx, Stage::Concat, &source)?;
    let expected = workspace.concat();
    let video = concat(&ctx.tools, &ctx.copy_options(), &encoded, &settings.output_extension)
        .await?;
    if video != expected {
        workspace.track(video.clone());
    }

    enter(ctx, Stage::CleanupTranscodedSegments, &source)?;
    workspace.release(encoded)?;

    let (output, consumed) = match audio_job.take() {
        Some(job) => {
            enter(ctx, Stage::AwaitAudio, &source)?;
            let audio = job.join().await?;
            enter(ctx, Stage::Mux, &source)?;
            let output = mux(&ctx.tools, &ctx.copy_options(), &video, &audio).await?;
            (output, vec![video, audio])
        }
        None => {
            enter(ctx, Stage::Mux, &source)?;
            let output = remux_video_only(&ctx.tools, &ctx.copy_options(), &video).await?;
            (output, vec![video])
        }
    };

    enter(ctx, Stage::CleanupVideoAndAudio, &source)?;
    workspace.release(consumed)?;

    enter(ctx, Stage::Done, &source)?;
    tracing::info!("{} -> {}", source.path().display(), output.display());
    Ok(output)
}

/// Drive `work` while watching the audio job.
///
/// If the audio encode fails first, the run's tools are stopped, `work` is
/// driven until its processes have exited, and the audio error is returned.
async fn race_audio<T>(
    ctx: &PipelineContext,
    audio_job: &mut Option<PoolHandle<PathBuf>>,
    work: impl Future<Output = Result<T>>,
) -> Result<T> {
    let Some(job) = audio_job.as_mut() else {
        return work.await;
    };
    tokio::pin!(work);
    tokio::select! {
        result = &mut work => result,
        err = job.failure() => {
            tracing::warn!("audio encode failed; stopping video work: {err}");
            ctx.cancellation.cancel();
            let _ = work.await;
            Err(err)
        }
    }
}

/// Report `stage` and stop if the run has been cancelled.
fn enter(ctx: &PipelineContext, stage: Stage, source: &SourceFile) -> Result<()> {
    if ctx.cancellation.is_cancelled() {
        tracing::info!("transcode of {} cancelled", source.path().display());
        return Err(Error::pipeline(stage.as_str(), "cancelled"));
    }
    tracing::info!(stage = %stage, "{}", source.path().display());
    ctx.observer.notify(stage, source.path());
    Ok(())
}
