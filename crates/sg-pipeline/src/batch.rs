//! Transcoding many files with a bounded outer pool.
//!
//! Each file is one outer job; inside it the executor runs its own inner
//! pool for the audio and segment encodes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use sg_core::media::{absolute, join_path, split_path};
use sg_core::Error;

use crate::context::PipelineContext;
use crate::executor::PipelineExecutor;
use crate::pool::WorkerPool;

/// Per-file outcome of [`run_batch`], in input order.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// `(source, output)` for every file that finished.
    pub succeeded: Vec<(PathBuf, PathBuf)>,
    /// `(source, error)` for every file that failed.
    pub failed: Vec<(PathBuf, Error)>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Transcode `files`, at most `concurrency` at a time.
///
/// A failing file does not stop the others; its error is logged and
/// recorded in the report. When several files would write the same output
/// (`a.mp4` and `a.mkv` both become `a.webm`), only the first is
/// transcoded and the rest fail with [`Error::Validation`].
pub async fn run_batch(ctx: PipelineContext, files: Vec<PathBuf>, concurrency: usize) -> BatchReport {
    let pool = WorkerPool::new(concurrency);
    tracing::info!(
        "transcoding {} file(s), {} at a time",
        files.len(),
        pool.size()
    );

    let mut claimed: HashMap<PathBuf, PathBuf> = HashMap::new();
    let jobs: Vec<_> = files
        .into_iter()
        .map(|file| {
            if let Some(output) = planned_output(&file, &ctx.settings.output_extension) {
                if let Some(owner) = claimed.get(&output) {
                    let err = Error::Validation(format!(
                        "{} would also be written by {}",
                        output.display(),
                        owner.display()
                    ));
                    return (file, Err(err));
                }
                claimed.insert(output, file.clone());
            }
            let executor = PipelineExecutor::new(ctx.clone());
            let source = file.clone();
            (file, Ok(pool.spawn(async move { executor.run(&source).await })))
        })
        .collect();

    let mut report = BatchReport::default();
    for (file, job) in jobs {
        let outcome = match job {
            Ok(job) => job.join().await,
            Err(e) => Err(e),
        };
        match outcome {
            Ok(output) => report.succeeded.push((file, output)),
            Err(e) => {
                tracing::error!("{}: {e}", file.display());
                report.failed.push((file, e));
            }
        }
    }
    report
}

/// Where a run over `file` would write its output.
fn planned_output(file: &Path, output_extension: &str) -> Option<PathBuf> {
    let path = absolute(file).ok()?;
    let (dir, stem, _) = split_path(&path).ok()?;
    Some(join_path(&dir, &stem, output_extension))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sg_core::config::Config;

    #[tokio::test]
    async fn failures_are_collected_per_file() {
        let Ok(ctx) = PipelineContext::new(&Config::default()) else {
            return;
        };
        let tmp = tempfile::tempdir().unwrap();
        let files = vec![tmp.path().join("a.mp4"), tmp.path().join("b.mp4")];

        let report = run_batch(ctx, files.clone(), 2).await;
        assert!(!report.is_success());
        assert!(report.succeeded.is_empty());
        let failed: Vec<_> = report.failed.iter().map(|(f, _)| f.clone()).collect();
        assert_eq!(failed, files);
        assert!(report
            .failed
            .iter()
            .all(|(_, e)| matches!(e, Error::FileNotFound { .. })));
    }

    #[test]
    fn planned_output_ignores_source_extension() {
        assert_eq!(
            planned_output(Path::new("/m/a.mp4"), ".webm"),
            planned_output(Path::new("/m/a.mkv"), ".webm")
        );
        assert_ne!(
            planned_output(Path::new("/m/a.mp4"), ".webm"),
            planned_output(Path::new("/n/a.mp4"), ".webm")
        );
    }

    #[test]
    fn empty_report_is_success() {
        assert!(BatchReport::default().is_success());
    }
}
