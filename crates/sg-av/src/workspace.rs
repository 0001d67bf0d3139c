//! Intermediate-file lifecycle for one pipeline run.
//!
//! A [`Workspace`] owns every intermediate file a run creates next to its
//! source. Files are registered before the tool that writes them runs,
//! released (deleted) as soon as the next stage has consumed them, and any
//! that remain when the workspace is dropped are deleted then, so a failed
//! or cancelled run leaves nothing behind.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use sg_core::SourceFile;

use crate::naming;

/// Tracks the intermediates of a single run over one [`SourceFile`].
///
/// # Example
///
/// ```no_run
/// use sg_av::Workspace;
/// use sg_core::SourceFile;
///
/// let source = SourceFile::open(std::path::Path::new("/media/clip.mp4")).unwrap();
/// let mut workspace = Workspace::new(source, ".webm", ".ogg");
/// let audio = workspace.audio();
/// // ... run the audio encode, consume the file ...
/// workspace.release([audio]).unwrap();
/// ```
#[derive(Debug)]
pub struct Workspace {
    source: SourceFile,
    output_extension: String,
    audio_extension: String,
    tracked: BTreeSet<PathBuf>,
}

impl Workspace {
    /// Create a workspace for `source`.
    pub fn new(
        source: SourceFile,
        output_extension: impl Into<String>,
        audio_extension: impl Into<String>,
    ) -> Self {
        Self {
            source,
            output_extension: output_extension.into(),
            audio_extension: audio_extension.into(),
            tracked: BTreeSet::new(),
        }
    }

    /// The source this run reads from.
    pub fn source(&self) -> &SourceFile {
        &self.source
    }

    /// Extension of transcoded segments and the final output.
    pub fn output_extension(&self) -> &str {
        &self.output_extension
    }

    /// Extension of the transcoded audio.
    pub fn audio_extension(&self) -> &str {
        &self.audio_extension
    }

    /// Where the final output will be written. Not tracked.
    pub fn output(&self) -> PathBuf {
        naming::output_path(&self.source, &self.output_extension)
    }

    /// Register and return the transcoded audio path.
    pub fn audio(&mut self) -> PathBuf {
        let path = naming::audio_path(&self.source, &self.audio_extension);
        self.track(path.clone());
        path
    }

    /// Register and return the concatenated video path.
    pub fn concat(&mut self) -> PathBuf {
        let path = naming::concat_path(&self.source, &self.output_extension);
        self.track(path.clone());
        path
    }

    /// Register a file for deletion when the run ends.
    pub fn track(&mut self, path: PathBuf) {
        self.tracked.insert(path);
    }

    /// Register several files.
    pub fn track_all(&mut self, paths: impl IntoIterator<Item = PathBuf>) {
        self.tracked.extend(paths);
    }

    /// Whether `path` is currently registered.
    pub fn is_tracked(&self, path: &Path) -> bool {
        self.tracked.contains(path)
    }

    /// Delete `paths` now and stop tracking them. Missing files are fine.
    ///
    /// # Errors
    ///
    /// Returns the first deletion failure; paths that failed stay tracked
    /// so the drop sweep retries them.
    pub fn release(&mut self, paths: impl IntoIterator<Item = PathBuf>) -> sg_core::Result<()> {
        let mut first_error = None;
        for path in paths {
            match remove_if_exists(&path) {
                Ok(()) => {
                    self.tracked.remove(&path);
                }
                Err(e) => {
                    tracing::warn!("failed to remove {}: {e}", path.display());
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Delete every tracked file that still exists.
    pub fn cleanup(&mut self) {
        let leftovers = std::mem::take(&mut self.tracked);
        for path in leftovers {
            match remove_if_exists(&path) {
                Ok(()) => tracing::debug!("removed {}", path.display()),
                Err(e) => tracing::warn!("failed to remove {}: {e}", path.display()),
            }
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if !self.tracked.is_empty() {
            self.cleanup();
        }
    }
}

fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
