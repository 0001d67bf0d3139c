//! Source discovery for batch runs.

use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

/// Which files under a directory are transcode sources.
#[derive(Debug, Clone, Default)]
pub struct SourceFilter {
    /// Lower-cased extensions without the dot; empty accepts any.
    extensions: Vec<String>,
    /// Extension of the pipeline's output (lower-cased, no dot). Files that
    /// already have it are skipped since they could not be transcoded in
    /// place.
    output_extension: Option<String>,
}

impl SourceFilter {
    pub fn new(extensions: &[String], output_extension: &str) -> Self {
        let output = normalize(output_extension);
        Self {
            extensions: extensions.iter().map(|e| normalize(e)).collect(),
            output_extension: (!output.is_empty()).then_some(output),
        }
    }

    /// Whether `path` should be transcoded.
    pub fn accepts(&self, path: &Path) -> bool {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if self.output_extension.as_deref() == Some(ext.as_str()) {
            return false;
        }
        self.extensions.is_empty() || self.extensions.iter().any(|e| *e == ext)
    }
}

fn normalize(ext: &str) -> String {
    ext.trim_start_matches('.').to_lowercase()
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
}

/// Recursively list the regular files under `root` that `filter` accepts,
/// skipping hidden files and directories (which includes every pipeline
/// intermediate). The result is sorted.
pub fn discover_sources(root: &Path, filter: &SourceFilter) -> sg_core::Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(sg_core::Error::Validation(format!(
            "{} is not a directory",
            root.display()
        )));
    }

    let mut sources = Vec::new();
    for entry in WalkDir::new(root).into_iter().filter_entry(|e| !is_hidden(e)) {
        let entry = entry.map_err(std::io::Error::from)?;
        if entry.file_type().is_file() && filter.accepts(entry.path()) {
            sources.push(entry.into_path());
        }
    }
    sources.sort();
    tracing::debug!("found {} source(s) under {}", sources.len(), root.display());
    Ok(sources)
}
