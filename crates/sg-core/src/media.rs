//! Source media files and path decomposition.

use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// An existing regular file, addressed by an absolute path and decomposed
/// into directory, stem and extension.
///
/// The source is only ever read; every artifact derived from it is named
/// from [`stem`](Self::stem) so that runs over different sources never share
/// intermediate file names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    path: PathBuf,
    dir: PathBuf,
    stem: String,
    extension: String,
}

impl SourceFile {
    /// Resolve `path` to an absolute path and check that it is a regular file.
    ///
    /// # Errors
    ///
    /// - [`Error::FileNotFound`] if nothing exists at the path.
    /// - [`Error::NotARegularFile`] for directories and other special files.
    pub fn open(path: &Path) -> Result<Self> {
        let path = absolute(path)?;
        let meta = match std::fs::metadata(&path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::FileNotFound { path });
            }
            Err(e) => return Err(e.into()),
        };
        if !meta.is_file() {
            return Err(Error::NotARegularFile { path });
        }

        let (dir, stem, extension) = split_path(&path)?;
        Ok(Self {
            path,
            dir,
            stem,
            extension,
        })
    }

    /// Absolute path of the source.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory holding the source (and every intermediate of its run).
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name without extension.
    pub fn stem(&self) -> &str {
        &self.stem
    }

    /// Extension including the leading dot, or empty.
    pub fn extension(&self) -> &str {
        &self.extension
    }
}

/// Make `path` absolute against the current directory without touching
/// symlinks.
pub fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// Split a path into `(directory, stem, extension)`; the extension keeps its
/// leading dot and is empty when the file has none.
pub fn split_path(path: &Path) -> Result<(PathBuf, String, String)> {
    let dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .ok_or_else(|| Error::Validation(format!("no file name in {}", path.display())))?;
    let extension = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    Ok((dir, stem, extension))
}

/// Join a directory, stem and dotted extension back into a path.
pub fn join_path(dir: &Path, stem: &str, extension: &str) -> PathBuf {
    dir.join(format!("{stem}{extension}"))
}
