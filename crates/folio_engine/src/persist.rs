use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("output directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("destination has no file name: {0}")]
    InvalidTarget(PathBuf),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Ensure output directory exists; create if missing.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::OutputDir(format!(
                "{} is not a directory",
                dir.display()
            )));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    }
    // Basic writability probe: try creating a temp file.
    NamedTempFile::new_in(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    Ok(())
}

/// Atomically write content to `{dir}/{filename}` by writing a temp file then renaming.
///
/// The temp file lives in the destination directory so the rename never
/// crosses filesystems; on any error it is deleted when dropped.
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Writer for the directory holding `target`, plus the file name to write.
    pub fn for_target(target: &Path) -> Result<(Self, String), PersistError> {
        let filename = target
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| PersistError::InvalidTarget(target.to_path_buf()))?
            .to_string();
        let dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Ok((Self::new(dir), filename))
    }

    pub fn write(&self, filename: &str, content: &[u8]) -> Result<PathBuf, PersistError> {
        ensure_output_dir(&self.dir)?;

        let target = self.dir.join(filename);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content)?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;

        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }
}

/// Writes `content` to `target` through an [`AtomicFileWriter`].
pub fn write_atomically(target: &Path, content: &[u8]) -> Result<PathBuf, PersistError> {
    let (writer, filename) = AtomicFileWriter::for_target(target)?;
    writer.write(&filename, content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_file_name_targets_current_dir() {
        let (writer, name) = AtomicFileWriter::for_target(Path::new("article.pdf")).unwrap();
        assert_eq!(writer.dir, PathBuf::from("."));
        assert_eq!(name, "article.pdf");
    }

    #[test]
    fn target_without_file_name_is_rejected() {
        let err = AtomicFileWriter::for_target(Path::new("/")).err().unwrap();
        assert!(matches!(err, PersistError::InvalidTarget(_)));
    }
}
