//! Output emission — atomic file writes and a manifest of what was written.
//!
//! Every output goes to a temporary file in the destination directory and
//! is renamed into place only after the writer succeeds, so a concurrent
//! reader sees either the previous file or the complete new one.

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::debug;
use tempfile::NamedTempFile;

use crate::error::Result;

/// Manifest of files written by one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct GeneratedFiles {
    pub files: Vec<GeneratedFile>,
}

/// A single written output.
#[derive(Debug, Clone)]
pub struct GeneratedFile {
    pub path: PathBuf,
    pub kind: ArtifactKind,
    pub bytes: u64,
}

/// The kind of output artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Coefficients,
    Estimates,
    Rmsre,
    Aggregated,
    ScatterPlot,
    RmsrePlot,
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Coefficients => write!(f, "coefficients"),
            Self::Estimates => write!(f, "estimates"),
            Self::Rmsre => write!(f, "rmsre"),
            Self::Aggregated => write!(f, "aggregated"),
            Self::ScatterPlot => write!(f, "plot-3d"),
            Self::RmsrePlot => write!(f, "plot-rmsre"),
        }
    }
}

impl GeneratedFiles {
    /// Record a file that has just been written.
    pub fn record(&mut self, path: &Path, kind: ArtifactKind) -> Result<()> {
        let bytes = std::fs::metadata(path)?.len();
        self.files.push(GeneratedFile {
            path: path.to_path_buf(),
            kind,
            bytes,
        });
        Ok(())
    }
}

/// Write `path` atomically: fill a sibling temporary file, then rename.
///
/// On error the temporary file is removed and `path` is left untouched.
pub fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut dyn Write) -> Result<()>,
{
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        write(&mut writer)?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    debug!("wrote {}", path.display());
    Ok(())
}

/// Atomically write a string.
pub fn write_string_atomic(path: &Path, content: &str) -> Result<()> {
    write_atomic(path, |w| {
        w.write_all(content.as_bytes())?;
        Ok(())
    })
}
