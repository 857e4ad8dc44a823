//! A temporary file location for records written during a check.
use std::io;
use std::path::{Path, PathBuf};

use snafu::ResultExt;
use tempfile::TempDir;

use super::record::SyntheticRecord;
use crate::error::{RemoveFileSnafu, SaveError, ScratchDirSnafu};

const FILE_NAME: &str = "record.dcm";

/// A `.dcm` path inside a private temporary directory.
///
/// The file does not exist until a record is saved to it,
/// and everything is removed when the value is dropped.
#[derive(Debug)]
pub struct ScratchFile {
    dir: TempDir,
    path: PathBuf,
}

impl ScratchFile {
    pub fn new() -> Result<Self, SaveError> {
        let dir = tempfile::Builder::new()
            .prefix("dcmread-")
            .tempdir()
            .context(ScratchDirSnafu)?;
        let path = dir.path().join(FILE_NAME);
        Ok(ScratchFile { dir, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn save(&self, record: &SyntheticRecord) -> Result<(), SaveError> {
        record.save(&self.path)
    }

    /// Build the default record, write it here and hand it back.
    pub fn create_default(&self) -> Result<SyntheticRecord, SaveError> {
        let record = SyntheticRecord::new();
        self.save(&record)?;
        Ok(record)
    }

    /// Delete the file if it was written.
    pub fn remove(&self) -> Result<(), SaveError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).context(RemoveFileSnafu {
                filename: &self.path,
            }),
        }
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if let Err(e) = self.remove() {
            log::warn!("{e}");
        }
    }
}
