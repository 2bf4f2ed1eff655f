use std::{fmt, io, path::PathBuf};

use crate::types::Collection;

#[derive(Debug)]
pub enum BackupError {
    IoError(io::Error),
    /// The file is not a backup document: invalid JSON or wrong shape.
    Malformed(serde_json::Error),
    SerdeError(serde_json::Error),
}

impl fmt::Display for BackupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackupError::IoError(e) => write!(f, "cannot access backup file: {e}"),
            BackupError::Malformed(e) => write!(f, "invalid backup file: {e}"),
            BackupError::SerdeError(e) => write!(f, "cannot serialize backup: {e}"),
        }
    }
}

impl std::error::Error for BackupError {}

impl From<io::Error> for BackupError {
    fn from(err: io::Error) -> Self {
        BackupError::IoError(err)
    }
}

/// Reads and writes backup files.
pub struct BackupManager {
    path: PathBuf,
}

impl BackupManager {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Reads and parses the backup file.
    ///
    /// # Errors
    ///
    /// [`BackupError::IoError`] when the file cannot be read, [`BackupError::Malformed`]
    /// when it is not a backup document.
    pub async fn load(&self) -> Result<Collection, BackupError> {
        let content = async_fs::read_to_string(&self.path).await?;
        parse_backup(&content)
    }

    /// Writes `collection` as JSON, creating parent directories as needed.
    pub async fn save(&self, collection: &Collection) -> Result<(), BackupError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            async_fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string(collection).map_err(BackupError::SerdeError)?;
        async_fs::write(&self.path, json).await?;
        Ok(())
    }
}

/// Parses a backup document.
///
/// Only the document structure is checked here. Individual entries with bad
/// ids, uris or names are left for the reconciliation engine to skip.
pub fn parse_backup(content: &str) -> Result<Collection, BackupError> {
    serde_json::from_str(content).map_err(BackupError::Malformed)
}
