//! File-backed session memory, one JSON document per session id.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use intake_core::{ApplicationError, SessionId, SessionMemory};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("failed to create session directory `{path}`: {source}")]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("failed to write session file `{path}`: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("failed to replace session file `{path}`: {source}")]
    Replace { path: PathBuf, source: io::Error },
    #[error("failed to remove session file `{path}`: {source}")]
    Remove { path: PathBuf, source: io::Error },
    #[error("failed to serialize session memory: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl From<SessionStoreError> for ApplicationError {
    fn from(value: SessionStoreError) -> Self {
        Self::Persistence(value.to_string())
    }
}

#[derive(Clone, Debug)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, session_id: &SessionId) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(session_id.as_str())))
    }

    /// Missing, unreadable and corrupt files all mean "no memory".
    pub fn load(&self, session_id: &SessionId) -> Option<SessionMemory> {
        let path = self.path_for(session_id);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return None,
            Err(error) => {
                warn!(
                    event_name = "intake.session.unreadable",
                    session_id = %session_id.as_str(),
                    path = %path.display(),
                    error = %error,
                    "session file could not be read; starting fresh"
                );
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(SessionMemory::from_value(value)),
            Err(error) => {
                warn!(
                    event_name = "intake.session.corrupt",
                    session_id = %session_id.as_str(),
                    path = %path.display(),
                    error = %error,
                    "session file is not valid JSON; starting fresh"
                );
                None
            }
        }
    }

    /// Writes through a sibling `.tmp` file and renames it into place.
    pub fn save(
        &self,
        session_id: &SessionId,
        memory: &SessionMemory,
    ) -> Result<PathBuf, SessionStoreError> {
        fs::create_dir_all(&self.dir)
            .map_err(|source| SessionStoreError::CreateDir { path: self.dir.clone(), source })?;

        let path = self.path_for(session_id);
        let tmp_path = temporary_sibling(&path);
        let mut document = serde_json::to_string_pretty(&memory.to_value())?;
        document.push('\n');

        fs::write(&tmp_path, document)
            .map_err(|source| SessionStoreError::Write { path: tmp_path.clone(), source })?;
        fs::rename(&tmp_path, &path)
            .map_err(|source| SessionStoreError::Replace { path: path.clone(), source })?;

        Ok(path)
    }

    /// Returns whether a stored file was removed.
    pub fn clear(&self, session_id: &SessionId) -> Result<bool, SessionStoreError> {
        let path = self.path_for(session_id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(SessionStoreError::Remove { path, source }),
        }
    }
}

/// Keeps `[A-Za-z0-9_.-]`; everything else becomes `_`.
pub fn file_stem(session_id: &str) -> String {
    let stem: String = session_id
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '-') {
                ch
            } else {
                '_'
            }
        })
        .collect();

    if stem.is_empty() {
        "_".to_string()
    } else {
        stem
    }
}

fn temporary_sibling(path: &Path) -> PathBuf {
    let mut raw = OsString::from(path.as_os_str());
    raw.push(".tmp");
    PathBuf::from(raw)
}
