// Error taxonomy shared by the library index, playlist store and playback
// Listing calls swallow these into empty results; everything else returns them

use crate::audio::PlaybackState;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unsupported media type: {}", .0.display())]
    UnsupportedMedia(PathBuf),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("playback failed: {0}")]
    Playback(String),

    #[error("cannot {operation} while {state:?}")]
    InvalidState {
        operation: &'static str,
        state: PlaybackState,
    },
}

/// Storage-level failures, all surfaced as `Error::Persistence`.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("database statement failed: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("playlist '{0}' already exists")]
    DuplicatePlaylist(String),

    #[error("playlist '{0}' does not exist")]
    NoSuchPlaylist(String),

    #[error("'{0}' is not a valid playlist identifier (letters, digits and underscores only)")]
    InvalidIdentifier(String),

    #[error("path is not valid UTF-8: {}", .0.display())]
    NonUtf8Path(PathBuf),

    #[error("storage call timed out after {0:?}")]
    Timeout(Duration),

    #[error("storage worker failed: {0}")]
    Worker(String),
}

impl Error {
    pub fn filesystem(path: impl AsRef<Path>, source: io::Error) -> Self {
        Error::Filesystem {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Filesystem error for a path that exists but is not a directory, or is missing.
    pub fn not_a_directory(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let kind = if path.exists() {
            io::ErrorKind::InvalidInput
        } else {
            io::ErrorKind::NotFound
        };
        Self::filesystem(path, io::Error::new(kind, "not a directory"))
    }

    pub fn scan_timeout(path: impl AsRef<Path>, limit: Duration) -> Self {
        Self::filesystem(
            path,
            io::Error::new(
                io::ErrorKind::TimedOut,
                format!("directory scan exceeded {:?}", limit),
            ),
        )
    }

    pub fn is_unsupported_media(&self) -> bool {
        matches!(self, Error::UnsupportedMedia(_))
    }

    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Error::InvalidState { .. })
    }

    pub fn is_persistence(&self) -> bool {
        matches!(self, Error::Persistence(_))
    }

    pub fn is_filesystem(&self) -> bool {
        matches!(self, Error::Filesystem { .. })
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Persistence(PersistenceError::Sqlite(err))
    }
}
