// Playlist storage - SQLite tables for playlists, their tracks, and the
// singleton record remembering the library root and selected playlist

use crate::config::PersistenceConfig;
use crate::error::{Error, PersistenceError, Result};
use crate::library::RootStore;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Durable, named, append-only track lists.
///
/// Every public call is one SQL statement (or a read followed by one), all
/// parameterized. Playlist names are mapped to a storage key that must pass
/// [`storage_key`] before it is used to address a playlist.
pub struct PlaylistStore {
    conn: Mutex<Connection>,
}

/// Summary row for the playlist picker.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PlaylistSummary {
    pub name: String,
    pub track_count: usize,
}

impl PlaylistStore {
    pub fn open<P: AsRef<Path>>(db_path: P, config: &PersistenceConfig) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| Error::filesystem(parent, e))?;
            }
        }

        let conn = Connection::open(db_path)?;
        conn.busy_timeout(config.busy_timeout())?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_tables()?;

        info!("Opened playlist database at {}", db_path.display());
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        store.initialize_tables()?;
        Ok(store)
    }

    fn initialize_tables(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS playlists (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                storage_key TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        // AUTOINCREMENT ids double as insertion order
        conn.execute(
            "CREATE TABLE IF NOT EXISTS playlist_tracks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                playlist_id INTEGER NOT NULL REFERENCES playlists(id),
                file_path TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_tracks_playlist_id ON playlist_tracks(playlist_id)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS library_state (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                root_path TEXT,
                selected_playlist TEXT
            )",
            [],
        )?;

        conn.execute("INSERT OR IGNORE INTO library_state (id) VALUES (1)", [])?;

        Ok(())
    }

    /// Create an empty playlist. Names that map to an existing storage key
    /// are rejected rather than overwritten.
    pub fn create_playlist(&self, name: &str) -> Result<()> {
        let key = storage_key(name)?;
        let display_name = name.trim();

        let inserted = self.conn()?.execute(
            "INSERT INTO playlists (storage_key, name) VALUES (?1, ?2)",
            params![key, display_name],
        );

        match inserted {
            Ok(_) => {
                info!("Created new playlist: '{}'", display_name);
                Ok(())
            }
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                warn!("Playlist '{}' already exists", display_name);
                Err(PersistenceError::DuplicatePlaylist(display_name.to_string()).into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Append `track` to the end of `name`.
    pub fn add_track(&self, name: &str, track: &Path) -> Result<()> {
        let key = storage_key(name)?;
        let path = path_str(track)?;

        let rows = self.conn()?.execute(
            "INSERT INTO playlist_tracks (playlist_id, file_path)
             SELECT id, ?2 FROM playlists WHERE storage_key = ?1",
            params![key, path],
        )?;

        if rows == 0 {
            return Err(PersistenceError::NoSuchPlaylist(name.trim().to_string()).into());
        }

        info!("Added track '{}' to playlist '{}'", track.display(), name.trim());
        Ok(())
    }

    /// Remove every entry equal to `track`. Returns how many were removed.
    pub fn remove_track(&self, name: &str, track: &Path) -> Result<usize> {
        let key = storage_key(name)?;
        let path = path_str(track)?;
        let conn = self.conn()?;

        let playlist_id = Self::playlist_id(&conn, &key)?
            .ok_or_else(|| PersistenceError::NoSuchPlaylist(name.trim().to_string()))?;

        let removed = conn.execute(
            "DELETE FROM playlist_tracks WHERE playlist_id = ?1 AND file_path = ?2",
            params![playlist_id, path],
        )?;

        info!(
            "Removed {} entr{} of '{}' from playlist '{}'",
            removed,
            if removed == 1 { "y" } else { "ies" },
            track.display(),
            name.trim()
        );
        Ok(removed)
    }

    pub fn try_list_playlists(&self) -> Result<Vec<PlaylistSummary>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT p.name, COUNT(t.id)
             FROM playlists p LEFT JOIN playlist_tracks t ON t.playlist_id = p.id
             GROUP BY p.id ORDER BY p.id",
        )?;

        let playlists = stmt
            .query_map([], |row| {
                Ok(PlaylistSummary {
                    name: row.get(0)?,
                    track_count: row.get::<_, i64>(1)? as usize,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(playlists)
    }

    /// Playlist names in creation order; empty (and logged) if storage fails.
    pub fn list_playlists(&self) -> Vec<String> {
        match self.try_list_playlists() {
            Ok(playlists) => playlists.into_iter().map(|p| p.name).collect(),
            Err(e) => {
                warn!("Failed to list playlists: {}", e);
                Vec::new()
            }
        }
    }

    pub fn try_list_tracks(&self, name: &str) -> Result<Vec<PathBuf>> {
        let key = storage_key(name)?;
        let conn = self.conn()?;

        if Self::playlist_id(&conn, &key)?.is_none() {
            return Err(PersistenceError::NoSuchPlaylist(name.trim().to_string()).into());
        }

        let mut stmt = conn.prepare(
            "SELECT t.file_path
             FROM playlist_tracks t JOIN playlists p ON p.id = t.playlist_id
             WHERE p.storage_key = ?1 ORDER BY t.id",
        )?;

        let tracks = stmt
            .query_map(params![key], |row| row.get::<_, String>(0))?
            .map(|row| row.map(PathBuf::from))
            .collect::<Result<Vec<_>, _>>()?;

        debug!("Retrieved {} tracks for playlist '{}'", tracks.len(), name.trim());
        Ok(tracks)
    }

    /// Tracks of `name` in insertion order; empty (and logged) on any failure.
    pub fn list_tracks(&self, name: &str) -> Vec<PathBuf> {
        match self.try_list_tracks(name) {
            Ok(tracks) => tracks,
            Err(e) => {
                warn!("Failed to list tracks of '{}': {}", name, e);
                Vec::new()
            }
        }
    }

    pub fn save_selection(&self, name: &str) -> Result<()> {
        self.conn()?.execute(
            "UPDATE library_state SET selected_playlist = ?1 WHERE id = 1",
            params![name.trim()],
        )?;
        info!("Saved playlist selection '{}'", name.trim());
        Ok(())
    }

    pub fn load_selection(&self) -> Result<Option<String>> {
        let selection = self
            .conn()?
            .query_row(
                "SELECT selected_playlist FROM library_state WHERE id = 1",
                [],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?
            .flatten();
        Ok(selection)
    }

    pub fn save_library_root(&self, root: &Path) -> Result<()> {
        let path = path_str(root)?;
        self.conn()?.execute(
            "UPDATE library_state SET root_path = ?1 WHERE id = 1",
            params![path],
        )?;
        info!("Saved library root {}", root.display());
        Ok(())
    }

    pub fn load_library_root(&self) -> Result<Option<PathBuf>> {
        let root = self
            .conn()?
            .query_row(
                "SELECT root_path FROM library_state WHERE id = 1",
                [],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?
            .flatten()
            .map(PathBuf::from);
        Ok(root)
    }

    fn playlist_id(conn: &Connection, key: &str) -> Result<Option<i64>> {
        let id = conn
            .query_row(
                "SELECT id FROM playlists WHERE storage_key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| PersistenceError::Worker("connection mutex poisoned".to_string()).into())
    }
}

impl RootStore for PlaylistStore {
    fn save_library_root(&self, root: &Path) -> Result<()> {
        PlaylistStore::save_library_root(self, root)
    }

    fn load_library_root(&self) -> Result<Option<PathBuf>> {
        PlaylistStore::load_library_root(self)
    }
}

/// Storage key for a playlist name: trimmed, spaces turned into underscores,
/// then checked against `[A-Za-z0-9_]+`. Anything else is refused.
pub fn storage_key(name: &str) -> Result<String, PersistenceError> {
    let key = name.trim().replace(' ', "_");
    let valid = !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid {
        Ok(key)
    } else {
        Err(PersistenceError::InvalidIdentifier(name.to_string()))
    }
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| PersistenceError::NonUtf8Path(path.to_path_buf()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> PlaylistStore {
        PlaylistStore::open_in_memory().unwrap()
    }

    #[test]
    fn create_add_list_remove() {
        let store = store();
        store.create_playlist("Road Trip").unwrap();
        store
            .add_track("Road Trip", Path::new("/music/A/song1.mp3"))
            .unwrap();
        assert_eq!(
            store.list_tracks("Road Trip"),
            vec![PathBuf::from("/music/A/song1.mp3")]
        );

        let removed = store
            .remove_track("Road Trip", Path::new("/music/A/song1.mp3"))
            .unwrap();
        assert_eq!(removed, 1);
        assert!(store.list_tracks("Road Trip").is_empty());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let store = store();
        store.create_playlist("Road Trip").unwrap();
        store.add_track("Road Trip", Path::new("/a.mp3")).unwrap();

        let err = store.create_playlist("Road Trip").unwrap_err();
        assert!(matches!(
            err,
            Error::Persistence(PersistenceError::DuplicatePlaylist(_))
        ));
        // same storage key, so also a duplicate
        assert!(store.create_playlist("Road_Trip").is_err());
        assert_eq!(store.list_tracks("Road Trip").len(), 1);
    }

    #[test]
    fn unsafe_names_never_reach_storage() {
        let store = store();
        for name in ["", "   ", "x; DROP TABLE playlists", "a'b", "emoji🎵", "dash-name"] {
            let err = store.create_playlist(name).unwrap_err();
            assert!(
                matches!(err, Error::Persistence(PersistenceError::InvalidIdentifier(_))),
                "{:?} should be refused",
                name
            );
        }
        assert!(store.list_playlists().is_empty());
    }

    #[test]
    fn paths_are_stored_verbatim() {
        let store = store();
        store.create_playlist("Quotes").unwrap();
        let odd = Path::new("/music/O'Brien/it's \"fine\"; --.mp3");
        store.add_track("Quotes", odd).unwrap();
        assert_eq!(store.list_tracks("Quotes"), vec![odd.to_path_buf()]);
    }

    #[test]
    fn adding_to_missing_playlist_fails() {
        let store = store();
        let err = store.add_track("Nope", Path::new("/a.mp3")).unwrap_err();
        assert!(matches!(
            err,
            Error::Persistence(PersistenceError::NoSuchPlaylist(_))
        ));
        assert!(store.remove_track("Nope", Path::new("/a.mp3")).is_err());
        assert!(store.list_tracks("Nope").is_empty());
    }

    #[test]
    fn order_and_duplicates() {
        let store = store();
        store.create_playlist("Mix").unwrap();
        store.create_playlist("Other").unwrap();
        for track in ["/b.mp3", "/a.mp3", "/b.mp3", "/c.wav"] {
            store.add_track("Mix", Path::new(track)).unwrap();
        }
        store.add_track("Other", Path::new("/b.mp3")).unwrap();

        assert_eq!(store.list_playlists(), vec!["Mix", "Other"]);
        assert_eq!(
            store.list_tracks("Mix"),
            vec![
                PathBuf::from("/b.mp3"),
                PathBuf::from("/a.mp3"),
                PathBuf::from("/b.mp3"),
                PathBuf::from("/c.wav"),
            ]
        );

        // every occurrence goes, other playlists untouched
        assert_eq!(store.remove_track("Mix", Path::new("/b.mp3")).unwrap(), 2);
        assert_eq!(
            store.list_tracks("Mix"),
            vec![PathBuf::from("/a.mp3"), PathBuf::from("/c.wav")]
        );
        assert_eq!(store.list_tracks("Other").len(), 1);

        let summaries = store.try_list_playlists().unwrap();
        assert_eq!(summaries[0].track_count, 2);
        assert_eq!(summaries[1].track_count, 1);
    }

    #[test]
    fn pointers_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("data").join("music.db");
        let config = PersistenceConfig::default();

        {
            let store = PlaylistStore::open(&db, &config).unwrap();
            assert_eq!(store.load_library_root().unwrap(), None);
            assert_eq!(store.load_selection().unwrap(), None);
            store.create_playlist("Road Trip").unwrap();
            store.save_library_root(Path::new("/music")).unwrap();
            store.save_library_root(Path::new("/other/music")).unwrap();
            store.save_selection("Road Trip").unwrap();
        }

        let store = PlaylistStore::open(&db, &config).unwrap();
        assert_eq!(
            store.load_library_root().unwrap(),
            Some(PathBuf::from("/other/music"))
        );
        assert_eq!(store.load_selection().unwrap().as_deref(), Some("Road Trip"));
        assert_eq!(store.list_playlists(), vec!["Road Trip"]);
    }

    #[test]
    fn storage_keys() {
        assert_eq!(storage_key("  Road Trip ").unwrap(), "Road_Trip");
        assert_eq!(storage_key("mix_2024").unwrap(), "mix_2024");
        assert!(storage_key("a.b").is_err());
    }
}
