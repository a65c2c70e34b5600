// Library index - turns the chosen root directory into artist and track listings
// Listings never fail: unreadable directories come back empty with a warning

use crate::audio::{is_acceptable_file_type, AudioFormat};
use crate::config::LibraryConfig;
use crate::error::{Error, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Shown when an artist directory has no `.jpg` in it.
pub const PLACEHOLDER_COVER: &str = "images/Music_Library.png";

/// Where the library root pointer is persisted.
pub trait RootStore: Send + Sync {
    fn save_library_root(&self, root: &Path) -> Result<()>;
    fn load_library_root(&self) -> Result<Option<PathBuf>>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artist {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EntryKind {
    /// Nested directory, browsed like another artist.
    Directory,
    Track(AudioFormat),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LibraryEntry {
    pub name: String,
    pub path: PathBuf,
    pub kind: EntryKind,
}

impl LibraryEntry {
    pub fn is_track(&self) -> bool {
        matches!(self.kind, EntryKind::Track(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CoverArt {
    File(PathBuf),
    Placeholder,
}

impl CoverArt {
    /// Image reference for the view layer.
    pub fn reference(&self) -> &Path {
        match self {
            CoverArt::File(path) => path,
            CoverArt::Placeholder => Path::new(PLACEHOLDER_COVER),
        }
    }
}

pub struct LibraryIndex {
    store: Arc<dyn RootStore>,
    sort_entries: bool,
}

impl LibraryIndex {
    pub fn new(store: Arc<dyn RootStore>, config: &LibraryConfig) -> Self {
        Self {
            store,
            sort_entries: config.sort_entries,
        }
    }

    /// Make `root` the library root and list its artist directories.
    ///
    /// The root is persisted as soon as it is known to be a directory, even if
    /// listing it then turns up nothing.
    pub fn set_root(&self, root: &Path) -> Result<Vec<Artist>> {
        if !root.is_dir() {
            return Err(Error::not_a_directory(root));
        }
        let root = std::path::absolute(root).map_err(|e| Error::filesystem(root, e))?;

        if let Err(e) = self.store.save_library_root(&root) {
            warn!("Could not persist library root {}: {}", root.display(), e);
        }

        let artists = self.artists_in(&root);
        info!("Library root {} has {} artists", root.display(), artists.len());
        Ok(artists)
    }

    /// Artists under the persisted root, if one was ever set.
    pub fn restore(&self) -> Result<Option<(PathBuf, Vec<Artist>)>> {
        let Some(root) = self.store.load_library_root()? else {
            return Ok(None);
        };
        let artists = self.artists_in(&root);
        Ok(Some((root, artists)))
    }

    pub fn artists_in(&self, dir: &Path) -> Vec<Artist> {
        let mut artists: Vec<Artist> = self
            .children(dir)
            .into_iter()
            .filter(|path| path.is_dir())
            .map(|path| Artist {
                name: file_name(&path),
                path,
            })
            .collect();

        if self.sort_entries {
            artists.sort_by(|a, b| a.name.cmp(&b.name));
        }
        artists
    }

    /// Playable files and nested directories directly inside `dir`.
    pub fn tracks_for(&self, dir: &Path) -> Vec<LibraryEntry> {
        if !dir.is_dir() {
            debug!("Not a directory, nothing to list: {}", dir.display());
            return Vec::new();
        }

        let mut entries: Vec<LibraryEntry> = self
            .children(dir)
            .into_iter()
            .filter(|path| is_acceptable_file_type(path))
            .filter_map(|path| {
                let kind = if path.is_dir() {
                    EntryKind::Directory
                } else {
                    EntryKind::Track(AudioFormat::from_path(&path)?)
                };
                Some(LibraryEntry {
                    name: file_name(&path),
                    path,
                    kind,
                })
            })
            .collect();

        if self.sort_entries {
            entries.sort_by(|a, b| a.name.cmp(&b.name));
        }
        entries
    }

    /// First `.jpg` file directly inside `dir`, else the placeholder.
    pub fn cover_art(&self, dir: &Path) -> CoverArt {
        self.children(dir)
            .into_iter()
            .find(|path| {
                path.is_file() && path.extension().and_then(|ext| ext.to_str()) == Some("jpg")
            })
            .map(CoverArt::File)
            .unwrap_or(CoverArt::Placeholder)
    }

    /// Immediate children in filesystem order.
    fn children(&self, dir: &Path) -> Vec<PathBuf> {
        let mut children = Vec::new();

        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                    continue;
                }
            };
            children.push(entry.into_path());
        }

        children
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playlist::PlaylistStore;
    use std::fs;

    fn index_with(config: LibraryConfig) -> (LibraryIndex, Arc<PlaylistStore>) {
        let store = Arc::new(PlaylistStore::open_in_memory().unwrap());
        (LibraryIndex::new(store.clone(), &config), store)
    }

    fn index() -> (LibraryIndex, Arc<PlaylistStore>) {
        index_with(LibraryConfig::default())
    }

    fn touch(path: &Path) {
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn set_root_lists_directories_only() {
        let music = tempfile::tempdir().unwrap();
        fs::create_dir(music.path().join("Artist1")).unwrap();
        fs::create_dir(music.path().join("Artist2")).unwrap();
        touch(&music.path().join("readme.txt"));

        let (index, store) = index();
        let mut names: Vec<String> = index
            .set_root(music.path())
            .unwrap()
            .into_iter()
            .map(|a| a.name)
            .collect();
        names.sort();

        assert_eq!(names, vec!["Artist1", "Artist2"]);
        assert_eq!(store.load_library_root().unwrap(), Some(music.path().to_path_buf()));
    }

    #[test]
    fn set_root_on_missing_path_fails_without_persisting() {
        let (index, store) = index();
        let err = index.set_root(Path::new("/definitely/not/here")).unwrap_err();
        assert!(err.is_filesystem());
        assert_eq!(store.load_library_root().unwrap(), None);

        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(index.set_root(file.path()).unwrap_err().is_filesystem());
    }

    #[test]
    fn empty_root_is_still_persisted() {
        let music = tempfile::tempdir().unwrap();
        let (index, store) = index();
        assert!(index.set_root(music.path()).unwrap().is_empty());
        assert_eq!(store.load_library_root().unwrap(), Some(music.path().to_path_buf()));
    }

    #[test]
    fn tracks_for_filters_by_extension() {
        let music = tempfile::tempdir().unwrap();
        let artist = music.path().join("Artist1");
        fs::create_dir(&artist).unwrap();
        for name in ["song1.mp3", "song2.wav", "cover.jpg", "notes.txt", "LOUD.MP3"] {
            touch(&artist.join(name));
        }
        fs::create_dir(artist.join("Live")).unwrap();

        let (index, _) = index_with(LibraryConfig {
            sort_entries: true,
            ..LibraryConfig::default()
        });
        let entries = index.tracks_for(&artist);
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();

        assert_eq!(names, vec!["Live", "song1.mp3", "song2.wav"]);
        assert_eq!(entries[0].kind, EntryKind::Directory);
        assert_eq!(entries[1].kind, EntryKind::Track(AudioFormat::Mp3));
        assert_eq!(entries[2].kind, EntryKind::Track(AudioFormat::Wav));
        assert!(entries[1].is_track());

        assert_eq!(index.cover_art(&artist), CoverArt::File(artist.join("cover.jpg")));
    }

    #[test]
    fn dot_prefixed_entries_are_listed() {
        let music = tempfile::tempdir().unwrap();
        fs::create_dir(music.path().join(".Artist0")).unwrap();
        let artist = music.path().join("Artist1");
        fs::create_dir(&artist).unwrap();
        touch(&artist.join(".intro.mp3"));
        fs::create_dir(artist.join(".Bonus")).unwrap();

        let (index, _) = index_with(LibraryConfig {
            sort_entries: true,
            ..LibraryConfig::default()
        });
        let artists: Vec<String> = index
            .set_root(music.path())
            .unwrap()
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(artists, vec![".Artist0", "Artist1"]);

        let entries = index.tracks_for(&artist);
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec![".Bonus", ".intro.mp3"]);
        assert_eq!(entries[0].kind, EntryKind::Directory);
        assert_eq!(entries[1].kind, EntryKind::Track(AudioFormat::Mp3));
    }

    #[test]
    fn relative_root_is_persisted_as_absolute() {
        let cwd = std::env::current_dir().unwrap();
        let music = tempfile::tempdir_in(&cwd).unwrap();
        fs::create_dir(music.path().join("Artist1")).unwrap();
        let relative = music.path().strip_prefix(&cwd).unwrap().to_path_buf();
        assert!(relative.is_relative());

        let (index, store) = index();
        let artists = index.set_root(&relative).unwrap();

        let saved = store.load_library_root().unwrap().unwrap();
        assert!(saved.is_absolute());
        assert_eq!(saved, cwd.join(&relative));
        assert!(artists[0].path.is_absolute());
    }

    #[test]
    fn tracks_for_missing_directory_is_empty() {
        let (index, _) = index();
        assert!(index.tracks_for(Path::new("/no/such/artist")).is_empty());

        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(index.tracks_for(file.path()).is_empty());
    }

    #[test]
    fn cover_art_falls_back_to_placeholder() {
        let artist = tempfile::tempdir().unwrap();
        touch(&artist.path().join("front.JPG"));
        touch(&artist.path().join("back.png"));

        let (index, _) = index();
        let cover = index.cover_art(artist.path());
        assert_eq!(cover, CoverArt::Placeholder);
        assert_eq!(cover.reference(), Path::new(PLACEHOLDER_COVER));
        assert_eq!(index.cover_art(Path::new("/no/such/artist")), CoverArt::Placeholder);
    }

    #[test]
    fn restore_lists_the_saved_root() {
        let music = tempfile::tempdir().unwrap();
        fs::create_dir(music.path().join("Artist1")).unwrap();

        let (index, store) = index();
        assert_eq!(index.restore().unwrap(), None);

        store.save_library_root(music.path()).unwrap();
        let (root, artists) = index.restore().unwrap().unwrap();
        assert_eq!(root, music.path());
        assert_eq!(artists.len(), 1);
    }
}
