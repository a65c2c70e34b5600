// MusicCenter - the one object the view layer holds
// Owns the store, the library index and (optionally) the playback thread;
// blocking work runs on tokio's blocking pool under a timeout

use crate::audio::{
    MetadataProvider, PlaybackHandle, PlaybackStatus, PlayerEvent, TagReader, TrackDescription,
};
use crate::config::Config;
use crate::error::{Error, PersistenceError, Result};
use crate::library::{Artist, CoverArt, LibraryEntry, LibraryIndex};
use crate::playlist::{PlaylistStore, PlaylistSummary};
use crate::request::{LatestRequest, Outcome};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// What a previous run left behind.
#[derive(Debug, Clone, PartialEq)]
pub struct RestoredState {
    pub root: Option<PathBuf>,
    pub artists: Vec<Artist>,
    pub selected_playlist: Option<String>,
}

pub struct MusicCenter {
    config: Config,
    store: Arc<PlaylistStore>,
    library: Arc<LibraryIndex>,
    metadata: Arc<dyn MetadataProvider>,
    playback: Option<PlaybackHandle>,
    root_scans: LatestRequest,
    track_scans: LatestRequest,
}

impl MusicCenter {
    /// Open the playlist database named in `config`. No audio output is
    /// touched until [`attach_playback`](Self::attach_playback).
    pub fn open(config: Config) -> Result<Self> {
        let store = Arc::new(PlaylistStore::open(
            &config.database_path,
            &config.persistence,
        )?);
        Ok(Self::with_store(config, store))
    }

    pub fn with_store(config: Config, store: Arc<PlaylistStore>) -> Self {
        let library = Arc::new(LibraryIndex::new(store.clone(), &config.library));
        Self {
            config,
            store,
            library,
            metadata: Arc::new(TagReader::new()),
            playback: None,
            root_scans: LatestRequest::new(),
            track_scans: LatestRequest::new(),
        }
    }

    /// Replace the tag reader used by `describe`.
    pub fn with_metadata(mut self, metadata: Arc<dyn MetadataProvider>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn attach_playback(&mut self, playback: PlaybackHandle) {
        self.playback = Some(playback);
    }

    pub fn metadata(&self) -> Arc<dyn MetadataProvider> {
        Arc::clone(&self.metadata)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &PlaylistStore {
        &self.store
    }

    // Library

    /// Persist `root` and list its artists. A newer scan issued before this
    /// one finishes makes this one `Superseded`.
    pub async fn set_root(&self, root: impl Into<PathBuf>) -> Result<Outcome<Vec<Artist>>> {
        let root = root.into();
        let ticket = self.root_scans.begin();
        let library = Arc::clone(&self.library);
        let path = root.clone();

        let artists = self
            .scan(&root, move || library.set_root(&path))
            .await??;
        Ok(ticket.finish(artists))
    }

    /// Entries inside an artist directory. Failures and timeouts come back as
    /// an empty list.
    pub async fn tracks_for(&self, dir: impl Into<PathBuf>) -> Outcome<Vec<LibraryEntry>> {
        let dir = dir.into();
        let ticket = self.track_scans.begin();
        let library = Arc::clone(&self.library);
        let path = dir.clone();

        let entries = self
            .scan_or(&dir, Vec::new(), move || library.tracks_for(&path))
            .await;
        ticket.finish(entries)
    }

    pub async fn cover_art(&self, dir: impl Into<PathBuf>) -> CoverArt {
        let dir = dir.into();
        let library = Arc::clone(&self.library);
        let path = dir.clone();

        self.scan_or(&dir, CoverArt::Placeholder, move || library.cover_art(&path))
            .await
    }

    pub async fn describe(&self, track: impl Into<PathBuf>) -> TrackDescription {
        let track = track.into();
        let metadata = Arc::clone(&self.metadata);
        let path = track.clone();

        self.scan_or(&track, TrackDescription::default(), move || {
            metadata.describe(&path)
        })
        .await
    }

    /// Root, its artists, and the playlist selection from the last run.
    pub async fn restore(&self) -> Result<RestoredState> {
        let library = Arc::clone(&self.library);
        let restored = self.persist(move || library.restore()).await?;
        let selected_playlist = self.load_selection().await?;

        let (root, artists) = match restored {
            Some((root, artists)) => (Some(root), artists),
            None => (None, Vec::new()),
        };
        info!(
            "Restored root {:?} ({} artists), playlist {:?}",
            root,
            artists.len(),
            selected_playlist
        );

        Ok(RestoredState {
            root,
            artists,
            selected_playlist,
        })
    }

    // Playlists

    pub async fn create_playlist(&self, name: &str) -> Result<()> {
        let name = name.to_string();
        self.with_store_call(move |store| store.create_playlist(&name)).await
    }

    pub async fn add_track(&self, name: &str, track: impl Into<PathBuf>) -> Result<()> {
        let (name, track) = (name.to_string(), track.into());
        self.with_store_call(move |store| store.add_track(&name, &track))
            .await
    }

    pub async fn remove_track(&self, name: &str, track: impl Into<PathBuf>) -> Result<usize> {
        let (name, track) = (name.to_string(), track.into());
        self.with_store_call(move |store| store.remove_track(&name, &track))
            .await
    }

    pub async fn list_playlists(&self) -> Vec<String> {
        self.with_store_call(|store| Ok(store.list_playlists()))
            .await
            .unwrap_or_else(|e| {
                warn!("Failed to list playlists: {}", e);
                Vec::new()
            })
    }

    pub async fn playlist_summaries(&self) -> Vec<PlaylistSummary> {
        self.with_store_call(|store| store.try_list_playlists())
            .await
            .unwrap_or_else(|e| {
                warn!("Failed to summarize playlists: {}", e);
                Vec::new()
            })
    }

    pub async fn list_tracks(&self, name: &str) -> Vec<PathBuf> {
        let name = name.to_string();
        self.with_store_call(move |store| Ok(store.list_tracks(&name)))
            .await
            .unwrap_or_else(|e| {
                warn!("Failed to list playlist tracks: {}", e);
                Vec::new()
            })
    }

    /// Remember `name` as the selected playlist for the next run.
    pub async fn select_playlist(&self, name: &str) -> Result<()> {
        let name = name.to_string();
        self.with_store_call(move |store| store.save_selection(&name))
            .await
    }

    pub async fn load_selection(&self) -> Result<Option<String>> {
        self.with_store_call(|store| store.load_selection()).await
    }

    // Playback

    pub async fn load(&self, track: impl Into<PathBuf>) -> Result<Outcome<()>> {
        self.playback()?.load(track).await
    }

    pub async fn play(&self) -> Result<()> {
        self.playback()?.play().await
    }

    pub async fn pause(&self) -> Result<()> {
        self.playback()?.pause().await
    }

    pub async fn stop(&self) -> Result<()> {
        self.playback()?.stop().await
    }

    pub async fn set_volume(&self, volume: f32) -> Result<bool> {
        self.playback()?.set_volume(volume).await
    }

    pub async fn playback_status(&self) -> Result<PlaybackStatus> {
        self.playback()?.status().await
    }

    pub async fn now_playing(&self) -> Result<Option<TrackDescription>> {
        self.playback()?.describe_current().await
    }

    pub async fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<PlayerEvent>> {
        self.playback()?.subscribe().await
    }

    fn playback(&self) -> Result<&PlaybackHandle> {
        self.playback
            .as_ref()
            .ok_or_else(|| Error::Playback("no audio output attached".to_string()))
    }

    // Blocking helpers

    async fn with_store_call<T, F>(&self, call: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&PlaylistStore) -> Result<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        self.persist(move || call(&*store)).await
    }

    async fn persist<T, F>(&self, call: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let limit = self.config.persistence.call_timeout();
        match run_blocking(limit, call).await {
            Some(Ok(result)) => result,
            Some(Err(e)) => Err(PersistenceError::Worker(e.to_string()).into()),
            None => Err(PersistenceError::Timeout(limit).into()),
        }
    }

    /// `scan`, with failures and timeouts logged and replaced by `fallback`.
    async fn scan_or<T, F>(&self, path: &Path, fallback: T, call: F) -> T
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        match self.scan(path, call).await {
            Ok(value) => value,
            Err(e) => {
                warn!("Scan of {} failed: {}", path.display(), e);
                fallback
            }
        }
    }

    async fn scan<T, F>(&self, path: &Path, call: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let limit = self.config.library.scan_timeout();
        match run_blocking(limit, call).await {
            Some(Ok(result)) => Ok(result),
            Some(Err(e)) => Err(Error::filesystem(
                path,
                std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
            )),
            None => Err(Error::scan_timeout(path, limit)),
        }
    }
}

/// `None` on timeout. The blocking task keeps running to completion; only its
/// result is dropped.
async fn run_blocking<T, F>(
    limit: Duration,
    call: F,
) -> Option<std::result::Result<T, tokio::task::JoinError>>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::time::timeout(limit, tokio::task::spawn_blocking(call))
        .await
        .ok()
}
