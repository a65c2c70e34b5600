// Music Center Library - browse a music folder, keep playlists, play tracks
// The view layer only ever talks to MusicCenter

pub mod audio;    // playback state machine, backends, tag reading
pub mod config;   // settings and preferences
pub mod error;    // error taxonomy shared by every module
pub mod library;  // root directory, artists, tracks, cover art
pub mod playlist; // SQLite-backed playlists and remembered state
pub mod request;  // last-request-wins bookkeeping
pub mod session;  // MusicCenter context object

pub use audio::{
    AudioFormat, MediaBackend, MediaHandle, MetadataProvider, PlaybackController, PlaybackHandle,
    PlaybackState, PlaybackStatus, PlayerEvent, Progress, TagReader, TrackDescription,
};
pub use config::Config;
pub use error::{Error, PersistenceError, Result};
pub use library::{Artist, CoverArt, EntryKind, LibraryEntry, LibraryIndex};
pub use playlist::{PlaylistStore, PlaylistSummary};
pub use request::{LatestRequest, Outcome};
pub use session::{MusicCenter, RestoredState};
