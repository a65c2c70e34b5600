use super::{
    AudioFormat, MediaBackend, MediaHandle, MetadataProvider, PlaybackState, PlayerEvent, Progress,
    TrackDescription,
};
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// The one live session: which track, and the handle playing it.
/// `handle` is `None` once the session has been stopped.
struct Session<H> {
    track: PathBuf,
    handle: Option<H>,
    fallback_total: Option<Duration>,
}

/// Single-track playback state machine.
///
/// Owns at most one session at a time. Loading validates the new track before
/// the current session is touched, so a failed load leaves playback exactly as
/// it was. Position changes are pushed to subscribers from [`tick`], which the
/// owner calls on a fixed interval.
///
/// [`tick`]: PlaybackController::tick
pub struct PlaybackController<B: MediaBackend> {
    backend: B,
    metadata: Option<Arc<dyn MetadataProvider>>,
    session: Option<Session<B::Handle>>,
    state: PlaybackState,
    volume: f32,
    last_reported: Option<Duration>,
    subscribers: Vec<mpsc::UnboundedSender<PlayerEvent>>,
}

impl<B: MediaBackend> PlaybackController<B> {
    pub fn new(backend: B, volume: f32) -> Self {
        Self {
            backend,
            metadata: None,
            session: None,
            state: PlaybackState::Idle,
            volume: if (0.0..=1.0).contains(&volume) { volume } else { 1.0 },
            last_reported: None,
            subscribers: Vec::new(),
        }
    }

    /// Metadata used for `describe_current` and as a duration fallback when the
    /// decoder cannot tell how long a track is.
    pub fn with_metadata(mut self, metadata: Arc<dyn MetadataProvider>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<PlayerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn load(&mut self, path: &Path) -> Result<()> {
        if path.is_dir() || AudioFormat::from_path(path).is_none() {
            return Err(Error::UnsupportedMedia(path.to_path_buf()));
        }

        // Open before tearing down the current session so decoder failures
        // leave it running
        let mut handle = self.backend.open(path)?;
        handle.set_volume(self.volume);

        if let Some(mut previous) = self.session.take() {
            if let Some(old) = previous.handle.as_mut() {
                old.stop();
            }
            debug!("Discarded session for {}", previous.track.display());
        }

        let fallback_total = match handle.total_duration() {
            Some(_) => None,
            None => self
                .metadata
                .as_ref()
                .and_then(|m| m.describe(path).duration()),
        };

        self.session = Some(Session {
            track: path.to_path_buf(),
            handle: Some(handle),
            fallback_total,
        });
        self.state = PlaybackState::Loaded;
        self.last_reported = None;

        info!("Loaded {}", path.display());
        self.emit(PlayerEvent::TrackLoaded(path.to_path_buf()));
        Ok(())
    }

    pub fn play(&mut self) -> Result<()> {
        match self.state {
            PlaybackState::Loaded | PlaybackState::Paused => {
                if let Some(handle) = self.handle_mut() {
                    handle.play();
                }
                self.state = PlaybackState::Playing;
                self.emit(PlayerEvent::Playing);
                Ok(())
            }
            PlaybackState::Playing => Ok(()),
            state => Err(Error::InvalidState {
                operation: "play",
                state,
            }),
        }
    }

    pub fn pause(&mut self) -> Result<()> {
        match self.state {
            PlaybackState::Playing => {
                if let Some(handle) = self.handle_mut() {
                    handle.pause();
                }
                self.state = PlaybackState::Paused;
                self.emit(PlayerEvent::Paused);
                Ok(())
            }
            PlaybackState::Paused => Ok(()),
            state => Err(Error::InvalidState {
                operation: "pause",
                state,
            }),
        }
    }

    pub fn stop(&mut self) -> Result<()> {
        match self.state {
            PlaybackState::Loaded | PlaybackState::Playing | PlaybackState::Paused => {
                self.release();
                self.state = PlaybackState::Stopped;
                self.emit(PlayerEvent::Stopped);
                Ok(())
            }
            PlaybackState::Stopped => Ok(()),
            PlaybackState::Idle => Err(Error::InvalidState {
                operation: "stop",
                state: PlaybackState::Idle,
            }),
        }
    }

    /// Applies `volume` if it lies in [0, 1] and returns whether it did.
    /// Anything else (including NaN) is ignored and the old volume kept.
    pub fn set_volume(&mut self, volume: f32) -> bool {
        if !(0.0..=1.0).contains(&volume) {
            debug!("Ignoring out-of-range volume {}", volume);
            return false;
        }

        self.volume = volume;
        if let Some(handle) = self.handle_mut() {
            handle.set_volume(volume);
        }
        self.emit(PlayerEvent::VolumeChanged(volume));
        true
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn current_track(&self) -> Option<&Path> {
        self.session.as_ref().map(|s| s.track.as_path())
    }

    /// Fresh tags for the loaded track; never cached.
    pub fn describe_current(&self) -> Option<TrackDescription> {
        let track = self.current_track()?;
        let metadata = self.metadata.as_ref()?;
        Some(metadata.describe(track))
    }

    pub fn progress(&self) -> Progress {
        match &self.session {
            Some(session) => {
                let (elapsed, total) = match &session.handle {
                    Some(handle) => (handle.position(), handle.total_duration()),
                    None => (Duration::ZERO, None),
                };
                Progress {
                    elapsed,
                    total: total.or(session.fallback_total),
                }
            }
            None => Progress::default(),
        }
    }

    pub fn progress_value(&self) -> f64 {
        self.progress().fraction()
    }

    pub fn time_label(&self) -> String {
        self.progress().label()
    }

    /// Poll the handle: report a changed position, or finish the session when
    /// the media has run out.
    pub fn tick(&mut self) {
        if self.state != PlaybackState::Playing {
            return;
        }

        let finished = self
            .session
            .as_ref()
            .and_then(|s| s.handle.as_ref())
            .map_or(true, |h| h.is_finished());

        if finished {
            let track = self.current_track().map(Path::to_path_buf);
            self.release();
            self.state = PlaybackState::Stopped;
            if let Some(track) = track {
                info!("Finished {}", track.display());
                self.emit(PlayerEvent::TrackFinished(track));
            }
            return;
        }

        let progress = self.progress();
        if self.last_reported != Some(progress.elapsed) {
            self.last_reported = Some(progress.elapsed);
            self.emit(PlayerEvent::PositionChanged(progress));
        }
    }

    fn handle_mut(&mut self) -> Option<&mut B::Handle> {
        self.session.as_mut().and_then(|s| s.handle.as_mut())
    }

    fn release(&mut self) {
        if let Some(session) = self.session.as_mut() {
            if let Some(mut handle) = session.handle.take() {
                handle.stop();
            }
        }
        self.last_reported = None;
    }

    fn emit(&mut self, event: PlayerEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
