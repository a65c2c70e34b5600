// Dedicated playback thread. The controller (and the audio output, which is
// not Send) live on that thread only; everyone else talks to it via commands

use super::{
    MediaBackend, MetadataProvider, PlaybackController, PlaybackState, PlayerEvent, Progress,
    TrackDescription,
};
use crate::config::PlaybackConfig;
use crate::error::{Error, Result};
use crate::request::{LatestRequest, Outcome, Ticket};
use std::path::PathBuf;
use std::sync::mpsc::{self as std_mpsc, RecvTimeoutError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Snapshot of the session for the view layer.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackStatus {
    pub state: PlaybackState,
    pub track: Option<PathBuf>,
    pub volume: f32,
    pub progress: Progress,
}

impl PlaybackStatus {
    pub fn progress_value(&self) -> f64 {
        self.progress.fraction()
    }

    pub fn time_label(&self) -> String {
        self.progress.label()
    }
}

enum Command {
    Load {
        path: PathBuf,
        ticket: Ticket,
        reply: oneshot::Sender<Result<Outcome<()>>>,
    },
    Play(oneshot::Sender<Result<()>>),
    Pause(oneshot::Sender<Result<()>>),
    Stop(oneshot::Sender<Result<()>>),
    SetVolume(f32, oneshot::Sender<bool>),
    Status(oneshot::Sender<PlaybackStatus>),
    Describe(oneshot::Sender<Option<TrackDescription>>),
    Subscribe(oneshot::Sender<mpsc::UnboundedReceiver<PlayerEvent>>),
    Shutdown,
}

pub struct PlaybackHandle {
    commands: std_mpsc::Sender<Command>,
    loads: LatestRequest,
    thread: Option<JoinHandle<()>>,
}

impl PlaybackHandle {
    /// Start the playback thread. `make_backend` runs on that thread, so the
    /// backend itself does not need to be `Send`.
    pub fn spawn<B, F>(
        make_backend: F,
        metadata: Option<Arc<dyn MetadataProvider>>,
        config: &PlaybackConfig,
    ) -> Result<Self>
    where
        B: MediaBackend + 'static,
        F: FnOnce() -> Result<B> + Send + 'static,
    {
        let (commands, receiver) = std_mpsc::channel();
        let (ready_tx, ready_rx) = std_mpsc::channel();
        let poll_interval = Duration::from_millis(config.poll_interval_ms.max(1));
        let volume = config.default_volume;

        let thread = std::thread::Builder::new()
            .name("playback".to_string())
            .spawn(move || {
                let backend = match make_backend() {
                    Ok(backend) => backend,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                let mut controller = PlaybackController::new(backend, volume);
                if let Some(metadata) = metadata {
                    controller = controller.with_metadata(metadata);
                }
                let _ = ready_tx.send(Ok(()));

                run(controller, receiver, poll_interval);
            })
            .map_err(|e| Error::Playback(format!("failed to start playback thread: {}", e)))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!("Playback thread started (poll every {:?})", poll_interval);
                Ok(Self {
                    commands,
                    loads: LatestRequest::new(),
                    thread: Some(thread),
                })
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(worker_gone())
            }
        }
    }

    /// Load `path` as the new session. If another load is issued before this
    /// one reaches the playback thread, this one is dropped as `Superseded`.
    pub async fn load(&self, path: impl Into<PathBuf>) -> Result<Outcome<()>> {
        let ticket = self.loads.begin();
        self.load_with(path.into(), ticket).await
    }

    async fn load_with(&self, path: PathBuf, ticket: Ticket) -> Result<Outcome<()>> {
        self.request(|reply| Command::Load {
            path,
            ticket,
            reply,
        })
        .await?
    }

    pub async fn play(&self) -> Result<()> {
        self.request(Command::Play).await?
    }

    pub async fn pause(&self) -> Result<()> {
        self.request(Command::Pause).await?
    }

    pub async fn stop(&self) -> Result<()> {
        self.request(Command::Stop).await?
    }

    pub async fn set_volume(&self, volume: f32) -> Result<bool> {
        self.request(|reply| Command::SetVolume(volume, reply)).await
    }

    pub async fn status(&self) -> Result<PlaybackStatus> {
        self.request(Command::Status).await
    }

    pub async fn describe_current(&self) -> Result<Option<TrackDescription>> {
        self.request(Command::Describe).await
    }

    pub async fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<PlayerEvent>> {
        self.request(Command::Subscribe).await
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands.send(make(reply)).map_err(|_| worker_gone())?;
        response.await.map_err(|_| worker_gone())
    }
}

impl Drop for PlaybackHandle {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Playback thread panicked during shutdown");
            }
        }
    }
}

fn worker_gone() -> Error {
    Error::Playback("playback thread is not running".to_string())
}

fn run<B: MediaBackend>(
    mut controller: PlaybackController<B>,
    commands: std_mpsc::Receiver<Command>,
    poll_interval: Duration,
) {
    loop {
        match commands.recv_timeout(poll_interval) {
            Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Ok(command) => handle(&mut controller, command),
            Err(RecvTimeoutError::Timeout) => {}
        }
        controller.tick();
    }

    if matches!(
        controller.state(),
        PlaybackState::Loaded | PlaybackState::Playing | PlaybackState::Paused
    ) {
        let _ = controller.stop();
    }
    debug!("Playback thread exiting");
}

fn handle<B: MediaBackend>(controller: &mut PlaybackController<B>, command: Command) {
    match command {
        Command::Load {
            path,
            ticket,
            reply,
        } => {
            let result = if ticket.is_current() {
                controller.load(&path).map(Outcome::Current)
            } else {
                debug!("Skipping superseded load of {}", path.display());
                Ok(Outcome::Superseded)
            };
            if let Err(e) = &result {
                warn!("Load of {} failed: {}", path.display(), e);
            }
            let _ = reply.send(result);
        }
        Command::Play(reply) => {
            let _ = reply.send(controller.play());
        }
        Command::Pause(reply) => {
            let _ = reply.send(controller.pause());
        }
        Command::Stop(reply) => {
            let _ = reply.send(controller.stop());
        }
        Command::SetVolume(volume, reply) => {
            let _ = reply.send(controller.set_volume(volume));
        }
        Command::Status(reply) => {
            let _ = reply.send(PlaybackStatus {
                state: controller.state(),
                track: controller.current_track().map(|p| p.to_path_buf()),
                volume: controller.volume(),
                progress: controller.progress(),
            });
        }
        Command::Describe(reply) => {
            let _ = reply.send(controller.describe_current());
        }
        Command::Subscribe(reply) => {
            let _ = reply.send(controller.subscribe());
        }
        // handled by the loop
        Command::Shutdown => {}
    }
}
