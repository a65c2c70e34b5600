// Underlying media capability. The controller only ever talks to these traits,
// so decoding and output stay swappable (rodio in production, fakes in tests)

use crate::error::Result;
use std::path::Path;
use std::time::Duration;

/// Opens one playable handle per session.
pub trait MediaBackend {
    type Handle: MediaHandle;

    /// Open `path` paused at position zero. Decoder failures surface as
    /// `Error::Playback` and must not disturb any other open handle.
    fn open(&self, path: &Path) -> Result<Self::Handle>;
}

pub trait MediaHandle {
    fn play(&mut self);
    fn pause(&mut self);
    /// Stop and release the output resource. The handle is dropped right after.
    fn stop(&mut self);
    fn set_volume(&mut self, volume: f32);
    fn position(&self) -> Duration;
    fn total_duration(&self) -> Option<Duration>;
    fn is_finished(&self) -> bool;
}

#[cfg(feature = "audio")]
pub use rodio_backend::{RodioBackend, RodioHandle};

#[cfg(feature = "audio")]
mod rodio_backend {
    use super::{MediaBackend, MediaHandle};
    use crate::error::{Error, Result};
    use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
    use std::fs::File;
    use std::io::BufReader;
    use std::path::Path;
    use std::time::Duration;
    use tracing::debug;

    /// Default output device. Not `Send`: build it on the thread that plays.
    pub struct RodioBackend {
        _stream: OutputStream,
        stream_handle: OutputStreamHandle,
    }

    impl RodioBackend {
        pub fn new() -> Result<Self> {
            let (stream, stream_handle) = OutputStream::try_default()
                .map_err(|e| Error::Playback(format!("no audio output device: {}", e)))?;

            Ok(Self {
                _stream: stream,
                stream_handle,
            })
        }
    }

    impl MediaBackend for RodioBackend {
        type Handle = RodioHandle;

        fn open(&self, path: &Path) -> Result<RodioHandle> {
            let file = File::open(path).map_err(|e| Error::filesystem(path, e))?;

            let source = Decoder::new(BufReader::new(file)).map_err(|e| {
                Error::Playback(format!(
                    "failed to decode '{}': {}. The file may be corrupted or use an unsupported codec.",
                    path.display(),
                    e
                ))
            })?;
            let total = source.total_duration();

            let sink = Sink::try_new(&self.stream_handle)
                .map_err(|e| Error::Playback(format!("failed to open output sink: {}", e)))?;
            sink.pause();
            sink.append(source);

            debug!("Opened {} (duration {:?})", path.display(), total);
            Ok(RodioHandle { sink, total })
        }
    }

    pub struct RodioHandle {
        sink: Sink,
        total: Option<Duration>,
    }

    impl MediaHandle for RodioHandle {
        fn play(&mut self) {
            self.sink.play();
        }

        fn pause(&mut self) {
            self.sink.pause();
        }

        fn stop(&mut self) {
            self.sink.stop();
        }

        fn set_volume(&mut self, volume: f32) {
            self.sink.set_volume(volume);
        }

        fn position(&self) -> Duration {
            self.sink.get_pos()
        }

        fn total_duration(&self) -> Option<Duration> {
            self.total
        }

        fn is_finished(&self) -> bool {
            self.sink.empty()
        }
    }
}
