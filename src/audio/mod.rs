pub mod controller;
pub mod metadata;
pub mod player;
pub mod worker;

pub use controller::PlaybackController;
pub use metadata::{MetadataProvider, TagReader, TrackDescription};
pub use player::{MediaBackend, MediaHandle};
pub use worker::{PlaybackHandle, PlaybackStatus};

#[cfg(feature = "audio")]
pub use player::RodioBackend;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Extensions the player accepts. Matching is exact, so `.MP3` is not a track.
pub const ACCEPTED_EXTENSIONS: &[&str] = &["mp3", "wav", "aif", "aiff", "fxm", "flv", "m4a"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AudioFormat {
    Mp3,
    Wav,
    Aif,
    Aiff,
    Fxm,
    Flv,
    M4a,
}

impl AudioFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "mp3" => Some(AudioFormat::Mp3),
            "wav" => Some(AudioFormat::Wav),
            "aif" => Some(AudioFormat::Aif),
            "aiff" => Some(AudioFormat::Aiff),
            "fxm" => Some(AudioFormat::Fxm),
            "flv" => Some(AudioFormat::Flv),
            "m4a" => Some(AudioFormat::M4a),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
            AudioFormat::Aif => "aif",
            AudioFormat::Aiff => "aiff",
            AudioFormat::Fxm => "fxm",
            AudioFormat::Flv => "flv",
            AudioFormat::M4a => "m4a",
        }
    }
}

/// Browsing filter: directories always pass, files only with an accepted extension.
pub fn is_acceptable_file_type(path: &Path) -> bool {
    path.is_dir() || AudioFormat::from_path(path).is_some()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    Idle,
    Loaded,
    Playing,
    Paused,
    Stopped,
}

/// Elapsed/total pair for one session. `total` is `None` when neither the
/// decoder nor the tags know the length.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Progress {
    pub elapsed: Duration,
    pub total: Option<Duration>,
}

impl Progress {
    /// Fraction in [0, 1]; 0 when the total is unknown or zero.
    pub fn fraction(&self) -> f64 {
        match self.total {
            Some(total) if !total.is_zero() => {
                (self.elapsed.as_secs_f64() / total.as_secs_f64()).clamp(0.0, 1.0)
            }
            _ => 0.0,
        }
    }

    /// `mm:ss / mm:ss`
    pub fn label(&self) -> String {
        format!("{} / {}", format_time(self.elapsed), self.total_label())
    }

    pub fn total_label(&self) -> String {
        format_time(self.total.unwrap_or_default())
    }
}

/// Minutes and seconds, both zero-padded to two digits.
pub fn format_time(time: Duration) -> String {
    let secs = time.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    TrackLoaded(PathBuf),
    Playing,
    Paused,
    Stopped,
    TrackFinished(PathBuf),
    PositionChanged(Progress),
    VolumeChanged(f32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_every_listed_extension() {
        for ext in ACCEPTED_EXTENSIONS {
            let path = PathBuf::from(format!("x.{}", ext));
            assert!(is_acceptable_file_type(&path), "{} should be accepted", ext);
            assert_eq!(AudioFormat::from_path(&path).map(|f| f.extension()), Some(*ext));
        }
    }

    #[test]
    fn rejects_other_and_uppercase_extensions() {
        assert!(!is_acceptable_file_type(Path::new("x.mp4")));
        assert!(!is_acceptable_file_type(Path::new("x.MP3")));
        assert!(!is_acceptable_file_type(Path::new("no_extension")));
    }

    #[test]
    fn directories_are_always_browsable() {
        let dir = tempfile::tempdir().unwrap();
        let odd = dir.path().join("not-music.txt");
        std::fs::create_dir(&odd).unwrap();
        assert!(is_acceptable_file_type(&odd));
    }

    #[test]
    fn progress_without_total_is_zero() {
        let progress = Progress {
            elapsed: Duration::from_secs(42),
            total: None,
        };
        assert_eq!(progress.fraction(), 0.0);

        let zero = Progress {
            elapsed: Duration::from_secs(3),
            total: Some(Duration::ZERO),
        };
        assert_eq!(zero.fraction(), 0.0);
        assert!(!zero.fraction().is_nan());
    }

    #[test]
    fn progress_label_and_fraction() {
        let progress = Progress {
            elapsed: Duration::from_secs(65),
            total: Some(Duration::from_secs(260)),
        };
        assert_eq!(progress.label(), "01:05 / 04:20");
        assert!((progress.fraction() - 0.25).abs() < 1e-9);
        assert_eq!(Progress::default().label(), "00:00 / 00:00");
    }
}
