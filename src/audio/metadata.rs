use super::{format_time, AudioFormat};
use id3::TagLike;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};

// "01 - ", "7. ", "12_" style prefixes
static LEADING_NUMBER: LazyLock<Option<Regex>> =
    LazyLock::new(|| match Regex::new(r"^\d{1,3}\s*[-._)]\s*") {
        Ok(regex) => Some(regex),
        Err(e) => {
            warn!("Track number pattern failed to compile, keeping stems as-is: {}", e);
            None
        }
    });

/// What the view layer shows for a track. Fields stay empty rather than
/// failing when a file carries no tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackDescription {
    pub title: String,
    pub artist: String,
    pub duration_ms: Option<u64>,
}

impl TrackDescription {
    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            "Unknown"
        } else {
            &self.title
        }
    }

    pub fn display_artist(&self) -> &str {
        if self.artist.is_empty() {
            "Unknown Artist"
        } else {
            &self.artist
        }
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration_ms.map(Duration::from_millis)
    }

    pub fn formatted_duration(&self) -> Option<String> {
        self.duration().map(format_time)
    }

    /// Playlist row text: `artist - title`
    pub fn playlist_label(&self) -> String {
        format!("{} - {}", self.display_artist(), self.display_title())
    }
}

/// Metadata capability the core depends on. Implementations must not fail;
/// unreadable files come back with empty fields.
pub trait MetadataProvider: Send + Sync {
    fn describe(&self, path: &Path) -> TrackDescription;
}

/// Reads ID3 (mp3, wav, aif/aiff) and MP4 (m4a) tags, filling gaps from the filename.
#[derive(Debug, Clone, Copy)]
pub struct TagReader;

impl TagReader {
    pub fn new() -> Self {
        Self
    }

    fn read_tags(&self, path: &Path) -> Option<TrackDescription> {
        let format = AudioFormat::from_path(path)?;
        let result = match format {
            // id3 finds the tag inside RIFF and AIFF chunks on its own
            AudioFormat::Mp3 | AudioFormat::Wav | AudioFormat::Aif | AudioFormat::Aiff => {
                id3::Tag::read_from_path(path).map(|tag| Self::from_id3_tag(&tag))
            }
            AudioFormat::M4a => {
                return match mp4ameta::Tag::read_from_path(path) {
                    Ok(tag) => Some(TrackDescription {
                        title: tag.title().unwrap_or_default().to_string(),
                        artist: tag.artist().unwrap_or_default().to_string(),
                        duration_ms: tag.duration().map(|d| d.as_millis() as u64),
                    }),
                    Err(e) => {
                        debug!("No MP4 tags in {}: {}", path.display(), e);
                        None
                    }
                };
            }
            // flv/fxm containers carry no tags we can read
            AudioFormat::Flv | AudioFormat::Fxm => return None,
        };

        match result {
            Ok(description) => Some(description),
            Err(e) => {
                debug!("No ID3 tags in {}: {}", path.display(), e);
                None
            }
        }
    }

    fn from_id3_tag(tag: &id3::Tag) -> TrackDescription {
        TrackDescription {
            title: tag.title().unwrap_or_default().to_string(),
            artist: tag.artist().unwrap_or_default().to_string(),
            duration_ms: tag.duration().map(|d| d as u64),
        }
    }

    /// Title (and maybe artist) guessed from the file stem.
    fn from_filename(&self, path: &Path) -> (String, Option<String>) {
        let stem = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default();
        let stem = match LEADING_NUMBER.as_ref() {
            Some(regex) => regex.replace(stem, ""),
            None => Cow::Borrowed(stem),
        };

        match stem.split_once(" - ") {
            Some((artist, title)) if !artist.trim().is_empty() && !title.trim().is_empty() => {
                (title.trim().to_string(), Some(artist.trim().to_string()))
            }
            _ => (stem.trim().to_string(), None),
        }
    }

    /// Feature-gated duration probing using symphonia codec
    #[cfg(feature = "probe")]
    fn probe_duration(&self, path: &Path) -> Option<Duration> {
        use symphonia::core::formats::FormatOptions;
        use symphonia::core::io::MediaSourceStream;
        use symphonia::core::meta::MetadataOptions;
        use symphonia::core::probe::Hint;

        let file = std::fs::File::open(path).ok()?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(extension);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .ok()?;

        let track = probed
            .format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)?;

        let (time_base, n_frames) = (track.codec_params.time_base?, track.codec_params.n_frames?);
        let time = time_base.calc_time(n_frames);
        Some(Duration::from_secs_f64(time.seconds as f64 + time.frac))
    }

    #[cfg(not(feature = "probe"))]
    fn probe_duration(&self, _path: &Path) -> Option<Duration> {
        None
    }
}

impl MetadataProvider for TagReader {
    fn describe(&self, path: &Path) -> TrackDescription {
        let mut description = self.read_tags(path).unwrap_or_default();

        if description.title.is_empty() {
            let (title, artist) = self.from_filename(path);
            description.title = title;
            if description.artist.is_empty() {
                description.artist = artist.unwrap_or_default();
            }
        }

        if description.duration_ms.is_none() {
            description.duration_ms = self
                .probe_duration(path)
                .map(|d| d.as_millis() as u64);
        }

        description
    }
}

impl Default for TagReader {
    fn default() -> Self {
        Self::new()
    }
}
