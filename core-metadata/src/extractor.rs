//! Audio Tag Extraction
//!
//! Reads tags and audio properties from files on disk using the `lofty`
//! crate. Supports ID3v2, Vorbis Comments, MP4 tags, RIFF INFO and FLAC.
//!
//! ## Usage
//!
//! ```ignore
//! use core_metadata::extractor::MetadataExtractor;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let extractor = MetadataExtractor::new();
//! let metadata = extractor.extract_from_file(Path::new("song.mp3")).await?;
//!
//! println!("Title: {}", metadata.title);
//! println!("Duration: {}ms", metadata.duration_ms);
//! # Ok(())
//! # }
//! ```

use lofty::config::ParseOptions;
use lofty::file::{AudioFile, FileType, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::{Accessor, ItemKey};
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{MetadataError, Result};

/// File extensions the filesystem scanner treats as audio
pub const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "flac", "m4a", "mp4", "aac", "ogg", "oga", "opus", "wav", "aiff", "aif", "ape",
    "wv", "mpc", "spx",
];

/// Whether the path carries a known audio extension (case-insensitive)
pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            AUDIO_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// Metadata read from one audio file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedMetadata {
    /// Track title; the file stem when the file has no title tag
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    /// Album artist (for compilations)
    pub album_artist: Option<String>,
    pub genre: Option<String>,
    pub year: Option<u32>,
    pub track_number: Option<u32>,
    pub disc_number: Option<u32>,

    /// Duration in milliseconds
    pub duration_ms: u64,
    /// Container format (e.g. "Mpeg", "Flac")
    pub format: String,
    pub mime_type: String,
    pub file_size: u64,

    /// False when no tag block was found at all
    pub tagged: bool,
}

/// Audio metadata extractor
pub struct MetadataExtractor {
    parse_options: ParseOptions,
}

impl MetadataExtractor {
    pub fn new() -> Self {
        Self {
            parse_options: ParseOptions::new(),
        }
    }

    pub fn with_options(parse_options: ParseOptions) -> Self {
        Self { parse_options }
    }

    /// Extract metadata from an audio file
    ///
    /// Files without tags still succeed: the title falls back to the file
    /// stem and `tagged` is false.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or its format cannot be
    /// recognized.
    pub async fn extract_from_file(&self, path: &Path) -> Result<ExtractedMetadata> {
        debug!("Extracting metadata from: {}", path.display());

        let file_data = tokio::fs::read(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                MetadataError::FileNotFound(path.display().to_string())
            } else {
                MetadataError::ExtractionFailed(format!("Failed to read file: {}", e))
            }
        })?;

        self.extract_from_bytes(path, &file_data)
    }

    /// Parse already-loaded file contents; `path` only supplies the fallback title
    pub fn extract_from_bytes(&self, path: &Path, file_data: &[u8]) -> Result<ExtractedMetadata> {
        let tagged_file = Probe::new(std::io::Cursor::new(file_data))
            .options(self.parse_options)
            .guess_file_type()
            .map_err(|e| MetadataError::ExtractionFailed(format!("Failed to probe file: {}", e)))?
            .read()
            .map_err(|e| MetadataError::ExtractionFailed(format!("Failed to parse file: {}", e)))?;

        let file_type = tagged_file.file_type();
        let properties = tagged_file.properties();

        let tag = tagged_file
            .primary_tag()
            .or_else(|| tagged_file.first_tag());

        if tag.is_none() {
            warn!(
                "No tags found in file: {}. Using filename as title.",
                path.display()
            );
        }

        let text = |value: Option<String>| {
            value
                .map(|s| Self::normalize_text(&s))
                .filter(|s| !s.is_empty())
        };

        let title = text(tag.and_then(|t| t.title().map(|s| s.into_owned())))
            .unwrap_or_else(|| Self::fallback_title(path));

        Ok(ExtractedMetadata {
            title,
            artist: text(tag.and_then(|t| t.artist().map(|s| s.into_owned()))),
            album: text(tag.and_then(|t| t.album().map(|s| s.into_owned()))),
            album_artist: text(
                tag.and_then(|t| t.get_string(&ItemKey::AlbumArtist).map(str::to_string)),
            ),
            genre: text(tag.and_then(|t| t.genre().map(|s| s.into_owned()))),
            year: tag.and_then(|t| t.year()),
            track_number: tag.and_then(|t| t.track()),
            disc_number: tag.and_then(|t| t.disk()),
            duration_ms: properties.duration().as_millis() as u64,
            format: format!("{:?}", file_type),
            mime_type: Self::file_type_to_mime_type(file_type),
            file_size: file_data.len() as u64,
            tagged: tag.is_some(),
        })
    }

    fn fallback_title(path: &Path) -> String {
        path.file_stem()
            .and_then(|s| s.to_str())
            .map(Self::normalize_text)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "Unknown".to_string())
    }

    /// Normalize text metadata
    ///
    /// - Trims leading/trailing whitespace
    /// - Normalizes consecutive whitespace to single space
    /// - Removes null bytes and control characters
    fn normalize_text(text: &str) -> String {
        text.split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .chars()
            .filter(|c| !c.is_control())
            .collect()
    }

    fn file_type_to_mime_type(file_type: FileType) -> String {
        match file_type {
            FileType::Aac => "audio/aac",
            FileType::Aiff => "audio/aiff",
            FileType::Ape => "audio/ape",
            FileType::Flac => "audio/flac",
            FileType::Mpeg => "audio/mpeg",
            FileType::Mp4 => "audio/mp4",
            FileType::Mpc => "audio/musepack",
            FileType::Opus => "audio/opus",
            FileType::Vorbis => "audio/vorbis",
            FileType::Speex => "audio/speex",
            FileType::Wav => "audio/wav",
            FileType::WavPack => "audio/wavpack",
            _ => "application/octet-stream",
        }
        .to_string()
    }
}

impl Default for MetadataExtractor {
    fn default() -> Self {
        Self::new()
    }
}
