//! # Metadata & Lyrics Module
//!
//! Reads tags from audio files and turns synced lyrics into a queryable
//! timeline.
//!
//! ## Overview
//!
//! This module handles:
//! - Audio tag extraction (ID3, Vorbis, MP4, RIFF, FLAC) for the filesystem scanner
//! - Synced lyrics parsing and position lookup
//! - The lyrics provider seam for external lookup services

pub mod error;
pub mod extractor;
pub mod lyrics;

pub use error::{MetadataError, Result};
pub use extractor::{ExtractedMetadata, MetadataExtractor};
pub use lyrics::{LyricLine, LyricsDto, LyricsIndex, LyricsMetadata, LyricsProvider, LyricsQuery};
