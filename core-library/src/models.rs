//! Domain models for the media library
//!
//! Rows as persisted by the sync engine. Surrogate ids are UUID strings; the
//! natural keys are the content URI (tracks, videos) and the normalized name
//! (albums per artist, artists, genres).

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Normalize a display name into its identity key.
///
/// Trims, lowercases and collapses internal whitespace so that
/// `"  The  Beatles "` and `"the beatles"` resolve to the same artist.
pub fn normalize_name(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Library entities
// =============================================================================

/// Audio track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Track {
    pub id: String,
    /// Library source that produced this track
    pub source_id: String,
    /// Stable per-source natural key
    pub content_uri: String,
    /// Change detector; equal fingerprint means the row is left untouched
    pub fingerprint: String,
    pub title: String,
    pub normalized_title: String,
    pub duration_ms: i64,
    pub track_number: Option<i64>,
    pub disc_number: Option<i64>,
    pub album_id: String,
    pub artist_id: String,
    pub genre_id: String,
    /// Source modification time (Unix milliseconds)
    pub last_modified_ms: i64,
    pub size_bytes: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Track {
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("Track title cannot be empty".to_string());
        }

        if self.content_uri.trim().is_empty() {
            return Err("Track content URI cannot be empty".to_string());
        }

        if self.duration_ms < 0 {
            return Err("Track duration cannot be negative".to_string());
        }

        if let Some(track_number) = self.track_number {
            if track_number <= 0 {
                return Err("Track number must be positive".to_string());
            }
        }

        if let Some(disc_number) = self.disc_number {
            if disc_number <= 0 {
                return Err("Disc number must be positive".to_string());
            }
        }

        Ok(())
    }
}

/// Album, identified by normalized name within its album artist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Album {
    pub id: String,
    pub name: String,
    pub normalized_name: String,
    pub artist_id: String,
    pub artwork_uri: Option<String>,
    /// Recounted after every committed sync
    pub track_count: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Album {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Album name cannot be empty".to_string());
        }

        if self.track_count < 0 {
            return Err("Track count cannot be negative".to_string());
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Artist {
    pub id: String,
    pub name: String,
    pub normalized_name: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Genre {
    pub id: String,
    pub name: String,
    pub normalized_name: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Video item (no album/artist/genre relations)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Video {
    pub id: String,
    pub source_id: String,
    pub content_uri: String,
    pub fingerprint: String,
    pub title: String,
    pub duration_ms: i64,
    pub last_modified_ms: i64,
    pub size_bytes: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

// =============================================================================
// Sync history
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncRunKind {
    Full,
    Scoped,
}

impl SyncRunKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncRunKind::Full => "full",
            SyncRunKind::Scoped => "scoped",
        }
    }
}

impl fmt::Display for SyncRunKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncRunKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(SyncRunKind::Full),
            "scoped" => Ok(SyncRunKind::Scoped),
            other => Err(format!("Unknown sync run kind: {}", other)),
        }
    }
}

/// One row of `sync_runs`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct SyncRun {
    pub id: String,
    pub source_id: String,
    /// `full` or `scoped`
    pub kind: String,
    /// `syncing`, `success` or `failed`
    pub status: String,
    pub started_at: i64,
    pub finished_at: Option<i64>,
    pub added: i64,
    pub updated: i64,
    pub deleted: i64,
    pub unchanged: i64,
    pub skipped: i64,
    pub error_message: Option<String>,
}

impl SyncRun {
    pub fn started(source_id: impl Into<String>, kind: SyncRunKind, started_at: i64) -> Self {
        Self {
            id: new_id(),
            source_id: source_id.into(),
            kind: kind.as_str().to_string(),
            status: "syncing".to_string(),
            started_at,
            finished_at: None,
            added: 0,
            updated: 0,
            deleted: 0,
            unchanged: 0,
            skipped: 0,
            error_message: None,
        }
    }

    pub fn run_kind(&self) -> Option<SyncRunKind> {
        self.kind.parse().ok()
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }
}
