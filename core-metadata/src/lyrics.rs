//! # Synced Lyrics
//!
//! Parses LRC-style time-tagged lyrics into a sorted timeline and resolves
//! the active line for a playback position.
//!
//! ## Format
//!
//! ```text
//! [ti:Song Title]
//! [offset:+250]
//! [00:12.50]First line
//! [00:17.20][01:02.00]Repeated chorus
//! [00:21.00]
//! ```
//!
//! - Time tags: `[mm:ss]`, `[mm:ss.cc]`, `[mm:ss.mmm]` (a `:` before the
//!   fraction is accepted too). A line may carry several; each one yields a
//!   line sharing the text.
//! - A blank text is a rest.
//! - ID tags (`ti`, `ar`, `al`, `by`, `length`, `offset`) fill
//!   [`LyricsMetadata`]. A positive offset makes lyrics appear sooner.
//! - A line with a malformed tag is skipped; the rest of the text still parses.
//!
//! Lookups are binary searches, cheap enough for every position tick.
//!
//! ## Usage
//!
//! ```rust
//! use core_metadata::lyrics::LyricsIndex;
//!
//! let index = LyricsIndex::parse("[00:00.55] a\n[00:03.72] b\n");
//! assert_eq!(index.line_at(4_000).map(|l| l.text.as_str()), Some("b"));
//! assert!(index.line_at(100).is_none());
//! ```

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One timed line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LyricLine {
    pub timestamp_ms: u64,
    /// Trimmed text; empty for a rest
    pub text: String,
}

/// Values from the ID tags of an LRC file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LyricsMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    /// Author of the LRC file
    pub by: Option<String>,
    pub length_ms: Option<u64>,
    /// Milliseconds subtracted from every timestamp
    pub offset_ms: i64,
}

/// Sorted, queryable lyric timeline
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LyricsIndex {
    lines: Vec<LyricLine>,
    metadata: LyricsMetadata,
    skipped: usize,
}

/// Why a line was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
enum MalformedLyricLine {
    Unterminated,
    BadTimestamp(String),
}

enum Tag {
    Time(u64),
    Id { key: String, value: String },
}

impl LyricsIndex {
    /// Parse raw LRC text. Never fails: malformed lines are skipped and
    /// counted in [`skipped_lines`](Self::skipped_lines).
    pub fn parse(raw: &str) -> Self {
        let mut lines = Vec::new();
        let mut metadata = LyricsMetadata::default();
        let mut skipped = 0;

        for (number, raw_line) in raw.lines().enumerate() {
            match Self::parse_line(raw_line) {
                Ok((stamps, text, ids)) => {
                    for (key, value) in ids {
                        metadata.apply(&key, &value);
                    }
                    lines.extend(stamps.into_iter().map(|timestamp_ms| LyricLine {
                        timestamp_ms,
                        text: text.clone(),
                    }));
                }
                Err(reason) => {
                    debug!(line = number + 1, ?reason, "Skipping malformed lyric line");
                    skipped += 1;
                }
            }
        }

        if metadata.offset_ms != 0 {
            for line in &mut lines {
                let shifted = i64::try_from(line.timestamp_ms)
                    .unwrap_or(i64::MAX)
                    .saturating_sub(metadata.offset_ms);
                line.timestamp_ms = shifted.max(0) as u64;
            }
        }

        // Stable: equal timestamps keep their source order
        lines.sort_by_key(|line| line.timestamp_ms);

        Self {
            lines,
            metadata,
            skipped,
        }
    }

    /// Returns the time stamps, the shared text and any ID tags of one line.
    /// Lines without a leading tag yield nothing.
    #[allow(clippy::type_complexity)]
    fn parse_line(
        raw_line: &str,
    ) -> std::result::Result<(Vec<u64>, String, Vec<(String, String)>), MalformedLyricLine> {
        let mut rest = raw_line.trim_start();
        let mut stamps = Vec::new();
        let mut ids = Vec::new();

        while let Some(after_bracket) = rest.strip_prefix('[') {
            let close = after_bracket
                .find(']')
                .ok_or(MalformedLyricLine::Unterminated)?;
            let content = &after_bracket[..close];

            match Self::parse_tag(content)? {
                Tag::Time(ms) => stamps.push(ms),
                Tag::Id { key, value } => ids.push((key, value)),
            }

            rest = after_bracket[close + 1..].trim_start();
        }

        Ok((stamps, rest.trim().to_string(), ids))
    }

    fn parse_tag(content: &str) -> std::result::Result<Tag, MalformedLyricLine> {
        let bad = || MalformedLyricLine::BadTimestamp(content.to_string());

        let (head, tail) = content.split_once(':').ok_or_else(bad)?;

        if !head.is_empty() && head.chars().all(|c| c.is_ascii_alphabetic()) {
            return Ok(Tag::Id {
                key: head.to_ascii_lowercase(),
                value: tail.trim().to_string(),
            });
        }

        let minutes = parse_digits(head).ok_or_else(bad)?;

        let (seconds, fraction) = match tail.find(['.', ':']) {
            Some(split) => (&tail[..split], Some(&tail[split + 1..])),
            None => (tail, None),
        };

        if seconds.len() > 2 {
            return Err(bad());
        }
        let seconds = parse_digits(seconds).ok_or_else(bad)?;
        if seconds >= 60 {
            return Err(bad());
        }

        let fraction_ms = match fraction {
            None => 0,
            Some(digits) => {
                let value = parse_digits(digits).ok_or_else(bad)?;
                match digits.len() {
                    1 => value * 100,
                    2 => value * 10,
                    3 => value,
                    _ => return Err(bad()),
                }
            }
        };

        to_millis(minutes, seconds, fraction_ms)
            .map(Tag::Time)
            .ok_or_else(bad)
    }

    /// Last line whose timestamp is at or before `position_ms`
    pub fn line_at(&self, position_ms: u64) -> Option<&LyricLine> {
        self.index_at(position_ms).map(|i| &self.lines[i])
    }

    /// Index of [`line_at`](Self::line_at)
    pub fn index_at(&self, position_ms: u64) -> Option<usize> {
        let after = self
            .lines
            .partition_point(|line| line.timestamp_ms <= position_ms);
        after.checked_sub(1)
    }

    /// Window of lines around the active one: up to `before` lines before it
    /// and `after` lines after it. Before the first line the window starts
    /// at the top.
    pub fn visible_lines(&self, position_ms: u64, before: usize, after: usize) -> &[LyricLine] {
        match self.index_at(position_ms) {
            Some(current) => {
                let start = current.saturating_sub(before);
                let end = (current + after + 1).min(self.lines.len());
                &self.lines[start..end]
            }
            None => &self.lines[..after.min(self.lines.len())],
        }
    }

    pub fn lines(&self) -> &[LyricLine] {
        &self.lines
    }

    pub fn metadata(&self) -> &LyricsMetadata {
        &self.metadata
    }

    pub fn skipped_lines(&self) -> usize {
        self.skipped
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl LyricsMetadata {
    fn apply(&mut self, key: &str, value: &str) {
        let text = || Some(value.to_string()).filter(|v| !v.is_empty());
        match key {
            "ti" => self.title = text(),
            "ar" => self.artist = text(),
            "al" => self.album = text(),
            "by" => self.by = text(),
            "length" => self.length_ms = parse_length(value),
            "offset" => {
                if let Ok(offset) = value.trim_start_matches('+').parse::<i64>() {
                    self.offset_ms = offset;
                }
            }
            _ => {}
        }
    }
}

fn parse_digits(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// `None` when the timestamp does not fit in a `u64` of milliseconds
fn to_millis(minutes: u64, seconds: u64, fraction_ms: u64) -> Option<u64> {
    minutes
        .checked_mul(60_000)?
        .checked_add(seconds.checked_mul(1_000)?)?
        .checked_add(fraction_ms)
}

/// `mm:ss` or `mm:ss.xx`
fn parse_length(value: &str) -> Option<u64> {
    let (minutes, seconds) = value.split_once(':')?;
    let (seconds, fraction) = match seconds.split_once('.') {
        Some((s, f)) => (s, Some(f)),
        None => (seconds, None),
    };
    let fraction_ms = match fraction {
        Some(f) => parse_digits(f)?.checked_mul(10u64.pow(3u32.saturating_sub(f.len() as u32)))?,
        None => 0,
    };
    to_millis(parse_digits(minutes)?, parse_digits(seconds)?, fraction_ms)
}

// =============================================================================
// Provider
// =============================================================================

/// Lookup parameters for an external lyrics service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LyricsQuery {
    pub artist: String,
    pub title: String,
    pub album: Option<String>,
    pub duration_ms: Option<u64>,
}

impl LyricsQuery {
    pub fn new(artist: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            artist: artist.into(),
            title: title.into(),
            album: None,
            duration_ms: None,
        }
    }

    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = Some(album.into());
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }
}

/// Already-parsed response of an external lyrics service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LyricsDto {
    /// LRC text, when the service has timed lyrics
    pub synced: Option<String>,
    pub plain: Option<String>,
    /// Service name
    pub source: String,
}

impl LyricsDto {
    /// Timeline of the synced text; `None` when absent or without any timed line
    pub fn index(&self) -> Option<LyricsIndex> {
        let index = LyricsIndex::parse(self.synced.as_deref()?);
        (!index.is_empty()).then_some(index)
    }
}

/// External collaborator that looks lyrics up
#[async_trait]
pub trait LyricsProvider: Send + Sync {
    /// `Ok(None)` when the service has no lyrics for the track
    async fn fetch(&self, query: &LyricsQuery) -> Result<Option<LyricsDto>>;
}

/// Fetch and parse timed lyrics in one step
pub async fn fetch_index(
    provider: &dyn LyricsProvider,
    query: &LyricsQuery,
) -> Result<Option<LyricsIndex>> {
    let dto = provider.fetch(query).await?;
    let index = dto.as_ref().and_then(LyricsDto::index);
    debug!(
        source = dto.as_ref().map(|d| d.source.as_str()),
        title = %query.title,
        found = dto.is_some(),
        synced = index.is_some(),
        "Lyrics lookup finished"
    );
    Ok(index)
}
