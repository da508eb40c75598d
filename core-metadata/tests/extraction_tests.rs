//! Integration tests for metadata extraction
//!
//! Audio files are generated on the fly so the suite needs no fixtures.

use core_metadata::extractor::MetadataExtractor;
use core_metadata::MetadataError;
use std::fs;
use std::path::Path;

/// One second of 8 kHz mono 16-bit silence as a bare RIFF/WAVE file
fn silent_wav() -> Vec<u8> {
    let sample_rate: u32 = 8_000;
    let data_len: u32 = sample_rate * 2;

    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");
    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
    bytes.extend_from_slice(&1u16.to_le_bytes()); // mono
    bytes.extend_from_slice(&sample_rate.to_le_bytes());
    bytes.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    bytes.extend_from_slice(&2u16.to_le_bytes());
    bytes.extend_from_slice(&16u16.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    bytes.resize(bytes.len() + data_len as usize, 0);
    bytes
}

#[tokio::test]
async fn test_extract_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let missing_path = dir.path().join("nonexistent.mp3");

    let extractor = MetadataExtractor::new();
    let result = extractor.extract_from_file(&missing_path).await;

    assert!(matches!(result, Err(MetadataError::FileNotFound(_))));
}

#[tokio::test]
async fn test_extract_corrupted_file() {
    let dir = tempfile::tempdir().unwrap();
    let corrupt_path = dir.path().join("corrupt.mp3");
    fs::write(&corrupt_path, b"This is not a valid audio file").unwrap();

    let extractor = MetadataExtractor::new();
    let result = extractor.extract_from_file(&corrupt_path).await;

    assert!(result.is_err(), "Should fail for corrupted file");
}

#[tokio::test]
async fn test_untagged_file_falls_back_to_stem() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Morning   Take.wav");
    fs::write(&path, silent_wav()).unwrap();

    let metadata = MetadataExtractor::new()
        .extract_from_file(&path)
        .await
        .unwrap();

    assert_eq!(metadata.title, "Morning Take");
    assert!(!metadata.tagged);
    assert!(metadata.artist.is_none());
    assert_eq!(metadata.mime_type, "audio/wav");
    assert!(
        (900..=1_100).contains(&metadata.duration_ms),
        "duration was {}",
        metadata.duration_ms
    );
}

#[test]
fn test_audio_extension_filter() {
    assert!(core_metadata::extractor::is_audio_file(Path::new("a/b.Opus")));
    assert!(!core_metadata::extractor::is_audio_file(Path::new("a/b.txt")));
}
