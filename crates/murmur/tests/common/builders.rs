//! Request builders for integration tests.

#![allow(dead_code)]

use std::path::Path;

use murmur::job::{JobParameters, JobType, NewJobRequest};

pub fn transcribe(source: &Path) -> NewJobRequest {
    NewJobRequest::new(
        JobType::Transcribe,
        JobParameters {
            source: Some(source.display().to_string()),
            model: Some("small".to_string()),
            language: Some("en".to_string()),
            ..Default::default()
        },
    )
}

pub fn download(url: &str) -> NewJobRequest {
    NewJobRequest::new(
        JobType::Download,
        JobParameters {
            source: Some(url.to_string()),
            model: Some("small".to_string()),
            language: Some("en".to_string()),
            ..Default::default()
        },
    )
}

pub fn transcode(source: &Path) -> NewJobRequest {
    NewJobRequest::new(
        JobType::Transcode,
        JobParameters {
            source: Some(source.display().to_string()),
            ..Default::default()
        },
    )
}

pub fn translate(source: &Path, target_lang: &str) -> NewJobRequest {
    NewJobRequest::new(
        JobType::Translate,
        JobParameters {
            source: Some(source.display().to_string()),
            target_language: Some(target_lang.to_string()),
            ..Default::default()
        },
    )
}

pub fn generate_subtitles(source: &Path, track: u32) -> NewJobRequest {
    NewJobRequest::new(
        JobType::GenerateSubtitles,
        JobParameters {
            source: Some(source.display().to_string()),
            audio_track: Some(track),
            ..Default::default()
        },
    )
}
