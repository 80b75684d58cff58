//! Content and media constraints per platform.
//!
//! Pure functions only; adapters call [`validate_post`] before any I/O.

use serde::Serialize;

use super::MediaFile;
use crate::models::Platform;

const MB: u64 = 1024 * 1024;
const GB: u64 = 1024 * MB;

const COMMON_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MediaLimits {
    pub max_characters: usize,
    pub requires_media: bool,
    pub max_files: usize,
    pub max_file_size: u64,
    pub max_video_duration_secs: u32,
    pub image_types: &'static [&'static str],
    pub video_types: &'static [&'static str],
}

impl MediaLimits {
    pub fn allows_type(&self, mime_type: &str) -> bool {
        let mime_type = mime_type.to_ascii_lowercase();
        self.image_types.contains(&mime_type.as_str())
            || self.video_types.contains(&mime_type.as_str())
    }
}

pub fn limits_for(platform: Platform) -> MediaLimits {
    match platform {
        Platform::Facebook => MediaLimits {
            max_characters: 63_206,
            requires_media: false,
            max_files: 30,
            max_file_size: 4 * GB,
            max_video_duration_secs: 240 * 60,
            image_types: COMMON_IMAGE_TYPES,
            video_types: &["video/mp4", "video/quicktime"],
        },
        Platform::Instagram => MediaLimits {
            max_characters: 2_200,
            requires_media: true,
            max_files: 10,
            max_file_size: 100 * MB,
            max_video_duration_secs: 60,
            image_types: &["image/jpeg", "image/png"],
            video_types: &["video/mp4", "video/quicktime"],
        },
        Platform::Twitter => MediaLimits {
            max_characters: 280,
            requires_media: false,
            max_files: 4,
            max_file_size: 5 * MB,
            max_video_duration_secs: 140,
            image_types: COMMON_IMAGE_TYPES,
            video_types: &["video/mp4"],
        },
        Platform::LinkedIn => MediaLimits {
            max_characters: 3_000,
            requires_media: false,
            max_files: 20,
            max_file_size: 200 * MB,
            max_video_duration_secs: 10 * 60,
            image_types: &["image/jpeg", "image/png", "image/gif"],
            video_types: &["video/mp4"],
        },
    }
}

fn format_size(bytes: u64) -> String {
    if bytes >= GB && bytes % GB == 0 {
        format!("{}GB", bytes / GB)
    } else {
        format!("{}MB", bytes / MB)
    }
}

/// Human-readable reasons the post would be rejected; empty when valid
pub fn validate_post(platform: Platform, content: &str, media: &[MediaFile]) -> Vec<String> {
    let limits = limits_for(platform);
    let name = platform.display_name();
    let mut errors = Vec::new();

    let length = content.chars().count();
    if length > limits.max_characters {
        errors.push(format!(
            "Content is too long for {}: {} characters (maximum {})",
            name, length, limits.max_characters
        ));
    }

    if content.trim().is_empty() && media.is_empty() {
        errors.push("Post content cannot be empty".to_string());
    }

    if limits.requires_media && media.is_empty() {
        errors.push(format!("{} posts require at least one image or video", name));
    }

    if media.len() > limits.max_files {
        errors.push(format!(
            "Too many media files for {}: {} (maximum {})",
            name,
            media.len(),
            limits.max_files
        ));
    }

    for file in media {
        if !limits.allows_type(&file.mime_type) {
            errors.push(format!(
                "{} does not accept {} files ({})",
                name, file.mime_type, file.url
            ));
        }

        if file.size_bytes > limits.max_file_size {
            errors.push(format!(
                "File {} exceeds the {} limit of {}",
                file.url,
                name,
                format_size(limits.max_file_size)
            ));
        }

        if let Some(duration) = file.duration_secs.filter(|_| file.is_video()) {
            if duration > limits.max_video_duration_secs {
                errors.push(format!(
                    "Video {} is too long for {}: {}s (maximum {}s)",
                    file.url, name, duration, limits.max_video_duration_secs
                ));
            }
        }
    }

    errors
}
