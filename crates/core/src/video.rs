//! Video metadata types, format post-processing, and input validation.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Maximum accepted length of a format id.
const MAX_FORMAT_ID_LEN: usize = 64;

/// Metadata for a single downloadable encoding variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoFormat {
    pub format_id: String,
    pub quality_label: String,
    pub height: u32,
    pub width: u32,
    pub ext: String,
    pub filesize: u64,
}

/// Metadata returned by a probe of a video URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoInfo {
    pub title: String,
    pub duration_secs: u64,
    pub thumbnail: Option<String>,
    pub uploader: String,
    pub formats: Vec<VideoFormat>,
}

/// Convert a pixel height to the quality label shown to users.
pub fn quality_label(height: u32) -> String {
    match height {
        h if h >= 2160 => "4K".to_string(),
        h if h >= 1440 => "2K".to_string(),
        h if h >= 1080 => "1080p".to_string(),
        h if h >= 720 => "720p".to_string(),
        h if h >= 480 => "480p".to_string(),
        h if h >= 360 => "360p".to_string(),
        h if h >= 240 => "240p".to_string(),
        h => format!("{h}p"),
    }
}

/// Deduplicate formats by resolution and sort best-first.
///
/// The first format of each distinct `(width, height)` pair wins; the
/// result is ordered by height descending so the highest quality comes
/// first (and is what clients auto-select).
pub fn normalize_formats(formats: Vec<VideoFormat>) -> Vec<VideoFormat> {
    let mut seen = std::collections::HashSet::new();
    let mut out: Vec<VideoFormat> = formats
        .into_iter()
        .filter(|f| seen.insert((f.width, f.height)))
        .collect();
    out.sort_by(|a, b| b.height.cmp(&a.height));
    out
}

/// Validate that a video URL is non-empty and uses http(s).
pub fn validate_url(url: &str) -> Result<(), CoreError> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("No URL provided".to_string()));
    }
    if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
        return Err(CoreError::Validation(format!(
            "URL must start with http:// or https://, got: '{trimmed}'"
        )));
    }
    Ok(())
}

/// Validate that a format id is syntactically plausible.
///
/// Format ids come back from a prior probe, but the service cannot assume
/// the client echoes them faithfully; reject anything that could not have
/// been issued by an extractor.
pub fn validate_format_id(format_id: &str) -> Result<(), CoreError> {
    if format_id.is_empty() {
        return Err(CoreError::Validation(
            "Format id must not be empty".to_string(),
        ));
    }
    if format_id.len() > MAX_FORMAT_ID_LEN {
        return Err(CoreError::Validation(format!(
            "Format id must not exceed {MAX_FORMAT_ID_LEN} characters"
        )));
    }
    if !format_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '_' | '.'))
    {
        return Err(CoreError::Validation(format!(
            "Format id contains invalid characters: '{format_id}'"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(format_id: &str, width: u32, height: u32) -> VideoFormat {
        VideoFormat {
            format_id: format_id.to_string(),
            quality_label: quality_label(height),
            height,
            width,
            ext: "mp4".to_string(),
            filesize: 1_000_000,
        }
    }

    // -- quality_label --------------------------------------------------------

    #[test]
    fn quality_labels_match_heights() {
        assert_eq!(quality_label(2160), "4K");
        assert_eq!(quality_label(1440), "2K");
        assert_eq!(quality_label(1080), "1080p");
        assert_eq!(quality_label(720), "720p");
        assert_eq!(quality_label(480), "480p");
        assert_eq!(quality_label(360), "360p");
        assert_eq!(quality_label(240), "240p");
        assert_eq!(quality_label(144), "144p");
    }

    #[test]
    fn quality_label_rounds_down_between_tiers() {
        assert_eq!(quality_label(2159), "2K");
        assert_eq!(quality_label(1079), "720p");
    }

    // -- normalize_formats ----------------------------------------------------

    #[test]
    fn duplicate_resolutions_removed() {
        let formats = vec![
            fmt("137", 1920, 1080),
            fmt("299", 1920, 1080),
            fmt("136", 1280, 720),
        ];
        let out = normalize_formats(formats);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].format_id, "137");
    }

    #[test]
    fn formats_sorted_highest_first() {
        let formats = vec![fmt("18", 640, 360), fmt("22", 1280, 720), fmt("137", 1920, 1080)];
        let out = normalize_formats(formats);
        let heights: Vec<u32> = out.iter().map(|f| f.height).collect();
        assert_eq!(heights, vec![1080, 720, 360]);
    }

    // -- validate_url ---------------------------------------------------------

    #[test]
    fn http_urls_accepted() {
        assert!(validate_url("https://youtube.com/watch?v=abc123def45").is_ok());
        assert!(validate_url("http://youtu.be/abc123def45").is_ok());
    }

    #[test]
    fn empty_and_non_http_urls_rejected() {
        assert!(validate_url("").is_err());
        assert!(validate_url("   ").is_err());
        assert!(validate_url("ftp://example.com/video").is_err());
        assert!(validate_url("watch?v=abc").is_err());
    }

    // -- validate_format_id ---------------------------------------------------

    #[test]
    fn plausible_format_ids_accepted() {
        assert!(validate_format_id("137").is_ok());
        assert!(validate_format_id("137+140").is_ok());
        assert!(validate_format_id("hls-1080p_v2.1").is_ok());
    }

    #[test]
    fn implausible_format_ids_rejected() {
        assert!(validate_format_id("").is_err());
        assert!(validate_format_id("137; rm -rf /").is_err());
        assert!(validate_format_id(&"9".repeat(MAX_FORMAT_ID_LEN + 1)).is_err());
    }
}
