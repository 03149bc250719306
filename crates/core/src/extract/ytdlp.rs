//! yt-dlp subprocess backend for [`MediaExtractor`].
//!
//! Probing runs `yt-dlp -J` and parses the JSON dump; downloading runs
//! `yt-dlp --newline` and scrapes per-line progress from stdout. The
//! child is spawned with `kill_on_drop` so a cancelled or timed-out job
//! never leaves a stray process behind.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::Command;

use crate::video::{self, VideoFormat, VideoInfo};

use super::{DownloadRequest, ExtractError, MediaExtractor, ProgressSender};

/// Maximum stderr captured per invocation (1 MiB); anything beyond is
/// truncated to bound memory against very chatty failures.
const MAX_STDERR_BYTES: usize = 1024 * 1024;

/// How long a metadata probe may take before we give up.
const PROBE_TIMEOUT: Duration = Duration::from_secs(60);

/// Fragments of yt-dlp error output that indicate a retryable condition.
const TRANSIENT_MARKERS: &[&str] = &[
    "timed out",
    "Temporary failure",
    "Connection reset",
    "Connection refused",
    "Unable to connect",
    "HTTP Error 5",
];

pub struct YtDlp {
    binary: PathBuf,
}

impl YtDlp {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl MediaExtractor for YtDlp {
    async fn probe(&self, url: &str) -> Result<VideoInfo, ExtractError> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(["-J", "--no-warnings", "--no-playlist", url])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(PROBE_TIMEOUT, cmd.output())
            .await
            .map_err(|_| ExtractError::Transient("Metadata probe timed out".to_string()))?
            .map_err(spawn_error)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(&stderr));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_probe_json(stdout.trim())
    }

    async fn download(
        &self,
        req: &DownloadRequest,
        progress: ProgressSender,
    ) -> Result<PathBuf, ExtractError> {
        let template = format!("{}.%(ext)s", req.dest_stem.display());

        let mut cmd = Command::new(&self.binary);
        cmd.args([
            "-f",
            &req.format_id,
            "-o",
            &template,
            "--newline",
            "--no-warnings",
            "--no-playlist",
            "--restrict-filenames",
            &req.url,
        ])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(spawn_error)?;

        let stderr_handle = child.stderr.take();
        let stderr_task = tokio::spawn(async move { read_capped(stderr_handle).await });

        // Scrape progress and the destination path from stdout as the
        // download proceeds.
        let mut destination: Option<PathBuf> = None;
        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(percent) = parse_progress_line(&line) {
                    // Receiver gone means the job was dropped; keep
                    // draining so the child can finish or die on its own.
                    let _ = progress.send(percent);
                } else if let Some(path) = parse_destination_line(&line) {
                    destination = Some(path);
                }
            }
        }

        let status = child.wait().await.map_err(ExtractError::Io)?;
        let stderr_bytes = stderr_task.await.unwrap_or_default();

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            return Err(classify_failure(&stderr));
        }

        match destination {
            Some(path) => Ok(path),
            // Older yt-dlp versions do not always print a destination
            // line; fall back to scanning for the stem we asked for.
            None => find_artifact(&req.dest_stem).await,
        }
    }
}

fn spawn_error(e: std::io::Error) -> ExtractError {
    if e.kind() == std::io::ErrorKind::NotFound {
        ExtractError::Unavailable("yt-dlp binary not found on this host".to_string())
    } else {
        ExtractError::Transient(format!("Failed to start yt-dlp: {e}"))
    }
}

/// Turn yt-dlp stderr into an [`ExtractError`], preserving the original
/// service's user-facing messages.
fn classify_failure(stderr: &str) -> ExtractError {
    let message = stderr
        .lines()
        .rev()
        .find_map(|line| line.split_once("ERROR:").map(|(_, msg)| msg.trim()))
        .unwrap_or("")
        .to_string();

    if TRANSIENT_MARKERS.iter().any(|m| stderr.contains(m)) {
        let msg = if message.is_empty() {
            "Temporary network failure".to_string()
        } else {
            message
        };
        return ExtractError::Transient(msg);
    }

    if message.contains("Private video") || message.contains("Sign in") {
        return ExtractError::Unavailable(
            "Video is private, age-restricted, or requires login.".to_string(),
        );
    }

    if message.is_empty() {
        ExtractError::Unavailable("Video unavailable or private.".to_string())
    } else {
        ExtractError::Unavailable(message)
    }
}

// ---------------------------------------------------------------------------
// Probe JSON parsing
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct RawInfo {
    title: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
    uploader: Option<String>,
    #[serde(default)]
    formats: Vec<RawFormat>,
}

#[derive(Deserialize)]
struct RawFormat {
    format_id: String,
    height: Option<u32>,
    width: Option<u32>,
    ext: Option<String>,
    vcodec: Option<String>,
    filesize: Option<f64>,
    filesize_approx: Option<f64>,
}

/// Parse a `yt-dlp -J` dump into [`VideoInfo`].
///
/// Format filtering matches the service contract: audio-only entries are
/// dropped, dimensions and a (possibly approximate) filesize are
/// required, resolutions are deduplicated, and the list is sorted
/// best-first.
fn parse_probe_json(json: &str) -> Result<VideoInfo, ExtractError> {
    let raw: RawInfo =
        serde_json::from_str(json).map_err(|e| ExtractError::Malformed(e.to_string()))?;

    let formats: Vec<VideoFormat> = raw
        .formats
        .into_iter()
        .filter_map(|f| {
            if f.vcodec.as_deref() == Some("none") {
                return None;
            }
            let height = f.height?;
            let width = f.width?;
            let filesize = f.filesize.or(f.filesize_approx)?;
            if filesize <= 0.0 {
                return None;
            }
            Some(VideoFormat {
                format_id: f.format_id,
                quality_label: video::quality_label(height),
                height,
                width,
                ext: f.ext.unwrap_or_else(|| "mp4".to_string()),
                filesize: filesize as u64,
            })
        })
        .collect();

    Ok(VideoInfo {
        title: raw.title.unwrap_or_else(|| "Unknown Title".to_string()),
        duration_secs: raw.duration.map(|d| d.max(0.0) as u64).unwrap_or(0),
        thumbnail: raw.thumbnail,
        uploader: raw.uploader.unwrap_or_else(|| "Unknown".to_string()),
        formats: video::normalize_formats(formats),
    })
}

// ---------------------------------------------------------------------------
// Progress line parsing
// ---------------------------------------------------------------------------

/// Extract the percentage from a `--newline` progress line, e.g.
/// `[download]  42.7% of 10.05MiB at 1.23MiB/s ETA 00:07`.
fn parse_progress_line(line: &str) -> Option<i32> {
    let rest = line.strip_prefix("[download]")?.trim_start();
    let token = rest.split_whitespace().next()?;
    let percent: f64 = token.strip_suffix('%')?.parse().ok()?;
    Some(percent.clamp(0.0, 100.0) as i32)
}

/// Extract the output path from a destination or merge line.
fn parse_destination_line(line: &str) -> Option<PathBuf> {
    if let Some(rest) = line.strip_prefix("[download] Destination: ") {
        return Some(PathBuf::from(rest.trim()));
    }
    if let Some(rest) = line.strip_prefix("[Merger] Merging formats into \"") {
        return Some(PathBuf::from(rest.trim_end_matches('"')));
    }
    if let Some(rest) = line.strip_prefix("[download] ") {
        if let Some(path) = rest.strip_suffix(" has already been downloaded") {
            return Some(PathBuf::from(path.trim()));
        }
    }
    None
}

/// Locate the produced artifact by its stem when yt-dlp did not tell us
/// the final name.
async fn find_artifact(dest_stem: &Path) -> Result<PathBuf, ExtractError> {
    let dir = dest_stem.parent().unwrap_or_else(|| Path::new("."));
    let stem = dest_stem
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or_default();

    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if let Some(name) = entry.file_name().to_str() {
            if name.starts_with(stem) {
                return Ok(entry.path());
            }
        }
    }

    Err(ExtractError::Malformed(format!(
        "yt-dlp reported success but no artifact matches '{stem}'"
    )))
}

async fn read_capped<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut h) = handle {
        let _ = (&mut h)
            .take(MAX_STDERR_BYTES as u64)
            .read_to_end(&mut buf)
            .await;
    }
    buf
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
