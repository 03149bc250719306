use std::path::PathBuf;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Directory download artifacts are written to and served from.
    pub download_dir: PathBuf,
    /// How long finished tasks and their artifacts are retained, in
    /// seconds (default: 2 hours).
    pub retention_secs: u64,
    /// How often the eviction sweep runs, in seconds (default: hourly).
    pub eviction_interval_secs: u64,
    /// Path or name of the yt-dlp binary.
    pub ytdlp_bin: String,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default      |
    /// |--------------------------|--------------|
    /// | `HOST`                   | `0.0.0.0`    |
    /// | `PORT`                   | `3000`       |
    /// | `CORS_ORIGINS`           | (empty)      |
    /// | `REQUEST_TIMEOUT_SECS`   | `30`         |
    /// | `DOWNLOAD_DIR`           | `downloads`  |
    /// | `RETENTION_SECS`         | `7200`       |
    /// | `EVICTION_INTERVAL_SECS` | `3600`       |
    /// | `YTDLP_BIN`              | `yt-dlp`     |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let download_dir = PathBuf::from(
            std::env::var("DOWNLOAD_DIR").unwrap_or_else(|_| "downloads".into()),
        );

        let retention_secs: u64 = std::env::var("RETENTION_SECS")
            .unwrap_or_else(|_| "7200".into())
            .parse()
            .expect("RETENTION_SECS must be a valid u64");

        let eviction_interval_secs: u64 = std::env::var("EVICTION_INTERVAL_SECS")
            .unwrap_or_else(|_| "3600".into())
            .parse()
            .expect("EVICTION_INTERVAL_SECS must be a valid u64");

        let ytdlp_bin = std::env::var("YTDLP_BIN").unwrap_or_else(|_| "yt-dlp".into());

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            download_dir,
            retention_secs,
            eviction_interval_secs,
            ytdlp_bin,
        }
    }
}
