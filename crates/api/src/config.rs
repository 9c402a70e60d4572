use std::path::PathBuf;
use std::time::Duration;

use comfyremote_comfyui::backoff::PollConfig;
use comfyremote_core::job::DEFAULT_HISTORY_CAPACITY;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Base HTTP URL of the ComfyUI instance.
    pub comfyui_url: String,
    /// Directory holding the stored workflow JSON files.
    pub workflow_dir: PathBuf,
    /// Number of jobs kept in history (at least 1).
    pub job_history_capacity: usize,
    /// Job status polling policy.
    pub poll: PollConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                    |
    /// |----------------------------|----------------------------|
    /// | `HOST`                     | `0.0.0.0`                  |
    /// | `PORT`                     | `8000`                     |
    /// | `CORS_ORIGINS`             | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`     | `30`                       |
    /// | `COMFYUI_URL`              | `http://127.0.0.1:8188`    |
    /// | `WORKFLOW_DIR`             | `./workflows`              |
    /// | `JOB_HISTORY_CAPACITY`     | `50`                       |
    /// | `POLL_INITIAL_INTERVAL_MS` | `1000`                     |
    /// | `POLL_MAX_INTERVAL_MS`     | `10000`                    |
    /// | `POLL_MAX_ATTEMPTS`        | `600`                      |
    /// | `POLL_DEADLINE_SECS`       | `1800`                     |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "8000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let comfyui_url =
            std::env::var("COMFYUI_URL").unwrap_or_else(|_| "http://127.0.0.1:8188".into());

        let workflow_dir: PathBuf = std::env::var("WORKFLOW_DIR")
            .unwrap_or_else(|_| "./workflows".into())
            .into();

        let job_history_capacity: usize = std::env::var("JOB_HISTORY_CAPACITY")
            .unwrap_or_else(|_| DEFAULT_HISTORY_CAPACITY.to_string())
            .parse::<usize>()
            .expect("JOB_HISTORY_CAPACITY must be a valid usize")
            .max(1);

        let defaults = PollConfig::default();

        let initial_interval_ms: u64 = std::env::var("POLL_INITIAL_INTERVAL_MS")
            .unwrap_or_else(|_| defaults.initial_interval.as_millis().to_string())
            .parse()
            .expect("POLL_INITIAL_INTERVAL_MS must be a valid u64");

        let max_interval_ms: u64 = std::env::var("POLL_MAX_INTERVAL_MS")
            .unwrap_or_else(|_| defaults.max_interval.as_millis().to_string())
            .parse()
            .expect("POLL_MAX_INTERVAL_MS must be a valid u64");

        let max_attempts: u32 = std::env::var("POLL_MAX_ATTEMPTS")
            .unwrap_or_else(|_| defaults.max_attempts.to_string())
            .parse()
            .expect("POLL_MAX_ATTEMPTS must be a valid u32");

        let deadline_secs: u64 = std::env::var("POLL_DEADLINE_SECS")
            .unwrap_or_else(|_| defaults.deadline.as_secs().to_string())
            .parse()
            .expect("POLL_DEADLINE_SECS must be a valid u64");

        let poll = PollConfig {
            initial_interval: Duration::from_millis(initial_interval_ms),
            max_interval: Duration::from_millis(max_interval_ms),
            max_attempts,
            deadline: Duration::from_secs(deadline_secs),
            ..defaults
        };
        if let Err(e) = poll.validate() {
            panic!("Invalid polling configuration: {e}");
        }

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            comfyui_url,
            workflow_dir,
            job_history_capacity,
            poll,
        }
    }
}
