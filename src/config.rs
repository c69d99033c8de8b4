use std::env;
use std::time::Duration;

pub struct AppConfig {
    pub updater_url: String,
    pub http_bind: String,
    pub poll_interval_ms: u64,
    pub request_timeout_ms: u64,
    pub notify_path: String,
    pub notify_reconnect_ms: u64,
    pub log_panel_lines: usize,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            updater_url: env_var("UPDATER_URL", "http://127.0.0.1:5000"),
            http_bind: env_var("HTTP_BIND", "0.0.0.0:8080"),
            poll_interval_ms: env_var("POLL_INTERVAL_MS", "3000").parse().unwrap_or(3000),
            request_timeout_ms: env_var("REQUEST_TIMEOUT_MS", "10000")
                .parse()
                .unwrap_or(10_000),
            notify_path: env_var("NOTIFY_PATH", "/socket.io/?EIO=4&transport=websocket"),
            notify_reconnect_ms: env_var("NOTIFY_RECONNECT_MS", "5000")
                .parse()
                .unwrap_or(5000),
            log_panel_lines: env_var("LOG_PANEL_LINES", "500").parse().unwrap_or(500),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn notify_reconnect(&self) -> Duration {
        Duration::from_millis(self.notify_reconnect_ms)
    }

    /// WebSocket URL of the updater's Socket.IO endpoint.
    pub fn notify_url(&self) -> String {
        websocket_url(&self.updater_url, &self.notify_path)
    }
}

pub fn websocket_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base.to_string()
    };
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

fn env_var(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
