use crate::launcher::LaunchTransport;
use crate::poller::StatusSource;
use crate::status::UpdateStatusSnapshot;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("server returned HTTP {status}")]
    Status { status: u16 },
    #[error("invalid response payload: {0}")]
    Decode(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateMode {
    Test,
    Confirm,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StartUpdateRequest {
    pub devices: Vec<String>,
    pub build_dir: String,
    pub update_mode: UpdateMode,
    pub stall_timeout: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StartUpdateResponse {
    pub success: bool,
    pub error: Option<String>,
    pub message: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogsResponse {
    pub success: bool,
    pub logs: Option<String>,
    pub log_file: Option<String>,
    pub error: Option<String>,
}

#[derive(Deserialize)]
struct CheckFileResponse {
    #[serde(default)]
    exists: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// HTTP client for the firmware-update server's `/api/*` endpoints.
#[derive(Clone)]
pub struct UpdaterClient {
    base_url: String,
    client: reqwest::Client,
}

impl UpdaterClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| ClientError::Network {
                url: base_url.to_string(),
                source,
            })?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn fetch_status(&self) -> Result<UpdateStatusSnapshot, ClientError> {
        let url = self.url("/api/update_status");
        let response = self.send(self.client.get(&url), &url).await?;
        decode(response).await
    }

    pub async fn start_update(
        &self,
        request: &StartUpdateRequest,
    ) -> Result<StartUpdateResponse, ClientError> {
        let url = self.url("/api/start_update");
        let response = self.send(self.client.post(&url).json(request), &url).await?;
        decode(response).await
    }

    /// Fail-closed: any error reads as "does not exist".
    pub async fn check_file(&self, path: &str) -> bool {
        let url = self.url("/api/check_file");
        let result: Result<CheckFileResponse, ClientError> = async {
            let response = self
                .send(self.client.get(&url).query(&[("path", path)]), &url)
                .await?;
            decode::<CheckFileResponse>(response).await
        }
        .await;
        match result {
            Ok(body) => body.exists,
            Err(err) => {
                tracing::warn!("Error checking file {path}: {err}");
                false
            }
        }
    }

    pub async fn download(
        &self,
        path: &str,
        filename: Option<&str>,
    ) -> Result<DownloadedFile, ClientError> {
        let url = self.url("/api/download");
        let response = self
            .send(self.client.get(&url).query(&[("path", path)]), &url)
            .await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|source| ClientError::Network {
                url: url.clone(),
                source,
            })?;
        Ok(DownloadedFile {
            filename: download_name(path, filename),
            bytes: bytes.to_vec(),
        })
    }

    pub async fn fetch_logs(&self, log_file: Option<&str>) -> Result<LogsResponse, ClientError> {
        let url = self.url("/api/logs");
        let mut request = self.client.get(&url);
        if let Some(log_file) = log_file {
            request = request.query(&[("log_file", log_file)]);
        }
        let response = self.send(request, &url).await?;
        decode(response).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        url: &str,
    ) -> Result<reqwest::Response, ClientError> {
        let response = request.send().await.map_err(|source| ClientError::Network {
            url: url.to_string(),
            source,
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    response
        .json::<T>()
        .await
        .map_err(|err| ClientError::Decode(err.to_string()))
}

/// Name to save a download under: the caller's choice, else the last path segment.
pub fn download_name(path: &str, filename: Option<&str>) -> String {
    if let Some(name) = filename.map(str::trim).filter(|name| !name.is_empty()) {
        return name.to_string();
    }
    match path.rsplit('/').next() {
        Some(segment) if !segment.is_empty() => segment.to_string(),
        _ => "download".to_string(),
    }
}

#[async_trait]
impl StatusSource for UpdaterClient {
    async fn fetch_status(&self) -> Result<UpdateStatusSnapshot, ClientError> {
        UpdaterClient::fetch_status(self).await
    }
}

#[async_trait]
impl LaunchTransport for UpdaterClient {
    async fn start_update(
        &self,
        request: &StartUpdateRequest,
    ) -> Result<StartUpdateResponse, ClientError> {
        UpdaterClient::start_update(self, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_drops_trailing_slash() {
        let client = UpdaterClient::new("http://updater.lan:5000/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://updater.lan:5000");
    }

    #[test]
    fn download_name_defaults_to_last_segment() {
        assert_eq!(
            download_name("logs/flash_logs_20240101.log", None),
            "flash_logs_20240101.log"
        );
        assert_eq!(download_name("logs/a.log", Some("renamed.log")), "renamed.log");
        assert_eq!(download_name("logs/a.log", Some("  ")), "a.log");
        assert_eq!(download_name("logs/", None), "download");
    }

    #[test]
    fn request_serializes_wire_names() {
        let request = StartUpdateRequest {
            devices: vec!["node-1".into()],
            build_dir: "../application/build".into(),
            update_mode: UpdateMode::Test,
            stall_timeout: 300,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["update_mode"], "test");
        assert_eq!(json["build_dir"], "../application/build");
        assert_eq!(json["stall_timeout"], 300);
    }
}
