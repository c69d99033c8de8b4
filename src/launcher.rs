use crate::api::{ClientError, StartUpdateRequest, StartUpdateResponse, UpdateMode};
use crate::session::ConsoleSession;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait LaunchTransport: Send + Sync {
    async fn start_update(
        &self,
        request: &StartUpdateRequest,
    ) -> Result<StartUpdateResponse, ClientError>;
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LaunchError {
    #[error("No devices selected")]
    EmptySelection,
    #[error("HTTP error {status_code}")]
    Transport { status_code: u16 },
    #[error("{reason}")]
    ServerRejected { reason: String },
    #[error("network error: {0}")]
    Network(String),
}

impl From<ClientError> for LaunchError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Status { status } => LaunchError::Transport {
                status_code: status,
            },
            other => LaunchError::Network(other.to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LaunchAck {
    pub message: Option<String>,
}

pub struct UpdateLauncher {
    transport: Arc<dyn LaunchTransport>,
    session: Arc<ConsoleSession>,
}

impl UpdateLauncher {
    pub fn new(transport: Arc<dyn LaunchTransport>, session: Arc<ConsoleSession>) -> Self {
        Self { transport, session }
    }

    /// Submits a start-update command. Marks the session as in progress
    /// before the server answers; the next polled snapshot settles it either
    /// way. Rendering the outcome is left to the caller.
    pub async fn launch(
        &self,
        devices: &[String],
        build_dir: &str,
        mode: UpdateMode,
        stall_timeout_secs: u64,
    ) -> Result<LaunchAck, LaunchError> {
        if devices.is_empty() {
            return Err(LaunchError::EmptySelection);
        }

        self.session.begin_launch();

        let request = StartUpdateRequest {
            devices: devices.to_vec(),
            build_dir: build_dir.to_string(),
            update_mode: mode,
            stall_timeout: stall_timeout_secs,
        };
        tracing::info!(
            "Starting update for {} device(s) from {build_dir} ({mode:?})",
            devices.len()
        );

        let response = self.transport.start_update(&request).await?;
        if !response.success {
            let reason = response
                .error
                .unwrap_or_else(|| "Unknown error".to_string());
            tracing::warn!("Update rejected by server: {reason}");
            return Err(LaunchError::ServerRejected { reason });
        }
        Ok(LaunchAck {
            message: response.message,
        })
    }
}
