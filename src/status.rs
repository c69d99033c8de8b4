use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateState {
    #[default]
    Idle,
    Updating,
    Completed,
    Error,
    #[serde(other)]
    Unknown,
}

/// One copy of the server-side update status. Replaced wholesale on every poll.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateStatusSnapshot {
    pub state: UpdateState,
    pub current_device: Option<String>,
    pub total_devices: u64,
    pub completed_devices: u64,
    pub successful_updates: u64,
    pub failed_updates: u64,
    pub skipped_updates: u64,
    pub upload_progress: f64,
    pub log_file: Option<String>,
    pub last_update: Option<String>,
}

impl UpdateStatusSnapshot {
    pub fn is_updating(&self) -> bool {
        self.state == UpdateState::Updating
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ClientPollState {
    pub last_snapshot: Option<UpdateStatusSnapshot>,
    pub in_progress: bool,
    pub completion_fired: bool,
}

impl ClientPollState {
    /// Optimistic transition taken when a new update is submitted.
    pub fn begin_launch(&mut self) {
        self.in_progress = true;
        self.completion_fired = false;
    }
}
