use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScannerState {
    Idle,
    Active,
    Stopping,
    Stopped,
}

impl ScannerState {
    pub fn can_transition_to(self, target: ScannerState) -> bool {
        matches!(
            (self, target),
            (ScannerState::Idle, ScannerState::Active)
                | (ScannerState::Active, ScannerState::Stopping)
                | (ScannerState::Stopping, ScannerState::Stopped)
                | (ScannerState::Stopped, ScannerState::Active)
        )
    }
}

impl std::fmt::Display for ScannerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Active => write!(f, "active"),
            Self::Stopping => write!(f, "stopping"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Summary of one pass over every stored check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total: usize,
    pub well_formed: usize,
    pub malformed: usize,
    pub unreadable: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listing_error: Option<String>,
}

impl ScanReport {
    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}
