//! Worker slots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::WorkerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerStatus {
    Available,
    Busy,
    Offline,
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkerStatus::Available => "AVAILABLE",
            WorkerStatus::Busy => "BUSY",
            WorkerStatus::Offline => "OFFLINE",
        };
        f.write_str(s)
    }
}

/// A named processing slot.
///
/// Like `Job`, a worker is a snapshot: status changes return a new value and
/// only reach other components once a repository persists them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Worker {
    id: WorkerId,
    name: String,
    status: WorkerStatus,
    last_heartbeat: DateTime<Utc>,
}

impl Worker {
    pub fn new(
        id: WorkerId,
        name: impl Into<String>,
        status: WorkerStatus,
        last_heartbeat: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            status,
            last_heartbeat,
        }
    }

    pub fn id(&self) -> &WorkerId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> WorkerStatus {
        self.status
    }

    pub fn last_heartbeat(&self) -> DateTime<Utc> {
        self.last_heartbeat
    }

    pub fn is_available(&self) -> bool {
        self.status == WorkerStatus::Available
    }

    pub fn with_status(&self, status: WorkerStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }

    pub fn heartbeat(&self, at: DateTime<Utc>) -> Self {
        Self {
            last_heartbeat: at,
            ..self.clone()
        }
    }
}
