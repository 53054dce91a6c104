//! Payloads of the task and version streams.
//!
//! Backends post these to the producer endpoints; the broker turns each
//! variant into one named [`StreamEvent`](super::StreamEvent).

use serde::{Deserialize, Serialize};

/// Final state of a task execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskOutcome {
    Succeeded,
    Failed,
    Cancelled,
}

impl std::fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskOutcome::Succeeded => write!(f, "succeeded"),
            TaskOutcome::Failed => write!(f, "failed"),
            TaskOutcome::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A state change of a running task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskUpdate {
    Progress {
        stage: String,
        #[serde(default)]
        percent: Option<u8>,
    },
    Finished {
        outcome: TaskOutcome,
        #[serde(default)]
        detail: Option<String>,
    },
}

impl TaskUpdate {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskUpdate::Finished { .. })
    }
}

/// Progress of a version lookup across package sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VersionUpdate {
    /// Versions reported by one source while others are still pending.
    Partial {
        source: String,
        versions: Vec<String>,
    },
    Resolved {
        latest: Option<String>,
        versions: Vec<String>,
    },
    Failed {
        reason: String,
    },
}

impl VersionUpdate {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, VersionUpdate::Partial { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_update_parsing() {
        let update: TaskUpdate =
            serde_json::from_str(r#"{"type":"finished","outcome":"failed","detail":"oom"}"#)
                .unwrap();
        assert!(update.is_terminal());
        let update: TaskUpdate =
            serde_json::from_str(r#"{"type":"progress","stage":"build"}"#).unwrap();
        assert!(!update.is_terminal());
    }

    #[test]
    fn test_version_update_terminality() {
        let partial = VersionUpdate::Partial {
            source: "crates.io".into(),
            versions: vec!["1.0.0".into()],
        };
        assert!(!partial.is_terminal());
        assert!(VersionUpdate::Failed { reason: "timeout".into() }.is_terminal());
    }
}
