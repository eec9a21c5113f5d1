use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{NamedRef, NOT_AVAILABLE};

/// States a Backup Service task can be in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    Queued,
    Running,
    Finished,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 5] = [
        TaskStatus::Queued,
        TaskStatus::Running,
        TaskStatus::Finished,
        TaskStatus::Failed,
        TaskStatus::Cancelled,
    ];

    /// Name as reported by the API
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Queued => "QUEUED",
            TaskStatus::Running => "RUNNING",
            TaskStatus::Finished => "FINISHED",
            TaskStatus::Failed => "FAILED",
            TaskStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        TaskStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == upper)
            .ok_or_else(|| {
                format!(
                    "unknown task status '{}' (expected one of QUEUED, RUNNING, FINISHED, FAILED, CANCELLED)",
                    s
                )
            })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(default)]
    pub guid: Option<String>,
    #[serde(rename = "type", default)]
    pub task_type: Option<NamedRef>,
    #[serde(default)]
    pub state: Option<NamedRef>,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub protected_entity: Option<NamedRef>,
}

fn name_of(reference: &Option<NamedRef>) -> Option<&str> {
    reference.as_ref().and_then(|r| r.name.as_deref())
}

impl Task {
    pub fn state_name(&self) -> Option<&str> {
        name_of(&self.state)
    }

    pub fn target_guid(&self) -> Option<&str> {
        self.protected_entity.as_ref().and_then(|e| e.guid.as_deref())
    }

    pub fn display_guid(&self) -> &str {
        self.guid.as_deref().unwrap_or(NOT_AVAILABLE)
    }

    pub fn display_type(&self) -> &str {
        name_of(&self.task_type).unwrap_or(NOT_AVAILABLE)
    }

    pub fn display_state(&self) -> &str {
        self.state_name().unwrap_or(NOT_AVAILABLE)
    }

    pub fn display_target(&self) -> &str {
        name_of(&self.protected_entity).unwrap_or(NOT_AVAILABLE)
    }

    pub fn display_progress(&self) -> String {
        match self.progress {
            Some(progress) => format!("{}", progress),
            None => NOT_AVAILABLE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub vm_guid: Option<String>,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        let status_ok = self
            .status
            .map_or(true, |status| task.state_name() == Some(status.as_str()));
        let vm_ok = self
            .vm_guid
            .as_deref()
            .map_or(true, |guid| task.target_guid() == Some(guid));
        status_ok && vm_ok
    }

    pub fn apply<'a>(&self, tasks: &'a [Task]) -> Vec<&'a Task> {
        tasks.iter().filter(|t| self.matches(t)).collect()
    }
}
