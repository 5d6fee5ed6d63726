use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::log::subject_matches;

/// Lifecycle state of an execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionState {
    #[default]
    Running,
    Completed,
    Failed,
}

impl ExecutionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionState::Running => "running",
            ExecutionState::Completed => "completed",
            ExecutionState::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "running" => Some(ExecutionState::Running),
            "completed" => Some(ExecutionState::Completed),
            "failed" => Some(ExecutionState::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExecutionState::Running)
    }
}

impl std::fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Current status of an execution, replaced wholesale on every update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRecord {
    pub subject: Option<String>,
    pub status: ExecutionState,
    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusRecord {
    pub fn matches(&self, filter: Option<&str>) -> bool {
        subject_matches(self.subject.as_deref(), filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_parse() {
        assert_eq!(ExecutionState::from_str("Completed"), Some(ExecutionState::Completed));
        assert_eq!(ExecutionState::from_str("FAILED"), Some(ExecutionState::Failed));
        assert_eq!(ExecutionState::from_str("queued"), None);
        assert!(ExecutionState::Failed.is_terminal());
        assert!(!ExecutionState::Running.is_terminal());
    }

    #[test]
    fn test_record_serialization_omits_absent_fields() {
        let record = StatusRecord {
            subject: Some("e1".to_string()),
            status: ExecutionState::Running,
            start_time: DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            end_time: None,
            exit_code: None,
            error: None,
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["status"], "running");
        assert_eq!(value["subject"], "e1");
        assert!(value.get("exitCode").is_none());
        assert!(value.get("endTime").is_none());
    }
}
