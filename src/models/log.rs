use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[default]
    Info,
    Warn,
    Error,
    Debug,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Debug => "debug",
        }
    }

    /// Case-insensitive parse; `None` for anything unrecognized
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            "debug" => Some(LogLevel::Debug),
            _ => None,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Normalized execution log line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Synthetic id, unique per entry
    pub id: String,
    /// Execution the line belongs to; `None` for unscoped broadcasts
    pub subject: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    /// Whether this entry is visible to a subscriber scoped to `filter`
    pub fn matches(&self, filter: Option<&str>) -> bool {
        subject_matches(self.subject.as_deref(), filter)
    }
}

/// Accept rule shared by log and status records: no filter, no subject, or
/// an exact subject match.
pub(crate) fn subject_matches(subject: Option<&str>, filter: Option<&str>) -> bool {
    match (filter, subject) {
        (None, _) | (_, None) => true,
        (Some(filter), Some(subject)) => filter == subject,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parse() {
        assert_eq!(LogLevel::from_str("ERROR"), Some(LogLevel::Error));
        assert_eq!(LogLevel::from_str("Warning"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::from_str("warn"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::from_str("debug"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::from_str("trace"), None);
        assert_eq!(LogLevel::default(), LogLevel::Info);
    }

    #[test]
    fn test_level_serialization() {
        assert_eq!(serde_json::to_string(&LogLevel::Warn).unwrap(), "\"warn\"");
        assert_eq!(LogLevel::Error.to_string(), "error");
    }

    #[test]
    fn test_subject_matching() {
        assert!(subject_matches(Some("e1"), None));
        assert!(subject_matches(Some("e1"), Some("e1")));
        assert!(!subject_matches(Some("e2"), Some("e1")));
        // Entries without a subject reach every subscriber.
        assert!(subject_matches(None, Some("e1")));
        assert!(subject_matches(None, None));
    }
}
