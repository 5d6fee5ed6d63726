//! Frame body normalization
//!
//! Backend producers do not agree on field casing (`executionId` vs
//! `ExecutionID`, `level` vs `Level`, ...). Every logical attribute has an
//! ordered alias list in [`Field::aliases`]; lookups take the first alias that
//! carries a usable value.

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::models::{parse_timestamp, ExecutionState, Frame, LogEntry, LogLevel, StatusRecord};

/// Logical attributes read from frame bodies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Subject,
    Level,
    Message,
    Status,
    StartTime,
    EndTime,
    ExitCode,
    Error,
}

impl Field {
    pub const ALL: [Field; 8] = [
        Field::Subject,
        Field::Level,
        Field::Message,
        Field::Status,
        Field::StartTime,
        Field::EndTime,
        Field::ExitCode,
        Field::Error,
    ];

    /// Accepted wire names, in precedence order
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Field::Subject => &["executionId", "ExecutionID"],
            Field::Level => &["level", "Level"],
            Field::Message => &["message", "Message"],
            Field::Status => &["status", "Status"],
            Field::StartTime => &["startTime", "StartTime"],
            Field::EndTime => &["endTime", "EndTime"],
            Field::ExitCode => &["exitCode", "ExitCode"],
            Field::Error => &["error", "Error"],
        }
    }

    /// First non-empty string value under any alias
    pub fn str_in(self, body: &Value) -> Option<&str> {
        self.aliases()
            .iter()
            .filter_map(|key| body.get(*key).and_then(Value::as_str))
            .find(|s| !s.is_empty())
    }

    /// Like [`Field::str_in`], but numeric ids are rendered as strings
    pub fn id_in(self, body: &Value) -> Option<String> {
        self.aliases().iter().find_map(|key| match body.get(*key)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }

    /// First integer value under any alias
    pub fn i64_in(self, body: &Value) -> Option<i64> {
        self.aliases()
            .iter()
            .find_map(|key| body.get(*key).and_then(Value::as_i64))
    }

    /// First parseable timestamp under any alias
    pub fn time_in(self, body: &Value) -> Option<DateTime<Utc>> {
        self.aliases()
            .iter()
            .filter_map(|key| body.get(*key).and_then(Value::as_str))
            .find_map(parse_timestamp)
    }
}

/// Build a log entry from a `log` frame body
pub fn log_entry(frame: &Frame, body: &Value) -> LogEntry {
    LogEntry {
        id: Uuid::new_v4().to_string(),
        subject: Field::Subject.id_in(body),
        timestamp: frame.parsed_timestamp().unwrap_or_else(Utc::now),
        level: Field::Level
            .str_in(body)
            .and_then(LogLevel::from_str)
            .unwrap_or_default(),
        message: Field::Message
            .str_in(body)
            .map(str::to_string)
            .unwrap_or_else(|| body.to_string()),
    }
}

/// Build a status record from a `status` frame body
pub fn status_record(frame: &Frame, body: &Value) -> StatusRecord {
    StatusRecord {
        subject: Field::Subject.id_in(body),
        status: Field::Status
            .str_in(body)
            .and_then(ExecutionState::from_str)
            .unwrap_or_default(),
        start_time: Field::StartTime
            .time_in(body)
            .or_else(|| frame.parsed_timestamp())
            .unwrap_or_else(Utc::now),
        end_time: Field::EndTime.time_in(body),
        exit_code: Field::ExitCode.i64_in(body),
        error: Field::Error.str_in(body).map(str::to_string),
    }
}
