use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Frame discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameKind {
    Log,
    Status,
    Metrics,
    #[serde(other)]
    Unknown,
}

impl FrameKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameKind::Log => "log",
            FrameKind::Status => "status",
            FrameKind::Metrics => "metrics",
            FrameKind::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for FrameKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One JSON message delivered over the streaming channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    #[serde(rename = "type")]
    pub kind: FrameKind,
    /// Producer timestamp, kept raw; a non-string value is ignored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Legacy name for `data`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl Frame {
    /// Decode a single frame
    pub fn decode(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Decode every frame packed into one transport message.
    ///
    /// The backend coalesces queued frames into a single text message
    /// separated by newlines. A value that is valid JSON but not a frame is
    /// skipped on its own. A syntax error ends the message, since nothing
    /// after it can be resynchronized. A message with no JSON value at all is
    /// reported as an error too.
    pub fn decode_batch(text: &str) -> (Vec<Frame>, Vec<serde_json::Error>) {
        let mut frames = Vec::new();
        let mut errors = Vec::new();
        for item in serde_json::Deserializer::from_str(text).into_iter::<Value>() {
            match item.and_then(serde_json::from_value::<Frame>) {
                Ok(frame) => frames.push(frame),
                Err(e) if e.is_data() => errors.push(e),
                Err(e) => {
                    errors.push(e);
                    break;
                }
            }
        }

        if frames.is_empty() && errors.is_empty() {
            errors.extend(serde_json::from_str::<Value>(text).err());
        }
        (frames, errors)
    }

    /// The frame body: `data` if present, else `payload`. JSON null counts as absent.
    pub fn body(&self) -> Option<&Value> {
        self.data
            .as_ref()
            .filter(|v| !v.is_null())
            .or_else(|| self.payload.as_ref().filter(|v| !v.is_null()))
    }

    /// Frame timestamp, if it is a string [`parse_timestamp`] understands
    pub fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
            .as_ref()
            .and_then(Value::as_str)
            .and_then(parse_timestamp)
    }
}

/// Parse an RFC 3339 timestamp, or an ISO 8601 one without offset taken as UTC
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_log_frame() {
        let frame = Frame::decode(
            r#"{"type":"log","timestamp":"2025-01-01T00:00:00Z","data":{"message":"hi"}}"#,
        )
        .unwrap();

        assert_eq!(frame.kind, FrameKind::Log);
        assert_eq!(frame.body(), Some(&json!({"message": "hi"})));
        assert_eq!(
            frame.parsed_timestamp().unwrap().to_rfc3339(),
            "2025-01-01T00:00:00+00:00"
        );
    }

    #[test]
    fn test_unknown_type_is_accepted() {
        let frame = Frame::decode(r#"{"type":"heartbeat","data":{}}"#).unwrap();
        assert_eq!(frame.kind, FrameKind::Unknown);
    }

    #[test]
    fn test_missing_type_is_rejected() {
        assert!(Frame::decode(r#"{"data":{}}"#).is_err());
        assert!(Frame::decode("not json").is_err());
    }

    #[test]
    fn test_body_prefers_data() {
        let frame = Frame::decode(r#"{"type":"log","data":{"a":1},"payload":{"b":2}}"#).unwrap();
        assert_eq!(frame.body(), Some(&json!({"a": 1})));

        let frame = Frame::decode(r#"{"type":"log","payload":{"b":2}}"#).unwrap();
        assert_eq!(frame.body(), Some(&json!({"b": 2})));

        let frame = Frame::decode(r#"{"type":"log","data":null,"payload":{"b":2}}"#).unwrap();
        assert_eq!(frame.body(), Some(&json!({"b": 2})));

        let frame = Frame::decode(r#"{"type":"log"}"#).unwrap();
        assert!(frame.body().is_none());
    }

    #[test]
    fn test_go_nanosecond_timestamp() {
        let frame =
            Frame::decode(r#"{"type":"log","timestamp":"2025-03-04T10:11:12.123456789+02:00"}"#)
                .unwrap();
        let ts = frame.parsed_timestamp().unwrap();
        assert_eq!(ts.to_rfc3339(), "2025-03-04T08:11:12.123456789+00:00");

        let frame = Frame::decode(r#"{"type":"log","timestamp":"yesterday"}"#).unwrap();
        assert!(frame.parsed_timestamp().is_none());
    }

    #[test]
    fn test_offsetless_timestamp_is_utc() {
        let frame = Frame::decode(r#"{"type":"log","timestamp":"2025-01-01T00:00:00"}"#).unwrap();
        assert_eq!(
            frame.parsed_timestamp().unwrap().to_rfc3339(),
            "2025-01-01T00:00:00+00:00"
        );

        let ts = parse_timestamp("2025-01-01T08:30:00.250").unwrap();
        assert_eq!(ts.to_rfc3339(), "2025-01-01T08:30:00.250+00:00");
    }

    #[test]
    fn test_non_string_timestamp_keeps_frame() {
        let frame = Frame::decode(
            r#"{"type":"log","timestamp":1735689600,"data":{"message":"hi"}}"#,
        )
        .unwrap();

        assert_eq!(frame.body(), Some(&json!({"message": "hi"})));
        assert!(frame.parsed_timestamp().is_none());
    }

    #[test]
    fn test_decode_batch() {
        let text = "{\"type\":\"log\",\"data\":{\"message\":\"a\"}}\n{\"type\":\"status\",\"data\":{\"status\":\"completed\"}}";
        let (frames, errors) = Frame::decode_batch(text);
        assert!(errors.is_empty());
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].kind, FrameKind::Log);
        assert_eq!(frames[1].kind, FrameKind::Status);
    }

    #[test]
    fn test_decode_batch_skips_invalid_frame() {
        let text = "{\"type\":\"log\",\"data\":{\"message\":\"a\"}}\n{\"data\":{\"message\":\"b\"}}\n{\"type\":\"log\",\"timestamp\":5,\"data\":{\"message\":\"c\"}}";
        let (frames, errors) = Frame::decode_batch(text);

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].body(), Some(&json!({"message": "a"})));
        assert_eq!(frames[1].body(), Some(&json!({"message": "c"})));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_decode_batch_stops_at_syntax_error() {
        let text = "{\"type\":\"log\",\"data\":{}}\n{broken\n{\"type\":\"log\",\"data\":{}}";
        let (frames, errors) = Frame::decode_batch(text);
        assert_eq!(frames.len(), 1);
        assert_eq!(errors.len(), 1);

        let (frames, errors) = Frame::decode_batch("garbage");
        assert!(frames.is_empty());
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_decode_batch_reports_empty_message() {
        for text in ["", "  \n "] {
            let (frames, errors) = Frame::decode_batch(text);
            assert!(frames.is_empty());
            assert_eq!(errors.len(), 1);
            assert!(errors[0].is_eof());
        }
    }
}
