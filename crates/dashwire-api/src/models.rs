// Wire types for the dashboard API.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ── Log records ─────────────────────────────────────────────────────

/// A scalar attribute value attached to a log record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(n) => write!(f, "{n}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

/// One server log line, as pushed over `/api/logs/stream`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub time: String,
    pub level: String,
    pub msg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<BTreeMap<String, AttrValue>>,
}

/// Display bucket for a record's level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum LevelClass {
    Error,
    Warn,
    Debug,
    Info,
}

impl LogRecord {
    /// Parse one push payload.
    pub fn from_wire(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }

    /// Encode as a push payload.
    pub fn to_wire(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Bucket the level case-insensitively; anything unknown is `Info`.
    pub fn level_class(&self) -> LevelClass {
        match self.level.to_ascii_uppercase().as_str() {
            "ERROR" => LevelClass::Error,
            "WARN" | "WARNING" => LevelClass::Warn,
            "DEBUG" => LevelClass::Debug,
            _ => LevelClass::Info,
        }
    }

    /// `msg` followed by `key=value` pairs. String values are written bare,
    /// everything else as JSON.
    pub fn display_message(&self) -> String {
        let mut message = self.msg.clone();
        let Some(attrs) = self.attrs.as_ref().filter(|a| !a.is_empty()) else {
            return message;
        };
        for (key, value) in attrs {
            message.push(' ');
            message.push_str(key);
            message.push('=');
            match value {
                AttrValue::String(s) => message.push_str(s),
                other => message.push_str(&other.to_string()),
            }
        }
        message
    }
}

/// Response of `GET /api/logs/history`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogHistory {
    pub logs: Vec<LogRecord>,
    pub count: usize,
}

// ── Auth ────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub auth_key: &'a str,
}

/// Response of `POST /api/login`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ValidateSessionRequest<'a> {
    pub session_id: &'a str,
}

/// Response of `POST /api/validate-session`.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct ValidateSessionResponse {
    pub valid: bool,
}

// ── Dashboard ───────────────────────────────────────────────────────

/// Response of `GET /api/dashboard/stats`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DashboardStats {
    pub memory_used: u64,
    pub memory_total: u64,
    pub memory_percent: f64,
    /// Server start, Unix seconds.
    pub start_time: i64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn wire_round_trip_is_lossless() {
        let record = LogRecord {
            time: "2025-01-18 04:18:14".into(),
            level: "INFO".into(),
            msg: "client connected".into(),
            attrs: Some(BTreeMap::from([
                ("remote_addr".into(), AttrValue::String("10.0.0.2".into())),
                ("port".into(), AttrValue::Int(8080)),
                ("ratio".into(), AttrValue::Float(0.5)),
                ("tls".into(), AttrValue::Bool(false)),
            ])),
        };

        let wire = record.to_wire().unwrap();
        assert_eq!(LogRecord::from_wire(&wire).unwrap(), record);
    }

    #[test]
    fn attrs_are_optional() {
        let record = LogRecord::from_wire(r#"{"time":"t","level":"WARN","msg":"m"}"#).unwrap();
        assert!(record.attrs.is_none());
        assert_eq!(record.to_wire().unwrap(), r#"{"time":"t","level":"WARN","msg":"m"}"#);
    }

    #[test]
    fn non_scalar_attrs_are_rejected() {
        let raw = r#"{"time":"t","level":"INFO","msg":"m","attrs":{"nested":{"a":1}}}"#;
        assert!(LogRecord::from_wire(raw).is_err());
    }

    #[test]
    fn level_classification() {
        let mut record = LogRecord::from_wire(r#"{"time":"t","level":"error","msg":"m"}"#).unwrap();
        assert_eq!(record.level_class(), LevelClass::Error);
        record.level = "DEBUG".into();
        assert_eq!(record.level_class(), LevelClass::Debug);
        record.level = "TRACE".into();
        assert_eq!(record.level_class(), LevelClass::Info);
    }

    #[test]
    fn display_message_appends_attrs() {
        let raw = r#"{"time":"t","level":"INFO","msg":"login","attrs":{"ok":true,"user":"admin"}}"#;
        let record = LogRecord::from_wire(raw).unwrap();
        assert_eq!(record.display_message(), "login ok=true user=admin");
    }
}
