use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Access,
    Operation,
    Audit,
}

impl LogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogKind::Access => "access",
            LogKind::Operation => "operation",
            LogKind::Audit => "audit",
        }
    }
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "access" => Ok(LogKind::Access),
            "operation" => Ok(LogKind::Operation),
            "audit" => Ok(LogKind::Audit),
            other => Err(format!("unknown log kind: {}", other)),
        }
    }
}

/// A stored access, operation or audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    pub kind: LogKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    pub operation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordLog {
    pub kind: LogKind,
    #[serde(default)]
    pub operator: Option<String>,
    pub operation: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub status_code: Option<u16>,
}
