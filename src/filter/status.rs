use std::fmt;

use serde::Serialize;

/// Nagios-style check status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl Status {
    /// Plugin exit code
    pub fn code(self) -> i32 {
        match self {
            Status::Ok => 0,
            Status::Warning => 1,
            Status::Critical => 2,
            Status::Unknown => 3,
        }
    }

    // Unknown outranks Warning but not Critical
    fn severity(self) -> u8 {
        match self {
            Status::Ok => 0,
            Status::Warning => 1,
            Status::Unknown => 2,
            Status::Critical => 3,
        }
    }

    pub fn is_worse_than(self, other: Status) -> bool {
        self.severity() > other.severity()
    }

    /// The worse of two statuses
    pub fn escalate(self, other: Status) -> Status {
        if other.is_worse_than(self) {
            other
        } else {
            self
        }
    }

    /// Parse `ok`, `warning`, `critical`, `unknown`, their short forms or
    /// the numeric exit codes
    pub fn parse(text: &str) -> Option<Status> {
        match text.trim().to_ascii_lowercase().as_str() {
            "ok" | "0" => Some(Status::Ok),
            "warning" | "warn" | "1" => Some(Status::Warning),
            "critical" | "crit" | "2" => Some(Status::Critical),
            "unknown" | "3" => Some(Status::Unknown),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Warning => "WARNING",
            Status::Critical => "CRITICAL",
            Status::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
