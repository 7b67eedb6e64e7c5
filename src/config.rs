//! Per-check filter configuration.
//!
//! A `FilterConfig` is read from JSON. Every field is optional so a check's
//! section can inherit unset values from a parent section via
//! [`FilterConfig::apply_parent`].

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::filter::Status;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid time: {0}")]
    InvalidTime(String),

    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error("max_age is not supported: no timestamp attribute registered")]
    NoAgeAttribute,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterConfig {
    /// Objects not matching this expression are ignored
    pub filter: Option<String>,
    pub ok: Option<String>,
    pub warn: Option<String>,
    pub crit: Option<String>,

    pub syntax_top: Option<String>,
    pub syntax_detail: Option<String>,
    pub syntax_ok: Option<String>,
    pub syntax_empty: Option<String>,
    /// Status reported when no object matched the filter
    pub empty_state: Option<String>,
    pub perf_syntax: Option<String>,
    /// Status given to every matched object instead of evaluating ok/warn/crit
    pub severity: Option<String>,
    /// HTML-escape the rendered message
    pub escape_html: Option<bool>,

    pub debug: Option<bool>,
    /// Objects older than this are ignored, e.g. `2d`; `none` disables it
    pub max_age: Option<String>,
    /// Wall-clock budget for a scan, e.g. `30s`; `none` disables it
    pub timeout: Option<String>,
    pub max_objects: Option<usize>,
    pub timeout_msg: Option<String>,
}

macro_rules! inherit {
    ($self:ident, $parent:ident, $($field:ident),+) => {
        $(
            if $self.$field.is_none() {
                $self.$field = $parent.$field.clone();
            }
        )+
    };
}

impl FilterConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Fill every unset field from `parent`
    pub fn apply_parent(&mut self, parent: &FilterConfig) {
        inherit!(
            self,
            parent,
            filter,
            ok,
            warn,
            crit,
            syntax_top,
            syntax_detail,
            syntax_ok,
            syntax_empty,
            empty_state,
            perf_syntax,
            severity,
            escape_html,
            debug,
            max_age,
            timeout,
            max_objects,
            timeout_msg
        );
    }

    pub fn is_debug(&self) -> bool {
        self.debug.unwrap_or(false)
    }

    /// Status for a scan where nothing matched, `unknown` when unset
    pub fn empty_state(&self) -> Result<Status, ConfigError> {
        match &self.empty_state {
            Some(state) => {
                Status::parse(state).ok_or_else(|| ConfigError::InvalidStatus(state.clone()))
            }
            None => Ok(Status::Unknown),
        }
    }

    pub fn escape_html(&self) -> bool {
        self.escape_html.unwrap_or(false)
    }

    /// Forced object status, `None` when unset
    pub fn severity(&self) -> Result<Option<Status>, ConfigError> {
        self.severity
            .as_ref()
            .map(|severity| {
                Status::parse(severity).ok_or_else(|| ConfigError::InvalidStatus(severity.clone()))
            })
            .transpose()
    }

    pub fn max_age(&self) -> Result<Option<Duration>, ConfigError> {
        match &self.max_age {
            Some(age) => parse_time(age),
            None => Ok(None),
        }
    }

    pub fn timeout(&self) -> Result<Option<Duration>, ConfigError> {
        match &self.timeout {
            Some(timeout) => parse_time(timeout),
            None => Ok(None),
        }
    }

    pub fn timeout_msg(&self) -> &str {
        self.timeout_msg
            .as_deref()
            .unwrap_or("Timeout while scanning objects")
    }
}

/// Seconds per duration unit suffix: `s`, `m`, `h`, `d` or `w`
pub fn unit_seconds(unit: char) -> Option<i64> {
    match unit.to_ascii_lowercase() {
        's' => Some(1),
        'm' => Some(60),
        'h' => Some(60 * 60),
        'd' => Some(24 * 60 * 60),
        'w' => Some(7 * 24 * 60 * 60),
        _ => None,
    }
}

/// Parse `30s`, `5m`, `2h`, `1d` or `1w`; a bare number is seconds.
///
/// `none`, `infinite`, `false` and `off` mean no limit.
pub fn parse_time(text: &str) -> Result<Option<Duration>, ConfigError> {
    let text = text.trim();
    if matches!(
        text.to_ascii_lowercase().as_str(),
        "none" | "infinite" | "false" | "off"
    ) {
        return Ok(None);
    }

    let invalid = || ConfigError::InvalidTime(text.to_string());
    let (number, multiplier) = match text.find(|c: char| unit_seconds(c).is_some()) {
        Some(pos) if pos + 1 == text.len() => {
            let unit = text[pos..].chars().next().and_then(unit_seconds).ok_or_else(invalid)?;
            (&text[..pos], unit)
        }
        Some(_) => return Err(invalid()),
        None => (text, 1),
    };

    let value: u64 = number.trim().parse().map_err(|_| invalid())?;
    let seconds = value.checked_mul(multiplier as u64).ok_or_else(invalid)?;
    Ok(Some(Duration::from_secs(seconds)))
}
