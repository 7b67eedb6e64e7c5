//! Scheduled task check.
//!
//! Two task models exist side by side: tasks registered through the 2.0
//! scheduler interface report `TASK_STATE_*` states, legacy 1.0 work items
//! report `SCHED_S_TASK_*` status codes. Both are exposed through the same
//! attribute names; the status converter picks the code table matching the
//! object being evaluated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::FilterConfig;
use crate::context::EvaluationContext;
use crate::expression::{CustomTag, Node, ValueType};
use crate::registry::{AccessError, AccessResult, AttributeRegistry, RegistryError};

/// Type tag of the `task_status` attribute
pub const TASK_STATUS: ValueType = ValueType::Custom(CustomTag::new("task_status"));

pub const TASK_STATE_UNKNOWN: i64 = 0;
pub const TASK_STATE_DISABLED: i64 = 1;
pub const TASK_STATE_QUEUED: i64 = 2;
pub const TASK_STATE_READY: i64 = 3;
pub const TASK_STATE_RUNNING: i64 = 4;

pub const SCHED_S_TASK_READY: i64 = 0x0004_1300;
pub const SCHED_S_TASK_RUNNING: i64 = 0x0004_1301;
pub const SCHED_S_TASK_DISABLED: i64 = 0x0004_1302;
pub const SCHED_S_TASK_HAS_NOT_RUN: i64 = 0x0004_1303;
pub const SCHED_S_TASK_NO_MORE_RUNS: i64 = 0x0004_1304;
pub const SCHED_S_TASK_NOT_SCHEDULED: i64 = 0x0004_1305;
pub const SCHED_S_TASK_TERMINATED: i64 = 0x0004_1306;
pub const SCHED_S_TASK_NO_VALID_TRIGGERS: i64 = 0x0004_1307;

/// Work item flag marking a legacy task as disabled
pub const TASK_FLAG_DISABLED: i64 = 0x4;

const REGISTERED_STATES: &[(&str, i64)] = &[
    ("queued", TASK_STATE_QUEUED),
    ("unknown", TASK_STATE_UNKNOWN),
    ("ready", TASK_STATE_READY),
    ("running", TASK_STATE_RUNNING),
    ("disabled", TASK_STATE_DISABLED),
];

const LEGACY_STATES: &[(&str, i64)] = &[
    ("ready", SCHED_S_TASK_READY),
    ("running", SCHED_S_TASK_RUNNING),
    ("not_scheduled", SCHED_S_TASK_NOT_SCHEDULED),
    ("has_not_run", SCHED_S_TASK_HAS_NOT_RUN),
    ("disabled", SCHED_S_TASK_DISABLED),
    ("no_more_runs", SCHED_S_TASK_NO_MORE_RUNS),
    ("no_valid_triggers", SCHED_S_TASK_NO_VALID_TRIGGERS),
];

/// Rendered but not accepted in filters
const LEGACY_DISPLAY_STATES: &[(&str, i64)] = &[("terminated", SCHED_S_TASK_TERMINATED)];

/// Read access to one scheduled task, whatever its model.
///
/// Fields a model does not carry report [`AccessError::Unsupported`].
pub trait ScheduledTask {
    /// True for 2.0 registered tasks, false for legacy work items
    fn is_registered(&self) -> bool;

    fn title(&self) -> AccessResult<String>;
    fn exit_code(&self) -> AccessResult<i64>;
    fn status(&self) -> AccessResult<i64>;
    fn most_recent_run_time(&self) -> AccessResult<Option<DateTime<Utc>>>;

    fn folder(&self) -> AccessResult<String> {
        Err(AccessError::Unsupported)
    }

    fn application(&self) -> AccessResult<String> {
        Err(AccessError::Unsupported)
    }

    fn comment(&self) -> AccessResult<String> {
        Err(AccessError::Unsupported)
    }

    fn creator(&self) -> AccessResult<String> {
        Err(AccessError::Unsupported)
    }

    fn parameters(&self) -> AccessResult<String> {
        Err(AccessError::Unsupported)
    }

    fn working_directory(&self) -> AccessResult<String> {
        Err(AccessError::Unsupported)
    }

    fn enabled(&self) -> AccessResult<bool> {
        Err(AccessError::Unsupported)
    }

    fn max_run_time(&self) -> AccessResult<i64> {
        Err(AccessError::Unsupported)
    }

    fn priority(&self) -> AccessResult<i64> {
        Err(AccessError::Unsupported)
    }

    fn has_run(&self) -> AccessResult<bool> {
        Ok(self.most_recent_run_time()?.is_some())
    }

    /// Symbolic name of the current status code
    fn status_name(&self) -> AccessResult<String> {
        let status = self.status()?;
        let tables: &[&[(&str, i64)]] = if self.is_registered() {
            &[REGISTERED_STATES]
        } else {
            &[LEGACY_STATES, LEGACY_DISPLAY_STATES]
        };
        Ok(tables
            .iter()
            .flat_map(|table| table.iter())
            .find(|(_, code)| *code == status)
            .map(|(name, _)| name.to_string())
            .unwrap_or_else(|| format!("unknown({:#x})", status)))
    }
}

/// Task from the 2.0 scheduler interface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisteredTask {
    pub folder: String,
    pub title: String,
    #[serde(default)]
    pub exit_code: i64,
    pub state: i64,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub last_run: Option<DateTime<Utc>>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub priority: i64,
    /// Execution time limit in seconds
    #[serde(default)]
    pub execution_time_limit: i64,
}

fn enabled_by_default() -> bool {
    true
}

impl ScheduledTask for RegisteredTask {
    fn is_registered(&self) -> bool {
        true
    }

    fn title(&self) -> AccessResult<String> {
        Ok(self.title.clone())
    }

    fn exit_code(&self) -> AccessResult<i64> {
        Ok(self.exit_code)
    }

    fn status(&self) -> AccessResult<i64> {
        Ok(self.state)
    }

    fn most_recent_run_time(&self) -> AccessResult<Option<DateTime<Utc>>> {
        Ok(self.last_run)
    }

    fn folder(&self) -> AccessResult<String> {
        Ok(self.folder.clone())
    }

    fn comment(&self) -> AccessResult<String> {
        Ok(self.description.clone())
    }

    fn creator(&self) -> AccessResult<String> {
        Ok(self.author.clone())
    }

    fn enabled(&self) -> AccessResult<bool> {
        Ok(self.enabled)
    }

    fn max_run_time(&self) -> AccessResult<i64> {
        Ok(self.execution_time_limit)
    }

    fn priority(&self) -> AccessResult<i64> {
        Ok(self.priority)
    }
}

/// Legacy 1.0 work item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyTask {
    pub title: String,
    #[serde(default)]
    pub application: String,
    #[serde(default)]
    pub parameters: String,
    #[serde(default)]
    pub working_directory: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub creator: String,
    #[serde(default)]
    pub exit_code: i64,
    pub status: i64,
    #[serde(default)]
    pub flags: i64,
    #[serde(default)]
    pub priority: i64,
    /// Maximum run time in seconds
    #[serde(default)]
    pub max_run_time: i64,
    #[serde(default)]
    pub most_recent_run_time: Option<DateTime<Utc>>,
}

impl ScheduledTask for LegacyTask {
    fn is_registered(&self) -> bool {
        false
    }

    fn title(&self) -> AccessResult<String> {
        Ok(self.title.clone())
    }

    fn exit_code(&self) -> AccessResult<i64> {
        Ok(self.exit_code)
    }

    fn status(&self) -> AccessResult<i64> {
        Ok(self.status)
    }

    fn most_recent_run_time(&self) -> AccessResult<Option<DateTime<Utc>>> {
        Ok(self.most_recent_run_time)
    }

    fn application(&self) -> AccessResult<String> {
        Ok(self.application.clone())
    }

    fn comment(&self) -> AccessResult<String> {
        Ok(self.comment.clone())
    }

    fn creator(&self) -> AccessResult<String> {
        Ok(self.creator.clone())
    }

    fn parameters(&self) -> AccessResult<String> {
        Ok(self.parameters.clone())
    }

    fn working_directory(&self) -> AccessResult<String> {
        Ok(self.working_directory.clone())
    }

    fn enabled(&self) -> AccessResult<bool> {
        Ok(self.flags & TASK_FLAG_DISABLED == 0)
    }

    fn max_run_time(&self) -> AccessResult<i64> {
        Ok(self.max_run_time)
    }

    fn priority(&self) -> AccessResult<i64> {
        Ok(self.priority)
    }

    fn has_run(&self) -> AccessResult<bool> {
        Ok(self.status != SCHED_S_TASK_HAS_NOT_RUN && self.most_recent_run_time.is_some())
    }
}

/// Either task model, as stored in snapshot files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskRecord {
    Registered(RegisteredTask),
    Legacy(LegacyTask),
}

macro_rules! delegate {
    ($($method:ident -> $ret:ty),+ $(,)?) => {
        $(
            fn $method(&self) -> $ret {
                match self {
                    TaskRecord::Registered(task) => task.$method(),
                    TaskRecord::Legacy(task) => task.$method(),
                }
            }
        )+
    };
}

impl ScheduledTask for TaskRecord {
    delegate!(
        is_registered -> bool,
        title -> AccessResult<String>,
        exit_code -> AccessResult<i64>,
        status -> AccessResult<i64>,
        most_recent_run_time -> AccessResult<Option<DateTime<Utc>>>,
        folder -> AccessResult<String>,
        application -> AccessResult<String>,
        comment -> AccessResult<String>,
        creator -> AccessResult<String>,
        parameters -> AccessResult<String>,
        working_directory -> AccessResult<String>,
        enabled -> AccessResult<bool>,
        max_run_time -> AccessResult<i64>,
        priority -> AccessResult<i64>,
        has_run -> AccessResult<bool>,
    );
}

/// Map a status name to the code table of `task`.
///
/// Unknown names are reported and map to 0.
pub fn convert_status<T: ScheduledTask>(task: &T, ctx: &mut EvaluationContext, subject: &Node) -> Node {
    let name = subject
        .literal_value()
        .map(|value| value.to_string())
        .unwrap_or_else(|| subject.to_string());
    let table = if task.is_registered() {
        REGISTERED_STATES
    } else {
        LEGACY_STATES
    };
    match table.iter().find(|(known, _)| *known == name) {
        Some((_, code)) => Node::int(*code),
        None => {
            ctx.error(format!("Failed to convert: {}", name));
            Node::int(0)
        }
    }
}

fn format_run_time(time: Option<DateTime<Utc>>) -> String {
    match time {
        Some(time) => time.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => "never".to_string(),
    }
}

/// Attribute registry for scheduled tasks
pub fn build_registry<T: ScheduledTask + 'static>() -> Result<AttributeRegistry<T>, RegistryError> {
    let mut registry = AttributeRegistry::new();
    registry
        .add_string("folder", |t: &T| t.folder(), "The task folder")?
        .add_string("title", |t: &T| t.title(), "The task title")?
        .add_string(
            "application",
            |t: &T| t.application(),
            "Retrieves the name of the application that the task is associated with.",
        )?
        .add_string(
            "comment",
            |t: &T| t.comment(),
            "Retrieves the comment or description for the work item.",
        )?
        .add_string("creator", |t: &T| t.creator(), "Retrieves the creator of the work item.")?
        .add_string(
            "parameters",
            |t: &T| t.parameters(),
            "Retrieves the command-line parameters of a task.",
        )?
        .add_string(
            "working_directory",
            |t: &T| t.working_directory(),
            "Retrieves the working directory of the task.",
        )?;

    registry
        .add_int("exit_code", |t: &T| t.exit_code(), "Retrieves the work item's last exit code.")?
        .add_int(
            "enabled",
            |t: &T| t.enabled().map(i64::from),
            "True if the task is enabled.",
        )?
        .add_int(
            "max_run_time",
            |t: &T| t.max_run_time(),
            "Retrieves the maximum length of time the task can run.",
        )?
        .add_int("priority", |t: &T| t.priority(), "Retrieves the priority for the task.")?
        .add_int_typed(
            "task_status",
            TASK_STATUS,
            |t: &T| t.status(),
            "Retrieves the status of the work item.",
        )?
        .add_int_typed(
            "most_recent_run_time",
            ValueType::Date,
            |t: &T| {
                t.most_recent_run_time()
                    .map(|time| time.map_or(0, |time| time.timestamp()))
            },
            "Retrieves the most recent time the work item began running.",
        )?
        .add_int_typed(
            "has_run",
            ValueType::Bool,
            |t: &T| t.has_run().map(i64::from),
            "True if the task has ever executed.",
        )?;

    registry
        .add_human_string(
            "task_status",
            |t: &T| t.status_name(),
            "Status name such as ready, running or has_not_run",
        )?
        .add_human_string(
            "most_recent_run_time",
            |t: &T| t.most_recent_run_time().map(format_run_time),
            "Last run as YYYY-MM-DD HH:MM:SS, never if the task has not run",
        )?;

    registry
        .add_converter(TASK_STATUS, convert_status::<T>)?
        .set_age_attribute("most_recent_run_time")?;

    Ok(registry)
}

/// Default filter section for the check
pub fn default_config() -> FilterConfig {
    FilterConfig {
        filter: Some("enabled = 1".to_string()),
        warn: Some("exit_code != 0".to_string()),
        crit: Some("exit_code < 0".to_string()),
        syntax_top: Some("${status}: ${problem_list}".to_string()),
        syntax_detail: Some("${title}: ${exit_code} != 0".to_string()),
        syntax_ok: Some("${status}: All tasks are ok".to_string()),
        syntax_empty: Some("No tasks found".to_string()),
        empty_state: Some("warning".to_string()),
        ..Default::default()
    }
}

/// Parse a JSON array of task records
pub fn parse_snapshot(json: &str) -> serde_json::Result<Vec<TaskRecord>> {
    serde_json::from_str(json)
}
