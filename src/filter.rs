//! Check filters: classify scanned objects into ok/warning/critical and render
//! the check result.
//!
//! A `Filter` is compiled once from a [`FilterConfig`] against a shared
//! registry. It is immutable afterwards, so one filter can scan object
//! batches from several threads at once; every object gets its own
//! [`EvaluationContext`].

pub mod bound;
pub mod perf;
pub mod status;
pub mod syntax;

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use thiserror::Error;

pub use bound::BoundExpression;
pub use perf::{PerfData, PerfThresholds};
pub use status::Status;

use crate::config::{ConfigError, FilterConfig};
use crate::context::EvaluationContext;
use crate::registry::AttributeRegistry;

const DEFAULT_SYNTAX_TOP: &str = "${status}: ${problem_list}";
const DEFAULT_SYNTAX_DETAIL: &str = "${status}";
const DEFAULT_SYNTAX_EMPTY: &str = "No objects found";

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Failed to parse '{expression}': {message}")]
    Parse { expression: String, message: String },

    #[error("Failed to bind '{expression}': {message}")]
    Bind { expression: String, message: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Outcome of running one object through the filter
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectResult {
    /// Passed the `filter` expression without evaluation errors
    pub matched: bool,
    pub status: Status,
    /// Rendered `syntax_detail`, empty for unmatched objects
    pub detail: String,
    pub errors: Option<String>,
    pub perf: Vec<PerfData>,
}

/// Result of scanning a batch of objects
#[derive(Debug, Clone, PartialEq)]
pub struct CheckResult {
    pub status: Status,
    pub message: String,
    pub perf: Vec<PerfData>,
    /// Objects that matched the filter
    pub count: usize,
    /// Objects looked at
    pub total: usize,
    pub problem_count: usize,
    pub errors: Vec<String>,
    pub timed_out: bool,
}

impl CheckResult {
    /// Space separated perf data
    pub fn perf_string(&self) -> String {
        self.perf
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.perf.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}|{}", self.message, self.perf_string())
        }
    }
}

pub struct Filter<T> {
    registry: Arc<AttributeRegistry<T>>,
    /// `<age attribute> >= -<max_age>`, checked before `filter`
    age: Option<BoundExpression>,
    filter: Option<BoundExpression>,
    ok: Option<BoundExpression>,
    warn: Option<BoundExpression>,
    crit: Option<BoundExpression>,
    thresholds: PerfThresholds,
    syntax_top: String,
    syntax_detail: String,
    syntax_ok: Option<String>,
    syntax_empty: String,
    empty_state: Status,
    severity: Option<Status>,
    escape_html: bool,
    perf_syntax: Option<String>,
    debug: bool,
    timeout: Option<Duration>,
    max_objects: Option<usize>,
    timeout_msg: String,
}

impl<T> Filter<T> {
    pub fn compile(
        config: &FilterConfig,
        registry: Arc<AttributeRegistry<T>>,
    ) -> Result<Self, FilterError> {
        let debug = config.is_debug();
        let mut ctx = EvaluationContext::with_debug(debug);

        let mut compile = |source: &Option<String>| -> Result<Option<BoundExpression>, FilterError> {
            match source.as_deref().map(str::trim) {
                Some(source) if !source.is_empty() => {
                    BoundExpression::compile(source, &registry, &mut ctx).map(Some)
                }
                _ => Ok(None),
            }
        };
        let mut filter = compile(&config.filter)?;
        let mut ok = compile(&config.ok)?;
        let mut warn = compile(&config.warn)?;
        let mut crit = compile(&config.crit)?;
        let age = match config.max_age()? {
            Some(max_age) => {
                let attribute = registry.age_attribute().ok_or(ConfigError::NoAgeAttribute)?;
                let source = format!("{} >= -{}s", attribute, max_age.as_secs());
                Some(BoundExpression::compile(&source, &registry, &mut ctx)?)
            }
            None => None,
        };

        let thresholds = PerfThresholds::collect(warn.as_ref(), crit.as_ref(), &ctx);
        for expr in [&mut filter, &mut ok, &mut warn, &mut crit].into_iter().flatten() {
            expr.fold(&registry, &mut ctx);
            if expr.is_constant() {
                debug!("Expression '{}' does not depend on the object", expr.source());
            }
        }
        if ctx.has_errors() {
            warn!("Errors while compiling filter: {}", ctx.get_errors());
        }

        let filter = Filter {
            age,
            filter,
            ok,
            warn,
            crit,
            thresholds,
            syntax_top: config
                .syntax_top
                .clone()
                .unwrap_or_else(|| DEFAULT_SYNTAX_TOP.to_string()),
            syntax_detail: config
                .syntax_detail
                .clone()
                .unwrap_or_else(|| DEFAULT_SYNTAX_DETAIL.to_string()),
            syntax_ok: config.syntax_ok.clone().filter(|s| !s.is_empty()),
            syntax_empty: config
                .syntax_empty
                .clone()
                .unwrap_or_else(|| DEFAULT_SYNTAX_EMPTY.to_string()),
            empty_state: config.empty_state()?,
            severity: config.severity()?,
            escape_html: config.escape_html(),
            perf_syntax: config.perf_syntax.clone(),
            debug,
            timeout: config.timeout()?,
            max_objects: config.max_objects,
            timeout_msg: config.timeout_msg().to_string(),
            registry,
        };
        debug!(
            "Compiled filter: filter={:?} warn={:?} crit={:?}",
            filter.filter.as_ref().map(BoundExpression::source),
            filter.warn.as_ref().map(BoundExpression::source),
            filter.crit.as_ref().map(BoundExpression::source),
        );
        Ok(filter)
    }

    pub fn registry(&self) -> &AttributeRegistry<T> {
        &self.registry
    }

    /// Run one object through max_age, filter, ok, crit and warn.
    ///
    /// An object whose evaluation reported an error is not matched. A
    /// configured severity replaces ok, crit and warn.
    pub fn match_object(&self, object: &T) -> ObjectResult {
        let mut ctx = EvaluationContext::with_debug(self.debug);
        let registry = self.registry.as_ref();
        let check = |expr: &Option<BoundExpression>, ctx: &mut EvaluationContext| {
            expr.as_ref()
                .map_or(false, |e| e.matches(registry, object, ctx))
        };

        let passed = [&self.age, &self.filter]
            .into_iter()
            .flatten()
            .all(|expr| expr.matches(registry, object, &mut ctx));
        if !passed || ctx.has_errors() {
            return ObjectResult {
                matched: false,
                status: Status::Ok,
                detail: String::new(),
                errors: take_errors(&ctx),
                perf: Vec::new(),
            };
        }

        let status = if let Some(severity) = self.severity {
            severity
        } else if check(&self.ok, &mut ctx) {
            Status::Ok
        } else if check(&self.crit, &mut ctx) {
            Status::Critical
        } else if check(&self.warn, &mut ctx) {
            Status::Warning
        } else {
            Status::Ok
        };

        let detail = syntax::render_object(&self.syntax_detail, registry, object, &mut ctx, |name| {
            (name == "status").then(|| status.to_string())
        });
        let perf = if self.thresholds.is_empty() {
            Vec::new()
        } else {
            let prefix = self.perf_syntax.as_ref().map(|template| {
                syntax::render_object(template, registry, object, &mut ctx, |_| None)
            });
            self.thresholds
                .read(registry, object, prefix.as_deref(), &mut ctx)
        };

        ObjectResult {
            matched: true,
            status,
            detail,
            errors: take_errors(&ctx),
            perf,
        }
    }

    /// Scan a batch of objects and render the check result.
    ///
    /// Stops early once `max_objects` objects were looked at or the timeout
    /// elapsed; a timeout reports Unknown.
    pub fn scan<I>(&self, objects: I) -> CheckResult
    where
        I: IntoIterator,
        I::Item: Borrow<T>,
    {
        let started = Instant::now();
        let mut summary = Summary::default();
        let mut timed_out = false;

        for object in objects {
            if self.max_objects.map_or(false, |max| summary.total >= max) {
                debug!("Stopping scan after {} objects", summary.total);
                break;
            }
            if self.timeout.map_or(false, |limit| started.elapsed() > limit) {
                timed_out = true;
                break;
            }

            summary.total += 1;
            let result = self.match_object(object.borrow());
            if let Some(errors) = result.errors {
                warn!("Error while evaluating object {}: {}", summary.total, errors);
                summary.errors.push(errors);
            }
            if !result.matched {
                continue;
            }

            summary.status = summary.status.escalate(result.status);
            if result.status != Status::Ok {
                summary.problems.push(result.detail.clone());
            }
            summary.details.push(result.detail);
            summary.perf.extend(result.perf);
        }

        let check = self.render(summary, timed_out);
        info!(
            "Scanned {} objects: {} matched, {} problems, status {}",
            check.total, check.count, check.problem_count, check.status
        );
        check
    }

    fn render(&self, summary: Summary, timed_out: bool) -> CheckResult {
        let count = summary.details.len();
        let (status, mut message) = if timed_out {
            (Status::Unknown, self.timeout_msg.clone())
        } else if count == 0 {
            let status = self.empty_state;
            (status, self.render_top(&self.syntax_empty, status, &summary))
        } else if summary.status == Status::Ok && self.syntax_ok.is_some() {
            let template = self.syntax_ok.as_deref().unwrap_or_default();
            (summary.status, self.render_top(template, summary.status, &summary))
        } else {
            (summary.status, self.render_top(&self.syntax_top, summary.status, &summary))
        };
        if self.escape_html {
            message = html_escape::encode_text(&message).into_owned();
        }

        CheckResult {
            status,
            message,
            count,
            total: summary.total,
            problem_count: summary.problems.len(),
            perf: summary.perf,
            errors: summary.errors,
            timed_out,
        }
    }

    fn render_top(&self, template: &str, status: Status, summary: &Summary) -> String {
        syntax::render(template, |name| match name {
            "status" => Some(status.to_string()),
            "count" => Some(summary.details.len().to_string()),
            "total" => Some(summary.total.to_string()),
            "problem_count" => Some(summary.problems.len().to_string()),
            "list" => Some(summary.details.join(", ")),
            "problem_list" => Some(summary.problems.join(", ")),
            _ => None,
        })
    }
}

#[derive(Default)]
struct Summary {
    status: Status,
    total: usize,
    details: Vec<String>,
    problems: Vec<String>,
    perf: Vec<PerfData>,
    errors: Vec<String>,
}

fn take_errors(ctx: &EvaluationContext) -> Option<String> {
    ctx.has_errors().then(|| ctx.get_errors())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::ValueType;
    use crate::registry::AccessError;
    use chrono::Utc;

    #[derive(Debug, Clone)]
    struct Backup {
        name: &'static str,
        exit_code: i64,
        size: f64,
        days_ago: i64,
    }

    fn backup(name: &'static str, exit_code: i64, size: f64) -> Backup {
        Backup {
            name,
            exit_code,
            size,
            days_ago: 0,
        }
    }

    fn registry() -> Arc<AttributeRegistry<Backup>> {
        let mut registry = AttributeRegistry::new();
        registry
            .add_string("name", |b: &Backup| Ok(b.name.to_string()), "Job name")
            .unwrap()
            .add_int("exit_code", |b: &Backup| Ok(b.exit_code), "Exit code")
            .unwrap()
            .add_float(
                "size",
                |b: &Backup| {
                    if b.size < 0.0 {
                        Err(AccessError::Failed("size unavailable".into()))
                    } else {
                        Ok(b.size)
                    }
                },
                "Size in GB",
            )
            .unwrap()
            .add_int_typed(
                "finished",
                ValueType::Date,
                |b: &Backup| Ok(Utc::now().timestamp() - b.days_ago * 86_400),
                "Completion time",
            )
            .unwrap()
            .set_age_attribute("finished")
            .unwrap();
        Arc::new(registry)
    }

    fn config() -> FilterConfig {
        FilterConfig {
            warn: Some("exit_code != 0".to_string()),
            crit: Some("exit_code < 0".to_string()),
            syntax_top: Some("${status}: ${problem_list}".to_string()),
            syntax_detail: Some("${name}=${exit_code}".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_match_object_status() {
        let filter = Filter::compile(&config(), registry()).unwrap();

        let ok = filter.match_object(&backup("daily", 0, 1.0));
        assert!(ok.matched);
        assert_eq!(ok.status, Status::Ok);
        assert_eq!(ok.detail, "daily=0");

        assert_eq!(filter.match_object(&backup("weekly", 2, 1.0)).status, Status::Warning);
        assert_eq!(filter.match_object(&backup("monthly", -1, 1.0)).status, Status::Critical);
    }

    #[test]
    fn test_ok_expression_overrides() {
        let config = FilterConfig {
            ok: Some("name = 'flaky'".to_string()),
            ..config()
        };
        let filter = Filter::compile(&config, registry()).unwrap();
        assert_eq!(filter.match_object(&backup("flaky", -1, 1.0)).status, Status::Ok);
        assert_eq!(filter.match_object(&backup("solid", -1, 1.0)).status, Status::Critical);
    }

    #[test]
    fn test_filter_excludes_objects() {
        let config = FilterConfig {
            filter: Some("name like 'daily'".to_string()),
            ..config()
        };
        let filter = Filter::compile(&config, registry()).unwrap();
        let result = filter.match_object(&backup("weekly", 5, 1.0));
        assert!(!result.matched);
        assert!(result.detail.is_empty());

        let check = filter.scan(vec![backup("daily-a", 3, 1.0), backup("weekly", 5, 1.0)]);
        assert_eq!(check.status, Status::Warning);
        assert_eq!(check.count, 1);
        assert_eq!(check.total, 2);
        assert_eq!(check.message, "WARNING: daily-a=3");
    }

    #[test]
    fn test_scan_escalates_and_renders() {
        let filter = Filter::compile(&config(), registry()).unwrap();
        let objects = vec![
            backup("a", 0, 1.0),
            backup("b", 1, 1.0),
            backup("c", -2, 1.0),
        ];
        let check = filter.scan(&objects);
        assert_eq!(check.status, Status::Critical);
        assert_eq!(check.message, "CRITICAL: b=1, c=-2");
        assert_eq!(check.problem_count, 2);
        assert!(!check.timed_out);
    }

    #[test]
    fn test_empty_and_ok_syntax() {
        let config = FilterConfig {
            filter: Some("name = 'nothing'".to_string()),
            syntax_empty: Some("No backups".to_string()),
            empty_state: Some("ok".to_string()),
            ..config()
        };
        let filter = Filter::compile(&config, registry()).unwrap();
        let check = filter.scan(vec![backup("a", 0, 1.0)]);
        assert_eq!(check.status, Status::Ok);
        assert_eq!(check.message, "No backups");

        let config = FilterConfig {
            syntax_ok: Some("All ${count} backups fine".to_string()),
            ..self::config()
        };
        let filter = Filter::compile(&config, registry()).unwrap();
        let check = filter.scan(vec![backup("a", 0, 1.0), backup("b", 0, 1.0)]);
        assert_eq!(check.message, "All 2 backups fine");
    }

    #[test]
    fn test_errors_skip_object_but_not_scan() {
        let config = FilterConfig {
            filter: Some("size > 0.5".to_string()),
            ..config()
        };
        let filter = Filter::compile(&config, registry()).unwrap();
        let check = filter.scan(vec![backup("broken", 1, -1.0), backup("fine", 1, 2.0)]);
        assert_eq!(check.count, 1);
        assert_eq!(check.total, 2);
        assert_eq!(check.errors, vec!["Failed to read size: size unavailable".to_string()]);
        assert_eq!(check.message, "WARNING: fine=1");
    }

    #[test]
    fn test_max_objects_and_timeout() {
        let config = FilterConfig {
            max_objects: Some(2),
            ..config()
        };
        let filter = Filter::compile(&config, registry()).unwrap();
        let check = filter.scan((0..10).map(|i| backup("x", i, 1.0)));
        assert_eq!(check.total, 2);

        let config = FilterConfig {
            timeout: Some("0s".to_string()),
            timeout_msg: Some("Scan timed out".to_string()),
            ..self::config()
        };
        let filter = Filter::compile(&config, registry()).unwrap();
        let slow = (0..3).map(|i| {
            std::thread::sleep(Duration::from_millis(5));
            backup("x", i, 1.0)
        });
        let check = filter.scan(slow);
        assert!(check.timed_out);
        assert_eq!(check.status, Status::Unknown);
        assert_eq!(check.message, "Scan timed out");
    }

    #[test]
    fn test_perf_data() {
        let config = FilterConfig {
            warn: Some("size > 10".to_string()),
            crit: Some("size > 20.5".to_string()),
            perf_syntax: Some("${name}".to_string()),
            syntax_top: Some("${status}".to_string()),
            ..Default::default()
        };
        let filter = Filter::compile(&config, registry()).unwrap();
        let check = filter.scan(vec![backup("a", 0, 12.0)]);
        assert_eq!(check.to_string(), "WARNING|'a_size'=12;10;20.5");
    }

    #[test]
    fn test_max_age_skips_old_objects() {
        let config = FilterConfig {
            max_age: Some("2d".to_string()),
            ..config()
        };
        let filter = Filter::compile(&config, registry()).unwrap();
        let stale = Backup {
            days_ago: 5,
            ..backup("stale", -1, 1.0)
        };
        assert!(!filter.match_object(&stale).matched);

        let check = filter.scan(vec![stale, backup("fresh", 1, 1.0)]);
        assert_eq!(check.total, 2);
        assert_eq!(check.count, 1);
        assert_eq!(check.message, "WARNING: fresh=1");

        let config = FilterConfig {
            max_age: Some("off".to_string()),
            ..self::config()
        };
        let filter = Filter::compile(&config, registry()).unwrap();
        let stale = Backup {
            days_ago: 5,
            ..backup("stale", -1, 1.0)
        };
        assert_eq!(filter.match_object(&stale).status, Status::Critical);
    }

    #[test]
    fn test_max_age_needs_age_attribute() {
        let config = FilterConfig {
            max_age: Some("1h".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            Filter::compile(&config, Arc::new(AttributeRegistry::<Backup>::new())),
            Err(FilterError::Config(ConfigError::NoAgeAttribute))
        ));
    }

    #[test]
    fn test_severity_forces_status() {
        let config = FilterConfig {
            severity: Some("critical".to_string()),
            ..config()
        };
        let filter = Filter::compile(&config, registry()).unwrap();
        assert_eq!(filter.match_object(&backup("a", 0, 1.0)).status, Status::Critical);

        let check = filter.scan(vec![backup("a", 0, 1.0), backup("b", 1, 1.0)]);
        assert_eq!(check.status, Status::Critical);
        assert_eq!(check.message, "CRITICAL: a=0, b=1");
    }

    #[test]
    fn test_escape_html() {
        let config = FilterConfig {
            syntax_detail: Some("<b>${name}</b>".to_string()),
            escape_html: Some(true),
            ..config()
        };
        let filter = Filter::compile(&config, registry()).unwrap();
        let check = filter.scan(vec![backup("a&b", 1, 1.0)]);
        assert_eq!(check.message, "WARNING: &lt;b&gt;a&amp;b&lt;/b&gt;");

        let config = FilterConfig {
            syntax_detail: Some("<b>${name}</b>".to_string()),
            ..self::config()
        };
        let filter = Filter::compile(&config, registry()).unwrap();
        let check = filter.scan(vec![backup("a&b", 1, 1.0)]);
        assert_eq!(check.message, "WARNING: <b>a&b</b>");
    }

    #[test]
    fn test_compile_errors() {
        let config = FilterConfig {
            warn: Some("bogus = 1".to_string()),
            ..Default::default()
        };
        match Filter::compile(&config, registry()) {
            Err(FilterError::Bind { message, .. }) => {
                assert_eq!(message, "Unknown attribute: bogus")
            }
            other => panic!("unexpected {:?}", other.err()),
        }

        let config = FilterConfig {
            timeout: Some("soon".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            Filter::compile(&config, registry()),
            Err(FilterError::Config(ConfigError::InvalidTime(_)))
        ));
    }
}
