//! Per-evaluation diagnostics and performance sample collection.

use log::{debug, warn};

/// Diagnostic sink used while binding and evaluating filters.
///
/// Errors are single-slot: every `log_error` replaces the previous message.
#[derive(Debug, Default, Clone)]
pub struct ErrorHandler {
    error: Option<String>,
    debug: bool,
}

impl ErrorHandler {
    pub fn new(debug: bool) -> Self {
        Self { error: None, debug }
    }

    pub fn log_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        debug!("{}", message);
        self.error = Some(message);
    }

    pub fn log_warning(&self, message: &str) {
        warn!("{}", message);
    }

    pub fn log_debug(&self, message: &str) {
        if self.debug {
            debug!("{}", message);
        }
    }

    pub fn has_errors(&self) -> bool {
        self.error.is_some()
    }

    /// The most recent error, or an empty string when none was logged
    pub fn get_errors(&self) -> String {
        self.error.clone().unwrap_or_default()
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }
}

/// A single named performance sample
#[derive(Debug, Clone, PartialEq)]
pub struct PerfSample {
    pub name: String,
    pub value: f64,
}

/// Append-only list of performance samples
#[derive(Debug, Default, Clone)]
pub struct PerformanceCollector {
    samples: Vec<PerfSample>,
}

impl PerformanceCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, value: f64) {
        self.samples.push(PerfSample {
            name: name.into(),
            value,
        });
    }

    pub fn samples(&self) -> &[PerfSample] {
        &self.samples
    }
}

/// State carried through one bind or one evaluation of one object.
///
/// Never share a context between concurrent evaluations.
#[derive(Debug, Default)]
pub struct EvaluationContext {
    errors: ErrorHandler,
}

impl EvaluationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_debug(debug: bool) -> Self {
        Self {
            errors: ErrorHandler::new(debug),
        }
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.errors.log_error(message);
    }

    pub fn warn(&self, message: &str) {
        self.errors.log_warning(message);
    }

    pub fn debug(&self, message: &str) {
        self.errors.log_debug(message);
    }

    pub fn has_errors(&self) -> bool {
        self.errors.has_errors()
    }

    pub fn get_errors(&self) -> String {
        self.errors.get_errors()
    }

    pub fn is_debug(&self) -> bool {
        self.errors.is_debug()
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.errors.set_debug(debug);
    }
}
