//! Diagnostics: every reported problem goes to the `log` facade and into a bounded ring so
//! hosts (and tests) can inspect what was logged without installing a logger.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::error::TimelineError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Reporting component (e.g. "hydration", "binding").
    pub module: &'static str,
    pub message: String,
}

#[derive(Debug)]
pub struct Diagnostics {
    entries: VecDeque<Diagnostic>,
    capacity: usize,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::with_capacity(256)
    }
}

impl Diagnostics {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(64)),
            capacity: capacity.max(1),
        }
    }

    pub fn warn(&mut self, module: &'static str, message: impl Into<String>) {
        self.record(Severity::Warning, module, message.into());
    }

    pub fn error(&mut self, module: &'static str, message: impl Into<String>) {
        self.record(Severity::Error, module, message.into());
    }

    /// Report an error at the level its variant maps to.
    pub fn report(&mut self, module: &'static str, err: &TimelineError) {
        self.record(
            err.severity(),
            module,
            format!("[{}] {}", err.category(), err),
        );
    }

    fn record(&mut self, severity: Severity, module: &'static str, message: String) {
        match severity {
            Severity::Warning => log::warn!(target: "vizij_timeline", "{module}: {message}"),
            Severity::Error => log::error!(target: "vizij_timeline", "{module}: {message}"),
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(Diagnostic {
            severity,
            module,
            message,
        });
    }

    pub fn entries(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.entries
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn drain(&mut self) -> Vec<Diagnostic> {
        self.entries.drain(..).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
