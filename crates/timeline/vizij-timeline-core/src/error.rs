//! Error types for vizij-timeline-core.
//!
//! Services return these as `Result`s; the [`crate::engine::Engine`] boundary reports them to
//! [`crate::diagnostics::Diagnostics`] and degrades instead of failing the frame.

use std::fmt;

use thiserror::Error;

use crate::config::Mode;
use crate::diagnostics::Severity;

/// Failure to turn a dotted property path into a setter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindError {
    /// An intermediate segment is absent or is not a container.
    #[error("property segment '{0}' is undefined")]
    MissingIntermediate(String),

    #[error("'{0}' is not a vector component (expected x, y or z)")]
    InvalidComponent(String),

    #[error("property path is empty")]
    EmptyPath,
}

/// Configuration problems detected at engine construction. These are the only fatal errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("build mode is not set; export {var}=development|production")]
    MissingMode { var: &'static str },

    #[error("unknown build mode '{0}'")]
    InvalidMode(String),
}

/// Kind of model entity named in an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Timeline,
    Object,
    Track,
    Keyframe,
    StaticProp,
    Spline,
    SplineNode,
    Target,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Timeline => "timeline",
            EntityKind::Object => "object",
            EntityKind::Track => "track",
            EntityKind::Keyframe => "keyframe",
            EntityKind::StaticProp => "static prop",
            EntityKind::Spline => "spline",
            EntityKind::SplineNode => "spline node",
            EntityKind::Target => "target",
        };
        f.write_str(name)
    }
}

/// Errors surfaced by the timeline engine and its services.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimelineError {
    #[error(transparent)]
    Bind(#[from] BindError),

    #[error("{operation} is only available in development mode (current mode: {mode})")]
    ModeViolation {
        mode: Mode,
        /// Name of the rejected engine operation.
        operation: &'static str,
    },

    #[error("{kind} '{key}' not found")]
    NotFound { kind: EntityKind, key: String },

    #[error("{kind} '{key}' already exists")]
    AlreadyExists { kind: EntityKind, key: String },

    /// A property is requested as tracked while static, or vice versa.
    #[error("property '{key}' is already {existing}")]
    RepresentationConflict { key: String, existing: &'static str },

    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("unknown {kind} action '{action}'")]
    UnknownAction { kind: String, action: String },

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("malformed input: {0}")]
    Malformed(String),
}

impl TimelineError {
    pub fn not_found(kind: EntityKind, key: impl Into<String>) -> Self {
        TimelineError::NotFound {
            kind,
            key: key.into(),
        }
    }

    pub fn already_exists(kind: EntityKind, key: impl Into<String>) -> Self {
        TimelineError::AlreadyExists {
            kind,
            key: key.into(),
        }
    }

    /// Stable category label, used as a structured field in logs.
    pub fn category(&self) -> &'static str {
        match self {
            TimelineError::Bind(_) => "binding",
            TimelineError::ModeViolation { .. } => "mode",
            TimelineError::NotFound { .. } => "not_found",
            TimelineError::AlreadyExists { .. } => "already_exists",
            TimelineError::RepresentationConflict { .. } => "representation",
            TimelineError::InvariantViolation(_) => "invariant",
            TimelineError::UnknownAction { .. } => "unknown_action",
            TimelineError::InvalidValue(_) => "invalid_value",
            TimelineError::Malformed(_) => "malformed",
        }
    }

    /// Log level this error is reported at.
    pub fn severity(&self) -> Severity {
        match self {
            TimelineError::ModeViolation { .. }
            | TimelineError::InvariantViolation(_)
            | TimelineError::Malformed(_) => Severity::Error,
            _ => Severity::Warning,
        }
    }
}
