//! Structured error types shared across ARCS crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`ArcsError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (identifiers, counts, etc.).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the group-formation core.
///
/// Cancellation and budget expiry are not represented here: both produce a
/// partial result flagged on the grouping outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum ArcsError {
    /// Too few students carry a motivation label for grouping.
    #[error("insufficient coverage: {0}")]
    InsufficientCoverage(ErrorInfo),
    /// Nothing to cluster or group.
    #[error("empty cohort: {0}")]
    EmptyCohort(ErrorInfo),
    /// The profile store could not be reached, or retries were exhausted.
    #[error("store unavailable: {0}")]
    StoreUnavailable(ErrorInfo),
    /// A concurrent write was detected; callers retry.
    #[error("stale data: {0}")]
    StaleData(ErrorInfo),
    /// The clusterer could not separate the inputs.
    #[error("numerical degeneracy: {0}")]
    NumericalDegeneracy(ErrorInfo),
    /// Malformed caller input (unknown student, out of range answer, ...).
    #[error("invalid input: {0}")]
    InvalidInput(ErrorInfo),
    /// Invalid configuration values.
    #[error("config error: {0}")]
    Config(ErrorInfo),
    /// Serialization and schema errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl ArcsError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            ArcsError::InsufficientCoverage(info)
            | ArcsError::EmptyCohort(info)
            | ArcsError::StoreUnavailable(info)
            | ArcsError::StaleData(info)
            | ArcsError::NumericalDegeneracy(info)
            | ArcsError::InvalidInput(info)
            | ArcsError::Config(info)
            | ArcsError::Serde(info) => info,
        }
    }

    /// Whether the error is a transient signal that a retry may clear.
    pub fn is_transient(&self) -> bool {
        matches!(self, ArcsError::StaleData(_))
    }

    /// Builds the coverage gate error shared by the analyzer and optimizer.
    pub fn insufficient_coverage(analyzed: usize, total: usize, threshold_percent: u32) -> Self {
        let percentage = if total == 0 {
            0.0
        } else {
            analyzed as f64 * 100.0 / total as f64
        };
        ArcsError::InsufficientCoverage(
            ErrorInfo::new(
                "coverage-below-threshold",
                format!(
                    "only {percentage:.1}% of students have a motivation label, \
                     {threshold_percent}% required"
                ),
            )
            .with_context("analyzed", analyzed.to_string())
            .with_context("total", total.to_string())
            .with_hint("collect the remaining ARCS questionnaires and re-run clustering"),
        )
    }

    /// Passes when `analyzed / total >= threshold_percent / 100`, compared
    /// in integers so that the exact threshold is accepted.
    pub fn ensure_coverage(
        analyzed: usize,
        total: usize,
        threshold_percent: u32,
    ) -> Result<(), Self> {
        let lhs = analyzed as u128 * 100;
        let rhs = total as u128 * u128::from(threshold_percent);
        if total > 0 && lhs >= rhs {
            Ok(())
        } else {
            Err(Self::insufficient_coverage(analyzed, total, threshold_percent))
        }
    }

    /// Builds the empty cohort error.
    pub fn empty_cohort(message: impl Into<String>) -> Self {
        ArcsError::EmptyCohort(ErrorInfo::new("empty-cohort", message))
    }
}
