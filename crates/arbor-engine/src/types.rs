//! Core types shared across the lifecycle engine

use serde::{Deserialize, Serialize};

/// Separator between segments of a compound component identifier
pub const SEPARATOR_CHAR: char = ':';

/// Prefix reserved for engine-generated identifiers
pub const GENERATED_ID_PREFIX: &str = "_id";

/// The request processing phases, in lifecycle order.
///
/// Ordering is meaningful: a listener registered for a phase that compares
/// greater than the current one counts as "interested in a future phase".
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Reconstruct component state from a saved snapshot
    RestoreState,
    /// Decode raw request input into component values
    ApplyRequest,
    /// Run validators over decoded values
    ProcessValidations,
    /// Commit validated values to their bound models
    UpdateModel,
    /// Produce output and capture the next snapshot
    RenderResponse,
}

/// Phase targeting for events and listeners
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenerPhase {
    /// Deliver in every phase, at most once per event per listener
    AnyPhase,
    /// Deliver only during the given phase
    During(Phase),
}

/// Severity of a request-scoped message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warn,
    Error,
    Fatal,
}

/// A user-facing message recorded against a component (or the request)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// How serious the message is
    pub severity: Severity,
    /// Short human-readable summary
    pub summary: String,
    /// Optional longer detail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Message {
    /// Create a message with the given severity
    pub fn new(severity: Severity, summary: impl Into<String>) -> Self {
        Self {
            severity,
            summary: summary.into(),
            detail: None,
        }
    }

    /// Create an error-severity message
    pub fn error(summary: impl Into<String>) -> Self {
        Self::new(Severity::Error, summary)
    }

    /// Attach a detail string
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}
