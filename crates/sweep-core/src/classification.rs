//! Removal error classification
//!
//! Adapters translate provider errors into a [`RemovalError`] carrying a
//! [`Classification`]. The removal queue only ever looks at the
//! classification, never at provider codes or messages.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// A step that must run before a removal can succeed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Precondition {
    /// Clear a deletion/termination protection flag
    DisableDeletionProtection,
}

impl Precondition {
    pub fn as_str(self) -> &'static str {
        match self {
            Precondition::DisableDeletionProtection => "disable_deletion_protection",
        }
    }
}

impl fmt::Display for Precondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the engine should react to a failed removal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Transient or dependency-shaped failure, try again next round
    Retryable,
    /// Permanent failure, never retried
    Terminal,
    /// The resource is already gone (counts as removed)
    NotFound,
    /// Removal is blocked until the given step has run
    RequiresPrecondition(Precondition),
}

/// Error returned by a resource's remove, settle or precondition step
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{message}")]
pub struct RemovalError {
    pub classification: Classification,
    /// Provider error code, when there is one
    pub code: Option<String>,
    pub message: String,
}

impl RemovalError {
    pub fn new(classification: Classification, message: impl Into<String>) -> Self {
        Self {
            classification,
            code: None,
            message: message.into(),
        }
    }

    pub fn retryable(message: impl Into<String>) -> Self {
        Self::new(Classification::Retryable, message)
    }

    pub fn terminal(message: impl Into<String>) -> Self {
        Self::new(Classification::Terminal, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(Classification::NotFound, message)
    }

    pub fn requires(step: Precondition, message: impl Into<String>) -> Self {
        Self::new(Classification::RequiresPrecondition(step), message)
    }

    /// Attach the provider error code
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn is_retryable(&self) -> bool {
        self.classification == Classification::Retryable
    }

    pub fn is_not_found(&self) -> bool {
        self.classification == Classification::NotFound
    }

    /// The precondition this error asks for, if any
    pub fn precondition(&self) -> Option<Precondition> {
        match self.classification {
            Classification::RequiresPrecondition(step) => Some(step),
            _ => None,
        }
    }

    /// Re-tag the error as terminal, keeping code and message
    pub fn into_terminal(self) -> Self {
        Self {
            classification: Classification::Terminal,
            ..self
        }
    }
}
