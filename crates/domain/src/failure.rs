//! Recorded failure outcomes.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// What went wrong when a process or one of its side effects failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    /// The process was started with input it cannot work with.
    Validation,
    /// A collaborator call (booking, notification, fraud check) failed.
    SideEffect,
    /// The host could not persist the process's progress.
    Infrastructure,
}

/// A fatal failure recorded in a process's stream.
///
/// Unlike the error enums this is plain data: it is persisted, replayed,
/// and copied from a child process into its parent's fulfillment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl Failure {
    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Validation,
            message: message.into(),
        }
    }

    pub fn side_effect(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::SideEffect,
            message: message.into(),
        }
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Infrastructure,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<ValidationError> for Failure {
    fn from(err: ValidationError) -> Self {
        Self::validation(err.to_string())
    }
}
