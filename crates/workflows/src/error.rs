//! Workflow error types.

use domain::{DomainError, Failure, ValidationError};
use event_store::EventStoreError;
use thiserror::Error;

/// Broad category of an error, as seen by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadInput,
    NotFound,
    Conflict,
    Internal,
}

/// Errors that can occur while starting, driving or querying processes.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The caller's input was rejected.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// No process instance with this id exists.
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    /// A process instance with this id was already started.
    #[error("{kind} {id} already started")]
    AlreadyStarted { kind: &'static str, id: String },

    /// A collaborator call failed.
    #[error("{activity} failed: {reason}")]
    SideEffect {
        activity: &'static str,
        reason: String,
    },

    /// A collaborator call did not finish in time.
    #[error("{activity} timed out")]
    Timeout { activity: &'static str },

    /// Domain error.
    #[error("Domain error: {0}")]
    Domain(DomainError),

    /// Event store error.
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The process task is no longer running.
    #[error("{kind} {id} is not running")]
    Stopped { kind: &'static str, id: String },
}

impl WorkflowError {
    pub fn side_effect(activity: &'static str, reason: impl ToString) -> Self {
        WorkflowError::SideEffect {
            activity,
            reason: reason.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkflowError::Validation(_) => ErrorKind::BadInput,
            WorkflowError::NotFound { .. } => ErrorKind::NotFound,
            WorkflowError::AlreadyStarted { .. } => ErrorKind::Conflict,
            _ => ErrorKind::Internal,
        }
    }

    /// Returns true if retrying the same call cannot help.
    pub fn is_permanent(&self) -> bool {
        !matches!(
            self,
            WorkflowError::SideEffect { .. } | WorkflowError::Timeout { .. }
        )
    }

    /// Converts the error into the failure recorded by a process.
    pub fn to_failure(&self) -> Failure {
        match self {
            WorkflowError::Validation(err) => Failure::from(err.clone()),
            WorkflowError::SideEffect { .. } | WorkflowError::Timeout { .. } => {
                Failure::side_effect(self.to_string())
            }
            _ => Failure::infrastructure(self.to_string()),
        }
    }
}

impl From<DomainError> for WorkflowError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(err) => WorkflowError::Validation(err),
            DomainError::EventStore(err) => WorkflowError::EventStore(err),
            DomainError::Serialization(err) => WorkflowError::Serialization(err),
            DomainError::AlreadyStarted { aggregate_type, id } => WorkflowError::AlreadyStarted {
                kind: aggregate_type,
                id,
            },
            DomainError::NotFound { aggregate_type, id } => WorkflowError::NotFound {
                kind: aggregate_type,
                id,
            },
        }
    }
}

/// Convenience type alias for workflow results.
pub type Result<T> = std::result::Result<T, WorkflowError>;
