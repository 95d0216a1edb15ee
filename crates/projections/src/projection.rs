//! Projection trait and position tracking.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use event_store::EventEnvelope;

use crate::Result;

/// How far into the event log a projection has read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectionPosition {
    /// Global log position of the last event seen; zero before the first.
    pub last_position: u64,
    /// Number of events seen.
    pub events_processed: u64,
    /// Timestamp of the last event seen.
    pub last_event_at: Option<DateTime<Utc>>,
}

impl ProjectionPosition {
    pub fn zero() -> Self {
        Self::default()
    }

    /// Moves past `event`.
    pub fn advance(&self, event: &EventEnvelope) -> Self {
        Self {
            last_position: event.position,
            events_processed: self.events_processed + 1,
            last_event_at: Some(event.timestamp),
        }
    }
}

impl std::fmt::Display for ProjectionPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "position({})", self.last_position)
    }
}

/// Folds the event log into a read model.
///
/// Every event in the log is handed to every projection exactly once, in
/// log order; a projection ignores what it has no use for but still
/// advances its position past it.
#[async_trait]
pub trait Projection: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, event: &EventEnvelope) -> Result<()>;

    async fn position(&self) -> ProjectionPosition;
}
