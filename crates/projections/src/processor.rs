//! Feeds the event log to projections.

use std::sync::Arc;

use event_store::EventStore;
use futures_util::StreamExt;
use tokio::sync::Mutex;

use crate::Result;
use crate::projection::Projection;

/// Delivers events from an event store to registered projections.
///
/// Projections are registered as shared handles so callers keep querying
/// the same read model the processor writes to. Catch-up runs are
/// serialized: two concurrent callers never hand the same event to a
/// projection twice.
pub struct ProjectionProcessor<S: EventStore> {
    store: S,
    projections: Vec<Arc<dyn Projection>>,
    catch_up: Mutex<()>,
}

impl<S: EventStore> ProjectionProcessor<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            projections: Vec::new(),
            catch_up: Mutex::new(()),
        }
    }

    pub fn register(&mut self, projection: Arc<dyn Projection>) {
        tracing::debug!(projection = projection.name(), "Registered projection");
        self.projections.push(projection);
    }

    /// Reads the log past the furthest-behind projection and hands each
    /// projection the events beyond its own position. Returns the number
    /// of events read.
    #[tracing::instrument(skip(self))]
    pub async fn run_catch_up(&self) -> Result<u64> {
        let _guard = self.catch_up.lock().await;

        let mut positions = Vec::with_capacity(self.projections.len());
        for projection in &self.projections {
            positions.push(projection.position().await.last_position);
        }
        let Some(from) = positions.iter().min().copied() else {
            return Ok(0);
        };

        let mut stream = self.store.stream_events_after(from).await?;
        let mut read: u64 = 0;
        let mut delivered: u64 = 0;

        while let Some(result) = stream.next().await {
            let event = result?;
            read += 1;

            for (projection, seen) in self.projections.iter().zip(positions.iter_mut()) {
                if *seen < event.position {
                    projection.handle(&event).await?;
                    *seen = event.position;
                    delivered += 1;
                }
            }
        }

        if delivered > 0 {
            metrics::counter!("projection_events_processed_total").increment(delivered);
            tracing::debug!(from, read, delivered, "Catch-up complete");
        }
        Ok(read)
    }
}
