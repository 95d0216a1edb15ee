//! Live process instances by id.

use std::collections::HashMap;
use std::sync::Arc;

use common::AggregateId;
use domain::{Aggregate, DomainError, Journal};
use event_store::EventStore;
use tokio::sync::Mutex;

use crate::error::{Result, WorkflowError};
use crate::process::{EventOf, Process, ProcessHandle, spawn};

/// The live handle of one instance, if any. Locked while the instance is
/// loaded or started, so two tasks never drive the same stream.
type Slot<P> = Arc<Mutex<Option<ProcessHandle<P>>>>;

/// Tracks one task per live instance.
///
/// The map lock is only held to look up a slot; replaying a stream holds
/// that instance's slot alone, so unrelated instances load in parallel.
/// Finished instances are dropped from the map and replayed on demand.
pub struct Registry<P: Process> {
    slots: Arc<Mutex<HashMap<AggregateId, Slot<P>>>>,
}

impl<P: Process> Clone for Registry<P> {
    fn clone(&self) -> Self {
        Self {
            slots: self.slots.clone(),
        }
    }
}

impl<P: Process> Default for Registry<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Process> Registry<P> {
    pub fn new() -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of instances with a live task.
    pub async fn live_count(&self) -> usize {
        self.slots.lock().await.len()
    }

    /// Returns the handle for `id`, replaying the instance from `journal`
    /// and resuming it if it is not live. None if it was never started.
    pub async fn attach<S>(
        &self,
        journal: &Journal<S, P::State>,
        id: &AggregateId,
        services: &Arc<P::Context>,
    ) -> Result<Option<ProcessHandle<P>>>
    where
        S: EventStore + Clone + 'static,
    {
        let slot = self.slot(id).await;
        let mut live = slot.lock().await;
        if let Some(handle) = live.as_ref() {
            return Ok(Some(handle.clone()));
        }

        let Some(state) = journal.load_existing(id).await? else {
            drop(live);
            self.release(id, &slot).await;
            return Ok(None);
        };

        tracing::info!(kind = P::kind(), %id, version = %state.version(), "Resuming process");
        let handle = spawn::<P, S>(journal.clone(), id.clone(), state, services.clone());
        *live = Some(handle.clone());
        self.evict_when_finished(&handle, slot.clone());
        Ok(Some(handle))
    }

    /// Records the start of instance `id` with the events `start` returns
    /// and spawns its task.
    ///
    /// If the instance already exists, an exclusive start fails with
    /// `AlreadyStarted`; otherwise the existing instance is returned.
    pub async fn start<S, F>(
        &self,
        journal: &Journal<S, P::State>,
        id: &AggregateId,
        services: &Arc<P::Context>,
        exclusive: bool,
        start: F,
    ) -> Result<ProcessHandle<P>>
    where
        S: EventStore + Clone + 'static,
        F: FnOnce(&P::State) -> std::result::Result<Vec<EventOf<P>>, DomainError>,
    {
        let already_started = || WorkflowError::AlreadyStarted {
            kind: P::kind(),
            id: id.to_string(),
        };

        let slot = self.slot(id).await;
        let mut live = slot.lock().await;
        if let Some(handle) = live.as_ref() {
            return if exclusive {
                Err(already_started())
            } else {
                Ok(handle.clone())
            };
        }

        let result = Self::load_or_start(journal, id, exclusive, start).await;
        let state = match result {
            Ok(state) => state,
            Err(err) => {
                drop(live);
                self.release(id, &slot).await;
                return Err(err);
            }
        };

        let handle = spawn::<P, S>(journal.clone(), id.clone(), state, services.clone());
        *live = Some(handle.clone());
        self.evict_when_finished(&handle, slot.clone());
        Ok(handle)
    }

    /// Stops every task and forgets its handle.
    pub async fn abort_all(&self) {
        let slots: Vec<Slot<P>> = self.slots.lock().await.drain().map(|(_, slot)| slot).collect();
        for slot in slots {
            if let Some(handle) = slot.lock().await.take() {
                handle.abort();
            }
        }
    }

    async fn load_or_start<S, F>(
        journal: &Journal<S, P::State>,
        id: &AggregateId,
        exclusive: bool,
        start: F,
    ) -> Result<P::State>
    where
        S: EventStore + Clone + 'static,
        F: FnOnce(&P::State) -> std::result::Result<Vec<EventOf<P>>, DomainError>,
    {
        let mut state = journal.load(id).await?;
        if state.id().is_some() {
            if exclusive {
                return Err(WorkflowError::AlreadyStarted {
                    kind: P::kind(),
                    id: id.to_string(),
                });
            }
            tracing::info!(kind = P::kind(), %id, "Resuming process");
            return Ok(state);
        }

        let events = start(&state)?;
        journal.record(id, &mut state, events).await?;
        metrics::counter!("workflow_started_total", "kind" => P::kind()).increment(1);
        tracing::info!(kind = P::kind(), %id, "Process started");
        Ok(state)
    }

    async fn slot(&self, id: &AggregateId) -> Slot<P> {
        self.slots.lock().await.entry(id.clone()).or_default().clone()
    }

    /// Forgets `slot` if it is still the one registered for `id`.
    async fn release(&self, id: &AggregateId, slot: &Slot<P>) {
        let mut slots = self.slots.lock().await;
        if slots.get(id).is_some_and(|current| Arc::ptr_eq(current, slot)) {
            slots.remove(id);
        }
    }

    fn evict_when_finished(&self, handle: &ProcessHandle<P>, slot: Slot<P>) {
        let registry = self.clone();
        let handle = handle.clone();
        tokio::spawn(async move {
            // Finished or stopped, the task no longer drives the stream.
            let _ = handle.wait().await;
            slot.lock().await.take();
            registry.release(handle.id(), &slot).await;
        });
    }
}
