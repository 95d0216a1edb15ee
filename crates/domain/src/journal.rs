//! Recording and replaying instance streams.

use std::marker::PhantomData;

use common::AggregateId;
use event_store::{AppendOptions, EventEnvelope, EventStore, EventStoreExt, Snapshot, Version};

use crate::aggregate::{Aggregate, DomainEvent, SnapshotCapable};
use crate::error::DomainError;

/// Persists and rebuilds one kind of process instance.
///
/// Each instance id maps to the stream `"<aggregate type>:<id>"`. Loading
/// replays the stream from the latest snapshot; recording appends with the
/// version the caller last saw, so two writers can never interleave events
/// in one stream.
pub struct Journal<S, A>
where
    S: EventStore,
    A: SnapshotCapable,
{
    store: S,
    _phantom: PhantomData<A>,
}

impl<S, A> Clone for Journal<S, A>
where
    S: EventStore + Clone,
    A: SnapshotCapable,
{
    fn clone(&self) -> Self {
        Self::new(self.store.clone())
    }
}

impl<S, A> Journal<S, A>
where
    S: EventStore,
    A: SnapshotCapable,
{
    /// Creates a new journal over the given event store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            _phantom: PhantomData,
        }
    }

    /// Returns a reference to the underlying event store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the stream id holding the events of instance `id`.
    pub fn stream_id(id: &AggregateId) -> AggregateId {
        AggregateId::new(format!("{}:{}", A::aggregate_type(), id))
    }

    /// Loads an instance by replay.
    ///
    /// If the instance doesn't exist, returns a default instance.
    pub async fn load(&self, id: &AggregateId) -> Result<A, DomainError> {
        let stream = Self::stream_id(id);
        let (snapshot, events) = self.store.load_aggregate(&stream).await?;

        let mut aggregate = match snapshot {
            Some(snapshot) => Self::restore_from_snapshot(snapshot)?,
            None => A::default(),
        };

        for envelope in events {
            let event: A::Event = serde_json::from_value(envelope.payload)?;
            aggregate.apply(event);
            aggregate.set_version(envelope.version);
        }

        Ok(aggregate)
    }

    /// Loads an instance, returning None if it was never started.
    pub async fn load_existing(&self, id: &AggregateId) -> Result<Option<A>, DomainError> {
        let aggregate = self.load(id).await?;
        Ok(aggregate.id().is_some().then_some(aggregate))
    }

    /// Appends `events` to the stream of `id` and applies them to
    /// `aggregate`, which must be the state the caller last loaded or
    /// recorded. Saves a snapshot when the new version calls for one.
    ///
    /// On error nothing is applied.
    pub async fn record(
        &self,
        id: &AggregateId,
        aggregate: &mut A,
        events: Vec<A::Event>,
    ) -> Result<Version, DomainError> {
        let current_version = aggregate.version();
        if events.is_empty() {
            return Ok(current_version);
        }

        let stream = Self::stream_id(id);
        let envelopes = Self::build_envelopes(&stream, current_version, &events)?;

        let options = if current_version == Version::initial() {
            AppendOptions::expect_new()
        } else {
            AppendOptions::expect_version(current_version)
        };

        let new_version = self.store.append(envelopes, options).await?;

        aggregate.apply_events(events);
        aggregate.set_version(new_version);

        if aggregate.should_snapshot() {
            let snapshot =
                Snapshot::from_state(stream.clone(), A::aggregate_type(), new_version, &*aggregate)?;
            self.store.save_snapshot(snapshot).await?;
            tracing::debug!(%stream, version = %new_version, "Saved snapshot");
        }

        Ok(new_version)
    }

    fn build_envelopes(
        stream: &AggregateId,
        current_version: Version,
        events: &[A::Event],
    ) -> Result<Vec<EventEnvelope>, DomainError> {
        let mut envelopes = Vec::with_capacity(events.len());
        let mut version = current_version;

        for event in events {
            version = version.next();
            let envelope = EventEnvelope::builder()
                .aggregate_id(stream.clone())
                .aggregate_type(A::aggregate_type())
                .event_type(event.event_type())
                .version(version)
                .payload(event)?
                .try_build()?;
            envelopes.push(envelope);
        }

        Ok(envelopes)
    }

    fn restore_from_snapshot(snapshot: Snapshot) -> Result<A, DomainError> {
        let version = snapshot.version;
        let mut aggregate: A = snapshot.into_state()?;
        aggregate.set_version(version);
        Ok(aggregate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_store::InMemoryEventStore;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    enum CounterEvent {
        Started { id: String },
        Incremented,
    }

    impl DomainEvent for CounterEvent {
        fn event_type(&self) -> &'static str {
            match self {
                CounterEvent::Started { .. } => "CounterStarted",
                CounterEvent::Incremented => "CounterIncremented",
            }
        }
    }

    #[derive(Debug, Default, Clone, Serialize, Deserialize)]
    struct Counter {
        id: Option<AggregateId>,
        count: u32,
        #[serde(default)]
        version: Version,
    }

    impl Counter {
        fn start(&self, id: &AggregateId) -> Result<Vec<CounterEvent>, DomainError> {
            if self.id.is_some() {
                return Err(DomainError::AlreadyStarted {
                    aggregate_type: "Counter",
                    id: id.to_string(),
                });
            }
            Ok(vec![CounterEvent::Started { id: id.to_string() }])
        }
    }

    impl Aggregate for Counter {
        type Event = CounterEvent;
        type Error = DomainError;

        fn aggregate_type() -> &'static str {
            "Counter"
        }

        fn id(&self) -> Option<&AggregateId> {
            self.id.as_ref()
        }

        fn version(&self) -> Version {
            self.version
        }

        fn set_version(&mut self, version: Version) {
            self.version = version;
        }

        fn apply(&mut self, event: Self::Event) {
            match event {
                CounterEvent::Started { id } => self.id = Some(AggregateId::new(id)),
                CounterEvent::Incremented => self.count += 1,
            }
        }
    }

    impl SnapshotCapable for Counter {
        fn snapshot_interval() -> usize {
            3
        }
    }

    fn journal(store: &InMemoryEventStore) -> Journal<InMemoryEventStore, Counter> {
        Journal::new(store.clone())
    }

    async fn started(journal: &Journal<InMemoryEventStore, Counter>, id: &AggregateId) -> Counter {
        let mut counter = journal.load(id).await.unwrap();
        let events = counter.start(id).unwrap();
        journal.record(id, &mut counter, events).await.unwrap();
        counter
    }

    #[test]
    fn stream_id_is_prefixed_with_type() {
        let stream = Journal::<InMemoryEventStore, Counter>::stream_id(&AggregateId::new("a:1"));
        assert_eq!(stream.as_str(), "Counter:a:1");
    }

    #[tokio::test]
    async fn start_is_recorded_and_replayed() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new("order123");
        let journal = journal(&store);

        let counter = started(&journal, &id).await;
        assert_eq!(counter.version(), Version::first());
        assert_eq!(counter.id(), Some(&id));

        let replayed = journal.load_existing(&id).await.unwrap().unwrap();
        assert_eq!(replayed.id(), Some(&id));
        assert!(matches!(
            replayed.start(&id),
            Err(DomainError::AlreadyStarted { .. })
        ));
        assert_eq!(store.event_count().await, 1);
    }

    #[tokio::test]
    async fn record_then_replay() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new("order123");
        let journal = journal(&store);

        let mut counter = started(&journal, &id).await;
        journal
            .record(&id, &mut counter, vec![CounterEvent::Incremented])
            .await
            .unwrap();
        assert_eq!(counter.count, 1);
        assert_eq!(counter.version(), Version::new(2));

        let replayed = journal.load(&id).await.unwrap();
        assert_eq!(replayed.count, 1);
        assert_eq!(replayed.version(), Version::new(2));
    }

    #[tokio::test]
    async fn stale_state_cannot_record() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new("order123");
        let journal = journal(&store);

        let counter = started(&journal, &id).await;
        let mut first = counter.clone();
        let mut second = counter;

        journal
            .record(&id, &mut first, vec![CounterEvent::Incremented])
            .await
            .unwrap();
        let result = journal
            .record(&id, &mut second, vec![CounterEvent::Incremented])
            .await;

        assert!(matches!(result, Err(DomainError::EventStore(_))));
        assert_eq!(second.count, 0);
    }

    #[tokio::test]
    async fn replay_resumes_from_snapshot() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new("order123");
        let journal = journal(&store);

        let mut counter = started(&journal, &id).await;
        for _ in 0..3 {
            journal
                .record(&id, &mut counter, vec![CounterEvent::Incremented])
                .await
                .unwrap();
        }

        let stream = Journal::<InMemoryEventStore, Counter>::stream_id(&id);
        let snapshot = store.get_snapshot(&stream).await.unwrap().unwrap();
        assert_eq!(snapshot.version, Version::new(3));

        let replayed = journal.load(&id).await.unwrap();
        assert_eq!(replayed.count, 3);
        assert_eq!(replayed.version(), Version::new(4));
    }

    #[tokio::test]
    async fn load_existing_is_none_for_unknown_instance() {
        let store = InMemoryEventStore::new();
        let result = journal(&store)
            .load_existing(&AggregateId::new("missing"))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn empty_record_is_a_no_op() {
        let store = InMemoryEventStore::new();
        let mut counter = Counter::default();

        let version = journal(&store)
            .record(&AggregateId::new("order123"), &mut counter, vec![])
            .await
            .unwrap();

        assert_eq!(version, Version::initial());
        assert_eq!(store.event_count().await, 0);
    }
}
