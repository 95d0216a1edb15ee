use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AggregateId, EventEnvelope, EventQuery, EventStoreError, Result, Snapshot, Version,
    store::{AppendOptions, EventStore, EventStream, validate_events_for_append},
};

#[derive(Default)]
struct Inner {
    /// Every stream, events kept in version order.
    streams: HashMap<AggregateId, Vec<EventEnvelope>>,
    /// All events in commit order; an event's position is its index plus one.
    log: Vec<EventEnvelope>,
}

/// In-memory event store.
///
/// Behaves like [`PostgresEventStore`](crate::PostgresEventStore) for the
/// durability contract (atomic batches, optimistic concurrency), but state
/// only lives as long as the process. Clones share the same storage, which
/// lets tests hand one store to a fresh engine to simulate a restart.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    inner: Arc<RwLock<Inner>>,
    snapshots: Arc<RwLock<HashMap<AggregateId, Snapshot>>>,
}

impl InMemoryEventStore {
    /// Creates a new empty in-memory event store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.inner.read().await.log.len()
    }

    /// Clears all events and snapshots.
    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        inner.streams.clear();
        inner.log.clear();
        self.snapshots.write().await.clear();
    }
}

fn matches(query: &EventQuery, e: &EventEnvelope) -> bool {
    if let Some(ref id) = query.aggregate_id
        && &e.aggregate_id != id
    {
        return false;
    }
    if let Some(ref agg_type) = query.aggregate_type
        && &e.aggregate_type != agg_type
    {
        return false;
    }
    if let Some(ref types) = query.event_types
        && !types.contains(&e.event_type)
    {
        return false;
    }
    if let Some(from) = query.from_version
        && e.version < from
    {
        return false;
    }
    if let Some(to) = query.to_version
        && e.version > to
    {
        return false;
    }
    true
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version> {
        validate_events_for_append(&events)?;

        let aggregate_id = events[0].aggregate_id.clone();
        let first_new_version = events[0].version;

        let mut inner = self.inner.write().await;

        let current_version = inner
            .streams
            .get(&aggregate_id)
            .and_then(|stream| stream.last())
            .map(|e| e.version)
            .unwrap_or(Version::initial());

        if let Some(expected) = options.expected_version
            && current_version != expected
        {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected,
                actual: current_version,
            });
        }

        // Mirrors the (aggregate_id, version) unique constraint.
        if first_new_version != current_version.next() {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected: options.expected_version.unwrap_or(current_version),
                actual: current_version,
            });
        }

        let last_version = events
            .last()
            .map(|e| e.version)
            .unwrap_or(Version::initial());

        let base = inner.log.len() as u64;
        let events: Vec<EventEnvelope> = events
            .into_iter()
            .zip(1..)
            .map(|(mut event, offset)| {
                event.position = base + offset;
                event
            })
            .collect();

        inner.log.extend(events.iter().cloned());
        inner.streams.entry(aggregate_id).or_default().extend(events);

        Ok(last_version)
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: &AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        let inner = self.inner.read().await;
        Ok(inner.streams.get(aggregate_id).cloned().unwrap_or_default())
    }

    async fn get_events_for_aggregate_from_version(
        &self,
        aggregate_id: &AggregateId,
        from_version: Version,
    ) -> Result<Vec<EventEnvelope>> {
        let inner = self.inner.read().await;
        Ok(inner
            .streams
            .get(aggregate_id)
            .map(|stream| {
                stream
                    .iter()
                    .filter(|e| e.version >= from_version)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn query_events(&self, query: EventQuery) -> Result<Vec<EventEnvelope>> {
        let inner = self.inner.read().await;
        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);

        Ok(inner
            .log
            .iter()
            .filter(|e| matches(&query, e))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get_events_by_type(&self, event_type: &str) -> Result<Vec<EventEnvelope>> {
        let inner = self.inner.read().await;
        Ok(inner
            .log
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect())
    }

    async fn stream_events_after(&self, position: u64) -> Result<EventStream> {
        use futures_util::stream;

        let skip = usize::try_from(position).unwrap_or(usize::MAX);
        let events: Vec<EventEnvelope> =
            self.inner.read().await.log.iter().skip(skip).cloned().collect();
        let stream = stream::iter(events.into_iter().map(Ok));
        Ok(Box::pin(stream))
    }

    async fn get_aggregate_version(&self, aggregate_id: &AggregateId) -> Result<Option<Version>> {
        let inner = self.inner.read().await;
        Ok(inner
            .streams
            .get(aggregate_id)
            .and_then(|stream| stream.last())
            .map(|e| e.version))
    }

    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<()> {
        let mut snapshots = self.snapshots.write().await;
        snapshots.insert(snapshot.aggregate_id.clone(), snapshot);
        Ok(())
    }

    async fn get_snapshot(&self, aggregate_id: &AggregateId) -> Result<Option<Snapshot>> {
        let snapshots = self.snapshots.read().await;
        Ok(snapshots.get(aggregate_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EventStoreExt;

    fn create_test_event(
        aggregate_id: &AggregateId,
        version: Version,
        event_type: &str,
    ) -> EventEnvelope {
        EventEnvelope::builder()
            .aggregate_id(aggregate_id.clone())
            .aggregate_type("Shipment")
            .event_type(event_type)
            .version(version)
            .payload_raw(serde_json::json!({"test": true}))
            .try_build()
            .unwrap()
    }

    #[tokio::test]
    async fn append_single_event() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new("Shipment:order123:1");
        let event = create_test_event(&id, Version::first(), "ShipmentStarted");

        let result = store.append(vec![event], AppendOptions::expect_new()).await;
        assert_eq!(result.unwrap(), Version::first());

        let events = store.get_events_for_aggregate(&id).await.unwrap();
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn append_batch_is_ordered() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new("Shipment:order123:1");

        let events = vec![
            create_test_event(&id, Version::new(1), "ShipmentStarted"),
            create_test_event(&id, Version::new(2), "ShipmentBooked"),
            create_test_event(&id, Version::new(3), "NotificationSent"),
        ];

        let result = store.append(events, AppendOptions::expect_new()).await;
        assert_eq!(result.unwrap(), Version::new(3));

        let stored = store.get_events_for_aggregate(&id).await.unwrap();
        let types: Vec<_> = stored.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(
            types,
            ["ShipmentStarted", "ShipmentBooked", "NotificationSent"]
        );
    }

    #[tokio::test]
    async fn stale_expected_version_conflicts() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new("Order:order123");

        let first = create_test_event(&id, Version::first(), "OrderStarted");
        store
            .append(vec![first], AppendOptions::expect_new())
            .await
            .unwrap();

        let second = create_test_event(&id, Version::new(2), "FulfillmentsAllocated");
        let result = store
            .append(vec![second], AppendOptions::expect_version(Version::initial()))
            .await;

        assert!(matches!(
            result,
            Err(EventStoreError::ConcurrencyConflict { .. })
        ));
        assert_eq!(store.event_count().await, 1);
    }

    #[tokio::test]
    async fn matching_expected_version_appends() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new("Order:order123");

        let first = create_test_event(&id, Version::first(), "OrderStarted");
        store
            .append(vec![first], AppendOptions::expect_new())
            .await
            .unwrap();

        let second = create_test_event(&id, Version::new(2), "FulfillmentsAllocated");
        let result = store
            .append(vec![second], AppendOptions::expect_version(Version::first()))
            .await;

        assert_eq!(result.unwrap(), Version::new(2));
    }

    #[tokio::test]
    async fn version_gap_is_a_conflict() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new("Order:order123");

        let event = create_test_event(&id, Version::new(3), "OrderStarted");
        let result = store.append(vec![event], AppendOptions::new()).await;

        assert!(matches!(
            result,
            Err(EventStoreError::ConcurrencyConflict { .. })
        ));
    }

    #[tokio::test]
    async fn empty_batch_is_invalid() {
        let store = InMemoryEventStore::new();
        let result = store.append(vec![], AppendOptions::new()).await;
        assert!(matches!(result, Err(EventStoreError::InvalidAppend(_))));
    }

    #[tokio::test]
    async fn get_events_from_version() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new("Charge:order123:1");

        let events = vec![
            create_test_event(&id, Version::new(1), "ChargeStarted"),
            create_test_event(&id, Version::new(2), "InvoiceGenerated"),
            create_test_event(&id, Version::new(3), "CustomerCharged"),
        ];
        store.append(events, AppendOptions::new()).await.unwrap();

        let from_v2 = store
            .get_events_for_aggregate_from_version(&id, Version::new(2))
            .await
            .unwrap();
        assert_eq!(from_v2.len(), 2);
        assert_eq!(from_v2[0].version, Version::new(2));
        assert_eq!(from_v2[1].version, Version::new(3));
    }

    #[tokio::test]
    async fn streams_with_shared_suffix_stay_separate() {
        let store = InMemoryEventStore::new();
        let shipment = AggregateId::new("Shipment:order123:1");
        let charge = AggregateId::new("Charge:order123:1");

        store
            .append(
                vec![create_test_event(&shipment, Version::first(), "ShipmentStarted")],
                AppendOptions::expect_new(),
            )
            .await
            .unwrap();
        store
            .append(
                vec![create_test_event(&charge, Version::first(), "ChargeStarted")],
                AppendOptions::expect_new(),
            )
            .await
            .unwrap();

        assert_eq!(store.get_events_for_aggregate(&shipment).await.unwrap().len(), 1);
        assert_eq!(store.get_events_for_aggregate(&charge).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn get_events_by_type() {
        let store = InMemoryEventStore::new();
        let id1 = AggregateId::new("Shipment:a:1");
        let id2 = AggregateId::new("Shipment:b:1");

        store
            .append(
                vec![create_test_event(&id1, Version::first(), "ShipmentStarted")],
                AppendOptions::new(),
            )
            .await
            .unwrap();
        store
            .append(
                vec![create_test_event(&id2, Version::first(), "ShipmentStarted")],
                AppendOptions::new(),
            )
            .await
            .unwrap();
        store
            .append(
                vec![create_test_event(&id1, Version::new(2), "ShipmentBooked")],
                AppendOptions::new(),
            )
            .await
            .unwrap();

        let started = store.get_events_by_type("ShipmentStarted").await.unwrap();
        assert_eq!(started.len(), 2);

        let booked = store.get_events_by_type("ShipmentBooked").await.unwrap();
        assert_eq!(booked.len(), 1);
    }

    #[tokio::test]
    async fn snapshot_save_and_load() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new("Shipment:order123:1");

        let events = vec![
            create_test_event(&id, Version::new(1), "ShipmentStarted"),
            create_test_event(&id, Version::new(2), "ShipmentBooked"),
            create_test_event(&id, Version::new(3), "StatusUpdated"),
        ];
        store.append(events, AppendOptions::new()).await.unwrap();

        let snapshot = Snapshot::new(
            id.clone(),
            "Shipment",
            Version::new(2),
            serde_json::json!({"status": "booked"}),
        );
        store.save_snapshot(snapshot).await.unwrap();

        let (snapshot, tail) = store.load_aggregate(&id).await.unwrap();
        assert_eq!(snapshot.unwrap().version, Version::new(2));
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].event_type, "StatusUpdated");
    }

    #[tokio::test]
    async fn snapshot_not_found() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new("Shipment:missing");

        let result = store.get_snapshot(&id).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn query_events_with_filters() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new("Order:order123");
        let other = AggregateId::new("Shipment:order123:1");

        let events = vec![
            create_test_event(&id, Version::new(1), "OrderStarted"),
            create_test_event(&id, Version::new(2), "FulfillmentsAllocated"),
            create_test_event(&id, Version::new(3), "CustomerActionRequested"),
        ];
        store.append(events, AppendOptions::new()).await.unwrap();
        store
            .append(
                vec![create_test_event(&other, Version::first(), "ShipmentStarted")],
                AppendOptions::new(),
            )
            .await
            .unwrap();

        let query = EventQuery::new()
            .aggregate_id(id.clone())
            .from_version(Version::new(2))
            .to_version(Version::new(2));
        let results = store.query_events(query).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].version, Version::new(2));

        let query = EventQuery::new()
            .event_types(vec!["OrderStarted".to_string(), "ShipmentStarted".to_string()])
            .offset(1)
            .limit(5);
        let results = store.query_events(query).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].aggregate_id, other);
    }

    #[tokio::test]
    async fn stream_all_events_in_commit_order() {
        use futures_util::StreamExt;

        let store = InMemoryEventStore::new();
        let id1 = AggregateId::new("Shipment:a:1");
        let id2 = AggregateId::new("Shipment:b:1");

        store
            .append(
                vec![create_test_event(&id1, Version::first(), "ShipmentStarted")],
                AppendOptions::new(),
            )
            .await
            .unwrap();
        store
            .append(
                vec![create_test_event(&id2, Version::first(), "ShipmentStarted")],
                AppendOptions::new(),
            )
            .await
            .unwrap();

        let stream = store.stream_all_events().await.unwrap();
        let events: Vec<_> = stream.collect().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].as_ref().unwrap().aggregate_id, id1);
        assert_eq!(events[1].as_ref().unwrap().aggregate_id, id2);
    }

    #[tokio::test]
    async fn stream_events_after_resumes_from_position() {
        use futures_util::TryStreamExt;

        let store = InMemoryEventStore::new();
        let id = AggregateId::new("Shipment:a:1");
        store
            .append(
                vec![
                    create_test_event(&id, Version::new(1), "ShipmentStarted"),
                    create_test_event(&id, Version::new(2), "ShipmentBooked"),
                ],
                AppendOptions::expect_new(),
            )
            .await
            .unwrap();
        store
            .append(
                vec![create_test_event(&id, Version::new(3), "StatusUpdated")],
                AppendOptions::expect_version(Version::new(2)),
            )
            .await
            .unwrap();

        let all: Vec<EventEnvelope> = store
            .stream_all_events()
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        let positions: Vec<u64> = all.iter().map(|e| e.position).collect();
        assert_eq!(positions, vec![1, 2, 3]);

        let rest: Vec<EventEnvelope> = store
            .stream_events_after(2)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].event_type, "StatusUpdated");
        assert_eq!(rest[0].position, 3);

        let none: Vec<EventEnvelope> = store
            .stream_events_after(3)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn get_aggregate_version() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new("Charge:order123:1");

        assert!(store.get_aggregate_version(&id).await.unwrap().is_none());
        assert!(!store.aggregate_exists(&id).await.unwrap());

        let events = vec![
            create_test_event(&id, Version::new(1), "ChargeStarted"),
            create_test_event(&id, Version::new(2), "InvoiceGenerated"),
        ];
        store.append(events, AppendOptions::new()).await.unwrap();

        let version = store.get_aggregate_version(&id).await.unwrap();
        assert_eq!(version, Some(Version::new(2)));
        assert!(store.aggregate_exists(&id).await.unwrap());
    }

    #[tokio::test]
    async fn clones_share_storage() {
        let store = InMemoryEventStore::new();
        let restarted = store.clone();
        let id = AggregateId::new("Order:order123");

        store
            .append(
                vec![create_test_event(&id, Version::first(), "OrderStarted")],
                AppendOptions::expect_new(),
            )
            .await
            .unwrap();

        assert_eq!(restarted.event_count().await, 1);
        restarted.clear().await;
        assert_eq!(store.event_count().await, 0);
    }
}
