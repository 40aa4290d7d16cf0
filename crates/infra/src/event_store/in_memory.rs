use std::collections::HashMap;
use std::sync::RwLock;

use storecore_core::{AggregateId, ExpectedVersion};

use super::r#trait::{EventStore, EventStoreError, StoredEvent, StreamBatch, UncommittedEvent};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct StreamKey {
    aggregate_id: AggregateId,
    aggregate_type: String,
}

/// In-memory append-only event store.
///
/// Intended for tests/dev and the default single-process deployment.
/// `append_multi` validates every batch under one write guard before any
/// stream is touched, which is what gives multi-stream appends their
/// all-or-nothing behavior.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    streams: RwLock<HashMap<StreamKey, Vec<StoredEvent>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn current_version(stream: &[StoredEvent]) -> u64 {
        stream.last().map(|e| e.sequence_number).unwrap_or(0)
    }

    /// Validate batch homogeneity and return the stream key it targets.
    fn batch_key(events: &[UncommittedEvent]) -> Result<StreamKey, EventStoreError> {
        let aggregate_id = events[0].aggregate_id;
        let aggregate_type = events[0].aggregate_type.clone();

        for (idx, e) in events.iter().enumerate() {
            if e.aggregate_id != aggregate_id {
                return Err(EventStoreError::InvalidAppend(format!(
                    "batch contains multiple aggregate_ids (index {idx})"
                )));
            }
            if e.aggregate_type != aggregate_type {
                return Err(EventStoreError::AggregateTypeMismatch(format!(
                    "batch contains multiple aggregate_types (index {idx})"
                )));
            }
        }

        Ok(StreamKey {
            aggregate_id,
            aggregate_type,
        })
    }
}

impl EventStore for InMemoryEventStore {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        self.append_multi(vec![StreamBatch {
            expected: expected_version,
            events,
        }])
    }

    fn append_multi(&self, batches: Vec<StreamBatch>) -> Result<Vec<StoredEvent>, EventStoreError> {
        let batches: Vec<StreamBatch> = batches.into_iter().filter(|b| !b.events.is_empty()).collect();
        if batches.is_empty() {
            return Ok(vec![]);
        }

        let mut streams = self
            .streams
            .write()
            .map_err(|_| EventStoreError::InvalidAppend("lock poisoned".to_string()))?;

        // Phase 1: validate every batch before touching any stream.
        let mut keys = Vec::with_capacity(batches.len());
        for batch in &batches {
            let key = Self::batch_key(&batch.events)?;

            if keys.contains(&key) {
                return Err(EventStoreError::InvalidAppend(format!(
                    "duplicate stream in multi-append ({}/{})",
                    key.aggregate_type, key.aggregate_id
                )));
            }

            let current = streams
                .get(&key)
                .map(|s| Self::current_version(s))
                .unwrap_or(0);
            if !batch.expected.matches(current) {
                return Err(EventStoreError::Concurrency(format!(
                    "stream {}/{}: expected {:?}, found {current}",
                    key.aggregate_type, key.aggregate_id, batch.expected
                )));
            }

            keys.push(key);
        }

        // Phase 2: commit all batches (append-only).
        let mut committed = Vec::new();
        for (key, batch) in keys.into_iter().zip(batches) {
            let stream = streams.entry(key).or_default();
            let mut next = Self::current_version(stream) + 1;

            for e in batch.events {
                let stored = StoredEvent {
                    event_id: e.event_id,
                    aggregate_id: e.aggregate_id,
                    aggregate_type: e.aggregate_type,
                    sequence_number: next,
                    event_type: e.event_type,
                    event_version: e.event_version,
                    occurred_at: e.occurred_at,
                    payload: e.payload,
                };
                next += 1;
                stream.push(stored.clone());
                committed.push(stored);
            }
        }

        Ok(committed)
    }

    fn load_stream(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let key = StreamKey {
            aggregate_id,
            aggregate_type: aggregate_type.to_string(),
        };

        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::InvalidAppend("lock poisoned".to_string()))?;

        Ok(streams.get(&key).cloned().unwrap_or_default())
    }
}
