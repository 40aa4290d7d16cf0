//! Read-side projections.
//!
//! Projections consume published envelopes (JSON payloads) and maintain
//! disposable read models. The bus delivers at-least-once, so every
//! projection keeps a per-stream sequence cursor: replays at or below the
//! cursor are ignored, gaps are errors.

use std::collections::HashMap;
use std::sync::RwLock;

use thiserror::Error;

use storecore_core::AggregateId;

pub mod catalog;
pub mod inventory_log;
pub mod orders;
pub mod stock_levels;

pub use catalog::{CatalogProjection, ProductReadModel};
pub use inventory_log::{InventoryLogEntry, InventoryLogProjection};
pub use orders::{OrderReadModel, OrdersProjection};
pub use stock_levels::{StockLevel, StockLevelsProjection};

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize event payload: {0}")]
    Deserialize(String),

    #[error("stream mismatch: {0}")]
    StreamMismatch(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Per-aggregate sequence cursors for at-least-once envelope delivery.
///
/// `apply_once` holds the write lock across the apply so cursor check and
/// advance are a single step, mirroring how the store assigns sequence
/// numbers under one guard.
#[derive(Debug, Default)]
pub(crate) struct ProjectionCursors {
    cursors: RwLock<HashMap<AggregateId, u64>>,
}

impl ProjectionCursors {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn clear(&self) {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.clear();
        }
    }

    /// Run `apply` exactly once per (aggregate, sequence) pair.
    ///
    /// - `seq == 0` is always invalid.
    /// - `seq <= cursor` is a duplicate or replay; skipped without error.
    /// - The first observed sequence may be any positive value (stores start
    ///   at 1, but a projection may attach mid-stream after a rebuild);
    ///   after that, strict +1 increments are enforced.
    pub(crate) fn apply_once(
        &self,
        aggregate_id: AggregateId,
        seq: u64,
        apply: impl FnOnce() -> Result<(), ProjectionError>,
    ) -> Result<(), ProjectionError> {
        if let Ok(mut cursors) = self.cursors.write() {
            let last = *cursors.get(&aggregate_id).unwrap_or(&0);

            if seq == 0 {
                return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
            }

            if seq <= last {
                return Ok(());
            }

            if last != 0 && seq != last + 1 {
                return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
            }

            apply()?;

            // Advance only after a successful apply.
            cursors.insert(aggregate_id, seq);
        }

        Ok(())
    }
}
