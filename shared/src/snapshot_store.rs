//! Holds the latest accepted snapshot.
//!
//! A replace swaps one `Arc` so readers see either the old snapshot or the
//! new one, never a blend. Failed polls leave the current snapshot alone and
//! only move the error counters.

use std::sync::Arc;

use crate::error::TransportError;
use crate::snapshot::Snapshot;
use crate::snapshot_client::PollSeq;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Replaced,
    Retained { error: TransportError },
    /// A newer poll was already applied.
    Stale { latest: PollSeq },
}

#[derive(Debug, Clone, Default)]
pub struct SnapshotStore {
    current: Option<Arc<Snapshot>>,
    last_applied: Option<PollSeq>,
    last_error: Option<TransportError>,
    consecutive_failures: u32,
    total_failures: u64,
    replacements: u64,
}

impl SnapshotStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(
        &mut self,
        poll: PollSeq,
        result: Result<Snapshot, TransportError>,
    ) -> ApplyOutcome {
        if let Some(latest) = self.last_applied.filter(|latest| poll <= *latest) {
            tracing::debug!(poll = %poll, latest = %latest, "discarding stale poll result");
            return ApplyOutcome::Stale { latest };
        }
        self.last_applied = Some(poll);

        let validated = result.and_then(|snapshot| {
            snapshot
                .validate()
                .map(|()| snapshot)
                .map_err(|err| TransportError::Invalid {
                    reason: err.to_string(),
                })
        });

        match validated {
            Ok(snapshot) => {
                if self.consecutive_failures > 0 {
                    tracing::info!(
                        failures = self.consecutive_failures,
                        "snapshot polling recovered"
                    );
                }
                self.current = Some(Arc::new(snapshot));
                self.last_error = None;
                self.consecutive_failures = 0;
                self.replacements += 1;
                ApplyOutcome::Replaced
            }
            Err(error) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                self.total_failures += 1;
                tracing::warn!(
                    poll = %poll,
                    error = %error,
                    consecutive = self.consecutive_failures,
                    "snapshot poll failed, keeping previous snapshot"
                );
                self.last_error = Some(error.clone());
                ApplyOutcome::Retained { error }
            }
        }
    }

    #[must_use]
    pub fn current(&self) -> Option<&Snapshot> {
        self.current.as_deref()
    }

    /// A handle that stays valid across later replaces.
    #[must_use]
    pub fn shared(&self) -> Option<Arc<Snapshot>> {
        self.current.clone()
    }

    #[must_use]
    pub const fn last_error(&self) -> Option<&TransportError> {
        self.last_error.as_ref()
    }

    #[must_use]
    pub const fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    #[must_use]
    pub const fn total_failures(&self) -> u64 {
        self.total_failures
    }

    #[must_use]
    pub const fn replacements(&self) -> u64 {
        self.replacements
    }

    #[must_use]
    pub const fn last_applied(&self) -> Option<PollSeq> {
        self.last_applied
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{Taxi, TaxiId, TaxiStatus};

    fn snapshot_with(ids: &[u64]) -> Snapshot {
        Snapshot {
            taxis: ids
                .iter()
                .map(|id| Taxi {
                    id: TaxiId(*id),
                    model: String::new(),
                    plate: String::new(),
                    status: TaxiStatus::Free,
                    x: 1.0,
                    y: 1.0,
                    earnings: 0.0,
                    trips: 0,
                    rating: 0.0,
                })
                .collect(),
            ..Snapshot::default()
        }
    }

    fn unreachable() -> TransportError {
        TransportError::Unreachable {
            reason: "refused".into(),
        }
    }

    #[test]
    fn test_success_replaces() {
        let mut store = SnapshotStore::new();
        assert_eq!(
            store.apply(PollSeq(0), Ok(snapshot_with(&[1]))),
            ApplyOutcome::Replaced
        );
        assert!(store.current().unwrap().contains_taxi(TaxiId(1)));
    }

    #[test]
    fn test_failure_retains_previous() {
        let mut store = SnapshotStore::new();
        store.apply(PollSeq(0), Ok(snapshot_with(&[1, 2])));
        let outcome = store.apply(PollSeq(1), Err(unreachable()));
        assert!(matches!(outcome, ApplyOutcome::Retained { .. }));
        assert_eq!(store.current().unwrap().taxis.len(), 2);
        assert_eq!(store.consecutive_failures(), 1);
        assert_eq!(store.total_failures(), 1);
        assert!(store.last_error().is_some());
    }

    #[test]
    fn test_failure_before_first_snapshot() {
        let mut store = SnapshotStore::new();
        store.apply(PollSeq(0), Err(unreachable()));
        assert!(store.current().is_none());
        assert_eq!(store.consecutive_failures(), 1);
    }

    #[test]
    fn test_recovery_resets_consecutive() {
        let mut store = SnapshotStore::new();
        store.apply(PollSeq(0), Err(unreachable()));
        store.apply(PollSeq(1), Err(unreachable()));
        store.apply(PollSeq(2), Ok(snapshot_with(&[])));
        assert_eq!(store.consecutive_failures(), 0);
        assert_eq!(store.total_failures(), 2);
        assert!(store.last_error().is_none());
    }

    #[test]
    fn test_invalid_snapshot_retained_as_error() {
        let mut store = SnapshotStore::new();
        store.apply(PollSeq(0), Ok(snapshot_with(&[1])));
        let outcome = store.apply(PollSeq(1), Ok(snapshot_with(&[3, 3])));
        assert!(matches!(
            outcome,
            ApplyOutcome::Retained {
                error: TransportError::Invalid { .. }
            }
        ));
        assert!(store.current().unwrap().contains_taxi(TaxiId(1)));
    }

    #[test]
    fn test_stale_result_discarded() {
        let mut store = SnapshotStore::new();
        store.apply(PollSeq(5), Ok(snapshot_with(&[5])));
        let outcome = store.apply(PollSeq(4), Ok(snapshot_with(&[4])));
        assert_eq!(
            outcome,
            ApplyOutcome::Stale {
                latest: PollSeq(5)
            }
        );
        assert!(store.current().unwrap().contains_taxi(TaxiId(5)));
    }

    #[test]
    fn test_shared_handle_survives_replace() {
        let mut store = SnapshotStore::new();
        store.apply(PollSeq(0), Ok(snapshot_with(&[1])));
        let held = store.shared().unwrap();
        store.apply(PollSeq(1), Ok(snapshot_with(&[2])));
        assert!(held.contains_taxi(TaxiId(1)));
        assert!(store.current().unwrap().contains_taxi(TaxiId(2)));
    }
}
