//! Pod directory shared between the synchronizer and the query handler
//!
//! The directory holds one immutable snapshot of workload records. The
//! synchronizer swaps a whole new snapshot in; readers grab the current one
//! without taking a lock, so a slow kubelet never stalls DNS answers.

use arc_swap::ArcSwap;
use serde::Serialize;
use std::net::Ipv4Addr;
use std::sync::Arc;

/// One resolvable workload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkloadRecord {
    /// Lookup key, the pod name without its trailing `-<suffix>` segment
    pub name: String,
    /// Runtime pod name the record was derived from
    pub pod_name: String,
    pub address: Ipv4Addr,
    pub port: Option<u16>,
}

/// Immutable view of the directory at one point in time
pub type Snapshot = Arc<Vec<WorkloadRecord>>;

/// Anything that can hand out the current set of records
pub trait RecordSource: Send + Sync {
    fn snapshot(&self) -> Snapshot;
}

/// Thread-safe directory of workload records
#[derive(Clone)]
pub struct PodDirectory {
    inner: Arc<ArcSwap<Vec<WorkloadRecord>>>,
}

impl PodDirectory {
    /// Create a new empty directory
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(Vec::new())),
        }
    }

    /// Install a complete new set of records, dropping the previous one
    pub fn replace(&self, records: Vec<WorkloadRecord>) {
        self.inner.store(Arc::new(records));
    }

    /// Get the current records
    pub fn snapshot(&self) -> Snapshot {
        self.inner.load_full()
    }

    /// Get the number of records in the current snapshot
    pub fn len(&self) -> usize {
        self.inner.load().len()
    }

    /// Check if the current snapshot is empty
    pub fn is_empty(&self) -> bool {
        self.inner.load().is_empty()
    }
}

impl Default for PodDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordSource for PodDirectory {
    fn snapshot(&self) -> Snapshot {
        PodDirectory::snapshot(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, pod_name: &str, ip: [u8; 4]) -> WorkloadRecord {
        WorkloadRecord {
            name: name.to_string(),
            pod_name: pod_name.to_string(),
            address: Ipv4Addr::from(ip),
            port: Some(8080),
        }
    }

    #[test]
    fn test_new_directory_is_empty() {
        let directory = PodDirectory::new();
        assert!(directory.is_empty());
        assert!(directory.snapshot().is_empty());
    }

    #[test]
    fn test_replace_swaps_whole_snapshot() {
        let directory = PodDirectory::new();
        directory.replace(vec![
            record("resnet50", "resnet50-abc123", [10, 0, 0, 5]),
            record("bert", "bert-x1", [10, 0, 0, 6]),
        ]);
        assert_eq!(directory.len(), 2);

        directory.replace(vec![record("gpt", "gpt-9", [10, 0, 0, 7])]);

        let snapshot = directory.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].name, "gpt");
    }

    #[test]
    fn test_snapshot_is_stable_between_replaces() {
        let directory = PodDirectory::new();
        directory.replace(vec![record("resnet50", "resnet50-abc123", [10, 0, 0, 5])]);

        assert_eq!(directory.snapshot(), directory.snapshot());
    }

    #[test]
    fn test_old_snapshot_survives_replace() {
        let directory = PodDirectory::new();
        directory.replace(vec![record("resnet50", "resnet50-abc123", [10, 0, 0, 5])]);

        let before = directory.snapshot();
        directory.replace(Vec::new());

        assert_eq!(before.len(), 1);
        assert!(directory.snapshot().is_empty());
    }

    #[test]
    fn test_clones_share_state() {
        let directory = PodDirectory::new();
        let reader = directory.clone();

        directory.replace(vec![record("bert", "bert-x1", [10, 0, 0, 6])]);

        assert_eq!(reader.len(), 1);
    }

    #[test]
    fn test_concurrent_readers_see_complete_snapshots() {
        let directory = PodDirectory::new();
        let full: Vec<_> = (0..16)
            .map(|i| record("svc", &format!("svc-{}", i), [10, 0, 1, i as u8]))
            .collect();

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let directory = directory.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        let len = directory.snapshot().len();
                        assert!(len == 0 || len == 16);
                    }
                })
            })
            .collect();

        for _ in 0..200 {
            directory.replace(full.clone());
            directory.replace(Vec::new());
        }

        for reader in readers {
            reader.join().unwrap();
        }
    }
}
