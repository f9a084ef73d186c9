//! Unit tests for the volume lifecycle orchestrator.

mod validate;

use rstest::fixture;

use super::VolumeOrchestrator;
use crate::storage_class::StorageClass;
use crate::test_support::FakeStore;

type FakeOrchestrator = VolumeOrchestrator<FakeStore, FakeStore>;

#[fixture]
fn store() -> FakeStore {
    let store = FakeStore::new();
    store.insert_instance("i-node1");
    store.insert_instance("i-node2");
    store
}

fn orchestrator(store: &FakeStore) -> FakeOrchestrator {
    VolumeOrchestrator::new(store.clone(), store.clone())
}

#[fixture]
fn class() -> StorageClass {
    StorageClass {
        volume_type: 0,
        min_size_gb: 10,
        max_size_gb: 100,
        step_size_gb: 10,
    }
}
