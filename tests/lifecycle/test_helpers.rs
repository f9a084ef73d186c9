//! Shared fixtures for lifecycle BDD scenarios.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use qingvol::Status;
use qingvol::test_support::FakeStore;
use rstest::fixture;
use tokio::runtime::{Builder, Runtime};

use crate::service::{FakeService, service};

/// Instances every scenario starts with.
pub const KNOWN_INSTANCES: [&str; 2] = ["i-node1", "i-node2"];

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Outcome {
    Created { volume_id: String, capacity_bytes: u64 },
    Deleted,
    Published { device: Option<String> },
    Failed(Status),
}

#[derive(Clone, Debug)]
pub struct LifecycleContext {
    pub store: FakeStore,
    outcomes: Arc<Mutex<Vec<Outcome>>>,
}

impl LifecycleContext {
    pub fn service(&self) -> FakeService {
        service(&self.store)
    }

    pub fn record(&self, outcome: Outcome) {
        self.outcomes().push(outcome);
    }

    pub fn last_outcome(&self) -> Option<Outcome> {
        self.outcomes().last().cloned()
    }

    pub fn all_outcomes(&self) -> Vec<Outcome> {
        self.outcomes().clone()
    }

    fn outcomes(&self) -> MutexGuard<'_, Vec<Outcome>> {
        self.outcomes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[fixture]
pub fn lifecycle_context() -> LifecycleContext {
    let store = FakeStore::new();
    for instance in KNOWN_INSTANCES {
        store.insert_instance(instance);
    }
    LifecycleContext {
        store,
        outcomes: Arc::new(Mutex::new(Vec::new())),
    }
}

/// Runtime with paused time so retry waits complete instantly.
pub fn paused_runtime() -> std::io::Result<Runtime> {
    Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
}
