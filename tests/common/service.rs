//! Shared controller fixture for integration tests.
//!
//! Integration tests are compiled as separate crates (one per top-level file in
//! `tests/`). Placing shared helpers under `tests/common/` avoids creating an
//! additional integration test binary while still allowing reuse via:
//!
//! ```rust
//! #[path = "common/service.rs"]
//! mod service;
//! ```

use qingvol::test_support::FakeStore;
use qingvol::{ControllerService, StorageClass, VolumeOrchestrator};

/// Controller wired to a shared in-memory store.
pub type FakeService = ControllerService<FakeStore, FakeStore>;

/// Storage class used unless a request overrides it.
pub const fn default_class() -> StorageClass {
    StorageClass {
        volume_type: 0,
        min_size_gb: 10,
        max_size_gb: 100,
        step_size_gb: 10,
    }
}

/// Builds a controller over `store` with the default retry policy.
pub fn service(store: &FakeStore) -> FakeService {
    ControllerService::new(
        VolumeOrchestrator::new(store.clone(), store.clone()),
        default_class(),
    )
}
