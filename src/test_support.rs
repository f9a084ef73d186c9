//! Test support utilities shared across unit and integration tests.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::env;
use std::ffi::OsString;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};
use tokio::time::Instant;

use crate::backend::{
    CreateVolumes, InstanceDirectory, StoreAction, StoreError, StoreFuture, VolumeQuery,
    VolumeSet, VolumeStore,
};
use crate::volume::{Attachment, Instance, Volume, VolumeStatus};

/// Zone reported by [`FakeStore`].
pub const FAKE_ZONE: &str = "test-zone";

/// Device path [`FakeStore`] assigns on attach unless told otherwise.
pub const FAKE_DEVICE: &str = "/dev/vdc";

/// Builds an available, detached volume of type 0.
#[must_use]
pub fn volume(id: &str, name: &str, size_gb: u64) -> Volume {
    Volume {
        id: id.to_owned(),
        name: name.to_owned(),
        size_gb,
        volume_type: 0,
        status: VolumeStatus::Available,
        attachment: None,
    }
}

/// Builds an in-use volume attached to `instance_id` at `device`.
#[must_use]
pub fn attached_volume(id: &str, instance_id: &str, device: &str) -> Volume {
    Volume {
        status: VolumeStatus::InUse,
        attachment: Some(Attachment {
            instance_id: instance_id.to_owned(),
            device: device.to_owned(),
        }),
        ..volume(id, id, 10)
    }
}

/// In-memory store and instance directory with call counters and scripted
/// failures.
///
/// Clones share state, so a test can hand one clone to the orchestrator and
/// inspect another.
#[derive(Clone, Debug, Default)]
pub struct FakeStore {
    state: Arc<Mutex<FakeState>>,
}

#[derive(Debug)]
struct FakeState {
    volumes: BTreeMap<String, Volume>,
    instances: BTreeSet<String>,
    next_id: u32,
    calls: HashMap<StoreAction, u32>,
    queued_failures: HashMap<StoreAction, VecDeque<StoreError>>,
    sticky_failures: HashMap<StoreAction, StoreError>,
    attach_device: String,
    hide_created: bool,
    delete_attempts: Vec<Instant>,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            volumes: BTreeMap::new(),
            instances: BTreeSet::new(),
            next_id: 0,
            calls: HashMap::new(),
            queued_failures: HashMap::new(),
            sticky_failures: HashMap::new(),
            attach_device: String::from(FAKE_DEVICE),
            hide_created: false,
            delete_attempts: Vec::new(),
        }
    }
}

impl FakeState {
    fn record(&mut self, action: StoreAction) -> Result<(), StoreError> {
        *self.calls.entry(action).or_default() += 1;
        if let Some(err) = self
            .queued_failures
            .get_mut(&action)
            .and_then(VecDeque::pop_front)
        {
            return Err(err);
        }
        match self.sticky_failures.get(&action) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

impl FakeStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seeds a volume, replacing any with the same id.
    pub fn insert_volume(&self, volume: Volume) {
        self.lock().volumes.insert(volume.id.clone(), volume);
    }

    /// Registers an instance with the directory.
    pub fn insert_instance(&self, instance_id: &str) {
        self.lock().instances.insert(instance_id.to_owned());
    }

    /// Returns the current state of a volume.
    #[must_use]
    pub fn volume(&self, volume_id: &str) -> Option<Volume> {
        self.lock().volumes.get(volume_id).cloned()
    }

    /// Returns how many times `action` was called.
    #[must_use]
    pub fn calls(&self, action: StoreAction) -> u32 {
        self.lock().calls.get(&action).copied().unwrap_or_default()
    }

    /// Fails the next call to `action` with `err`.
    pub fn push_failure(&self, action: StoreAction, err: StoreError) {
        self.lock()
            .queued_failures
            .entry(action)
            .or_default()
            .push_back(err);
    }

    /// Fails every call to `action` with `err` once queued failures drain.
    pub fn fail_always(&self, action: StoreAction, err: StoreError) {
        self.lock().sticky_failures.insert(action, err);
    }

    /// Sets the device path assigned by subsequent attaches. An empty string
    /// simulates an attach that never receives a device.
    pub fn set_attach_device(&self, device: &str) {
        device.clone_into(&mut self.lock().attach_device);
    }

    /// Makes created volumes invisible to describe calls, simulating
    /// read-after-write lag.
    pub fn hide_created_volumes(&self) {
        self.lock().hide_created = true;
    }

    /// Returns the instants at which delete calls were received.
    #[must_use]
    pub fn delete_attempts(&self) -> Vec<Instant> {
        self.lock().delete_attempts.clone()
    }
}

impl VolumeStore for FakeStore {
    fn zone(&self) -> &str {
        FAKE_ZONE
    }

    fn describe_volumes<'a>(&'a self, query: &'a VolumeQuery) -> StoreFuture<'a, VolumeSet> {
        Box::pin(async move {
            let mut state = self.lock();
            state.record(StoreAction::DescribeVolumes)?;
            let volumes: Vec<Volume> = state
                .volumes
                .values()
                .filter(|volume| match query {
                    VolumeQuery::ById(id) => &volume.id == id,
                    VolumeQuery::ByName { name, statuses } => {
                        &volume.name == name
                            && (statuses.is_empty() || statuses.contains(&volume.status))
                    }
                })
                .cloned()
                .collect();
            Ok(VolumeSet {
                total_count: volumes.len(),
                volumes,
            })
        })
    }

    fn create_volumes<'a>(&'a self, request: &'a CreateVolumes) -> StoreFuture<'a, Vec<String>> {
        Box::pin(async move {
            let mut state = self.lock();
            state.record(StoreAction::CreateVolumes)?;
            let mut ids = Vec::new();
            for _ in 0..request.count {
                state.next_id += 1;
                let id = format!("vol-{:08x}", state.next_id);
                if !state.hide_created {
                    state.volumes.insert(
                        id.clone(),
                        Volume {
                            id: id.clone(),
                            name: request.name.clone(),
                            size_gb: request.size_gb,
                            volume_type: request.volume_type,
                            status: VolumeStatus::Available,
                            attachment: None,
                        },
                    );
                }
                ids.push(id);
            }
            Ok(ids)
        })
    }

    fn delete_volumes<'a>(&'a self, volume_ids: &'a [String]) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.lock();
            state.delete_attempts.push(Instant::now());
            state.record(StoreAction::DeleteVolumes)?;
            for id in volume_ids {
                state.volumes.remove(id);
            }
            Ok(())
        })
    }

    fn attach_volumes<'a>(
        &'a self,
        volume_ids: &'a [String],
        instance_id: &'a str,
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.lock();
            state.record(StoreAction::AttachVolumes)?;
            let device = state.attach_device.clone();
            for id in volume_ids {
                if let Some(volume) = state.volumes.get_mut(id) {
                    volume.status = VolumeStatus::InUse;
                    volume.attachment = Some(Attachment {
                        instance_id: instance_id.to_owned(),
                        device: device.clone(),
                    });
                }
            }
            Ok(())
        })
    }

    fn detach_volumes<'a>(
        &'a self,
        volume_ids: &'a [String],
        _instance_id: &'a str,
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.lock();
            state.record(StoreAction::DetachVolumes)?;
            for id in volume_ids {
                if let Some(volume) = state.volumes.get_mut(id) {
                    volume.status = VolumeStatus::Available;
                    volume.attachment = None;
                }
            }
            Ok(())
        })
    }
}

impl InstanceDirectory for FakeStore {
    fn find_instance<'a>(&'a self, instance_id: &'a str) -> StoreFuture<'a, Option<Instance>> {
        Box::pin(async move {
            let mut state = self.lock();
            state.record(StoreAction::DescribeInstances)?;
            Ok(state.instances.contains(instance_id).then(|| Instance {
                id: instance_id.to_owned(),
            }))
        })
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: AsyncMutex<()> = AsyncMutex::const_new(());

/// Guard that holds the env mutex and restores variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: AsyncMutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets multiple environment variables while holding a global mutex.
    pub async fn set_vars(pairs: &[(&str, &str)]) -> Self {
        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::set_var(key, value) };
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in self.previous.iter().rev() {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
