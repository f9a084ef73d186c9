//! Volume lifecycle orchestration: create, delete, attach, detach and
//! capability validation on top of an injected [`VolumeStore`] and
//! [`InstanceDirectory`].
//!
//! The orchestrator holds no mutable state. Check-then-act sequences are not
//! atomic with respect to the store; callers that need same-key exclusion
//! serialise requests themselves.

mod attach;
mod create;
mod delete;
mod detach;
mod retry;
mod validate;

pub use create::CreatedVolume;
pub use retry::{Backoff, RetryPolicy};
pub use validate::CapabilityCheck;

use crate::backend::{InstanceDirectory, StoreError, VolumeStore};
use crate::capability::{AccessMode, DEFAULT_SUPPORTED_MODES};
use crate::error::VolumeError;
use crate::lookup::VolumeLookup;
use crate::volume::{Instance, Volume};

/// Drives volume lifecycle operations against the remote store.
#[derive(Clone, Debug)]
pub struct VolumeOrchestrator<S, I> {
    store: S,
    instances: I,
    retry: RetryPolicy,
    supported_modes: Vec<AccessMode>,
}

impl<S, I> VolumeOrchestrator<S, I>
where
    S: VolumeStore,
    I: InstanceDirectory,
{
    /// Builds an orchestrator with the default retry policy and
    /// single-node-writer access only.
    #[must_use]
    pub fn new(store: S, instances: I) -> Self {
        Self {
            store,
            instances,
            retry: RetryPolicy::default(),
            supported_modes: DEFAULT_SUPPORTED_MODES.to_vec(),
        }
    }

    /// Replaces the delete retry policy.
    #[must_use]
    pub const fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replaces the declared access modes.
    #[must_use]
    pub fn with_supported_modes(mut self, modes: impl IntoIterator<Item = AccessMode>) -> Self {
        self.supported_modes = modes.into_iter().collect();
        self
    }

    /// Zone of the underlying store.
    #[must_use]
    pub fn zone(&self) -> &str {
        self.store.zone()
    }

    /// Access modes this orchestrator accepts.
    #[must_use]
    pub fn supported_modes(&self) -> &[AccessMode] {
        &self.supported_modes
    }

    /// Delete retry policy in force.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Returns the volume or [`VolumeError::VolumeNotFound`].
    ///
    /// # Errors
    ///
    /// Fails when the volume is absent, duplicated or the lookup call fails.
    pub async fn require_volume(
        &self,
        operation: &'static str,
        volume_id: &str,
    ) -> Result<Volume, VolumeError> {
        require_field("volume id", volume_id)?;
        self.lookup()
            .find_by_id(volume_id)
            .await
            .map_err(|err| VolumeError::lookup(operation, err))?
            .ok_or_else(|| VolumeError::VolumeNotFound {
                volume_id: volume_id.to_owned(),
                zone: self.zone().to_owned(),
            })
    }

    /// Returns the instance or [`VolumeError::InstanceNotFound`].
    ///
    /// # Errors
    ///
    /// Fails when the instance is absent or the describe call fails.
    pub async fn require_instance(
        &self,
        operation: &'static str,
        instance_id: &str,
    ) -> Result<Instance, VolumeError> {
        require_field("instance id", instance_id)?;
        self.instances
            .find_instance(instance_id)
            .await
            .map_err(|source| self.store_error(operation, instance_id, source))?
            .ok_or_else(|| VolumeError::InstanceNotFound {
                instance_id: instance_id.to_owned(),
                zone: self.zone().to_owned(),
            })
    }

    fn lookup(&self) -> VolumeLookup<'_, S> {
        VolumeLookup::new(&self.store)
    }

    fn store_error(&self, operation: &'static str, target: &str, source: StoreError) -> VolumeError {
        VolumeError::Store {
            operation,
            target: target.to_owned(),
            zone: self.zone().to_owned(),
            source,
        }
    }
}

fn require_field(field: &str, value: &str) -> Result<(), VolumeError> {
    if value.trim().is_empty() {
        return Err(VolumeError::invalid_argument(format!("{field} is required")));
    }
    Ok(())
}

#[cfg(test)]
mod tests;
