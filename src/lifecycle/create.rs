//! Idempotent volume creation.

use tracing::{info, instrument, warn};

use crate::backend::{CreateVolumes, InstanceDirectory, VolumeStore};
use crate::error::VolumeError;
use crate::size::{CapacityRange, GIB, normalize};
use crate::storage_class::StorageClass;
use crate::volume::Volume;

use super::{VolumeOrchestrator, require_field};

/// Volume returned by a successful create.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CreatedVolume {
    /// Store-assigned identifier.
    pub volume_id: String,
    /// Capacity in GiB as reported by the store.
    pub size_gb: u64,
    /// Capacity in bytes.
    pub capacity_bytes: u64,
}

impl From<&Volume> for CreatedVolume {
    fn from(volume: &Volume) -> Self {
        Self {
            volume_id: volume.id.clone(),
            size_gb: volume.size_gb,
            capacity_bytes: volume.size_gb.saturating_mul(GIB),
        }
    }
}

impl<S, I> VolumeOrchestrator<S, I>
where
    S: VolumeStore,
    I: InstanceDirectory,
{
    /// Creates a volume named `name`, or returns the existing one when a
    /// compatible volume already carries that name.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeError::OutOfRange`] when no legal size fits the range,
    /// [`VolumeError::IncompatibleVolume`] when the name is taken by a volume
    /// of another size or type, and [`VolumeError::CreateUnverified`] when the
    /// new volume cannot be read back.
    #[instrument(skip(self, class), fields(zone = %self.zone(), volume_type = class.volume_type))]
    pub async fn create_volume(
        &self,
        name: &str,
        range: CapacityRange,
        class: &StorageClass,
    ) -> Result<CreatedVolume, VolumeError> {
        require_field("volume name", name)?;
        let size_gb = normalize(&range, class)?;

        let existing = self
            .lookup()
            .find_by_name(name)
            .await
            .map_err(|err| VolumeError::lookup("create volume", err))?;
        if let Some(volume) = existing {
            if !is_compatible(&volume, size_gb, &range, class) {
                warn!(volume_id = %volume.id, existing_gb = volume.size_gb, size_gb, "name taken by incompatible volume");
                return Err(VolumeError::IncompatibleVolume {
                    name: name.to_owned(),
                    volume_id: volume.id,
                });
            }
            info!(volume_id = %volume.id, size_gb = volume.size_gb, "volume already exists");
            return Ok(CreatedVolume::from(&volume));
        }

        let request = CreateVolumes {
            name: name.to_owned(),
            size_gb,
            volume_type: class.volume_type,
            count: 1,
        };
        let ids = self
            .store
            .create_volumes(&request)
            .await
            .map_err(|source| self.store_error("create volume", name, source))?;
        let Some(volume_id) = ids.into_iter().next() else {
            return Err(self.unverified(name, String::from("store returned no volume id")));
        };

        let created = match self.lookup().find_by_id(&volume_id).await {
            Ok(Some(volume)) => volume,
            Ok(None) => {
                return Err(self.unverified(name, format!("read-back of {volume_id} found nothing")));
            }
            Err(err) => {
                return Err(self.unverified(name, format!("read-back of {volume_id} failed: {err}")));
            }
        };
        info!(volume_id = %created.id, size_gb = created.size_gb, "volume created");
        Ok(CreatedVolume::from(&created))
    }

    fn unverified(&self, name: &str, reason: String) -> VolumeError {
        VolumeError::CreateUnverified {
            name: name.to_owned(),
            zone: self.zone().to_owned(),
            reason,
        }
    }
}

fn is_compatible(
    existing: &Volume,
    size_gb: u64,
    range: &CapacityRange,
    class: &StorageClass,
) -> bool {
    existing.size_gb >= size_gb
        && range.admits(existing.size_gb)
        && existing.volume_type == class.volume_type
}
