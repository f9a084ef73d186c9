//! Volume detachment.

use tracing::{info, instrument, warn};

use crate::backend::{InstanceDirectory, VolumeStore};
use crate::error::VolumeError;

use super::{VolumeOrchestrator, require_field};

impl<S, I> VolumeOrchestrator<S, I>
where
    S: VolumeStore,
    I: InstanceDirectory,
{
    /// Detaches a volume from the instance that holds it.
    ///
    /// Not idempotent: detaching a volume that is not attached to
    /// `instance_id` fails.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeError::VolumeNotFound`] when the volume is absent,
    /// [`VolumeError::NotAttached`] when it is not held by `instance_id`, and
    /// [`VolumeError::Store`] for transport failures.
    #[instrument(skip(self), fields(zone = %self.zone()))]
    pub async fn detach_volume(&self, volume_id: &str, instance_id: &str) -> Result<(), VolumeError> {
        require_field("instance id", instance_id)?;
        let volume = self.require_volume("detach volume", volume_id).await?;
        if !volume.is_attached_to(instance_id) {
            return Err(VolumeError::NotAttached {
                volume_id: volume_id.to_owned(),
                instance_id: instance_id.to_owned(),
                zone: self.zone().to_owned(),
            });
        }

        let ids = [volume_id.to_owned()];
        match self.store.detach_volumes(&ids, instance_id).await {
            Ok(()) => {
                info!("volume detached");
                Ok(())
            }
            Err(err) if err.is_business() => {
                warn!(error = %err, "store rejected detach");
                Ok(())
            }
            Err(source) => Err(self.store_error("detach volume", volume_id, source)),
        }
    }
}
