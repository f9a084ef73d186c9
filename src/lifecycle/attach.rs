//! Volume attachment with read-back verification and rollback.

use tracing::{info, instrument, warn};

use crate::backend::{InstanceDirectory, VolumeStore};
use crate::error::VolumeError;
use crate::volume::Attachment;

use super::VolumeOrchestrator;

impl<S, I> VolumeOrchestrator<S, I>
where
    S: VolumeStore,
    I: InstanceDirectory,
{
    /// Attaches a volume to an instance and returns the device path.
    ///
    /// Re-attaching to the instance that already holds the volume returns
    /// the existing device path without a remote attach.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeError::VolumeNotFound`] or
    /// [`VolumeError::InstanceNotFound`] for missing resources,
    /// [`VolumeError::AttachedElsewhere`] when another instance holds the
    /// volume, and [`VolumeError::MissingDevicePath`] or
    /// [`VolumeError::RollbackFailed`] when the attachment is unusable.
    #[instrument(skip(self), fields(zone = %self.zone()))]
    pub async fn attach_volume(
        &self,
        volume_id: &str,
        instance_id: &str,
    ) -> Result<String, VolumeError> {
        let volume = self.require_volume("attach volume", volume_id).await?;
        self.require_instance("attach volume", instance_id).await?;

        if let Some(attachment) = &volume.attachment {
            if attachment.instance_id != instance_id {
                return Err(VolumeError::AttachedElsewhere {
                    volume_id: volume_id.to_owned(),
                    attached_to: attachment.instance_id.clone(),
                    requested: instance_id.to_owned(),
                });
            }
            if let Some(device) = attachment.device_path() {
                info!(device, "volume already attached");
                return Ok(device.to_owned());
            }
            warn!("volume attached without a device path");
            return Err(self.roll_back_attach(volume_id, instance_id).await);
        }

        let ids = [volume_id.to_owned()];
        self.store
            .attach_volumes(&ids, instance_id)
            .await
            .map_err(|source| self.store_error("attach volume", volume_id, source))?;

        let attached = self
            .lookup()
            .find_by_id(volume_id)
            .await
            .map_err(|err| VolumeError::lookup("read back attached volume", err))?;
        let device = attached
            .as_ref()
            .and_then(|found| found.attachment.as_ref())
            .filter(|attachment| attachment.instance_id == instance_id)
            .and_then(Attachment::device_path);
        match device {
            Some(path) => {
                info!(device = path, "volume attached");
                Ok(path.to_owned())
            }
            None => {
                warn!("attach left no usable device path");
                Err(self.roll_back_attach(volume_id, instance_id).await)
            }
        }
    }

    async fn roll_back_attach(&self, volume_id: &str, instance_id: &str) -> VolumeError {
        let ids = [volume_id.to_owned()];
        match self.store.detach_volumes(&ids, instance_id).await {
            Ok(()) => {}
            Err(err) if err.is_business() => {
                warn!(error = %err, "rollback detach rejected by store");
            }
            Err(source) => {
                return VolumeError::RollbackFailed {
                    volume_id: volume_id.to_owned(),
                    instance_id: instance_id.to_owned(),
                    source,
                };
            }
        }
        VolumeError::MissingDevicePath {
            volume_id: volume_id.to_owned(),
            instance_id: instance_id.to_owned(),
        }
    }
}
