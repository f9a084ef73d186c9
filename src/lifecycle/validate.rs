//! Capability validation against the declared access modes.

use tracing::{debug, instrument};

use crate::backend::{InstanceDirectory, VolumeStore};
use crate::capability::{VolumeCapability, first_unsupported};
use crate::error::VolumeError;

use super::VolumeOrchestrator;

/// Outcome of a capability check. Neither variant is an error.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CapabilityCheck {
    /// Every requested capability is supported.
    Confirmed(Vec<VolumeCapability>),
    /// A requested mode is unsupported.
    Unsupported {
        /// Advisory message naming the first unsupported mode.
        message: String,
    },
}

impl<S, I> VolumeOrchestrator<S, I>
where
    S: VolumeStore,
    I: InstanceDirectory,
{
    /// Checks `capabilities` against the declared access modes for an
    /// existing volume.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeError::VolumeNotFound`] when the volume is absent.
    #[instrument(skip(self, capabilities), fields(zone = %self.zone(), requested = capabilities.len()))]
    pub async fn validate_capabilities(
        &self,
        volume_id: &str,
        capabilities: &[VolumeCapability],
    ) -> Result<CapabilityCheck, VolumeError> {
        self.require_volume("validate volume capabilities", volume_id)
            .await?;
        let check = match first_unsupported(capabilities, &self.supported_modes) {
            Some(mode) => CapabilityCheck::Unsupported {
                message: format!("Driver does not support mode: {mode}"),
            },
            None => CapabilityCheck::Confirmed(capabilities.to_vec()),
        };
        debug!(?check, "capabilities checked");
        Ok(check)
    }
}
