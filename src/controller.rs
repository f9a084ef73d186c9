//! Controller request handler: validates inbound requests, serialises
//! same-key mutations and drives the lifecycle orchestrator.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;

use tokio::time::Instant;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::backend::{InstanceDirectory, VolumeStore};
use crate::capability::{VolumeCapability, first_unsupported};
use crate::config::{CloudConfig, ConfigError};
use crate::error::{Status, VolumeError};
use crate::lifecycle::{CapabilityCheck, VolumeOrchestrator};
use crate::locks::KeyLocks;
use crate::qingcloud::QingCloudStore;
use crate::size::CapacityRange;
use crate::storage_class::StorageClass;

/// Publish context key carrying the attached device path.
pub const DEVICE_PATH_KEY: &str = "devicePath";

/// Controller RPC groups a service may advertise.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ControllerCapability {
    /// `CreateVolume` and `DeleteVolume`.
    CreateDeleteVolume,
    /// `ControllerPublishVolume` and `ControllerUnpublishVolume`.
    PublishUnpublishVolume,
    /// `ListVolumes`.
    ListVolumes,
    /// `GetCapacity`.
    GetCapacity,
    /// `CreateSnapshot` and `DeleteSnapshot`.
    CreateDeleteSnapshot,
    /// `ListSnapshots`.
    ListSnapshots,
    /// `ControllerExpandVolume`.
    ExpandVolume,
}

impl fmt::Display for ControllerCapability {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::CreateDeleteVolume => "CREATE_DELETE_VOLUME",
            Self::PublishUnpublishVolume => "PUBLISH_UNPUBLISH_VOLUME",
            Self::ListVolumes => "LIST_VOLUMES",
            Self::GetCapacity => "GET_CAPACITY",
            Self::CreateDeleteSnapshot => "CREATE_DELETE_SNAPSHOT",
            Self::ListSnapshots => "LIST_SNAPSHOTS",
            Self::ExpandVolume => "EXPAND_VOLUME",
        })
    }
}

/// Capabilities advertised by default.
pub const ADVERTISED_CAPABILITIES: [ControllerCapability; 2] = [
    ControllerCapability::CreateDeleteVolume,
    ControllerCapability::PublishUnpublishVolume,
];

/// `CreateVolume` request.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CreateVolumeRequest {
    /// Caller-chosen volume name; the idempotency key.
    pub name: String,
    /// Requested byte range; absent means no preference.
    pub capacity_range: Option<CapacityRange>,
    /// Capabilities the volume must support.
    pub volume_capabilities: Vec<VolumeCapability>,
    /// Storage class parameters.
    pub parameters: BTreeMap<String, String>,
}

/// `CreateVolume` response.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CreateVolumeResponse {
    /// Store-assigned identifier.
    pub volume_id: String,
    /// Provisioned capacity.
    pub capacity_bytes: u64,
    /// Request parameters echoed back for later calls.
    pub volume_context: BTreeMap<String, String>,
}

/// `DeleteVolume` request.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DeleteVolumeRequest {
    /// Volume to delete.
    pub volume_id: String,
    /// Give up before a retry wait that would end past this instant.
    pub deadline: Option<Instant>,
}

/// `ControllerPublishVolume` request.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ControllerPublishVolumeRequest {
    /// Volume to attach.
    pub volume_id: String,
    /// Instance to attach to.
    pub node_id: String,
    /// Capability the node will use.
    pub volume_capability: Option<VolumeCapability>,
}

/// `ControllerPublishVolume` response.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ControllerPublishVolumeResponse {
    /// Carries [`DEVICE_PATH_KEY`].
    pub publish_context: BTreeMap<String, String>,
}

/// `ControllerUnpublishVolume` request.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ControllerUnpublishVolumeRequest {
    /// Volume to detach.
    pub volume_id: String,
    /// Instance to detach from.
    pub node_id: String,
}

/// `ValidateVolumeCapabilities` request.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ValidateVolumeCapabilitiesRequest {
    /// Volume to check.
    pub volume_id: String,
    /// Capabilities to check.
    pub volume_capabilities: Vec<VolumeCapability>,
}

/// `ValidateVolumeCapabilities` response. Exactly one field is set.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ValidateVolumeCapabilitiesResponse {
    /// Confirmed capabilities.
    pub confirmed: Option<Vec<VolumeCapability>>,
    /// Advisory message naming an unsupported mode.
    pub message: Option<String>,
}

/// Controller service over a volume store and instance directory.
#[derive(Debug)]
pub struct ControllerService<S, I> {
    orchestrator: VolumeOrchestrator<S, I>,
    storage_class: StorageClass,
    capabilities: Vec<ControllerCapability>,
    locks: KeyLocks,
}

impl ControllerService<QingCloudStore, QingCloudStore> {
    /// Builds a service talking to the QingCloud API.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the configuration is invalid.
    pub fn from_config(config: &CloudConfig) -> Result<Self, ConfigError> {
        let store = QingCloudStore::new(config)?;
        let orchestrator = VolumeOrchestrator::new(store.clone(), store)
            .with_retry_policy(config.retry_policy());
        Ok(Self::new(orchestrator, config.storage_class()?))
    }
}

impl<S, I> ControllerService<S, I>
where
    S: VolumeStore,
    I: InstanceDirectory,
{
    /// Wraps `orchestrator`, using `storage_class` as the defaults that
    /// request parameters override.
    #[must_use]
    pub fn new(orchestrator: VolumeOrchestrator<S, I>, storage_class: StorageClass) -> Self {
        Self {
            orchestrator,
            storage_class,
            capabilities: ADVERTISED_CAPABILITIES.to_vec(),
            locks: KeyLocks::new(),
        }
    }

    /// Replaces the advertised capabilities.
    #[must_use]
    pub fn with_capabilities(
        mut self,
        capabilities: impl IntoIterator<Item = ControllerCapability>,
    ) -> Self {
        self.capabilities = capabilities.into_iter().collect();
        self
    }

    /// Advertised controller capabilities.
    #[must_use]
    pub fn controller_get_capabilities(&self) -> &[ControllerCapability] {
        &self.capabilities
    }

    /// Creates a volume or returns the compatible one already carrying the
    /// requested name.
    ///
    /// # Errors
    ///
    /// Returns a [`Status`] whose code classifies the failure.
    pub async fn create_volume(
        &self,
        request: &CreateVolumeRequest,
    ) -> Result<CreateVolumeResponse, Status> {
        traced("CreateVolume", self.handle_create(request)).await
    }

    /// Deletes a volume. Absent volumes succeed.
    ///
    /// # Errors
    ///
    /// Returns a [`Status`] whose code classifies the failure.
    pub async fn delete_volume(&self, request: &DeleteVolumeRequest) -> Result<(), Status> {
        traced("DeleteVolume", self.handle_delete(request)).await
    }

    /// Attaches a volume to a node and returns the device path in the
    /// publish context.
    ///
    /// # Errors
    ///
    /// Returns a [`Status`] whose code classifies the failure.
    pub async fn controller_publish_volume(
        &self,
        request: &ControllerPublishVolumeRequest,
    ) -> Result<ControllerPublishVolumeResponse, Status> {
        traced("ControllerPublishVolume", self.handle_publish(request)).await
    }

    /// Detaches a volume from a node. The volume and node must both exist.
    ///
    /// # Errors
    ///
    /// Returns a [`Status`] whose code classifies the failure.
    pub async fn controller_unpublish_volume(
        &self,
        request: &ControllerUnpublishVolumeRequest,
    ) -> Result<(), Status> {
        traced("ControllerUnpublishVolume", self.handle_unpublish(request)).await
    }

    /// Checks whether an existing volume supports the requested
    /// capabilities. An unsupported mode is reported in the message, not as
    /// an error.
    ///
    /// # Errors
    ///
    /// Returns a [`Status`] whose code classifies the failure.
    pub async fn validate_volume_capabilities(
        &self,
        request: &ValidateVolumeCapabilitiesRequest,
    ) -> Result<ValidateVolumeCapabilitiesResponse, Status> {
        traced("ValidateVolumeCapabilities", self.handle_validate(request)).await
    }

    /// Not provided.
    ///
    /// # Errors
    ///
    /// Always returns `UNIMPLEMENTED`.
    pub fn controller_expand_volume(&self) -> Result<(), Status> {
        unimplemented_rpc("ControllerExpandVolume")
    }

    /// Not provided.
    ///
    /// # Errors
    ///
    /// Always returns `UNIMPLEMENTED`.
    pub fn list_volumes(&self) -> Result<(), Status> {
        unimplemented_rpc("ListVolumes")
    }

    /// Not provided.
    ///
    /// # Errors
    ///
    /// Always returns `UNIMPLEMENTED`.
    pub fn get_capacity(&self) -> Result<(), Status> {
        unimplemented_rpc("GetCapacity")
    }

    /// Not provided.
    ///
    /// # Errors
    ///
    /// Always returns `UNIMPLEMENTED`.
    pub fn create_snapshot(&self) -> Result<(), Status> {
        unimplemented_rpc("CreateSnapshot")
    }

    /// Not provided.
    ///
    /// # Errors
    ///
    /// Always returns `UNIMPLEMENTED`.
    pub fn delete_snapshot(&self) -> Result<(), Status> {
        unimplemented_rpc("DeleteSnapshot")
    }

    /// Not provided.
    ///
    /// # Errors
    ///
    /// Always returns `UNIMPLEMENTED`.
    pub fn list_snapshots(&self) -> Result<(), Status> {
        unimplemented_rpc("ListSnapshots")
    }

    async fn handle_create(
        &self,
        request: &CreateVolumeRequest,
    ) -> Result<CreateVolumeResponse, VolumeError> {
        self.require_capability(ControllerCapability::CreateDeleteVolume)?;
        require("volume name", &request.name)?;
        self.require_supported(&request.volume_capabilities)?;
        let class = self.storage_class.with_parameters(&request.parameters)?;
        let range = request.capacity_range.unwrap_or_default();

        let _guard = self.locks.acquire(&name_key(&request.name)).await;
        let created = self
            .orchestrator
            .create_volume(&request.name, range, &class)
            .await?;
        Ok(CreateVolumeResponse {
            volume_id: created.volume_id,
            capacity_bytes: created.capacity_bytes,
            volume_context: request.parameters.clone(),
        })
    }

    async fn handle_delete(&self, request: &DeleteVolumeRequest) -> Result<(), VolumeError> {
        self.require_capability(ControllerCapability::CreateDeleteVolume)?;
        require("volume id", &request.volume_id)?;
        let _guard = self.locks.acquire(&id_key(&request.volume_id)).await;
        self.orchestrator
            .delete_volume_until(&request.volume_id, request.deadline)
            .await
    }

    async fn handle_publish(
        &self,
        request: &ControllerPublishVolumeRequest,
    ) -> Result<ControllerPublishVolumeResponse, VolumeError> {
        self.require_capability(ControllerCapability::PublishUnpublishVolume)?;
        require("volume id", &request.volume_id)?;
        require("node id", &request.node_id)?;
        if request.volume_capability.is_none() {
            return Err(VolumeError::invalid_argument("volume capability is required"));
        }

        let _guard = self.locks.acquire(&id_key(&request.volume_id)).await;
        let device = self
            .orchestrator
            .attach_volume(&request.volume_id, &request.node_id)
            .await?;
        Ok(ControllerPublishVolumeResponse {
            publish_context: BTreeMap::from([(DEVICE_PATH_KEY.to_owned(), device)]),
        })
    }

    async fn handle_unpublish(
        &self,
        request: &ControllerUnpublishVolumeRequest,
    ) -> Result<(), VolumeError> {
        self.require_capability(ControllerCapability::PublishUnpublishVolume)?;
        require("volume id", &request.volume_id)?;
        require("node id", &request.node_id)?;

        let _guard = self.locks.acquire(&id_key(&request.volume_id)).await;
        self.orchestrator
            .require_volume("unpublish volume", &request.volume_id)
            .await?;
        self.orchestrator
            .require_instance("unpublish volume", &request.node_id)
            .await?;
        self.orchestrator
            .detach_volume(&request.volume_id, &request.node_id)
            .await
    }

    async fn handle_validate(
        &self,
        request: &ValidateVolumeCapabilitiesRequest,
    ) -> Result<ValidateVolumeCapabilitiesResponse, VolumeError> {
        require("volume id", &request.volume_id)?;
        if request.volume_capabilities.is_empty() {
            return Err(VolumeError::invalid_argument(
                "volume capabilities are required",
            ));
        }
        let check = self
            .orchestrator
            .validate_capabilities(&request.volume_id, &request.volume_capabilities)
            .await?;
        Ok(match check {
            CapabilityCheck::Confirmed(confirmed) => ValidateVolumeCapabilitiesResponse {
                confirmed: Some(confirmed),
                message: None,
            },
            CapabilityCheck::Unsupported { message } => ValidateVolumeCapabilitiesResponse {
                confirmed: None,
                message: Some(message),
            },
        })
    }

    fn require_capability(&self, capability: ControllerCapability) -> Result<(), VolumeError> {
        if self.capabilities.contains(&capability) {
            return Ok(());
        }
        Err(VolumeError::invalid_argument(format!(
            "controller capability {capability} is not advertised"
        )))
    }

    fn require_supported(&self, capabilities: &[VolumeCapability]) -> Result<(), VolumeError> {
        if capabilities.is_empty() {
            return Err(VolumeError::invalid_argument(
                "volume capabilities are required",
            ));
        }
        match first_unsupported(capabilities, self.orchestrator.supported_modes()) {
            Some(mode) => Err(VolumeError::invalid_argument(format!(
                "access mode {mode} is not supported"
            ))),
            None => Ok(()),
        }
    }
}

/// Creates serialise on the requested name, everything else on the volume id.
fn name_key(name: &str) -> String {
    format!("name:{name}")
}

fn id_key(volume_id: &str) -> String {
    format!("id:{volume_id}")
}

fn require(field: &str, value: &str) -> Result<(), VolumeError> {
    if value.trim().is_empty() {
        return Err(VolumeError::invalid_argument(format!("{field} is required")));
    }
    Ok(())
}

fn unimplemented_rpc(rpc: &'static str) -> Result<(), Status> {
    warn!(rpc, "unimplemented RPC called");
    Err(Status::from(VolumeError::Unimplemented { operation: rpc }))
}

async fn traced<T, F>(rpc: &'static str, operation: F) -> Result<T, Status>
where
    F: Future<Output = Result<T, VolumeError>>,
{
    let request_id = Uuid::new_v4();
    let span = info_span!("rpc", rpc, %request_id);
    async move {
        info!("request started");
        match operation.await {
            Ok(value) => {
                info!("request succeeded");
                Ok(value)
            }
            Err(err) => {
                warn!(code = %err.code(), error = %err, "request failed");
                Err(Status::from(err))
            }
        }
    }
    .instrument(span)
    .await
}
