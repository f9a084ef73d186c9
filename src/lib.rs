//! Core library for the `qingvol` block-storage volume controller.
//!
//! The crate exposes a store abstraction for a QingCloud-style IaaS control
//! plane, an HTTP implementation of it, and a lifecycle orchestrator that
//! drives volume create → attach → detach → delete with idempotency, size
//! normalisation and bounded retry. A controller service layers request
//! validation, per-key serialisation and tracing on top.

pub mod backend;
pub mod capability;
pub mod config;
pub mod controller;
pub mod error;
pub mod lifecycle;
pub mod locks;
pub mod lookup;
pub mod qingcloud;
pub mod size;
pub mod storage_class;
pub mod test_support;
pub mod volume;

pub use backend::{
    CreateVolumes, InstanceDirectory, StoreAction, StoreError, VolumeQuery, VolumeSet,
    VolumeStore,
};
pub use capability::{AccessMode, VolumeCapability};
pub use config::{CloudConfig, ConfigError};
pub use controller::{
    ControllerCapability, ControllerPublishVolumeRequest, ControllerPublishVolumeResponse,
    ControllerService, ControllerUnpublishVolumeRequest, CreateVolumeRequest,
    CreateVolumeResponse, DeleteVolumeRequest, ValidateVolumeCapabilitiesRequest,
    ValidateVolumeCapabilitiesResponse,
};
pub use error::{ErrorCode, Status, VolumeError};
pub use lifecycle::{CapabilityCheck, CreatedVolume, RetryPolicy, VolumeOrchestrator};
pub use lookup::{LookupError, VolumeLookup};
pub use qingcloud::QingCloudStore;
pub use size::{CapacityRange, GIB};
pub use storage_class::StorageClass;
pub use volume::{Attachment, Instance, Volume, VolumeStatus};
