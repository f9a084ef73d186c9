//! Error kinds surfaced by lifecycle operations and their outbound codes.

use std::fmt;

use thiserror::Error;

use crate::backend::StoreError;
use crate::lookup::LookupError;
use crate::size::SizeError;
use crate::storage_class::StorageClassError;

/// Outbound status code understood by the orchestrator.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ErrorCode {
    /// Malformed or missing request fields. Never retried.
    InvalidArgument,
    /// Capacity outside policy bounds.
    OutOfRange,
    /// Referenced volume or instance does not exist.
    NotFound,
    /// Name collision or unverifiable create.
    AlreadyExists,
    /// Required state not met.
    FailedPrecondition,
    /// Remote store anomaly.
    Internal,
    /// Operation intentionally not provided.
    Unimplemented,
}

impl ErrorCode {
    /// Returns the canonical upper-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::OutOfRange => "OUT_OF_RANGE",
            Self::NotFound => "NOT_FOUND",
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::FailedPrecondition => "FAILED_PRECONDITION",
            Self::Internal => "INTERNAL",
            Self::Unimplemented => "UNIMPLEMENTED",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Errors raised by lifecycle operations.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum VolumeError {
    /// Raised when a request is missing a required field or is malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Raised when storage class parameters are unusable.
    #[error("invalid storage class: {0}")]
    StorageClass(#[from] StorageClassError),
    /// Raised when the requested capacity cannot be satisfied.
    #[error("unsupported capacity range: {0}")]
    OutOfRange(#[from] SizeError),
    /// Raised when the volume does not exist.
    #[error("volume {volume_id} not found in zone {zone}")]
    VolumeNotFound {
        /// Volume identifier.
        volume_id: String,
        /// Zone searched.
        zone: String,
    },
    /// Raised when the instance does not exist.
    #[error("instance {instance_id} not found in zone {zone}")]
    InstanceNotFound {
        /// Instance identifier.
        instance_id: String,
        /// Zone searched.
        zone: String,
    },
    /// Raised when a volume with the requested name exists with another
    /// size or type.
    #[error("volume {name} already exists as {volume_id} but is incompatible")]
    IncompatibleVolume {
        /// Requested name.
        name: String,
        /// Identifier of the existing volume.
        volume_id: String,
    },
    /// Raised when a create call succeeded but the new volume could not be
    /// read back. Reported as `AlreadyExists` for compatibility even though
    /// the cause may be read-after-write lag.
    #[error("volume {name} could not be verified after creation in zone {zone}: {reason}")]
    CreateUnverified {
        /// Requested name.
        name: String,
        /// Zone of the create call.
        zone: String,
        /// What went wrong during verification.
        reason: String,
    },
    /// Raised when deleting a volume that is still attached.
    #[error("volume {volume_id} is in use by instance {instance_id}")]
    VolumeInUse {
        /// Volume identifier.
        volume_id: String,
        /// Instance holding the volume, empty when the store did not say.
        instance_id: String,
    },
    /// Raised when attaching a volume that is held by another instance.
    #[error("volume {volume_id} is attached to instance {attached_to}, not {requested}")]
    AttachedElsewhere {
        /// Volume identifier.
        volume_id: String,
        /// Instance currently holding the volume.
        attached_to: String,
        /// Instance the caller asked for.
        requested: String,
    },
    /// Raised when detaching a volume that is not attached to the instance.
    #[error("volume {volume_id} is not attached to instance {instance_id} in zone {zone}")]
    NotAttached {
        /// Volume identifier.
        volume_id: String,
        /// Instance the caller asked for.
        instance_id: String,
        /// Zone searched.
        zone: String,
    },
    /// Raised when an attach left no usable device path and was rolled back.
    #[error("cannot find device path, please re-attach volume {volume_id} to instance {instance_id}")]
    MissingDevicePath {
        /// Volume identifier.
        volume_id: String,
        /// Instance identifier.
        instance_id: String,
    },
    /// Raised when rolling back an unusable attachment failed.
    #[error("failed to detach volume {volume_id} from instance {instance_id} after an unusable attach: {source}")]
    RollbackFailed {
        /// Volume identifier.
        volume_id: String,
        /// Instance identifier.
        instance_id: String,
        /// Failure of the compensating detach.
        #[source]
        source: StoreError,
    },
    /// Raised when every retryable delete attempt failed.
    #[error("exceeded {attempts} attempts deleting volume {volume_id}: {last}")]
    RetriesExhausted {
        /// Volume identifier.
        volume_id: String,
        /// Attempts made.
        attempts: u32,
        /// Failure of the final attempt.
        #[source]
        last: StoreError,
    },
    /// Raised when the caller's deadline expires before the next retry.
    #[error("deadline expired after {attempts} attempts deleting volume {volume_id}: {last}")]
    DeadlineExceeded {
        /// Volume identifier.
        volume_id: String,
        /// Attempts made.
        attempts: u32,
        /// Failure of the final attempt.
        #[source]
        last: StoreError,
    },
    /// Raised when a lookup or mutation against the store fails.
    #[error("{operation} failed for {target} in zone {zone}: {source}")]
    Store {
        /// Lifecycle step that issued the call.
        operation: &'static str,
        /// Volume id, name, or instance id the call concerned.
        target: String,
        /// Zone of the call.
        zone: String,
        /// Underlying failure.
        #[source]
        source: StoreError,
    },
    /// Raised when a lookup matched more than one volume.
    #[error("{operation}: {source}")]
    Lookup {
        /// Lifecycle step that issued the lookup.
        operation: &'static str,
        /// Underlying lookup failure.
        #[source]
        source: LookupError,
    },
    /// Raised for operations this controller does not provide.
    #[error("{operation} is not implemented")]
    Unimplemented {
        /// Operation name.
        operation: &'static str,
    },
}

impl VolumeError {
    /// Returns the outbound status code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidArgument(_) | Self::StorageClass(_) => ErrorCode::InvalidArgument,
            Self::OutOfRange(_) => ErrorCode::OutOfRange,
            Self::VolumeNotFound { .. } | Self::InstanceNotFound { .. } => ErrorCode::NotFound,
            Self::IncompatibleVolume { .. } | Self::CreateUnverified { .. } => {
                ErrorCode::AlreadyExists
            }
            Self::VolumeInUse { .. } | Self::AttachedElsewhere { .. } | Self::NotAttached { .. } => {
                ErrorCode::FailedPrecondition
            }
            Self::MissingDevicePath { .. }
            | Self::RollbackFailed { .. }
            | Self::RetriesExhausted { .. }
            | Self::DeadlineExceeded { .. }
            | Self::Store { .. }
            | Self::Lookup { .. } => ErrorCode::Internal,
            Self::Unimplemented { .. } => ErrorCode::Unimplemented,
        }
    }

    /// Builds an [`VolumeError::InvalidArgument`].
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub(crate) fn lookup(operation: &'static str, source: LookupError) -> Self {
        match source {
            LookupError::Store { key, zone, source } => Self::Store {
                operation,
                target: key,
                zone,
                source,
            },
            duplicate @ LookupError::Duplicate { .. } => Self::Lookup {
                operation,
                source: duplicate,
            },
        }
    }
}

/// Outbound status pair handed back to the orchestrator channel.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Status {
    /// Status code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

impl From<&VolumeError> for Status {
    fn from(value: &VolumeError) -> Self {
        Self {
            code: value.code(),
            message: value.to_string(),
        }
    }
}

impl From<VolumeError> for Status {
    fn from(value: VolumeError) -> Self {
        Self::from(&value)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}: {}", self.code, self.message)
    }
}
