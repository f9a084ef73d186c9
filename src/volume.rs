//! Volume and instance model as reported by the block-storage control plane.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Lifecycle status reported by the store for a volume.
///
/// Transitions are driven by the store; the orchestrator only observes them.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum VolumeStatus {
    /// Creation accepted, capacity not yet allocated.
    Pending,
    /// Ready and detached.
    Available,
    /// Attached to an instance.
    InUse,
    /// Suspended for billing reasons.
    Suspended,
    /// Logically deleted; awaiting reclamation.
    Deleted,
    /// Reclaimed.
    Ceased,
}

impl VolumeStatus {
    /// Statuses a volume can hold while it still counts as existing for
    /// name lookups.
    pub const LIVE: [Self; 4] = [Self::Pending, Self::Available, Self::InUse, Self::Suspended];

    /// Returns the wire representation used by the store.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Available => "available",
            Self::InUse => "in-use",
            Self::Suspended => "suspended",
            Self::Deleted => "deleted",
            Self::Ceased => "ceased",
        }
    }
}

impl fmt::Display for VolumeStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Raised when the store reports a status this crate does not know.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("unrecognised volume status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for VolumeStatus {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "available" => Ok(Self::Available),
            "in-use" => Ok(Self::InUse),
            "suspended" => Ok(Self::Suspended),
            "deleted" => Ok(Self::Deleted),
            "ceased" => Ok(Self::Ceased),
            other => Err(UnknownStatus(other.to_owned())),
        }
    }
}

/// Binding between a volume and the instance it is attached to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Attachment {
    /// Instance holding the volume.
    pub instance_id: String,
    /// Block device path on the instance. Empty while the store has not yet
    /// assigned one.
    pub device: String,
}

impl Attachment {
    /// Returns the device path when the store has assigned one.
    #[must_use]
    pub fn device_path(&self) -> Option<&str> {
        let trimmed = self.device.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    }
}

/// A block-storage volume.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Volume {
    /// Store-assigned identifier, stable for the volume's life.
    pub id: String,
    /// Caller-supplied name. Not unique in the store.
    pub name: String,
    /// Capacity in GiB.
    pub size_gb: u64,
    /// Hardware tier selected at creation.
    pub volume_type: i32,
    /// Current lifecycle status.
    pub status: VolumeStatus,
    /// Present only while the volume is attached.
    pub attachment: Option<Attachment>,
}

impl Volume {
    /// Returns the instance the volume is attached to, if any.
    #[must_use]
    pub fn attached_instance(&self) -> Option<&str> {
        self.attachment
            .as_ref()
            .map(|attachment| attachment.instance_id.as_str())
    }

    /// Returns `true` when the volume is attached to `instance_id`.
    #[must_use]
    pub fn is_attached_to(&self, instance_id: &str) -> bool {
        self.attached_instance() == Some(instance_id)
    }
}

/// Compute instance known to the instance directory.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Instance {
    /// Provider identifier.
    pub id: String,
}
