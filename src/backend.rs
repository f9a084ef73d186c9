//! Remote store abstraction for the block-storage control plane.
//!
//! Every call either completes with a typed reply or fails on one of two
//! independent layers: the transport (the call did not complete) or the
//! business layer (the call completed but the embedded return code is
//! non-zero). Callers decide per operation which layer is fatal.

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::volume::{Instance, Volume, VolumeStatus};

/// Substring the store embeds in transport failures that are safe to retry.
pub const RETRY_MARKER: &str = "try later";

/// Remote call being issued, used to label failures.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum StoreAction {
    /// `DescribeVolumes`.
    DescribeVolumes,
    /// `CreateVolumes`.
    CreateVolumes,
    /// `DeleteVolumes`.
    DeleteVolumes,
    /// `AttachVolumes`.
    AttachVolumes,
    /// `DetachVolumes`.
    DetachVolumes,
    /// `DescribeInstances`.
    DescribeInstances,
}

impl StoreAction {
    /// Returns the remote action name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DescribeVolumes => "DescribeVolumes",
            Self::CreateVolumes => "CreateVolumes",
            Self::DeleteVolumes => "DeleteVolumes",
            Self::AttachVolumes => "AttachVolumes",
            Self::DetachVolumes => "DetachVolumes",
            Self::DescribeInstances => "DescribeInstances",
        }
    }
}

impl std::fmt::Display for StoreAction {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Failure of a single remote call.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum StoreError {
    /// The call could not complete or its reply could not be decoded.
    #[error("call {action} failed: {message}")]
    Transport {
        /// Remote action that failed.
        action: StoreAction,
        /// Message from the transport or decoder.
        message: String,
    },
    /// The call completed with a non-zero return code.
    #[error("call {action} returned {ret_code}: {message}")]
    Business {
        /// Remote action that failed.
        action: StoreAction,
        /// Return code embedded in the reply.
        ret_code: i32,
        /// Message embedded in the reply.
        message: String,
    },
}

impl StoreError {
    /// Builds a transport failure.
    pub fn transport(action: StoreAction, message: impl Into<String>) -> Self {
        Self::Transport {
            action,
            message: message.into(),
        }
    }

    /// Builds a business failure.
    pub fn business(action: StoreAction, ret_code: i32, message: impl Into<String>) -> Self {
        Self::Business {
            action,
            ret_code,
            message: message.into(),
        }
    }

    /// Returns `true` for transport failures the store marked as transient.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { message, .. } => {
                message.to_ascii_lowercase().contains(RETRY_MARKER)
            }
            Self::Business { .. } => false,
        }
    }

    /// Returns `true` when the failure came from the business layer.
    #[must_use]
    pub const fn is_business(&self) -> bool {
        matches!(self, Self::Business { .. })
    }
}

/// Filter for a `DescribeVolumes` call.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum VolumeQuery {
    /// Exact identifier match.
    ById(String),
    /// Exact name match restricted to the given statuses (all statuses when
    /// empty).
    ByName {
        /// Volume name.
        name: String,
        /// Statuses to include.
        statuses: Vec<VolumeStatus>,
    },
}

/// Reply to a `DescribeVolumes` call.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct VolumeSet {
    /// Number of matches reported by the store.
    pub total_count: usize,
    /// Matching volumes.
    pub volumes: Vec<Volume>,
}

/// Arguments for a `CreateVolumes` call.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CreateVolumes {
    /// Name given to every created volume.
    pub name: String,
    /// Capacity in GiB.
    pub size_gb: u64,
    /// Hardware tier.
    pub volume_type: i32,
    /// Number of volumes to create.
    pub count: u32,
}

/// Future returned by store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Volume operations offered by the remote store. One call per method.
pub trait VolumeStore: Send + Sync {
    /// Zone the store operates in.
    fn zone(&self) -> &str;

    /// Describes volumes matching `query`.
    fn describe_volumes<'a>(&'a self, query: &'a VolumeQuery) -> StoreFuture<'a, VolumeSet>;

    /// Creates volumes and returns the identifiers assigned by the store.
    fn create_volumes<'a>(&'a self, request: &'a CreateVolumes) -> StoreFuture<'a, Vec<String>>;

    /// Deletes the given volumes.
    fn delete_volumes<'a>(&'a self, volume_ids: &'a [String]) -> StoreFuture<'a, ()>;

    /// Attaches the given volumes to `instance_id`.
    fn attach_volumes<'a>(
        &'a self,
        volume_ids: &'a [String],
        instance_id: &'a str,
    ) -> StoreFuture<'a, ()>;

    /// Detaches the given volumes from `instance_id`.
    fn detach_volumes<'a>(
        &'a self,
        volume_ids: &'a [String],
        instance_id: &'a str,
    ) -> StoreFuture<'a, ()>;
}

/// Instance discovery offered by the compute side of the control plane.
pub trait InstanceDirectory: Send + Sync {
    /// Returns the instance when it exists.
    fn find_instance<'a>(&'a self, instance_id: &'a str) -> StoreFuture<'a, Option<Instance>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("volume busy, please try later", true)]
    #[case("Resource Locked, Try Later", true)]
    #[case("connection refused", false)]
    fn transport_retry_marker_is_case_insensitive(#[case] message: &str, #[case] expected: bool) {
        let err = StoreError::transport(StoreAction::DeleteVolumes, message);
        assert_eq!(err.is_retryable(), expected);
    }

    #[test]
    fn business_failures_are_never_retryable() {
        let err = StoreError::business(StoreAction::DeleteVolumes, 5100, "please try later");
        assert!(!err.is_retryable());
        assert!(err.is_business());
    }

    #[test]
    fn business_failure_display_names_layer_details() {
        let err = StoreError::business(StoreAction::AttachVolumes, 2100, "instance busy");
        assert_eq!(
            err.to_string(),
            "call AttachVolumes returned 2100: instance busy"
        );
    }
}
