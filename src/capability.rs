//! Volume access modes and capability descriptors.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// How a volume may be shared between nodes.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum AccessMode {
    /// Read-write on a single node.
    SingleNodeWriter,
    /// Read-only on a single node.
    SingleNodeReaderOnly,
    /// Read-only on many nodes.
    MultiNodeReaderOnly,
    /// Read-only on many nodes with one writer.
    MultiNodeSingleWriter,
    /// Read-write on many nodes.
    MultiNodeMultiWriter,
}

impl AccessMode {
    /// Every mode, in wire order.
    pub const ALL: [Self; 5] = [
        Self::SingleNodeWriter,
        Self::SingleNodeReaderOnly,
        Self::MultiNodeReaderOnly,
        Self::MultiNodeSingleWriter,
        Self::MultiNodeMultiWriter,
    ];

    /// Returns the upper-case wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SingleNodeWriter => "SINGLE_NODE_WRITER",
            Self::SingleNodeReaderOnly => "SINGLE_NODE_READER_ONLY",
            Self::MultiNodeReaderOnly => "MULTI_NODE_READER_ONLY",
            Self::MultiNodeSingleWriter => "MULTI_NODE_SINGLE_WRITER",
            Self::MultiNodeMultiWriter => "MULTI_NODE_MULTI_WRITER",
        }
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Raised when parsing an unknown access mode name.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("unknown access mode '{0}'")]
pub struct UnknownAccessMode(pub String);

impl FromStr for AccessMode {
    type Err = UnknownAccessMode;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalised = value.trim().to_ascii_uppercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == normalised)
            .ok_or_else(|| UnknownAccessMode(value.to_owned()))
    }
}

/// A single requested capability. Only the access mode is inspected.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct VolumeCapability {
    /// Requested access mode.
    pub access_mode: AccessMode,
}

impl VolumeCapability {
    /// Builds a capability for `access_mode`.
    #[must_use]
    pub const fn new(access_mode: AccessMode) -> Self {
        Self { access_mode }
    }
}

impl From<AccessMode> for VolumeCapability {
    fn from(access_mode: AccessMode) -> Self {
        Self::new(access_mode)
    }
}

/// Access modes a block volume can honour by default.
pub const DEFAULT_SUPPORTED_MODES: [AccessMode; 1] = [AccessMode::SingleNodeWriter];

/// Returns the first capability whose mode is not in `supported`.
#[must_use]
pub fn first_unsupported(
    capabilities: &[VolumeCapability],
    supported: &[AccessMode],
) -> Option<AccessMode> {
    capabilities
        .iter()
        .map(|capability| capability.access_mode)
        .find(|mode| !supported.contains(mode))
}
