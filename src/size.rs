//! Capacity normalisation between caller byte ranges and store GiB sizes.

use thiserror::Error;

use crate::storage_class::StorageClass;

/// Bytes per GiB, the store's native capacity unit.
pub const GIB: u64 = 1 << 30;

/// Byte range requested by the caller.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CapacityRange {
    /// Minimum acceptable capacity in bytes. Zero means unspecified.
    pub required_bytes: u64,
    /// Maximum acceptable capacity in bytes. `None` means unbounded.
    pub limit_bytes: Option<u64>,
}

impl CapacityRange {
    /// Builds a range, treating a zero limit as unbounded.
    #[must_use]
    pub const fn new(required_bytes: u64, limit_bytes: u64) -> Self {
        Self {
            required_bytes,
            limit_bytes: if limit_bytes == 0 {
                None
            } else {
                Some(limit_bytes)
            },
        }
    }

    /// Returns `true` when `size_gb` expressed in bytes fits under the limit.
    #[must_use]
    pub fn admits(&self, size_gb: u64) -> bool {
        match (gib_to_bytes(size_gb), self.limit_bytes) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(bytes), Some(limit)) => bytes <= limit,
        }
    }
}

/// Raised when no legal size satisfies the request.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error(
    "capacity range [{required_bytes}, {limit}] bytes cannot be satisfied by class range [{min_gb}, {max_gb}] GiB (step {step_gb}, normalised {normalised_gb} GiB)"
)]
pub struct SizeError {
    /// Requested minimum in bytes.
    pub required_bytes: u64,
    /// Requested maximum rendered for display.
    pub limit: String,
    /// Class minimum in GiB.
    pub min_gb: u64,
    /// Class maximum in GiB.
    pub max_gb: u64,
    /// Class step in GiB.
    pub step_gb: u64,
    /// Size the request normalised to before it was rejected.
    pub normalised_gb: u64,
}

/// Converts bytes to GiB, rounding up.
#[must_use]
pub const fn byte_ceil_to_gib(bytes: u64) -> u64 {
    bytes.div_ceil(GIB)
}

/// Converts GiB to bytes, returning `None` on overflow.
#[must_use]
pub const fn gib_to_bytes(size_gb: u64) -> Option<u64> {
    size_gb.checked_mul(GIB)
}

/// Snaps `size_gb` onto the class grid: clamps to the class bounds and
/// otherwise rounds up to the next step.
#[must_use]
pub fn format_size(size_gb: u64, class: &StorageClass) -> u64 {
    if size_gb <= class.min_size_gb {
        return class.min_size_gb;
    }
    if size_gb >= class.max_size_gb {
        return class.max_size_gb;
    }
    size_gb
        .checked_next_multiple_of(class.step_size_gb)
        .unwrap_or(class.max_size_gb)
}

/// Maps a byte range onto a legal size for `class`.
///
/// The rounded size is re-validated against the original byte bounds as well
/// as the class bounds: rounding up may push a request past its limit, and
/// clamping may leave it short of its minimum. Both are rejected.
///
/// # Errors
///
/// Returns [`SizeError`] when the normalised size violates either bound.
pub fn normalize(range: &CapacityRange, class: &StorageClass) -> Result<u64, SizeError> {
    let normalised_gb = format_size(byte_ceil_to_gib(range.required_bytes), class);
    let fits = gib_to_bytes(normalised_gb).is_some_and(|bytes| bytes >= range.required_bytes)
        && range.admits(normalised_gb)
        && (class.min_size_gb..=class.max_size_gb).contains(&normalised_gb);
    if fits {
        return Ok(normalised_gb);
    }
    Err(SizeError {
        required_bytes: range.required_bytes,
        limit: range
            .limit_bytes
            .map_or_else(|| String::from("unbounded"), |limit| limit.to_string()),
        min_gb: class.min_size_gb,
        max_gb: class.max_size_gb,
        step_gb: class.step_size_gb,
        normalised_gb,
    })
}
