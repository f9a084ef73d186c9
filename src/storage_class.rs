//! Storage class: the volume tier and size grid applied to a create request.

use std::collections::BTreeMap;

use thiserror::Error;

/// Request parameter overriding the volume type.
pub const PARAM_TYPE: &str = "type";
/// Request parameter overriding the minimum size in GiB.
pub const PARAM_MIN_SIZE: &str = "minSize";
/// Request parameter overriding the maximum size in GiB.
pub const PARAM_MAX_SIZE: &str = "maxSize";
/// Request parameter overriding the size step in GiB.
pub const PARAM_STEP_SIZE: &str = "stepSize";

/// Volume types offered by the control plane.
pub const KNOWN_VOLUME_TYPES: [i32; 7] = [0, 2, 3, 5, 6, 100, 200];

/// Size grid and tier for new volumes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StorageClass {
    /// Hardware tier.
    pub volume_type: i32,
    /// Smallest size in GiB.
    pub min_size_gb: u64,
    /// Largest size in GiB.
    pub max_size_gb: u64,
    /// Sizes between the bounds are multiples of this step.
    pub step_size_gb: u64,
}

/// Raised when a storage class cannot be built or is inconsistent.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum StorageClassError {
    /// A parameter value is not a decimal integer.
    #[error("parameter {key}='{value}' is not a valid integer")]
    NotANumber {
        /// Parameter name.
        key: String,
        /// Offending value.
        value: String,
    },
    /// The volume type is not offered by the control plane.
    #[error("unsupported volume type {0}")]
    UnknownVolumeType(i32),
    /// The step is zero.
    #[error("volume step size must be greater than zero")]
    ZeroStep,
    /// The bounds are empty or inverted.
    #[error("volume size range [{min}, {max}] GiB is invalid")]
    InvalidRange {
        /// Minimum size in GiB.
        min: u64,
        /// Maximum size in GiB.
        max: u64,
    },
}

impl StorageClass {
    /// Applies request parameters on top of `self`, then validates the
    /// result. Unknown keys are ignored; they travel on as volume context.
    ///
    /// # Errors
    ///
    /// Returns [`StorageClassError`] when a known key is malformed or the
    /// merged class is inconsistent.
    pub fn with_parameters(
        &self,
        parameters: &BTreeMap<String, String>,
    ) -> Result<Self, StorageClassError> {
        let class = Self {
            volume_type: parse_param(parameters, PARAM_TYPE)?.unwrap_or(self.volume_type),
            min_size_gb: parse_param(parameters, PARAM_MIN_SIZE)?.unwrap_or(self.min_size_gb),
            max_size_gb: parse_param(parameters, PARAM_MAX_SIZE)?.unwrap_or(self.max_size_gb),
            step_size_gb: parse_param(parameters, PARAM_STEP_SIZE)?.unwrap_or(self.step_size_gb),
        };
        class.validate()?;
        Ok(class)
    }

    /// Checks the class invariants.
    ///
    /// # Errors
    ///
    /// Returns [`StorageClassError`] describing the first violated rule.
    pub fn validate(&self) -> Result<(), StorageClassError> {
        if !KNOWN_VOLUME_TYPES.contains(&self.volume_type) {
            return Err(StorageClassError::UnknownVolumeType(self.volume_type));
        }
        if self.step_size_gb == 0 {
            return Err(StorageClassError::ZeroStep);
        }
        if self.min_size_gb == 0 || self.min_size_gb > self.max_size_gb {
            return Err(StorageClassError::InvalidRange {
                min: self.min_size_gb,
                max: self.max_size_gb,
            });
        }
        Ok(())
    }
}

fn parse_param<T: std::str::FromStr>(
    parameters: &BTreeMap<String, String>,
    key: &str,
) -> Result<Option<T>, StorageClassError> {
    parameters
        .get(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|_| StorageClassError::NotANumber {
                    key: key.to_owned(),
                    value: raw.clone(),
                })
        })
        .transpose()
}
