//! Configuration loading via `ortho-config`.

use std::ffi::OsString;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::lifecycle::RetryPolicy;
use crate::storage_class::{StorageClass, StorageClassError};

/// Control-plane credentials, endpoint and volume defaults derived from
/// environment variables and configuration files.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "QINGVOL",
    discovery(
        app_name = "qingvol",
        env_var = "QINGVOL_CONFIG_PATH",
        config_file_name = "qingvol.toml",
        dotfile_name = ".qingvol.toml",
        project_file_name = "qingvol.toml"
    )
)]
pub struct CloudConfig {
    /// Access key identifier sent with every call.
    #[ortho_config(default = String::new())]
    pub access_key_id: String,
    /// Secret key sent in the auth header. Never logged.
    #[ortho_config(default = String::new())]
    pub secret_access_key: String,
    /// Zone all calls are scoped to.
    #[ortho_config(default = "pek3a".to_owned())]
    pub zone: String,
    /// Base URL of the IaaS API.
    #[ortho_config(default = "https://api.qingcloud.com/iaas/".to_owned())]
    pub api_endpoint: String,
    /// Default volume tier when a request does not name one.
    #[ortho_config(default = 0)]
    pub volume_type: i32,
    /// Default minimum volume size in GiB.
    #[ortho_config(default = 10)]
    pub volume_min_size_gb: u64,
    /// Default maximum volume size in GiB.
    #[ortho_config(default = 500)]
    pub volume_max_size_gb: u64,
    /// Default volume size step in GiB.
    #[ortho_config(default = 10)]
    pub volume_step_size_gb: u64,
    /// Upper bound on a single HTTP call.
    #[ortho_config(default = 30)]
    pub request_timeout_secs: u64,
    /// Delete attempts before giving up on transient failures.
    #[ortho_config(default = 10)]
    pub delete_max_attempts: u32,
    /// Linear backoff step between delete attempts.
    #[ortho_config(default = 1)]
    pub delete_backoff_secs: u64,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }
}

impl CloudConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: set {} or add {} to qingvol.toml",
                metadata.description, metadata.env_var, metadata.toml_key
            )));
        }
        Ok(())
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([OsString::from("qingvol")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation. Error messages name the environment
    /// variable and file key that supply a missing value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty
    /// and [`ConfigError::StorageClass`] when the volume defaults are
    /// inconsistent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(
            &self.access_key_id,
            &FieldMetadata::new("access key id", "QINGVOL_ACCESS_KEY_ID", "access_key_id"),
        )?;
        Self::require_field(
            &self.secret_access_key,
            &FieldMetadata::new(
                "secret access key",
                "QINGVOL_SECRET_ACCESS_KEY",
                "secret_access_key",
            ),
        )?;
        Self::require_field(&self.zone, &FieldMetadata::new("zone", "QINGVOL_ZONE", "zone"))?;
        Self::require_field(
            &self.api_endpoint,
            &FieldMetadata::new("API endpoint", "QINGVOL_API_ENDPOINT", "api_endpoint"),
        )?;
        self.storage_class()?;
        Ok(())
    }

    /// Builds the default storage class from the volume settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::StorageClass`] when the settings are
    /// inconsistent.
    pub fn storage_class(&self) -> Result<StorageClass, ConfigError> {
        let class = StorageClass {
            volume_type: self.volume_type,
            min_size_gb: self.volume_min_size_gb,
            max_size_gb: self.volume_max_size_gb,
            step_size_gb: self.volume_step_size_gb,
        };
        class.validate()?;
        Ok(class)
    }

    /// Delete retry policy derived from the configured attempts and step.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::linear(
            self.delete_max_attempts,
            Duration::from_secs(self.delete_backoff_secs),
        )
    }

    /// Timeout applied to every HTTP call.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates the volume defaults do not form a usable storage class.
    #[error("invalid volume defaults: {0}")]
    StorageClass(#[from] StorageClassError),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
    /// Raised when the HTTP client cannot be built from the settings.
    #[error("HTTP client setup failed: {0}")]
    Client(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
