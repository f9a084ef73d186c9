//! Command-line interface definitions for the `qingvol` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{Parser, Subcommand};

/// Top-level CLI for the `qingvol` binary.
#[derive(Debug, Parser)]
#[command(
    name = "qingvol",
    about = "Manage QingCloud block-storage volumes through the controller service",
    arg_required_else_help = true
)]
pub(crate) struct Cli {
    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    pub(crate) json_logs: bool,
    /// Operation to run.
    #[command(subcommand)]
    pub(crate) command: Command,
}

/// Volume operations.
#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Create a volume, or return the compatible volume with the same name.
    #[command(name = "create")]
    Create(CreateCommand),
    /// Delete a volume, retrying while the store asks to try later.
    #[command(name = "delete")]
    Delete(DeleteCommand),
    /// Attach a volume to an instance and print the device path.
    #[command(name = "attach")]
    Attach(AttachmentCommand),
    /// Detach a volume from the instance holding it.
    #[command(name = "detach")]
    Detach(AttachmentCommand),
    /// Check access modes against an existing volume.
    #[command(name = "validate")]
    Validate(ValidateCommand),
}

/// Arguments for `qingvol create`.
#[derive(Debug, Parser)]
pub(crate) struct CreateCommand {
    /// Volume name; repeated creates with the same name are idempotent.
    #[arg(long)]
    pub(crate) name: String,
    /// Minimum capacity in bytes.
    #[arg(long, value_name = "BYTES", default_value_t = 0)]
    pub(crate) required_bytes: u64,
    /// Maximum capacity in bytes; 0 means no limit.
    #[arg(long, value_name = "BYTES", default_value_t = 0)]
    pub(crate) limit_bytes: u64,
    /// Access mode the volume must support (repeatable).
    #[arg(long = "mode", value_name = "MODE", default_value = "SINGLE_NODE_WRITER")]
    pub(crate) modes: Vec<String>,
    /// Storage class parameter such as `type=3` or `stepSize=50` (repeatable).
    #[arg(long = "param", value_name = "KEY=VALUE")]
    pub(crate) parameters: Vec<String>,
}

/// Arguments for `qingvol delete`.
#[derive(Debug, Parser)]
pub(crate) struct DeleteCommand {
    /// Volume identifier.
    #[arg(long)]
    pub(crate) volume_id: String,
    /// Stop retrying once this many seconds have elapsed.
    #[arg(long, value_name = "SECONDS")]
    pub(crate) timeout_secs: Option<u64>,
}

/// Arguments for `qingvol attach` and `qingvol detach`.
#[derive(Debug, Parser)]
pub(crate) struct AttachmentCommand {
    /// Volume identifier.
    #[arg(long)]
    pub(crate) volume_id: String,
    /// Instance identifier.
    #[arg(long)]
    pub(crate) node_id: String,
}

/// Arguments for `qingvol validate`.
#[derive(Debug, Parser)]
pub(crate) struct ValidateCommand {
    /// Volume identifier.
    #[arg(long)]
    pub(crate) volume_id: String,
    /// Access mode to check (repeatable).
    #[arg(long = "mode", value_name = "MODE", required = true)]
    pub(crate) modes: Vec<String>,
}
