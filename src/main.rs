//! Binary entry point for the `qingvol` CLI.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::process;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;
use tokio::time::Instant;
use tracing_subscriber::EnvFilter;

use qingvol::{
    AccessMode, CapacityRange, CloudConfig, ConfigError, ControllerPublishVolumeRequest,
    ControllerService, ControllerUnpublishVolumeRequest, CreateVolumeRequest,
    DeleteVolumeRequest, ErrorCode, QingCloudStore, Status, ValidateVolumeCapabilitiesRequest,
    VolumeCapability,
};

mod cli;

use cli::{AttachmentCommand, Cli, Command, CreateCommand, DeleteCommand, ValidateCommand};

type Service = ControllerService<QingCloudStore, QingCloudStore>;

#[derive(Debug, Error)]
enum CliError {
    #[error("{code}: configuration error: {0}", code = ErrorCode::InvalidArgument)]
    Config(#[from] ConfigError),
    #[error("{code}: {0}", code = ErrorCode::InvalidArgument)]
    Argument(String),
    #[error("{0}")]
    Rpc(Status),
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

impl From<Status> for CliError {
    fn from(value: Status) -> Self {
        Self::Rpc(value)
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let exit_code = match dispatch(cli.command).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn dispatch(command: Command) -> Result<(), CliError> {
    let config = CloudConfig::load_without_cli_args()?;
    let service = ControllerService::from_config(&config)?;
    let mut stdout = io::stdout();

    match command {
        Command::Create(args) => create(&service, args, &mut stdout).await,
        Command::Delete(args) => delete(&service, &args, &mut stdout).await,
        Command::Attach(args) => attach(&service, args, &mut stdout).await,
        Command::Detach(args) => detach(&service, args, &mut stdout).await,
        Command::Validate(args) => validate(&service, args, &mut stdout).await,
    }
}

async fn create(service: &Service, args: CreateCommand, out: &mut impl Write) -> Result<(), CliError> {
    let request = CreateVolumeRequest {
        capacity_range: Some(CapacityRange::new(args.required_bytes, args.limit_bytes)),
        volume_capabilities: parse_modes(&args.modes)?,
        parameters: parse_parameters(&args.parameters)?,
        name: args.name,
    };
    let response = service.create_volume(&request).await?;
    writeln!(out, "{} {}", response.volume_id, response.capacity_bytes)?;
    Ok(())
}

async fn delete(service: &Service, args: &DeleteCommand, out: &mut impl Write) -> Result<(), CliError> {
    let request = DeleteVolumeRequest {
        volume_id: args.volume_id.clone(),
        deadline: args
            .timeout_secs
            .and_then(|secs| Instant::now().checked_add(Duration::from_secs(secs))),
    };
    service.delete_volume(&request).await?;
    writeln!(out, "deleted {}", request.volume_id)?;
    Ok(())
}

async fn attach(
    service: &Service,
    args: AttachmentCommand,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let request = ControllerPublishVolumeRequest {
        volume_id: args.volume_id,
        node_id: args.node_id,
        volume_capability: Some(VolumeCapability::new(AccessMode::SingleNodeWriter)),
    };
    let response = service.controller_publish_volume(&request).await?;
    for (key, value) in &response.publish_context {
        writeln!(out, "{key}={value}")?;
    }
    Ok(())
}

async fn detach(
    service: &Service,
    args: AttachmentCommand,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let request = ControllerUnpublishVolumeRequest {
        volume_id: args.volume_id,
        node_id: args.node_id,
    };
    service.controller_unpublish_volume(&request).await?;
    writeln!(out, "detached {} from {}", request.volume_id, request.node_id)?;
    Ok(())
}

async fn validate(
    service: &Service,
    args: ValidateCommand,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let request = ValidateVolumeCapabilitiesRequest {
        volume_capabilities: parse_modes(&args.modes)?,
        volume_id: args.volume_id,
    };
    let response = service.validate_volume_capabilities(&request).await?;
    match (response.confirmed, response.message) {
        (Some(confirmed), _) => {
            let modes: Vec<String> = confirmed
                .iter()
                .map(|capability| capability.access_mode.to_string())
                .collect();
            writeln!(out, "confirmed {}", modes.join(","))?;
        }
        (None, message) => writeln!(out, "{}", message.unwrap_or_default())?,
    }
    Ok(())
}

fn parse_modes(raw: &[String]) -> Result<Vec<VolumeCapability>, CliError> {
    raw.iter()
        .map(|mode| {
            mode.parse::<AccessMode>()
                .map(VolumeCapability::new)
                .map_err(|err| CliError::Argument(err.to_string()))
        })
        .collect()
}

fn parse_parameters(raw: &[String]) -> Result<BTreeMap<String, String>, CliError> {
    raw.iter()
        .map(|pair| {
            pair.split_once('=')
                .filter(|(key, _)| !key.trim().is_empty())
                .map(|(key, value)| (key.trim().to_owned(), value.trim().to_owned()))
                .ok_or_else(|| CliError::Argument(format!("parameter '{pair}' is not KEY=VALUE")))
        })
        .collect()
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn parameters_split_on_first_equals() {
        let parsed = parse_parameters(&[String::from("type=3"), String::from("note=a=b")])
            .expect("valid pairs");
        assert_eq!(parsed.get("type").map(String::as_str), Some("3"));
        assert_eq!(parsed.get("note").map(String::as_str), Some("a=b"));
    }

    #[rstest]
    #[case("type")]
    #[case("=3")]
    fn malformed_parameters_are_rejected(#[case] raw: &str) {
        let err = parse_parameters(&[raw.to_owned()]).expect_err("not KEY=VALUE");
        assert!(err.to_string().starts_with("INVALID_ARGUMENT: "));
    }

    #[test]
    fn unknown_mode_is_an_argument_error() {
        let err = parse_modes(&[String::from("EVERYWHERE")]).expect_err("unknown mode");
        assert!(matches!(err, CliError::Argument(_)));
    }

    #[test]
    fn rpc_errors_render_code_and_message() {
        let mut buffer = Vec::new();
        let err = CliError::Rpc(Status {
            code: ErrorCode::NotFound,
            message: String::from("volume vol-1 not found in zone pek3a"),
        });
        write_error(&mut buffer, &err);
        assert_eq!(
            String::from_utf8(buffer).expect("utf8"),
            "NOT_FOUND: volume vol-1 not found in zone pek3a\n"
        );
    }
}
