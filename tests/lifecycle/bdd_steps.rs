//! BDD step definitions for the volume lifecycle.

use qingvol::test_support::{attached_volume, volume};
use qingvol::controller::DEVICE_PATH_KEY;
use qingvol::{
    AccessMode, CapacityRange, ControllerPublishVolumeRequest, CreateVolumeRequest,
    DeleteVolumeRequest, GIB, StoreAction, StoreError, VolumeCapability,
};
use rstest_bdd_macros::{given, then, when};

use super::test_helpers::{LifecycleContext, Outcome, paused_runtime};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("runtime setup failed: {0}")]
    Runtime(#[from] std::io::Error),
    #[error("assertion failed: {0}")]
    Assertion(String),
}

const ACTIONS: [StoreAction; 6] = [
    StoreAction::DescribeVolumes,
    StoreAction::CreateVolumes,
    StoreAction::DeleteVolumes,
    StoreAction::AttachVolumes,
    StoreAction::DetachVolumes,
    StoreAction::DescribeInstances,
];

#[given("an empty volume store")]
fn empty_store(lifecycle_context: &LifecycleContext) {
    assert!(lifecycle_context.all_outcomes().is_empty());
}

#[given("the store holds volume \"{id}\" named \"{name}\" of {size} GiB")]
fn store_holds_volume(lifecycle_context: &LifecycleContext, id: String, name: String, size: u64) {
    lifecycle_context.store.insert_volume(volume(&id, &name, size));
}

#[given("volume \"{id}\" is attached to \"{instance}\" at \"{device}\"")]
fn volume_attached(
    lifecycle_context: &LifecycleContext,
    id: String,
    instance: String,
    device: String,
) {
    lifecycle_context
        .store
        .insert_volume(attached_volume(&id, &instance, &device));
}

#[given("every delete asks to try later")]
fn deletes_are_busy(lifecycle_context: &LifecycleContext) {
    lifecycle_context.store.fail_always(
        StoreAction::DeleteVolumes,
        StoreError::transport(StoreAction::DeleteVolumes, "volume is busy, please try later"),
    );
}

#[given("attaches report no device path")]
fn attaches_lack_device(lifecycle_context: &LifecycleContext) {
    lifecycle_context.store.set_attach_device("");
}

#[when("I create volume \"{name}\" with {size} GiB required")]
fn create_volume(
    lifecycle_context: &LifecycleContext,
    name: String,
    size: u64,
) -> Result<(), StepError> {
    let request = CreateVolumeRequest {
        name,
        capacity_range: Some(CapacityRange::new(size * GIB, 0)),
        volume_capabilities: vec![VolumeCapability::new(AccessMode::SingleNodeWriter)],
        ..CreateVolumeRequest::default()
    };
    let service = lifecycle_context.service();
    let result = paused_runtime()?.block_on(async move { service.create_volume(&request).await });
    lifecycle_context.record(match result {
        Ok(response) => Outcome::Created {
            volume_id: response.volume_id,
            capacity_bytes: response.capacity_bytes,
        },
        Err(status) => Outcome::Failed(status),
    });
    Ok(())
}

#[when("I delete volume \"{id}\"")]
fn delete_volume(lifecycle_context: &LifecycleContext, id: String) -> Result<(), StepError> {
    let request = DeleteVolumeRequest {
        volume_id: id,
        deadline: None,
    };
    let service = lifecycle_context.service();
    let result = paused_runtime()?.block_on(async move { service.delete_volume(&request).await });
    lifecycle_context.record(match result {
        Ok(()) => Outcome::Deleted,
        Err(status) => Outcome::Failed(status),
    });
    Ok(())
}

#[when("I publish volume \"{id}\" to node \"{node}\"")]
fn publish_volume(
    lifecycle_context: &LifecycleContext,
    id: String,
    node: String,
) -> Result<(), StepError> {
    let request = ControllerPublishVolumeRequest {
        volume_id: id,
        node_id: node,
        volume_capability: Some(VolumeCapability::new(AccessMode::SingleNodeWriter)),
    };
    let service = lifecycle_context.service();
    let result = paused_runtime()?
        .block_on(async move { service.controller_publish_volume(&request).await });
    lifecycle_context.record(match result {
        Ok(response) => Outcome::Published {
            device: response.publish_context.get(DEVICE_PATH_KEY).cloned(),
        },
        Err(status) => Outcome::Failed(status),
    });
    Ok(())
}

#[then("both creates return the same volume of {size} GiB")]
fn creates_match(lifecycle_context: &LifecycleContext, size: u64) -> Result<(), StepError> {
    let outcomes = lifecycle_context.all_outcomes();
    let [first, second] = outcomes.as_slice() else {
        return Err(StepError::Assertion(format!(
            "expected two outcomes, got {outcomes:?}"
        )));
    };
    if first != second {
        return Err(StepError::Assertion(format!(
            "creates disagree: {first:?} vs {second:?}"
        )));
    }
    match first {
        Outcome::Created { capacity_bytes, .. } if *capacity_bytes == size * GIB => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected a {size} GiB volume, got {other:?}"
        ))),
    }
}

#[then("the request fails with code \"{code}\"")]
fn request_fails(lifecycle_context: &LifecycleContext, code: String) -> Result<(), StepError> {
    match lifecycle_context.last_outcome() {
        Some(Outcome::Failed(status)) if status.code.as_str() == code => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected failure {code}, got {other:?}"
        ))),
    }
}

#[then("the device path is \"{device}\"")]
fn device_path_is(lifecycle_context: &LifecycleContext, device: String) -> Result<(), StepError> {
    match lifecycle_context.last_outcome() {
        Some(Outcome::Published {
            device: Some(actual),
        }) if actual == device => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected device {device}, got {other:?}"
        ))),
    }
}

#[then("the \"{action}\" call count is {count}")]
fn call_count(
    lifecycle_context: &LifecycleContext,
    action: String,
    count: u32,
) -> Result<(), StepError> {
    let Some(store_action) = ACTIONS.into_iter().find(|known| known.as_str() == action) else {
        return Err(StepError::Assertion(format!("unknown store action {action}")));
    };
    let actual = lifecycle_context.store.calls(store_action);
    if actual == count {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {count} {action} calls, got {actual}"
        )))
    }
}

#[then("volume \"{id}\" is detached")]
fn volume_detached(lifecycle_context: &LifecycleContext, id: String) -> Result<(), StepError> {
    match lifecycle_context.store.volume(&id) {
        Some(found) if found.attachment.is_none() => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected {id} to be detached, got {other:?}"
        ))),
    }
}
