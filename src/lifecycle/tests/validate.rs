use rstest::rstest;

use super::{orchestrator, store};
use crate::capability::{AccessMode, VolumeCapability};
use crate::error::ErrorCode;
use crate::lifecycle::CapabilityCheck;
use crate::test_support::{FakeStore, volume};

#[rstest]
#[tokio::test]
async fn supported_modes_are_confirmed(store: FakeStore) {
    store.insert_volume(volume("vol-1", "pvc-1", 10));
    let requested = [VolumeCapability::new(AccessMode::SingleNodeWriter)];
    let check = orchestrator(&store)
        .validate_capabilities("vol-1", &requested)
        .await;
    assert_eq!(check, Ok(CapabilityCheck::Confirmed(requested.to_vec())));
}

#[rstest]
#[tokio::test]
async fn first_unsupported_mode_is_named(store: FakeStore) {
    store.insert_volume(volume("vol-1", "pvc-1", 10));
    let requested = [
        VolumeCapability::new(AccessMode::SingleNodeWriter),
        VolumeCapability::new(AccessMode::MultiNodeMultiWriter),
        VolumeCapability::new(AccessMode::MultiNodeReaderOnly),
    ];
    let check = orchestrator(&store)
        .validate_capabilities("vol-1", &requested)
        .await;
    assert_eq!(
        check,
        Ok(CapabilityCheck::Unsupported {
            message: String::from("Driver does not support mode: MULTI_NODE_MULTI_WRITER"),
        })
    );
}

#[rstest]
#[tokio::test]
async fn declared_modes_can_be_widened(store: FakeStore) {
    store.insert_volume(volume("vol-1", "pvc-1", 10));
    let requested = [VolumeCapability::new(AccessMode::SingleNodeReaderOnly)];
    let check = orchestrator(&store)
        .with_supported_modes([AccessMode::SingleNodeWriter, AccessMode::SingleNodeReaderOnly])
        .validate_capabilities("vol-1", &requested)
        .await;
    assert!(matches!(check, Ok(CapabilityCheck::Confirmed(_))));
}

#[rstest]
#[tokio::test]
async fn missing_volume_is_not_found(store: FakeStore) {
    let err = orchestrator(&store)
        .validate_capabilities("vol-1", &[])
        .await
        .expect_err("volume missing");
    assert_eq!(err.code(), ErrorCode::NotFound);
}
