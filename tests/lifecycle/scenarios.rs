//! BDD scenarios for the volume lifecycle.

use rstest_bdd_macros::scenario;

use super::test_helpers::{LifecycleContext, lifecycle_context};

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Creating a volume twice returns the same volume"
)]
fn scenario_idempotent_create(lifecycle_context: LifecycleContext) {
    drop(lifecycle_context);
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Reject a create whose name is taken by an incompatible volume"
)]
fn scenario_incompatible_create(lifecycle_context: LifecycleContext) {
    drop(lifecycle_context);
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Give up deleting after the retry budget is spent"
)]
fn scenario_delete_retries_exhausted(lifecycle_context: LifecycleContext) {
    drop(lifecycle_context);
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Refuse to delete an attached volume"
)]
fn scenario_delete_in_use(lifecycle_context: LifecycleContext) {
    drop(lifecycle_context);
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Publishing an already attached volume reuses its device"
)]
fn scenario_publish_idempotent(lifecycle_context: LifecycleContext) {
    drop(lifecycle_context);
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Refuse to publish a volume attached to another node"
)]
fn scenario_publish_conflict(lifecycle_context: LifecycleContext) {
    drop(lifecycle_context);
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Roll back an attach that yields no device path"
)]
fn scenario_publish_rollback(lifecycle_context: LifecycleContext) {
    drop(lifecycle_context);
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Duplicate live names are reported as internal errors"
)]
fn scenario_duplicate_names(lifecycle_context: LifecycleContext) {
    drop(lifecycle_context);
}
