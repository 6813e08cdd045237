//! Web container ensure-running decisions.

mod support;

use stackwarden::application::lifecycle::ContainerLifecycle;
use stackwarden::domain::{LifecycleState, OutcomeStatus};
use stackwarden::testkit::stack::MockStack;
use support::fixture::Fixture;

fn journal(entries: &[&str]) -> Vec<String> {
    entries.iter().map(ToString::to_string).collect()
}

#[tokio::test]
async fn missing_container_is_created() {
    let fixture = Fixture::new();
    let assets = fixture.populated_assets();
    let stack = MockStack::new(&fixture.config).with_remote_digest("sha256:abc");
    let ctx = fixture.context(&stack, assets);

    let (outcome, state) = ContainerLifecycle::new(&ctx, false).ensure_running(false).await;

    assert_eq!(outcome.status, OutcomeStatus::Success);
    assert_eq!(state, LifecycleState::Healthy);
    assert_eq!(stack.journal(), journal(&["container.run"]));
}

#[tokio::test]
async fn stopped_container_is_started_in_place() {
    let fixture = Fixture::new();
    let assets = fixture.populated_assets();
    let stack = MockStack::new(&fixture.config).with_container(&fixture.config, &assets, "sha256:abc", false);
    let ctx = fixture.context(&stack, assets);

    let (_, state) = ContainerLifecycle::new(&ctx, false).ensure_running(false).await;

    assert_eq!(state, LifecycleState::Healthy);
    assert_eq!(stack.journal(), journal(&["container.start"]));
}

#[tokio::test]
async fn healthy_container_is_left_alone() {
    let fixture = Fixture::new();
    let assets = fixture.populated_assets();
    let stack = MockStack::new(&fixture.config).with_container(&fixture.config, &assets, "sha256:abc", true);
    let ctx = fixture.context(&stack, assets);

    let (outcome, state) = ContainerLifecycle::new(&ctx, false).ensure_running(false).await;

    assert_eq!(outcome.detail, "already healthy");
    assert_eq!(state, LifecycleState::Healthy);
    assert!(stack.journal().is_empty());
}

#[tokio::test]
async fn unresponsive_container_is_restarted_and_reported_unhealthy() {
    let fixture = Fixture::new();
    let assets = fixture.populated_assets();
    let stack = MockStack::new(&fixture.config)
        .with_container(&fixture.config, &assets, "sha256:abc", true)
        .with_unresponsive_container();
    let ctx = fixture.context(&stack, assets);

    let (outcome, state) = ContainerLifecycle::new(&ctx, false).ensure_running(false).await;

    assert_eq!(stack.journal(), journal(&["container.stop", "container.start"]));
    assert_eq!(outcome.status, OutcomeStatus::Degraded);
    assert_eq!(state, LifecycleState::Unhealthy);
}

#[tokio::test]
async fn asset_mount_drift_replaces_container_and_keeps_data_volume() {
    let fixture = Fixture::new();
    let assets = fixture.populated_assets();
    let mount = assets.display_path();
    let stack = MockStack::new(&fixture.config)
        .with_container(&fixture.config, &assets, "sha256:abc", true)
        .with_container_mount(&mount, "/old/models");
    let ctx = fixture.context(&stack, assets);

    let (_, state) = ContainerLifecycle::new(&ctx, false).ensure_running(false).await;

    assert_eq!(state, LifecycleState::Healthy);
    assert_eq!(
        stack.journal(),
        journal(&["container.stop", "container.rm", "container.run"])
    );
    let info = stack.container().unwrap();
    assert!(info
        .mounts
        .iter()
        .any(|m| m.source == mount && m.destination == mount));
    assert!(info
        .mounts
        .iter()
        .any(|m| m.source == fixture.config.container.data_volume
            && m.destination == fixture.config.container.data_path));
}

#[tokio::test]
async fn image_update_recreates_healthy_container() {
    let fixture = Fixture::new();
    let assets = fixture.populated_assets();
    let stack = MockStack::new(&fixture.config)
        .with_remote_digest("sha256:new")
        .with_local_digest("sha256:new")
        .with_container(&fixture.config, &assets, "sha256:old", true);
    let ctx = fixture.context(&stack, assets);

    let (outcome, _) = ContainerLifecycle::new(&ctx, false).ensure_running(true).await;

    assert_eq!(outcome.status, OutcomeStatus::Success);
    assert_eq!(
        stack.journal(),
        journal(&["container.stop", "container.rm", "container.run"])
    );
    assert_eq!(
        stack.container().and_then(|info| info.image_digest).as_deref(),
        Some("sha256:new")
    );
}

#[tokio::test]
async fn reclaim_stops_running_container() {
    let fixture = Fixture::new();
    let assets = fixture.populated_assets();
    let stack = MockStack::new(&fixture.config).with_container(&fixture.config, &assets, "sha256:abc", true);
    let ctx = fixture.context(&stack, assets);

    let outcome = ContainerLifecycle::new(&ctx, false).reclaim().await;

    assert_eq!(outcome.status, OutcomeStatus::Success);
    assert_eq!(stack.journal(), journal(&["container.stop"]));
    assert!(!stack.container().unwrap().running);
    assert_eq!(stack.host().port_kills(), vec![fixture.config.container.host_port]);
}
