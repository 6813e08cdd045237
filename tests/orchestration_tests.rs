//! End-to-end update cycles against a simulated stack.

mod support;

use std::fs;

use stackwarden::adapter::inbound::cli::exit;
use stackwarden::adapter::inbound::cli::run::exit_code;
use stackwarden::domain::{Decision, OutcomeStatus, Phase, ServiceState};
use stackwarden::error::{Error, LockError};
use stackwarden::infrastructure::config::lock::LockPolicy;
use stackwarden::testkit::host::MockHost;
use stackwarden::testkit::stack::{MockStack, TRANSIENT_PID};
use support::fixture::{cancelled, Fixture};

fn phase_status(summary: &stackwarden::application::orchestration::RunSummary, phase: Phase) -> OutcomeStatus {
    summary
        .report
        .phases
        .iter()
        .find(|outcome| outcome.phase == phase)
        .map(|outcome| outcome.status)
        .unwrap_or_else(|| panic!("phase {phase} not recorded"))
}

#[tokio::test]
async fn fresh_host_is_installed_derived_and_started() {
    let fixture = Fixture::new();
    let stack = MockStack::new(&fixture.config)
        .with_latest("v0.6.0")
        .with_models(&["modelA"])
        .with_remote_digest("sha256:new");

    let summary = fixture.orchestrator(&stack).run().await.unwrap();

    assert_eq!(stack.installed().as_deref(), Some("v0.6.0"));
    assert!(stack.models().contains(&"modelA-maxgpu".to_string()));
    assert_eq!(
        stack.container().and_then(|info| info.image_digest).as_deref(),
        Some("sha256:new")
    );
    assert!(!stack.host().is_alive(TRANSIENT_PID));

    let journal = stack.journal();
    let position = |entry: &str| journal.iter().position(|item| item == entry);
    assert!(position("runtime.install") < position("runtime.spawn_transient"));
    assert!(position("api.create:modelA-maxgpu") < position("runtime.start"));
    assert!(position("container.pull") < position("container.run"));

    assert_eq!(phase_status(&summary, Phase::Derivation), OutcomeStatus::Success);
    assert_eq!(summary.report.runtime.state, ServiceState::RunningResponding);
    assert_eq!(summary.report.web.state, ServiceState::RunningResponding);
    assert!(summary.report.is_clean());
    assert_eq!(exit_code(&summary, true), exit::OK);
    assert!(!fixture.config.lock.path.exists());
}

#[tokio::test]
async fn phases_are_recorded_in_declaration_order() {
    let fixture = Fixture::new();
    let stack = MockStack::new(&fixture.config)
        .with_latest("v0.6.0")
        .with_models(&["modelA"])
        .with_remote_digest("sha256:new");

    let summary = fixture.orchestrator(&stack).run().await.unwrap();

    let recorded: Vec<Phase> = summary.report.phases.iter().map(|outcome| outcome.phase).collect();
    let mut declared = recorded.clone();
    declared.sort_by_key(|phase| *phase as u8);
    assert_eq!(recorded, declared);
    assert_eq!(recorded.first(), Some(&Phase::Lock));
    assert_eq!(recorded.last(), Some(&Phase::Report));
    assert!(recorded.contains(&Phase::ContainerStart));
    assert!(recorded.contains(&Phase::Preload));
}

#[tokio::test]
async fn second_run_on_converged_stack_changes_nothing() {
    let fixture = Fixture::new();
    let assets = fixture.populated_assets();
    let stack = MockStack::new(&fixture.config)
        .with_runtime("0.5.7", "v0.5.7")
        .with_remote_digest("sha256:abc")
        .with_container(&fixture.config, &assets, "sha256:abc", true);

    fixture.orchestrator(&stack).run().await.unwrap();
    stack.clear_journal();
    let signals = stack.host().signals().len();

    let summary = fixture.orchestrator(&stack).run().await.unwrap();

    assert!(stack.journal().is_empty(), "unexpected changes: {:?}", stack.journal());
    assert_eq!(stack.host().signals().len(), signals);
    let runtime = summary.report.runtime.version.as_ref().unwrap();
    let web = summary.report.web.version.as_ref().unwrap();
    assert_eq!(runtime.decision, Decision::UpToDate);
    assert_eq!(web.decision, Decision::UpToDate);
    assert_eq!(phase_status(&summary, Phase::RuntimeUpdate), OutcomeStatus::Skipped);
    assert_eq!(phase_status(&summary, Phase::ContainerUpdate), OutcomeStatus::Skipped);
    assert!(summary.report.is_clean());
}

#[tokio::test]
async fn cancellation_before_lock_touches_nothing() {
    let fixture = Fixture::new();
    let stack = MockStack::new(&fixture.config)
        .with_latest("v0.6.0")
        .with_remote_digest("sha256:new");

    let summary = fixture
        .orchestrator_with(&stack, cancelled())
        .run()
        .await
        .unwrap();

    assert!(summary.cancelled());
    assert_eq!(summary.report.phases[0].phase, Phase::Lock);
    assert_eq!(summary.report.phases[0].status, OutcomeStatus::Skipped);
    assert!(summary
        .report
        .phases
        .iter()
        .all(|outcome| matches!(outcome.phase, Phase::Lock | Phase::Report)));
    assert!(stack.journal().is_empty());
    assert!(!fixture.config.lock.path.exists());
    assert_eq!(exit_code(&summary, false), exit::CANCELLED);
}

#[tokio::test]
async fn live_lock_owner_stops_the_run_under_fail_policy() {
    let fixture = Fixture::new();
    fs::write(&fixture.config.lock.path, "77\n").unwrap();
    let stack = MockStack::new(&fixture.config)
        .with_latest("v0.6.0")
        .with_host(MockHost::new().with_alive(77));

    let error = fixture
        .orchestrator(&stack)
        .lock_policy(LockPolicy::Fail)
        .run()
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        Error::Lock(LockError::Contended { owner_pid: 77, .. })
    ));
    assert!(stack.journal().is_empty());
    assert_eq!(fs::read_to_string(&fixture.config.lock.path).unwrap(), "77\n");
}

#[tokio::test]
async fn force_unlock_displaces_owner_and_degrades_lock_phase() {
    let fixture = Fixture::new();
    fs::write(&fixture.config.lock.path, "77\n").unwrap();
    let assets = fixture.populated_assets();
    let stack = MockStack::new(&fixture.config)
        .with_runtime("0.5.7", "0.5.7")
        .with_remote_digest("sha256:abc")
        .with_container(&fixture.config, &assets, "sha256:abc", true)
        .with_host(MockHost::new().with_alive(77));

    let summary = fixture
        .orchestrator(&stack)
        .lock_policy(LockPolicy::Force)
        .run()
        .await
        .unwrap();

    let lock = &summary.report.phases[0];
    assert_eq!(lock.phase, Phase::Lock);
    assert_eq!(lock.status, OutcomeStatus::Degraded);
    assert!(lock.detail.contains("displaced pid 77"));
    assert_eq!(exit_code(&summary, true), exit::DEGRADED);
    assert_eq!(exit_code(&summary, false), exit::OK);
}

#[tokio::test]
async fn failed_install_skips_derivation_and_restores_runtime() {
    let fixture = Fixture::new();
    fixture.populated_assets();
    let stack = MockStack::new(&fixture.config)
        .with_runtime("0.5.0", "v0.6.0")
        .with_failing_install()
        .with_models(&["modelA"]);

    let summary = fixture.orchestrator(&stack).run().await.unwrap();

    assert_eq!(phase_status(&summary, Phase::RuntimeUpdate), OutcomeStatus::Failed);
    assert_eq!(phase_status(&summary, Phase::Derivation), OutcomeStatus::Skipped);
    assert_eq!(phase_status(&summary, Phase::RuntimeStart), OutcomeStatus::Success);
    assert_eq!(stack.installed().as_deref(), Some("0.5.0"));
    assert!(!stack.journal().iter().any(|entry| entry.starts_with("api.create")));
    assert_eq!(exit_code(&summary, true), exit::DEGRADED);
    assert_eq!(exit_code(&summary, false), exit::OK);
}

#[tokio::test]
async fn unresponsive_web_is_degraded_not_fatal() {
    let fixture = Fixture::new();
    let assets = fixture.populated_assets();
    let stack = MockStack::new(&fixture.config)
        .with_runtime("0.5.7", "0.5.7")
        .with_remote_digest("sha256:abc")
        .with_container(&fixture.config, &assets, "sha256:abc", true)
        .with_unresponsive_container();

    let summary = fixture.orchestrator(&stack).run().await.unwrap();

    assert_eq!(phase_status(&summary, Phase::ContainerStart), OutcomeStatus::Degraded);
    assert_eq!(summary.report.web.state, ServiceState::RunningNotResponding);
    assert!(!summary.report.is_healthy());
}

#[tokio::test]
async fn preload_runs_once_runtime_is_healthy() {
    let mut fixture = Fixture::new();
    fixture.config.runtime.preload = vec!["modelA".into(), "missing".into()];
    let assets = fixture.populated_assets();
    let stack = MockStack::new(&fixture.config)
        .with_runtime("0.5.7", "0.5.7")
        .with_remote_digest("sha256:abc")
        .with_container(&fixture.config, &assets, "sha256:abc", true)
        .with_failing_preload("missing");

    let summary = fixture.orchestrator(&stack).run().await.unwrap();

    assert_eq!(stack.preloaded(), vec!["modelA".to_string()]);
    let preload = summary
        .report
        .phases
        .iter()
        .find(|outcome| outcome.phase == Phase::Preload)
        .unwrap();
    assert_eq!(preload.status, OutcomeStatus::Degraded);
    assert!(preload.detail.contains("missing"));
}

#[tokio::test]
async fn status_file_records_the_run() {
    let fixture = Fixture::new();
    let stack = MockStack::new(&fixture.config)
        .with_latest("v0.6.0")
        .with_remote_digest("sha256:new");

    let summary = fixture.orchestrator(&stack).run().await.unwrap();

    let path = fixture.config.report.status_file.clone().unwrap();
    assert_eq!(summary.status_file.as_deref(), Some(path.as_path()));
    let value: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
    assert_eq!(value["command"], "run");
    assert_eq!(value["cancelled"], false);
    assert_eq!(value["phases"][0]["phase"], "lock");
    assert!(value["remediation"].as_array().is_some_and(|items| !items.is_empty()));
    assert_eq!(
        summary.report.phases.last().map(|outcome| outcome.phase),
        Some(Phase::Report)
    );
}

#[tokio::test]
async fn accelerator_devices_reach_the_runtime_override() {
    let fixture = Fixture::new();
    let assets = fixture.populated_assets();
    let stack = MockStack::new(&fixture.config)
        .with_runtime("0.5.7", "0.5.7")
        .with_remote_digest("sha256:abc")
        .with_container(&fixture.config, &assets, "sha256:abc", true)
        .with_accelerator(2);

    let summary = fixture.orchestrator(&stack).run().await.unwrap();

    let env = stack.override_env().unwrap();
    assert_eq!(env.get("CUDA_VISIBLE_DEVICES"), Some("0,1"));
    assert_eq!(env.get("OLLAMA_MODELS"), Some(assets.display_path().as_str()));
    assert!(summary.report.accelerator.is_present());
}

#[tokio::test]
async fn failed_pull_leaves_existing_container_running() {
    let fixture = Fixture::new();
    let assets = fixture.populated_assets();
    let stack = MockStack::new(&fixture.config)
        .with_runtime("0.5.7", "0.5.7")
        .with_remote_digest("sha256:new")
        .with_container(&fixture.config, &assets, "sha256:old", true)
        .with_failing_pull();

    let summary = fixture.orchestrator(&stack).run().await.unwrap();

    assert_eq!(phase_status(&summary, Phase::ContainerUpdate), OutcomeStatus::Failed);
    assert_eq!(phase_status(&summary, Phase::ContainerStart), OutcomeStatus::Success);
    assert!(!stack.journal().iter().any(|entry| entry == "container.rm"));
    assert_eq!(summary.report.web.state, ServiceState::RunningResponding);
}

#[tokio::test]
async fn stopped_runtime_is_started_without_update() {
    let fixture = Fixture::new();
    let assets = fixture.populated_assets();
    let stack = MockStack::new(&fixture.config)
        .with_runtime("0.5.7", "0.5.7")
        .with_runtime_stopped()
        .with_remote_digest("sha256:abc")
        .with_container(&fixture.config, &assets, "sha256:abc", true);

    let summary = fixture.orchestrator(&stack).run().await.unwrap();

    assert!(!stack.journal().iter().any(|entry| entry == "runtime.install"));
    assert!(stack.journal().iter().any(|entry| entry == "runtime.start"));
    assert_eq!(summary.report.runtime.state, ServiceState::RunningResponding);
}

#[tokio::test]
async fn unresponsive_runtime_skips_preload() {
    let mut fixture = Fixture::new();
    fixture.config.runtime.preload = vec!["modelA".into()];
    let assets = fixture.populated_assets();
    let stack = MockStack::new(&fixture.config)
        .with_runtime("0.5.7", "0.5.7")
        .with_unresponsive_runtime()
        .with_remote_digest("sha256:abc")
        .with_container(&fixture.config, &assets, "sha256:abc", true);

    let summary = fixture.orchestrator(&stack).run().await.unwrap();

    assert_eq!(phase_status(&summary, Phase::RuntimeStart), OutcomeStatus::Degraded);
    assert_eq!(phase_status(&summary, Phase::Preload), OutcomeStatus::Skipped);
    assert!(stack.preloaded().is_empty());
    assert_eq!(summary.report.runtime.state, ServiceState::RunningNotResponding);
}
