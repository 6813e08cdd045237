//! Rendering of the run/status report.

use serde_json::json;
use tabled::{Table, Tabled};

use crate::adapter::inbound::cli::output;
use crate::application::report::{RunReport, ServiceReport};
use crate::domain::{OutcomeStatus, PhaseOutcome};
use crate::port::outbound::AcceleratorStatus;

#[derive(Tabled)]
struct PhaseRow {
    #[tabled(rename = "Phase")]
    phase: String,
    #[tabled(rename = "Result")]
    status: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

impl From<&PhaseOutcome> for PhaseRow {
    fn from(outcome: &PhaseOutcome) -> Self {
        Self {
            phase: outcome.phase.to_string(),
            status: outcome.status.to_string(),
            detail: outcome.detail.clone(),
        }
    }
}

/// Render `report` in the active output mode.
pub fn render(report: &RunReport, status_file: Option<&str>) {
    if output::is_json() {
        let value = serde_json::to_value(report).unwrap_or_else(|error| json!({ "error": error.to_string() }));
        output::json_output(json!({
            "command": report.command,
            "report": value,
            "status_file": status_file,
        }));
        return;
    }

    output::header(env!("CARGO_PKG_VERSION"));

    output::section("Services");
    render_service("Runtime", &report.runtime);
    render_service("Web", &report.web);

    output::section("Environment");
    match &report.assets {
        Some(assets) => output::field(
            "Models",
            format!(
                "{} {}",
                assets.path().display(),
                output::muted(format!(
                    "({} manifests, {} blobs)",
                    assets.manifests(),
                    assets.blobs()
                ))
            ),
        ),
        None => output::field("Models", output::muted("not found")),
    }
    output::field("Accelerator", accelerator_line(&report.accelerator));
    if let Some(path) = status_file {
        output::field("Status file", path);
    }

    if !report.phases.is_empty() {
        output::section("Phases");
        let rows: Vec<PhaseRow> = report.phases.iter().map(PhaseRow::from).collect();
        output::lines(&Table::new(rows).to_string());
    }

    if report.cancelled {
        output::warning("Run was cancelled; remaining work was skipped");
    }

    if report.is_healthy() && report.is_clean() {
        output::success("Stack healthy");
        return;
    }

    output::section("Troubleshooting");
    for issue in report
        .phases
        .iter()
        .filter(|outcome| outcome.status >= OutcomeStatus::Degraded)
    {
        output::warning(&format!("{}: {}", issue.phase, issue.detail));
    }
    for command in &report.remediation {
        output::hint(command);
    }
}

fn render_service(label: &str, service: &ServiceReport) {
    let state = if service.state.is_healthy() {
        output::positive(service.state)
    } else {
        output::negative(service.state)
    };
    output::field(label, format!("{state} {}", output::highlight(&service.endpoint)));
    if let Some(lan) = &service.lan_endpoint {
        output::field("", format!("LAN {}", output::highlight(lan)));
    }
    if let Some(version) = &service.version {
        let current = version.current.as_deref().unwrap_or("none");
        let latest = version.latest.known().unwrap_or("unknown");
        output::field(
            "",
            output::muted(format!("{current} / latest {latest}: {}", version.decision)),
        );
    }
}

fn accelerator_line(status: &AcceleratorStatus) -> String {
    match status {
        AcceleratorStatus::Absent => output::muted("none detected"),
        AcceleratorStatus::Present { driver, devices } => {
            let names: Vec<String> = devices
                .iter()
                .map(|device| {
                    format!(
                        "{} ({}/{} MiB)",
                        device.name, device.memory_used_mib, device.memory_total_mib
                    )
                })
                .collect();
            match driver {
                Some(driver) => format!("{} {}", names.join(", "), output::muted(format!("driver {driver}"))),
                None => names.join(", "),
            }
        }
    }
}
