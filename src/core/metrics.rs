use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROM_HANDLE.set(handle);

    metrics::describe_counter!("attempts_started_total", "Attempts created");
    metrics::describe_counter!("attempts_submitted_total", "Attempts submitted and graded");
    metrics::describe_counter!("answers_recorded_total", "Answer writes accepted");
    metrics::describe_counter!("sections_completed_total", "Section transitions");
    metrics::describe_counter!(
        "expired_sections_closed_total",
        "Sections closed by the expiry watchdog"
    );

    Ok(())
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}
