//! Prometheus exporter.

use std::net::{Ipv4Addr, SocketAddr};
use std::thread;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};

use crate::config::MetricsConfig;
use crate::{Error, Result};

/// Installs the Prometheus recorder and its HTTP listener.
///
/// Returns `None` when metrics are disabled; metric macros are then no-ops.
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] if a recorder is already installed or
/// the listener cannot be started.
pub fn install_prometheus(config: &MetricsConfig) -> Result<Option<PrometheusHandle>> {
    if !config.enabled {
        return Ok(None);
    }

    let listen_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.port));
    let handle = install_listener(PrometheusBuilder::new().with_http_listener(listen_addr))?;
    describe_metrics();
    tracing::info!(%listen_addr, "Prometheus exporter listening");
    Ok(Some(handle))
}

/// Registers help text for the metrics this crate emits.
pub fn describe_metrics() {
    metrics::describe_counter!(
        "storage_operations_total",
        "Link store operations by backend, operation and status"
    );
    metrics::describe_histogram!(
        "storage_operation_duration_ms",
        metrics::Unit::Milliseconds,
        "Link store operation latency"
    );
    metrics::describe_counter!("lookup_searches_total", "Searches run by the lookup engine");
    metrics::describe_histogram!(
        "lookup_results_returned",
        metrics::Unit::Count,
        "Identifiers returned per search page"
    );
    metrics::describe_counter!(
        "discovery_validation_failures_total",
        "Requests rejected before reaching the store"
    );
}

fn install_listener(builder: PrometheusBuilder) -> Result<PrometheusHandle> {
    if let Ok(handle) = tokio::runtime::Handle::try_current() {
        return install_with_runtime(builder, &handle);
    }
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::OperationFailed {
            operation: "metrics_runtime_init".to_string(),
            cause: e.to_string(),
        })?;
    let handle = runtime.handle().clone();
    let prometheus = install_with_runtime(builder, &handle)?;
    thread::Builder::new()
        .name("metrics-exporter-prometheus-http".to_string())
        .spawn(move || runtime.block_on(std::future::pending::<()>()))
        .map_err(|e| Error::OperationFailed {
            operation: "metrics_runtime_thread".to_string(),
            cause: e.to_string(),
        })?;
    Ok(prometheus)
}

fn install_with_runtime(
    builder: PrometheusBuilder,
    runtime_handle: &tokio::runtime::Handle,
) -> Result<PrometheusHandle> {
    let (recorder, exporter) = {
        let _guard = runtime_handle.enter();
        builder.build().map_err(|e| Error::OperationFailed {
            operation: "metrics_exporter_build".to_string(),
            cause: e.to_string(),
        })?
    };
    let handle = recorder.handle();
    set_global_recorder(recorder)?;
    runtime_handle.spawn(exporter);
    Ok(handle)
}

fn set_global_recorder(recorder: PrometheusRecorder) -> Result<()> {
    metrics::set_global_recorder(recorder).map_err(|e| Error::OperationFailed {
        operation: "metrics_recorder_install".to_string(),
        cause: e.to_string(),
    })
}
