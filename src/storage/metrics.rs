//! Operation metrics shared by link store backends.

use std::time::Instant;

use crate::Result;

/// Records `storage_operations_total` and `storage_operation_duration_ms`
/// for one store operation.
pub fn record_operation_metrics(
    backend: &'static str,
    operation: &'static str,
    start: Instant,
    status: &'static str,
) {
    metrics::counter!(
        "storage_operations_total",
        "backend" => backend,
        "operation" => operation,
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        "storage_operation_duration_ms",
        "backend" => backend,
        "operation" => operation,
        "status" => status
    )
    .record(start.elapsed().as_secs_f64() * 1000.0);
}

/// Metrics status label for an operation outcome.
///
/// A missing shell is an expected outcome, so it is kept apart from errors.
pub const fn status_of<T>(result: &Result<T>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(crate::Error::NotFound(_)) => "not_found",
        Err(crate::Error::InvalidInput(_)) => "invalid",
        Err(crate::Error::OperationFailed { .. }) => "error",
    }
}
