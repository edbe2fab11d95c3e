//! Metric names and recording helpers for the mirroring dispatch engine.
//!
//! Split out of `mirroring-client` the same way `readyset-client-metrics` is
//! split out of `readyset-client`: the core shouldn't need to know which
//! [`metrics::Recorder`] is installed (Prometheus, a test no-op recorder, or
//! none at all), only that the calls below are cheap no-ops when nothing is
//! listening.

use mirroring_errors::OperationKind;

/// Metric name constants, exposed so a binary wiring up a recorder can describe them.
pub mod names {
    pub const SECONDARY_SUBMITTED: &str = "mirroring_secondary_submitted_total";
    pub const SECONDARY_SUCCEEDED: &str = "mirroring_secondary_succeeded_total";
    pub const SECONDARY_FAILED: &str = "mirroring_secondary_failed_total";
    pub const ADMISSION_DENIED: &str = "mirroring_admission_denied_total";
    pub const MISMATCH: &str = "mirroring_mismatch_total";
    pub const READ_MATCH: &str = "mirroring_read_match_total";
    pub const SECONDARY_READ_FAILED: &str = "mirroring_secondary_read_failed_total";
    pub const WRITE_ERROR_SINK_NOTIFIED: &str = "mirroring_write_error_sink_notified_total";
    pub const DISPATCH_LATENCY: &str = "mirroring_dispatch_latency_seconds";
    pub const SECONDARY_LATENCY: &str = "mirroring_secondary_latency_seconds";
}

fn kind_label(kind: OperationKind) -> &'static str {
    match kind {
        OperationKind::Exists => "exists",
        OperationKind::ExistsAll => "exists_all",
        OperationKind::Get => "get",
        OperationKind::GetList => "get_list",
        OperationKind::Scan => "scan",
        OperationKind::Put => "put",
        OperationKind::PutList => "put_list",
        OperationKind::Delete => "delete",
        OperationKind::DeleteList => "delete_list",
        OperationKind::Append => "append",
        OperationKind::Increment => "increment",
        OperationKind::MutateRow => "mutate_row",
        OperationKind::CheckAndMutate => "check_and_mutate",
        OperationKind::Batch => "batch",
    }
}

/// Recorded once per operation admitted for secondary dispatch.
pub fn record_secondary_submitted(kind: OperationKind) {
    metrics::counter!(names::SECONDARY_SUBMITTED, "operation" => kind_label(kind)).increment(1);
}

/// Recorded once the secondary execution for `kind` completes successfully.
pub fn record_secondary_succeeded(kind: OperationKind) {
    metrics::counter!(names::SECONDARY_SUCCEEDED, "operation" => kind_label(kind)).increment(1);
}

/// Recorded once the secondary execution for `kind` fails.
pub fn record_secondary_failed(kind: OperationKind) {
    metrics::counter!(names::SECONDARY_FAILED, "operation" => kind_label(kind)).increment(1);
}

/// Recorded when the flow controller denies admission for `kind`.
pub fn record_admission_denied(kind: OperationKind) {
    metrics::counter!(names::ADMISSION_DENIED, "operation" => kind_label(kind)).increment(1);
}

/// Recorded when the mismatch detector observes primary/secondary divergence for `kind`.
pub fn record_mismatch(kind: OperationKind) {
    metrics::counter!(names::MISMATCH, "operation" => kind_label(kind)).increment(1);
}

/// Recorded when a sampled read's primary and secondary results agree.
pub fn record_read_match(kind: OperationKind) {
    metrics::counter!(names::READ_MATCH, "operation" => kind_label(kind)).increment(1);
}

/// Recorded when a sampled read's secondary side fails outright, so there is nothing to compare.
pub fn record_secondary_read_failure(kind: OperationKind) {
    metrics::counter!(names::SECONDARY_READ_FAILED, "operation" => kind_label(kind)).increment(1);
}

/// Recorded each time the write-error sink is notified.
pub fn record_write_error_sink_notified(kind: OperationKind) {
    metrics::counter!(names::WRITE_ERROR_SINK_NOTIFIED, "operation" => kind_label(kind))
        .increment(1);
}

/// Records the wall-clock time, in seconds, the primary side of a dispatch took.
pub fn record_dispatch_latency(kind: OperationKind, seconds: f64) {
    metrics::histogram!(names::DISPATCH_LATENCY, "operation" => kind_label(kind)).record(seconds);
}

/// Records the wall-clock time, in seconds, the secondary side of a dispatch took.
pub fn record_secondary_latency(kind: OperationKind, seconds: f64) {
    metrics::histogram!(names::SECONDARY_LATENCY, "operation" => kind_label(kind))
        .record(seconds);
}
