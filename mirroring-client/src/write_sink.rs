//! The write-error sink (§4.5): told about writes that could not be mirrored to the secondary,
//! after the fact and off the caller's path.

use mirroring_errors::OperationKind;

use crate::operation::WriteOperationInfo;

/// Why a write's secondary side never completed.
#[derive(Debug)]
pub enum WriteSinkError {
    /// The flow controller denied admission before dispatch was attempted.
    AdmissionDenied,
    /// The secondary backend raised an error while applying the write.
    SecondaryFailed(Box<dyn std::error::Error + Send + Sync>),
    /// The secondary dispatch was cancelled by a concurrent close.
    Cancelled,
}

impl std::fmt::Display for WriteSinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteSinkError::AdmissionDenied => write!(f, "admission denied"),
            WriteSinkError::SecondaryFailed(e) => write!(f, "secondary failed: {e}"),
            WriteSinkError::Cancelled => write!(f, "cancelled by close"),
        }
    }
}

/// `mirroring.write-error-sink`: notified, best-effort, about every write operation whose
/// secondary mirroring did not succeed. Notification is advisory — losing one is not itself an
/// error condition for the caller.
pub trait WriteErrorSink: Send + Sync + 'static {
    fn on_write_not_mirrored(&self, info: &WriteOperationInfo, error: &WriteSinkError);
}

/// The bundled default: logs a structured warning and increments a counter. Most deployments that
/// care about lost writes plug in something that re-queues them instead; this is the safe
/// fallback for the ones that don't.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingWriteErrorSink;

impl WriteErrorSink for LoggingWriteErrorSink {
    fn on_write_not_mirrored(&self, info: &WriteOperationInfo, error: &WriteSinkError) {
        mirroring_client_metrics::record_write_error_sink_notified(info.kind);
        tracing::warn!(
            operation_kind = %info.kind,
            operation_count = info.resource_description.operation_count,
            %error,
            "write not mirrored to secondary"
        );
    }
}

/// A sink that discards every notification. Matches a deployment that has explicitly decided lost
/// secondary writes are acceptable (e.g. best-effort cache warming).
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardingWriteErrorSink;

impl WriteErrorSink for DiscardingWriteErrorSink {
    fn on_write_not_mirrored(&self, _info: &WriteOperationInfo, _error: &WriteSinkError) {}
}
