//! The mismatch detector (§4.4): compares primary and secondary read results and reports
//! divergence. The dispatcher never fails a caller-visible read because of a mismatch — only the
//! primary's result is ever returned.

use mirroring_errors::OperationKind;

use crate::operation::{Operation, OperationResult};

/// Told about every sampled read once both the primary's and the secondary's results are known.
pub trait MismatchDetector: Send + Sync + 'static {
    fn on_compared(&self, operation: &Operation, primary: &OperationResult, secondary: &OperationResult);

    /// The secondary read failed outright; there is nothing to compare.
    fn on_secondary_read_failed(&self, operation: &Operation, error: &(dyn std::error::Error + 'static)) {
        let _ = (operation, error);
    }
}

/// The bundled default: logs a structured warning on divergence, a structured error on secondary
/// read failure, and increments the mismatch counter either way. Mirrors how the teacher's
/// upstream adapters log divergent replies rather than fail the caller's request.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingMismatchDetector;

impl MismatchDetector for LoggingMismatchDetector {
    fn on_compared(&self, operation: &Operation, primary: &OperationResult, secondary: &OperationResult) {
        let kind = operation.kind();
        if results_match(primary, secondary) {
            mirroring_client_metrics::record_read_match(kind);
            return;
        }
        mirroring_client_metrics::record_mismatch(kind);
        tracing::warn!(
            operation_kind = %kind,
            primary = %primary,
            secondary = %secondary,
            "mirrored read diverged between primary and secondary"
        );
    }

    fn on_secondary_read_failed(&self, operation: &Operation, error: &(dyn std::error::Error + 'static)) {
        let kind = operation.kind();
        mirroring_client_metrics::record_secondary_read_failure(kind);
        tracing::error!(operation_kind = %kind, %error, "secondary read failed during sampled comparison");
    }
}

fn results_match(primary: &OperationResult, secondary: &OperationResult) -> bool {
    primary == secondary
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn identical_results_match() {
        let a = OperationResult::Bool(true);
        let b = OperationResult::Bool(true);
        assert!(results_match(&a, &b));
    }

    #[test]
    fn differing_results_do_not_match() {
        let a = OperationResult::Bool(true);
        let b = OperationResult::Bool(false);
        assert!(!results_match(&a, &b));
    }

    #[test]
    fn detector_does_not_panic_on_mismatch_or_failure() {
        let detector = LoggingMismatchDetector;
        let op = Operation::Exists(Bytes::from_static(b"row"));
        detector.on_compared(&op, &OperationResult::Bool(true), &OperationResult::Bool(false));
        let err: Box<dyn std::error::Error> = "boom".into();
        detector.on_secondary_read_failed(&op, err.as_ref());
    }
}
