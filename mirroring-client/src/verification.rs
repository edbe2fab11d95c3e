//! The verification continuation factory (§4.2, §9): produces the callback run once a secondary
//! result (or failure) is known, dispatching to the Mismatch Detector for reads and the
//! Write-Error Sink for writes.

use std::sync::Arc;

use mirroring_errors::OperationKind;

use crate::mismatch::MismatchDetector;
use crate::operation::{Operation, OperationResult, RequestResourcesDescription, WriteOperationInfo};
use crate::write_sink::{WriteErrorSink, WriteSinkError};

/// Bundles the two collaborators a verification continuation needs. Cheap to clone: both fields
/// are `Arc`s, matching how the dispatcher shares them across every detached continuation.
#[derive(Clone)]
pub struct Verifier {
    mismatch_detector: Arc<dyn MismatchDetector>,
    write_error_sink: Arc<dyn WriteErrorSink>,
}

impl Verifier {
    pub fn new(mismatch_detector: Arc<dyn MismatchDetector>, write_error_sink: Arc<dyn WriteErrorSink>) -> Self {
        Verifier {
            mismatch_detector,
            write_error_sink,
        }
    }

    /// The read-verification continuation (§4.2 step 3): compares `primary_result` against
    /// whatever the secondary produced for `op`, or reports an outright secondary failure.
    pub fn verify_read<E: std::error::Error + 'static>(
        &self,
        op: &Operation,
        primary_result: &OperationResult,
        secondary_outcome: Result<OperationResult, E>,
    ) {
        match secondary_outcome {
            Ok(secondary_result) => self
                .mismatch_detector
                .on_compared(op, primary_result, &secondary_result),
            Err(error) => self
                .mismatch_detector
                .on_secondary_read_failed(op, &error),
        }
    }

    /// The write-verification continuation: notifies the Write-Error Sink with the *original*
    /// operation (never the rewritten `Put`) if the secondary failed.
    pub fn verify_write<E: std::error::Error + Send + Sync + 'static>(
        &self,
        original_op: Operation,
        kind: OperationKind,
        secondary_outcome: Result<OperationResult, E>,
    ) {
        if let Err(error) = secondary_outcome {
            let info = WriteOperationInfo {
                resource_description: RequestResourcesDescription::for_operation(&original_op),
                operations: vec![original_op],
                kind,
            };
            self.write_error_sink
                .on_write_not_mirrored(&info, &WriteSinkError::SecondaryFailed(Box::new(error)));
        }
    }

    /// The scan-row verification continuation (§4.4): compares one primary-delivered row against
    /// whatever the secondary scanner's next row was, keyed by row rather than by a shared
    /// `Operation` (a streaming scan doesn't address operations one at a time).
    pub fn verify_scan_row<E: std::error::Error + 'static>(
        &self,
        key: &bytes::Bytes,
        primary_row: &Option<crate::operation::Row>,
        secondary_outcome: Result<Option<crate::operation::Row>, E>,
    ) {
        let op = crate::scanner::scan_row_operation(key);
        let primary_result = OperationResult::Row(primary_row.clone());
        match secondary_outcome {
            Ok(secondary_row) => self
                .mismatch_detector
                .on_compared(&op, &primary_result, &OperationResult::Row(secondary_row)),
            Err(error) => self.mismatch_detector.on_secondary_read_failed(&op, &error),
        }
    }

    /// Notifies the Write-Error Sink that a write never reached the secondary because admission
    /// was denied before dispatch.
    pub fn notify_admission_denied(&self, original_op: Operation, kind: OperationKind) {
        let info = WriteOperationInfo {
            resource_description: RequestResourcesDescription::for_operation(&original_op),
            operations: vec![original_op],
            kind,
        };
        self.write_error_sink
            .on_write_not_mirrored(&info, &WriteSinkError::AdmissionDenied);
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::mismatch::LoggingMismatchDetector;
    use crate::write_sink::LoggingWriteErrorSink;

    fn verifier() -> Verifier {
        Verifier::new(Arc::new(LoggingMismatchDetector), Arc::new(LoggingWriteErrorSink))
    }

    #[test]
    fn verify_read_does_not_panic_on_match_or_mismatch_or_failure() {
        let v = verifier();
        let op = Operation::Get(Bytes::from_static(b"r"));
        v.verify_read::<std::convert::Infallible>(&op, &OperationResult::Unit, Ok(OperationResult::Unit));

        let err: Result<OperationResult, Box<dyn std::error::Error>> = Err("boom".into());
        v.verify_read(&op, &OperationResult::Unit, err);
    }

    #[test]
    fn verify_write_only_notifies_on_failure() {
        let v = verifier();
        let op = Operation::Put(crate::operation::Row::new("r"));
        v.verify_write::<std::convert::Infallible>(op.clone(), OperationKind::Put, Ok(OperationResult::Unit));

        let err: Result<OperationResult, Box<dyn std::error::Error + Send + Sync>> = Err("boom".into());
        v.verify_write(op, OperationKind::Put, err);
    }

    #[test]
    fn verify_scan_row_does_not_panic_on_match_mismatch_or_failure() {
        let v = verifier();
        let key = Bytes::from_static(b"r");
        let row = Some(crate::operation::Row::new("r"));
        v.verify_scan_row::<std::convert::Infallible>(&key, &row, Ok(row.clone()));
        v.verify_scan_row::<std::convert::Infallible>(&key, &row, Ok(None));

        let err: Result<Option<crate::operation::Row>, Box<dyn std::error::Error>> = Err("boom".into());
        v.verify_scan_row(&key, &row, err);
    }
}
