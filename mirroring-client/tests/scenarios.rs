//! Integration tests exercising the scenarios of §8 end-to-end against
//! [`mirroring_client::test_support::MockTableHandle`], through the public `MirroringTable` API
//! rather than its internal collaborators.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use mirroring_client::backend::{BatchOutcome, TableHandle};
use mirroring_client::mismatch::MismatchDetector;
use mirroring_client::operation::{Amount, Cell, CheckAndMutate, Increment, Modification, Operation, OperationResult, Predicate, Row, WriteOperationInfo};
use mirroring_client::test_support::{MockError, MockTableHandle};
use mirroring_client::write_sink::{WriteErrorSink, WriteSinkError};
use mirroring_client::{FlowController, MirroringTable, Reservation, UnboundedFlowController};
use parking_lot::Mutex;

#[derive(Default)]
struct RecordingMismatchDetector {
    compared: Mutex<Vec<(Operation, OperationResult, OperationResult)>>,
    secondary_failed: Mutex<Vec<Operation>>,
}

impl MismatchDetector for RecordingMismatchDetector {
    fn on_compared(&self, operation: &Operation, primary: &OperationResult, secondary: &OperationResult) {
        self.compared
            .lock()
            .push((operation.clone(), primary.clone(), secondary.clone()));
    }

    fn on_secondary_read_failed(&self, operation: &Operation, _error: &(dyn std::error::Error + 'static)) {
        self.secondary_failed.lock().push(operation.clone());
    }
}

#[derive(Default)]
struct RecordingWriteErrorSink {
    notified: Mutex<Vec<WriteOperationInfo>>,
}

impl WriteErrorSink for RecordingWriteErrorSink {
    fn on_write_not_mirrored(&self, info: &WriteOperationInfo, _error: &WriteSinkError) {
        self.notified.lock().push(info.clone());
    }
}

/// A secondary [`TableHandle`] that sleeps before delegating, used to give close()'s drain
/// something to actually wait on (scenario 7).
struct SlowSecondary {
    inner: MockTableHandle,
    delay: Duration,
}

impl TableHandle for SlowSecondary {
    type Error = MockError;
    type Scanner = <MockTableHandle as TableHandle>::Scanner;

    fn batch(&self, ops: &[Operation]) -> BatchOutcome<Self::Error> {
        std::thread::sleep(self.delay);
        self.inner.batch(ops)
    }

    fn open_scanner(&self, scan: &mirroring_client::operation::Scan) -> Result<Self::Scanner, Self::Error> {
        self.inner.open_scanner(scan)
    }

    fn close(&self) -> Result<(), Self::Error> {
        self.inner.close()
    }
}

struct DenyAllFlowController;

#[async_trait::async_trait]
impl FlowController for DenyAllFlowController {
    async fn acquire(&self, _description: mirroring_client::operation::RequestResourcesDescription) -> Option<Reservation> {
        None
    }
}

fn row(key: &str, value: &str) -> Row {
    Row::new(key).with_cell(Cell::new("cf", "c", value))
}

/// Scenario 1: a simple put is mirrored byte-for-byte, with no write-error-sink call.
#[tokio::test]
async fn simple_put_is_mirrored_with_no_sink_call() {
    let primary = MockTableHandle::new();
    let secondary = MockTableHandle::new();
    let sink = Arc::new(RecordingWriteErrorSink::default());

    let table = MirroringTable::builder(primary, secondary.clone())
        .write_error_sink(sink.clone())
        .build();

    table.put(row("r1", "v")).await.unwrap();
    table.close().await.unwrap().wait().await;

    assert_eq!(secondary.row(&Bytes::from_static(b"r1")), Some(row("r1", "v")));
    assert!(sink.notified.lock().is_empty());
}

/// Scenario 2: a sampled get whose primary and secondary agree reports a match, not a mismatch.
#[tokio::test]
async fn sampled_get_match_reports_no_mismatch() {
    let primary = MockTableHandle::new();
    primary.put_row(row("r1", "v"));
    let secondary = MockTableHandle::new();
    secondary.put_row(row("r1", "v"));

    let detector = Arc::new(RecordingMismatchDetector::default());
    let table = MirroringTable::builder(primary, secondary)
        .mismatch_detector(detector.clone())
        .build();

    let result = table.get(Bytes::from_static(b"r1")).await.unwrap();
    assert_eq!(result, Some(row("r1", "v")));
    table.close().await.unwrap().wait().await;

    let compared = detector.compared.lock();
    assert_eq!(compared.len(), 1);
    assert_eq!(compared[0].1, compared[0].2, "primary and secondary results should have matched");
}

/// Scenario 3: a sampled get whose secondary diverges still returns the primary's value to the
/// caller, and reports the mismatch.
#[tokio::test]
async fn sampled_get_mismatch_still_returns_primary_value() {
    let primary = MockTableHandle::new();
    primary.put_row(row("r1", "v"));
    let secondary = MockTableHandle::new();
    secondary.put_row(row("r1", "v-prime"));

    let detector = Arc::new(RecordingMismatchDetector::default());
    let table = MirroringTable::builder(primary, secondary)
        .mismatch_detector(detector.clone())
        .build();

    let result = table.get(Bytes::from_static(b"r1")).await.unwrap();
    assert_eq!(result, Some(row("r1", "v")), "caller must see the primary's value");
    table.close().await.unwrap().wait().await;

    let compared = detector.compared.lock();
    assert_eq!(compared.len(), 1);
    assert_ne!(compared[0].1, compared[0].2, "mismatch detector should see the divergence");
}

/// Scenario 4: a batch with one primary failure still forwards the successful slots to the
/// secondary, and the write-error sink is untouched.
#[tokio::test]
async fn batch_with_partial_primary_failure_forwards_successes() {
    let primary = MockTableHandle::new();
    primary.fail_next_for_key(Bytes::from_static(b"b"));
    let secondary = MockTableHandle::new();
    let sink = Arc::new(RecordingWriteErrorSink::default());

    let table = MirroringTable::builder(primary, secondary.clone())
        .write_error_sink(sink.clone())
        .build();

    let ops = vec![
        Operation::Put(row("a", "1")),
        Operation::Put(row("b", "2")),
        Operation::Put(row("c", "3")),
    ];
    let results = table.batch(ops).await.unwrap();
    assert!(results[0].is_ok());
    assert!(results[1].is_err(), "b's primary write was made to fail");
    assert!(results[2].is_ok());

    table.close().await.unwrap().wait().await;

    assert_eq!(secondary.row(&Bytes::from_static(b"a")), Some(row("a", "1")));
    assert_eq!(secondary.row(&Bytes::from_static(b"b")), None, "the failed slot must not be forwarded");
    assert_eq!(secondary.row(&Bytes::from_static(b"c")), Some(row("c", "3")));
    assert!(sink.notified.lock().is_empty());
}

/// Scenario 5: a batch whose secondary write for one forwarded slot fails notifies the
/// write-error sink exactly once, with the caller's view unaffected.
#[tokio::test]
async fn batch_with_secondary_failure_notifies_sink_once() {
    let primary = MockTableHandle::new();
    let secondary = MockTableHandle::new();
    secondary.fail_next_for_key(Bytes::from_static(b"c"));
    let sink = Arc::new(RecordingWriteErrorSink::default());

    let table = MirroringTable::builder(primary, secondary)
        .write_error_sink(sink.clone())
        .build();

    let ops = vec![Operation::Put(row("a", "1")), Operation::Put(row("c", "3"))];
    let results = table.batch(ops).await.unwrap();
    assert!(results.iter().all(Result::is_ok), "the caller only ever sees the primary's results");

    table.close().await.unwrap().wait().await;

    let notified = sink.notified.lock();
    assert_eq!(notified.len(), 1);
    assert_eq!(notified[0].operations, vec![Operation::Put(row("c", "3"))]);
}

/// Scenario 6: an increment's caller-visible result is the accumulated value; the secondary only
/// ever sees the equivalent `Put`.
#[tokio::test]
async fn increment_rewrites_to_put_on_the_secondary() {
    let primary = MockTableHandle::new();
    let secondary = MockTableHandle::new();

    let table = MirroringTable::builder(primary, secondary.clone()).build();

    let resulting_row = table
        .increment(Increment {
            key: Bytes::from_static(b"r"),
            amounts: vec![Amount {
                family: Bytes::from_static(b"cf"),
                qualifier: Bytes::from_static(b"c"),
                delta: 5,
            }],
        })
        .await
        .unwrap();
    assert_eq!(resulting_row.cells[0].value, Bytes::from_static(b"5"));

    table.close().await.unwrap().wait().await;

    let mirrored = secondary.row(&Bytes::from_static(b"r")).expect("secondary should have the rewritten Put");
    assert_eq!(mirrored.cells[0].value, Bytes::from_static(b"5"));
}

/// Scenario 7: close() returns a completion that only resolves once the in-flight secondary
/// submission finishes.
#[tokio::test]
async fn close_awaits_outstanding_secondary_work() {
    let primary = MockTableHandle::new();
    let secondary = SlowSecondary {
        inner: MockTableHandle::new(),
        delay: Duration::from_millis(300),
    };

    let table = MirroringTable::builder(primary, secondary).build();
    table.put(row("r1", "v")).await.unwrap();

    let completion = table.close().await.unwrap();

    let too_soon = tokio::time::timeout(Duration::from_millis(50), completion.wait()).await;
    assert!(too_soon.is_err(), "completion resolved before the slow secondary finished");

    tokio::time::timeout(Duration::from_secs(2), completion.wait())
        .await
        .expect("completion should resolve once the secondary drains");
}

/// Scenario 8 lives in `mirroring_client::config`'s own unit tests; configuration validation has
/// no table-level behavior to exercise here.

/// Scenario 9: an admission denial on a write's secondary reservation still returns the primary's
/// success to the caller, notifies the sink once, and never reaches the secondary.
#[tokio::test]
async fn admission_denial_on_write_notifies_sink_without_reaching_secondary() {
    let primary = MockTableHandle::new();
    let secondary = MockTableHandle::new();
    let sink = Arc::new(RecordingWriteErrorSink::default());

    let table = MirroringTable::builder(primary, secondary.clone())
        .flow_controller(Arc::new(DenyAllFlowController))
        .write_error_sink(sink.clone())
        .build();

    table.put(row("r1", "v")).await.unwrap();
    table.close().await.unwrap().wait().await;

    assert_eq!(secondary.row(&Bytes::from_static(b"r1")), None);
    assert_eq!(sink.notified.lock().len(), 1);
}

/// Invariant 6: a `CheckAndMutate` whose predicate does not match produces zero secondary
/// submissions.
#[tokio::test]
async fn check_and_mutate_with_unmatched_predicate_does_not_mirror() {
    let primary = MockTableHandle::new();
    let secondary = MockTableHandle::new();

    let table = MirroringTable::builder(primary, secondary.clone()).build();

    let matched = table
        .check_and_mutate(CheckAndMutate {
            key: Bytes::from_static(b"r1"),
            predicate: Predicate {
                family: Bytes::from_static(b"cf"),
                qualifier: Bytes::from_static(b"c"),
                expected_value: Some(Bytes::from_static(b"expected")),
            },
            mutations: vec![Modification::Put(Cell::new("cf", "c", "new"))],
        })
        .await
        .unwrap();

    assert!(!matched, "the row doesn't exist, so the predicate (expecting a value) cannot match");
    table.close().await.unwrap().wait().await;
    assert_eq!(secondary.row(&Bytes::from_static(b"r1")), None);
}

/// Invariant 2: if the primary raises, the secondary is never invoked.
#[tokio::test]
async fn primary_failure_never_reaches_the_secondary() {
    let primary = MockTableHandle::new();
    primary.fail_next_for_key(Bytes::from_static(b"r1"));
    let secondary = MockTableHandle::new();

    let table = MirroringTable::builder(primary, secondary.clone()).build();

    let result = table.put(row("r1", "v")).await;
    assert!(result.is_err());
    table.close().await.unwrap().wait().await;

    assert_eq!(secondary.row(&Bytes::from_static(b"r1")), None);
}

/// [`UnboundedFlowController`] remains usable directly from the integration suite, exercising the
/// builder's default collaborator wiring end-to-end rather than only via unit tests.
#[tokio::test]
async fn unbounded_flow_controller_is_the_default() {
    let primary = MockTableHandle::new();
    let secondary = MockTableHandle::new();
    let table = MirroringTable::builder(primary, secondary.clone())
        .flow_controller(Arc::new(UnboundedFlowController))
        .build();

    table.put(row("r1", "v")).await.unwrap();
    table.close().await.unwrap().wait().await;
    assert_eq!(secondary.row(&Bytes::from_static(b"r1")), Some(row("r1", "v")));
}
