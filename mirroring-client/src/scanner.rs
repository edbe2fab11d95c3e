//! The mirroring scanner (§4.4): a streaming scan that reads ahead from the primary and, when the
//! scan was sampled, advances a secondary scanner in lockstep, verifying each row pairwise.
//!
//! Unlike the point-read and batch paths, a scan is stateful across many calls to `next_row`, so
//! its outstanding verifications are tracked by a [`ReferenceCounter`] of the scanner's own rather
//! than the table's — `close` awaits that counter, not the table's, and only then releases the
//! single reference it holds on the table's counter for the scanner's lifetime (§3 Lifecycle).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use mirroring_errors::{MirroringError, MirroringResult, OperationKind};
use mirroring_util::shutdown::{Completion, ReferenceGuard};
use mirroring_util::ReferenceCounter;
use parking_lot::Mutex;
use tracing::Instrument;

use crate::backend::{RowScanner, TableHandle};
use crate::operation::{Operation, Row, Scan};
use crate::verification::Verifier;

/// A streaming scan fronting a primary and (if the scan was sampled) a secondary [`RowScanner`].
pub struct MirroringScanner<P: TableHandle, S: TableHandle> {
    primary: Arc<Mutex<P::Scanner>>,
    secondary: Option<Arc<Mutex<S::Scanner>>>,
    verifier: Verifier,
    scan_outstanding: ReferenceCounter,
    table_guard: Mutex<Option<ReferenceGuard>>,
    closed: AtomicBool,
    close_completion: Mutex<Option<Completion>>,
}

impl<P: TableHandle, S: TableHandle> MirroringScanner<P, S> {
    pub(crate) fn new(
        primary_scanner: P::Scanner,
        secondary_scanner: Option<S::Scanner>,
        verifier: Verifier,
        table_outstanding: ReferenceCounter,
    ) -> Self {
        let table_guard = table_outstanding.hold();
        MirroringScanner {
            primary: Arc::new(Mutex::new(primary_scanner)),
            secondary: secondary_scanner.map(|s| Arc::new(Mutex::new(s))),
            verifier,
            scan_outstanding: ReferenceCounter::new(),
            table_guard: Mutex::new(Some(table_guard)),
            closed: AtomicBool::new(false),
            close_completion: Mutex::new(None),
        }
    }

    /// Whether this scan is sampled, i.e. a secondary scanner was opened alongside the primary's.
    pub fn is_sampled(&self) -> bool {
        self.secondary.is_some()
    }

    /// Advances the primary scanner by one row and, if sampled, schedules a verification of the
    /// corresponding secondary row. Returns `None` once the primary is exhausted.
    #[tracing::instrument(skip(self))]
    pub async fn next_row(&self) -> MirroringResult<Option<Row>>
    where
        P: 'static,
        S: 'static,
    {
        let primary = self.primary.clone();
        let row = tokio::task::spawn_blocking(move || primary.lock().next_row())
            .await
            .map_err(|join_err| MirroringError::Interrupted(join_err.to_string()))?
            .map_err(|e| MirroringError::primary_message(OperationKind::Scan, e.to_string()))?;

        if let Some(row) = &row {
            self.schedule_verification(row.clone());
        }
        Ok(row)
    }

    /// Schedules the verification of one primary row against the next row the secondary scanner
    /// produces. A no-op if this scan was not sampled.
    fn schedule_verification(&self, primary_row: Row)
    where
        S: 'static,
    {
        let Some(secondary) = &self.secondary else {
            return;
        };
        let secondary = secondary.clone();
        let verifier = self.verifier.clone();
        let guard = self.scan_outstanding.hold();
        let key = primary_row.key.clone();

        tokio::spawn(
            async move {
                let secondary_result = match tokio::task::spawn_blocking(move || secondary.lock().next_row()).await {
                    Ok(inner) => inner,
                    Err(join_err) => Err(Box::new(join_err) as Box<dyn std::error::Error + Send + Sync>),
                };
                verifier.verify_scan_row(&key, &Some(primary_row), secondary_result);
                drop(guard);
            }
            .instrument(tracing::debug_span!("verify_scan_row")),
        );
    }

    /// Idempotent close (§4.4): every caller awaits the same drain of outstanding verifications;
    /// only the first caller actually releases the underlying scanners and the table-level
    /// reference this scan has held since [`crate::table::MirroringTable::get_scanner`].
    #[tracing::instrument(skip(self))]
    pub async fn close(&self) -> MirroringResult<()>
    where
        P: 'static,
        S: 'static,
    {
        let first_caller = !self.closed.swap(true, Ordering::SeqCst);
        let completion = {
            let mut slot = self.close_completion.lock();
            if let Some(completion) = slot.as_ref() {
                completion.clone()
            } else {
                let completion = self.scan_outstanding.close();
                *slot = Some(completion.clone());
                completion
            }
        };
        completion.wait().await;

        if first_caller {
            let primary = self.primary.clone();
            tokio::task::spawn_blocking(move || primary.lock().close())
                .await
                .map_err(|join_err| MirroringError::Interrupted(join_err.to_string()))?;

            if let Some(secondary) = self.secondary.clone() {
                let _ = tokio::task::spawn_blocking(move || secondary.lock().close()).await;
            }

            self.table_guard.lock().take();
        }
        Ok(())
    }
}

/// Builds the synthetic [`Operation::Scan`] used to report a scan-row comparison through the
/// Mismatch Detector, which is keyed on an [`Operation`] rather than a bare row.
pub(crate) fn scan_row_operation(key: &bytes::Bytes) -> Operation {
    Operation::Scan(Scan {
        start_row: key.clone(),
        stop_row: None,
        limit: Some(1),
    })
}
