//! Bridges a synchronous [`TableHandle`] (the secondary) onto the async dispatcher.
//!
//! The secondary is, per the design, a collaborator the dispatcher never blocks the caller on: its
//! `batch` call runs on the blocking pool via [`tokio::task::spawn_blocking`], and the dispatcher
//! only ever awaits it from inside a detached [`tokio::spawn`]'d continuation — never inline on the
//! primary's return path.

use std::sync::Arc;
use std::time::Instant;

use mirroring_errors::OperationKind;
use mirroring_util::ReferenceCounter;
use tracing::Instrument;

use crate::backend::{BatchOutcome, TableHandle};
use crate::operation::{Operation, Scan};

/// Wraps the secondary [`TableHandle`]. Holds a clone of the owning
/// [`crate::table::MirroringTable`]'s [`ReferenceCounter`] so that every dispatched call is
/// visible to `close()`'s drain, without the adapter needing a counter of its own.
pub struct SecondaryAsyncAdapter<S: TableHandle> {
    handle: Arc<S>,
    outstanding: ReferenceCounter,
}

impl<S: TableHandle> SecondaryAsyncAdapter<S> {
    pub fn new(handle: S, outstanding: ReferenceCounter) -> Self {
        SecondaryAsyncAdapter {
            handle: Arc::new(handle),
            outstanding,
        }
    }

    pub fn outstanding(&self) -> &ReferenceCounter {
        &self.outstanding
    }

    /// Runs `ops` against the secondary on the blocking pool, holding a reference for the
    /// duration of the call so a concurrent close can observe it as outstanding work.
    ///
    /// The returned future is meant to be awaited from inside a task the caller has already
    /// detached (via `tokio::spawn`) — this method does not spawn on its own, so that a
    /// not-yet-admitted reservation and the eventual dispatch stay decoupled per the design's
    /// "admission strictly precedes dispatch construction" ordering.
    pub async fn dispatch(&self, kind: OperationKind, ops: Vec<Operation>) -> BatchOutcome<S::Error> {
        let handle = self.handle.clone();
        let guard = self.outstanding.hold();
        let span = tracing::debug_span!("secondary_dispatch", operation_kind = %kind, count = ops.len());
        let start = Instant::now();

        mirroring_client_metrics::record_secondary_submitted(kind);
        let outcome = async move {
            tokio::task::spawn_blocking(move || handle.batch(&ops))
                .await
                .unwrap_or_else(|_join_err| {
                    let mut outcome = BatchOutcome::ok(vec![]);
                    outcome.error = Some(S::Error::from(PanicError));
                    outcome
                })
        }
        .instrument(span)
        .await;

        mirroring_client_metrics::record_secondary_latency(kind, start.elapsed().as_secs_f64());
        if outcome.error.is_some() || outcome.results.iter().any(Result::is_err) {
            mirroring_client_metrics::record_secondary_failed(kind);
        } else {
            mirroring_client_metrics::record_secondary_succeeded(kind);
        }

        drop(guard);
        outcome
    }

    /// Opens a secondary-side scan cursor on the blocking pool, for [`crate::scanner::MirroringScanner`].
    pub async fn open_scanner(&self, scan: Scan) -> Result<S::Scanner, S::Error> {
        let handle = self.handle.clone();
        tokio::task::spawn_blocking(move || handle.open_scanner(&scan))
            .await
            .unwrap_or_else(|_join_err| Err(S::Error::from(PanicError)))
    }

    /// Releases the secondary handle, on the blocking pool like every other call into it. Called at
    /// most once, from `MirroringTable::close`, alongside the primary's own close.
    pub async fn close(&self) -> Result<(), S::Error> {
        let handle = self.handle.clone();
        tokio::task::spawn_blocking(move || handle.close())
            .await
            .unwrap_or_else(|_join_err| Err(S::Error::from(PanicError)))
    }
}

impl<S: TableHandle> Clone for SecondaryAsyncAdapter<S> {
    fn clone(&self) -> Self {
        SecondaryAsyncAdapter {
            handle: self.handle.clone(),
            outstanding: self.outstanding.clone(),
        }
    }
}

/// A placeholder error used to fold a blocking-pool panic into a backend's own error type. Backend
/// implementations that want a descriptive message should implement `From<PanicError>` themselves;
/// the mock in [`crate::test_support`] does.
#[derive(Debug, Clone, Copy, Default)]
pub struct PanicError;

impl std::fmt::Display for PanicError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "secondary backend task panicked")
    }
}

impl std::error::Error for PanicError {}
