//! The backend handle contract (§6): the collaborator interface implemented once per concrete
//! store (the real primary, the real secondary, or — in tests — [`crate::test_support`]'s
//! in-memory stand-in).
//!
//! Everything funnels through [`TableHandle::batch`]: per the design notes (§9), dynamic dispatch
//! over operation kinds is a tagged enum with one dispatch point, not a method per operation kind.
//! `batch` is called with a single-element slice for point reads and single writes alike.

use std::error::Error as StdError;

use crate::operation::{Operation, OperationResult, Scan};

/// The outcome of a `batch` call on a backend: one slot per input operation, always filled
/// best-effort, plus an optional terminal error if the call itself failed partway through.
///
/// Mirrors the Java HBase contract the design is modeled on, where a batch call may throw after
/// having already populated some of the caller's result array.
#[derive(Debug)]
pub struct BatchOutcome<E> {
    pub results: Vec<Result<OperationResult, E>>,
    pub error: Option<E>,
}

impl<E> BatchOutcome<E> {
    pub fn ok(results: Vec<Result<OperationResult, E>>) -> Self {
        BatchOutcome {
            results,
            error: None,
        }
    }

    /// Extracts the single slot of a one-element batch, preferring the slot's own error, then the
    /// batch-level error, then the slot's success.
    pub fn into_single(mut self) -> Result<OperationResult, E>
    where
        E: StdError,
    {
        match self.results.pop() {
            Some(Ok(result)) => match self.error {
                Some(err) => Err(err),
                None => Ok(result),
            },
            Some(Err(err)) => Err(err),
            None => match self.error {
                Some(err) => Err(err),
                None => unreachable!("batch called with one operation returned zero slots"),
            },
        }
    }
}

/// A cursor over the rows matched by an open [`Scan`]. Implementations are free to buffer ahead
/// internally; `next_row` is called synchronously from a blocking-pool task.
pub trait RowScanner: Send {
    fn next_row(&mut self) -> Result<Option<crate::operation::Row>, Box<dyn StdError + Send + Sync>>;

    fn close(&mut self) {}
}

/// A synchronous handle to one backend (primary or secondary). The mirroring engine never mutates
/// or assumes interior mutability of this handle beyond what the backend's own contract provides —
/// it is required to be `Send + Sync` so it can be shared across the blocking-pool tasks the
/// [`crate::secondary::SecondaryAsyncAdapter`] schedules work onto.
pub trait TableHandle: Send + Sync + 'static {
    type Error: StdError + Send + Sync + From<crate::secondary::PanicError> + 'static;
    type Scanner: RowScanner + 'static;

    /// Executes `ops` against the backend, filling one result slot per operation.
    fn batch(&self, ops: &[Operation]) -> BatchOutcome<Self::Error>;

    /// Opens a streaming cursor over `scan`.
    fn open_scanner(&self, scan: &Scan) -> Result<Self::Scanner, Self::Error>;

    /// Releases any resources held by this handle. Called at most once per handle, from
    /// [`crate::table::MirroringTable::close`].
    fn close(&self) -> Result<(), Self::Error>;
}
