//! A dual-write mirroring client: a table-level dispatcher that fronts a primary backend and
//! shadows operations to a secondary backend without letting the secondary's latency or
//! availability affect the caller.
//!
//! The entry point is [`table::MirroringTable`]. Backends plug in by implementing
//! [`backend::TableHandle`]; everything else (sampling, admission, verification, write-loss
//! reporting) is a collaborator trait with a bundled default, following the same
//! wire-it-yourself-or-take-the-default shape the upstream-database adapters in this workspace's
//! sibling crates use.

pub mod backend;
pub mod batch;
pub mod config;
pub mod flow_control;
pub mod mismatch;
pub mod operation;
pub mod sampler;
pub mod scanner;
pub mod secondary;
pub mod table;
pub mod verification;
pub mod write_sink;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use backend::{BatchOutcome, RowScanner, TableHandle};
pub use config::MirroringTableConfig;
pub use flow_control::{FlowController, Reservation, SemaphoreFlowController, UnboundedFlowController};
pub use mismatch::{LoggingMismatchDetector, MismatchDetector};
pub use mirroring_errors::{MirroringError, MirroringResult, OperationKind};
pub use operation::{Operation, OperationResult};
pub use sampler::{AlwaysSample, NeverSample, RatioSampler, ReadSampler};
pub use scanner::MirroringScanner;
pub use table::MirroringTable;
pub use write_sink::{DiscardingWriteErrorSink, LoggingWriteErrorSink, WriteErrorSink, WriteSinkError};
