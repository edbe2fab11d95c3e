//! The error taxonomy shared by every crate in the mirroring client.
//!
//! [`MirroringError`] has one variant per failure class named in the design:
//! primary failure, admission failure, secondary failure, configuration
//! validation failure, and close failure. Secondary failures are advisory —
//! they never become a [`MirroringError::Primary`] — but they still need a
//! concrete type so the write-error sink and the logs can report on them.

use std::fmt;

use thiserror::Error;

/// The kind of table operation an error or a write-error-sink notification is about.
///
/// This is deliberately flat rather than carrying the operation's payload: the
/// sink and the logs want to know *what kind* of thing failed to mirror, not
/// re-parse the row out of the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Exists,
    ExistsAll,
    Get,
    GetList,
    Scan,
    Put,
    PutList,
    Delete,
    DeleteList,
    Append,
    Increment,
    MutateRow,
    CheckAndMutate,
    Batch,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperationKind::Exists => "exists",
            OperationKind::ExistsAll => "existsAll",
            OperationKind::Get => "get",
            OperationKind::GetList => "getList",
            OperationKind::Scan => "scan",
            OperationKind::Put => "put",
            OperationKind::PutList => "putList",
            OperationKind::Delete => "delete",
            OperationKind::DeleteList => "deleteList",
            OperationKind::Append => "append",
            OperationKind::Increment => "increment",
            OperationKind::MutateRow => "mutateRow",
            OperationKind::CheckAndMutate => "checkAndMutate",
            OperationKind::Batch => "batch",
        };
        f.write_str(s)
    }
}

/// Errors surfaced by the mirroring dispatch engine.
///
/// Only [`MirroringError::Primary`], [`MirroringError::Unsupported`], and
/// [`MirroringError::Config`] are ever returned to a caller of
/// [`MirroringTable`](../mirroring_client/struct.MirroringTable.html); the rest
/// describe secondary-side or close-time failures that are reported through the
/// write-error sink or the close-completion handle, never via `?` from a
/// dispatcher method that also invoked the primary successfully.
#[derive(Debug, Error)]
pub enum MirroringError {
    /// The primary backend raised an error for `op`. Returned to the caller verbatim.
    #[error("primary backend failed for {kind}: {source}")]
    Primary {
        kind: OperationKind,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The secondary backend raised an error for `op`, after the primary succeeded.
    #[error("secondary backend failed for {kind}: {source}")]
    Secondary {
        kind: OperationKind,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The flow controller denied a reservation for `op`.
    #[error("admission denied for {kind}: {reason}")]
    AdmissionDenied { kind: OperationKind, reason: String },

    /// Accumulated failure(s) while closing the primary and/or secondary handles.
    #[error("close failed: {0}")]
    Close(String),

    /// A `mirroring.*` configuration key was missing or invalid.
    #[error("invalid mirroring configuration: {0}")]
    Config(String),

    /// A table-level API method this client does not implement was called.
    #[error("{0} is not supported by the mirroring client")]
    Unsupported(&'static str),

    /// The calling task was cancelled while awaiting a primary or close operation.
    #[error("interrupted: {0}")]
    Interrupted(String),
}

impl MirroringError {
    pub fn primary<E>(kind: OperationKind, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        MirroringError::Primary {
            kind,
            source: Box::new(source),
        }
    }

    /// Builds a [`MirroringError::Primary`] from a message rather than a concrete error type, for
    /// call sites that only have a per-slot `Display` of an error whose ownership they can't move
    /// (e.g. a batch's `Vec<Result<_, E>>` borrowed while also consumed elsewhere).
    pub fn primary_message(kind: OperationKind, message: impl Into<String>) -> Self {
        MirroringError::Primary {
            kind,
            source: Box::new(StringError(message.into())),
        }
    }

    pub fn secondary<E>(kind: OperationKind, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        MirroringError::Secondary {
            kind,
            source: Box::new(source),
        }
    }

    /// True for the variants a dispatcher is allowed to return from a call that also touched the
    /// secondary path; i.e. everything that is *not* secondary-only.
    pub fn is_caller_visible(&self) -> bool {
        !matches!(self, MirroringError::Secondary { .. })
    }
}

pub type MirroringResult<T> = std::result::Result<T, MirroringError>;

/// An error carrying only a message, used where a concrete source error can't be moved out of a
/// shared reference (see [`MirroringError::primary_message`]).
#[derive(Debug)]
struct StringError(String);

impl fmt::Display for StringError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for StringError {}
