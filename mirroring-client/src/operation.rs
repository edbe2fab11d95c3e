//! The operation and result data model (§3 of the design).
//!
//! Every dispatch path funnels down to [`Operation`], a tagged enum, rather
//! than a hierarchy of request types — the mirroring engine never needs to
//! know more about an operation than its variant and its row key.

use std::fmt;

use bytes::Bytes;
use mirroring_errors::OperationKind;

/// A single cell: a value stored under a column family + qualifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cell {
    pub family: Bytes,
    pub qualifier: Bytes,
    pub value: Bytes,
}

impl Cell {
    pub fn new(family: impl Into<Bytes>, qualifier: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Cell {
            family: family.into(),
            qualifier: qualifier.into(),
            value: value.into(),
        }
    }

    fn approximate_size(&self) -> usize {
        self.family.len() + self.qualifier.len() + self.value.len()
    }
}

/// A row: a key plus the cells read from, or to be written to, it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Row {
    pub key: Bytes,
    pub cells: Vec<Cell>,
}

impl Row {
    pub fn new(key: impl Into<Bytes>) -> Self {
        Row {
            key: key.into(),
            cells: Vec::new(),
        }
    }

    pub fn with_cell(mut self, cell: Cell) -> Self {
        self.cells.push(cell);
        self
    }

    pub fn approximate_size(&self) -> usize {
        self.key.len() + self.cells.iter().map(Cell::approximate_size).sum::<usize>()
    }
}

/// A single column-family/qualifier modification within a [`RowMutations`] or
/// [`CheckAndMutate`] bundle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Modification {
    Put(Cell),
    DeleteColumn { family: Bytes, qualifier: Bytes },
    DeleteFamily(Bytes),
}

/// A grouped Put/Delete bundle addressed to a single row, applied atomically by the backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RowMutations {
    pub key: Bytes,
    pub mutations: Vec<Modification>,
}

/// A delete of an entire row, or of specific family/qualifier cells within it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Delete {
    pub key: Bytes,
    /// Empty means "delete the whole row".
    pub cells: Vec<(Bytes, Bytes)>,
}

impl Delete {
    pub fn whole_row(key: impl Into<Bytes>) -> Self {
        Delete {
            key: key.into(),
            cells: Vec::new(),
        }
    }
}

/// A column family/qualifier and the signed amount to add to its current value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Amount {
    pub family: Bytes,
    pub qualifier: Bytes,
    pub delta: i64,
}

/// A read-modify-write increment of one or more columns on a single row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Increment {
    pub key: Bytes,
    pub amounts: Vec<Amount>,
}

/// The predicate half of a [`CheckAndMutate`]: "does this family/qualifier currently hold
/// `expected_value` (or, if `None`, does the column not exist)?"
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Predicate {
    pub family: Bytes,
    pub qualifier: Bytes,
    pub expected_value: Option<Bytes>,
}

/// A conditional mutation: apply `mutations` only if `predicate` holds against the current row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckAndMutate {
    pub key: Bytes,
    pub predicate: Predicate,
    pub mutations: Vec<Modification>,
}

/// A row-key range to stream rows from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Scan {
    pub start_row: Bytes,
    /// Exclusive. `None` scans to the end of the table.
    pub stop_row: Option<Bytes>,
    pub limit: Option<usize>,
}

/// A discriminated operation. Every dispatch path, including the heterogeneous batch path,
/// operates on slices of this type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    Exists(Bytes),
    Get(Bytes),
    Scan(Scan),
    Put(Row),
    Delete(Delete),
    Append(Row),
    Increment(Increment),
    RowMutations(RowMutations),
    CheckAndMutate(CheckAndMutate),
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Exists(_) => OperationKind::Exists,
            Operation::Get(_) => OperationKind::Get,
            Operation::Scan(_) => OperationKind::Scan,
            Operation::Put(_) => OperationKind::Put,
            Operation::Delete(_) => OperationKind::Delete,
            Operation::Append(_) => OperationKind::Append,
            Operation::Increment(_) => OperationKind::Increment,
            Operation::RowMutations(_) => OperationKind::MutateRow,
            Operation::CheckAndMutate(_) => OperationKind::CheckAndMutate,
        }
    }

    /// The row key this operation addresses, if it addresses exactly one (everything but `Scan`).
    pub fn row_key(&self) -> Option<&Bytes> {
        match self {
            Operation::Exists(key) | Operation::Get(key) => Some(key),
            Operation::Scan(_) => None,
            Operation::Put(row) | Operation::Append(row) => Some(&row.key),
            Operation::Delete(d) => Some(&d.key),
            Operation::Increment(i) => Some(&i.key),
            Operation::RowMutations(m) => Some(&m.key),
            Operation::CheckAndMutate(c) => Some(&c.key),
        }
    }

    /// Whether this operation is read-only (as opposed to a write that mutates the backend).
    pub fn is_read(&self) -> bool {
        matches!(self, Operation::Exists(_) | Operation::Get(_) | Operation::Scan(_))
    }

    /// Whether this operation is non-idempotent on replay and must be rewritten into a [`Put`]
    /// before being sent to the secondary (§3 invariant, §4.3 splitting discipline).
    pub fn is_non_idempotent(&self) -> bool {
        matches!(self, Operation::Append(_) | Operation::Increment(_))
    }

    fn approximate_size(&self) -> usize {
        match self {
            Operation::Exists(key) | Operation::Get(key) => key.len(),
            Operation::Scan(scan) => {
                scan.start_row.len() + scan.stop_row.as_ref().map_or(0, Bytes::len)
            }
            Operation::Put(row) | Operation::Append(row) => row.approximate_size(),
            Operation::Delete(d) => {
                d.key.len()
                    + d.cells
                        .iter()
                        .map(|(f, q)| f.len() + q.len())
                        .sum::<usize>()
            }
            Operation::Increment(i) => {
                i.key.len()
                    + i.amounts
                        .iter()
                        .map(|a| a.family.len() + a.qualifier.len())
                        .sum::<usize>()
            }
            Operation::RowMutations(m) => m.key.len() + modifications_size(&m.mutations),
            Operation::CheckAndMutate(c) => {
                c.key.len()
                    + c.predicate.family.len()
                    + c.predicate.qualifier.len()
                    + c.predicate.expected_value.as_ref().map_or(0, Bytes::len)
                    + modifications_size(&c.mutations)
            }
        }
    }
}

fn modifications_size(mutations: &[Modification]) -> usize {
    mutations
        .iter()
        .map(|m| match m {
            Modification::Put(cell) => cell.approximate_size(),
            Modification::DeleteColumn { family, qualifier } => family.len() + qualifier.len(),
            Modification::DeleteFamily(family) => family.len(),
        })
        .sum()
}

/// The typed payload half of a [`Result<OperationResult, E>`] batch slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OperationResult {
    /// `Put`/`Delete`/`RowMutations` completed with no return value.
    Unit,
    /// `Get` (`None` if the row didn't exist), or the resulting row of an `Append`/`Increment`.
    Row(Option<Row>),
    /// `Scan` rows delivered in one shot (used only by the non-streaming convenience path; the
    /// streaming path is [`crate::scanner::MirroringScanner`]).
    Rows(Vec<Row>),
    /// `Exists`, or whether a `CheckAndMutate` predicate matched and its mutation was applied.
    Bool(bool),
}

impl OperationResult {
    pub fn as_row(&self) -> Option<&Option<Row>> {
        match self {
            OperationResult::Row(row) => Some(row),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OperationResult::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_rows(&self) -> Option<&[Row]> {
        match self {
            OperationResult::Rows(rows) => Some(rows),
            _ => None,
        }
    }
}

impl fmt::Display for OperationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationResult::Unit => write!(f, "()"),
            OperationResult::Row(row) => write!(f, "{row:?}"),
            OperationResult::Rows(rows) => write!(f, "{} rows", rows.len()),
            OperationResult::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// An estimate of an operation (or batch of operations) used by the flow controller to decide
/// admission (§3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct RequestResourcesDescription {
    pub operation_count: usize,
    pub approximate_byte_size: usize,
}

impl RequestResourcesDescription {
    pub fn for_operation(op: &Operation) -> Self {
        RequestResourcesDescription {
            operation_count: 1,
            approximate_byte_size: op.approximate_size(),
        }
    }

    pub fn for_batch(ops: &[Operation]) -> Self {
        RequestResourcesDescription {
            operation_count: ops.len(),
            approximate_byte_size: ops.iter().map(Operation::approximate_size).sum(),
        }
    }
}

/// Retained alongside a batch of operations sent to the secondary so that, if the secondary
/// fails, the write-error sink can be told exactly which operations were lost (§3).
#[derive(Clone, Debug)]
pub struct WriteOperationInfo {
    pub resource_description: RequestResourcesDescription,
    pub operations: Vec<Operation>,
    pub kind: OperationKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_increment_are_non_idempotent() {
        assert!(Operation::Append(Row::new("r")).is_non_idempotent());
        assert!(Operation::Increment(Increment {
            key: Bytes::from_static(b"r"),
            amounts: vec![]
        })
        .is_non_idempotent());
        assert!(!Operation::Put(Row::new("r")).is_non_idempotent());
    }

    #[test]
    fn reads_are_identified() {
        assert!(Operation::Get(Bytes::from_static(b"r")).is_read());
        assert!(Operation::Exists(Bytes::from_static(b"r")).is_read());
        assert!(Operation::Scan(Scan::default()).is_read());
        assert!(!Operation::Put(Row::new("r")).is_read());
    }

    #[test]
    fn batch_resource_description_sums_operations() {
        let ops = vec![
            Operation::Put(Row::new("r1").with_cell(Cell::new("cf", "c", "v"))),
            Operation::Put(Row::new("r2").with_cell(Cell::new("cf", "c", "v2"))),
        ];
        let desc = RequestResourcesDescription::for_batch(&ops);
        assert_eq!(desc.operation_count, 2);
        assert_eq!(
            desc.approximate_byte_size,
            ops[0].approximate_size() + ops[1].approximate_size()
        );
    }
}
