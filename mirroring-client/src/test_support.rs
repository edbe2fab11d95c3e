//! An in-memory [`TableHandle`] used by this crate's own tests and available to downstream
//! integration tests that want a deterministic stand-in for a real primary or secondary.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::backend::{BatchOutcome, RowScanner, TableHandle};
use crate::operation::{Modification, Operation, OperationResult, Row, Scan};
use crate::secondary::PanicError;

#[derive(Debug, thiserror::Error)]
pub enum MockError {
    #[error("row {0:?} not found")]
    NotFound(Bytes),
    #[error("injected failure for {0:?}")]
    Injected(Bytes),
    #[error(transparent)]
    Panic(#[from] PanicError),
}

#[derive(Default)]
struct State {
    rows: HashMap<Bytes, Row>,
    /// Row keys whose next operation should fail, regardless of kind.
    failing_keys: std::collections::HashSet<Bytes>,
    closed: bool,
}

/// A backend stand-in that stores rows in a `HashMap` guarded by a `parking_lot::Mutex`, as the
/// trait requires synchronous, blocking-safe access.
#[derive(Clone, Default)]
pub struct MockTableHandle {
    state: Arc<Mutex<State>>,
}

impl MockTableHandle {
    pub fn new() -> Self {
        MockTableHandle::default()
    }

    pub fn set_exists(&self, key: Bytes, exists: bool) {
        let mut state = self.state.lock();
        if exists {
            state.rows.entry(key.clone()).or_insert_with(|| Row::new(key));
        } else {
            state.rows.remove(&key);
        }
    }

    pub fn put_row(&self, row: Row) {
        self.state.lock().rows.insert(row.key.clone(), row);
    }

    pub fn row(&self, key: &Bytes) -> Option<Row> {
        self.state.lock().rows.get(key).cloned()
    }

    /// Causes the next operation addressed to `key` to fail with [`MockError::Injected`].
    pub fn fail_next_for_key(&self, key: Bytes) {
        self.state.lock().failing_keys.insert(key);
    }

    fn apply(&self, op: &Operation) -> Result<OperationResult, MockError> {
        let mut state = self.state.lock();
        if let Some(key) = op.row_key() {
            if state.failing_keys.remove(key) {
                return Err(MockError::Injected(key.clone()));
            }
        }

        match op {
            Operation::Exists(key) => Ok(OperationResult::Bool(state.rows.contains_key(key))),
            Operation::Get(key) => Ok(OperationResult::Row(state.rows.get(key).cloned())),
            Operation::Scan(scan) => Ok(OperationResult::Rows(scan_rows(&state.rows, scan))),
            Operation::Put(row) => {
                state.rows.insert(row.key.clone(), row.clone());
                Ok(OperationResult::Unit)
            }
            Operation::Delete(delete) => {
                if delete.cells.is_empty() {
                    state.rows.remove(&delete.key);
                } else if let Some(row) = state.rows.get_mut(&delete.key) {
                    row.cells.retain(|cell| {
                        !delete
                            .cells
                            .iter()
                            .any(|(f, q)| *f == cell.family && *q == cell.qualifier)
                    });
                }
                Ok(OperationResult::Unit)
            }
            Operation::Append(row) => {
                let entry = state.rows.entry(row.key.clone()).or_insert_with(|| Row::new(row.key.clone()));
                for cell in &row.cells {
                    match entry.cells.iter_mut().find(|c| c.family == cell.family && c.qualifier == cell.qualifier) {
                        Some(existing) => {
                            let mut merged = existing.value.to_vec();
                            merged.extend_from_slice(&cell.value);
                            existing.value = Bytes::from(merged);
                        }
                        None => entry.cells.push(cell.clone()),
                    }
                }
                Ok(OperationResult::Row(Some(entry.clone())))
            }
            Operation::Increment(increment) => {
                let entry = state
                    .rows
                    .entry(increment.key.clone())
                    .or_insert_with(|| Row::new(increment.key.clone()));
                for amount in &increment.amounts {
                    let current = entry
                        .cells
                        .iter_mut()
                        .find(|c| c.family == amount.family && c.qualifier == amount.qualifier);
                    let new_value = match current {
                        Some(cell) => {
                            let existing: i64 = std::str::from_utf8(&cell.value)
                                .ok()
                                .and_then(|s| s.parse().ok())
                                .unwrap_or(0);
                            existing + amount.delta
                        }
                        None => amount.delta,
                    };
                    let encoded = Bytes::from(new_value.to_string());
                    match entry.cells.iter_mut().find(|c| c.family == amount.family && c.qualifier == amount.qualifier) {
                        Some(cell) => cell.value = encoded,
                        None => entry.cells.push(crate::operation::Cell::new(
                            amount.family.clone(),
                            amount.qualifier.clone(),
                            encoded,
                        )),
                    }
                }
                Ok(OperationResult::Row(Some(entry.clone())))
            }
            Operation::RowMutations(mutations) => {
                apply_mutations(&mut state.rows, &mutations.key, &mutations.mutations);
                Ok(OperationResult::Unit)
            }
            Operation::CheckAndMutate(cam) => {
                let matches = match state.rows.get(&cam.key) {
                    Some(row) => row
                        .cells
                        .iter()
                        .find(|c| c.family == cam.predicate.family && c.qualifier == cam.predicate.qualifier)
                        .map(|c| Some(c.value.clone()) == cam.predicate.expected_value)
                        .unwrap_or(cam.predicate.expected_value.is_none()),
                    None => cam.predicate.expected_value.is_none(),
                };
                if matches {
                    apply_mutations(&mut state.rows, &cam.key, &cam.mutations);
                }
                Ok(OperationResult::Bool(matches))
            }
        }
    }
}

fn apply_mutations(rows: &mut HashMap<Bytes, Row>, key: &Bytes, mutations: &[Modification]) {
    let entry = rows.entry(key.clone()).or_insert_with(|| Row::new(key.clone()));
    for modification in mutations {
        match modification {
            Modification::Put(cell) => {
                match entry.cells.iter_mut().find(|c| c.family == cell.family && c.qualifier == cell.qualifier) {
                    Some(existing) => existing.value = cell.value.clone(),
                    None => entry.cells.push(cell.clone()),
                }
            }
            Modification::DeleteColumn { family, qualifier } => {
                entry.cells.retain(|c| !(c.family == *family && c.qualifier == *qualifier));
            }
            Modification::DeleteFamily(family) => {
                entry.cells.retain(|c| c.family != *family);
            }
        }
    }
}

fn scan_rows(rows: &HashMap<Bytes, Row>, scan: &Scan) -> Vec<Row> {
    let mut matched: Vec<Row> = rows
        .values()
        .filter(|row| {
            row.key >= scan.start_row
                && scan.stop_row.as_ref().map_or(true, |stop| row.key < *stop)
        })
        .cloned()
        .collect();
    matched.sort_by(|a, b| a.key.cmp(&b.key));
    if let Some(limit) = scan.limit {
        matched.truncate(limit);
    }
    matched
}

pub struct MockScanner {
    rows: std::vec::IntoIter<Row>,
}

impl RowScanner for MockScanner {
    fn next_row(&mut self) -> Result<Option<Row>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.rows.next())
    }
}

impl TableHandle for MockTableHandle {
    type Error = MockError;
    type Scanner = MockScanner;

    fn batch(&self, ops: &[Operation]) -> BatchOutcome<Self::Error> {
        let results = ops.iter().map(|op| self.apply(op)).collect();
        BatchOutcome::ok(results)
    }

    fn open_scanner(&self, scan: &Scan) -> Result<Self::Scanner, Self::Error> {
        let rows = scan_rows(&self.state.lock().rows, scan);
        Ok(MockScanner { rows: rows.into_iter() })
    }

    fn close(&self) -> Result<(), Self::Error> {
        self.state.lock().closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_round_trips() {
        let handle = MockTableHandle::new();
        let row = Row::new("r1").with_cell(crate::operation::Cell::new("cf", "c", "v"));
        let outcome = handle.batch(&[Operation::Put(row.clone())]);
        assert!(outcome.into_single().unwrap() == OperationResult::Unit);

        let outcome = handle.batch(&[Operation::Get(Bytes::from_static(b"r1"))]);
        assert_eq!(outcome.into_single().unwrap(), OperationResult::Row(Some(row)));
    }

    #[test]
    fn fail_next_for_key_injects_exactly_one_failure() {
        let handle = MockTableHandle::new();
        handle.fail_next_for_key(Bytes::from_static(b"r1"));

        let outcome = handle.batch(&[Operation::Exists(Bytes::from_static(b"r1"))]);
        assert!(matches!(outcome.results[0], Err(MockError::Injected(_))));

        let outcome = handle.batch(&[Operation::Exists(Bytes::from_static(b"r1"))]);
        assert!(outcome.results[0].is_ok());
    }

    #[test]
    fn increment_accumulates() {
        let handle = MockTableHandle::new();
        let increment = Operation::Increment(crate::operation::Increment {
            key: Bytes::from_static(b"r1"),
            amounts: vec![crate::operation::Amount {
                family: Bytes::from_static(b"cf"),
                qualifier: Bytes::from_static(b"counter"),
                delta: 5,
            }],
        });
        handle.batch(&[increment.clone()]);
        let outcome = handle.batch(&[increment]);
        let row = outcome.into_single().unwrap();
        let row = row.as_row().unwrap().as_ref().unwrap();
        assert_eq!(row.cells[0].value, Bytes::from_static(b"10"));
    }
}
