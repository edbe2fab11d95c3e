//! The mirroring table dispatcher (§4.1–§4.3, §4.8): the operation-by-operation state machine
//! fronting a primary and secondary [`TableHandle`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use mirroring_errors::{MirroringError, MirroringResult, OperationKind};
use mirroring_util::shutdown::Completion;
use mirroring_util::ReferenceCounter;
use parking_lot::Mutex;
use tracing::Instrument;

use crate::backend::TableHandle;
use crate::batch::{
    check_and_mutate_matched, check_and_mutate_to_row_mutations, rewrite_for_secondary, split_for_secondary,
};
use crate::flow_control::FlowController;
use crate::mismatch::MismatchDetector;
use crate::operation::{
    CheckAndMutate, Delete, Increment, Operation, OperationResult, RequestResourcesDescription, Row, RowMutations,
    Scan,
};
use crate::sampler::ReadSampler;
use crate::scanner::MirroringScanner;
use crate::secondary::SecondaryAsyncAdapter;
use crate::verification::Verifier;
use crate::write_sink::WriteErrorSink;

/// Collaborators a [`MirroringTable`] is built from. Every field has a bundled default reachable
/// through [`MirroringTableBuilder`], mirroring the way this workspace's adapters let most
/// collaborators be swapped independently of the connection itself.
pub struct MirroringTableBuilder<P: TableHandle, S: TableHandle> {
    primary: P,
    secondary: S,
    flow_controller: Arc<dyn FlowController>,
    read_sampler: Arc<dyn ReadSampler>,
    mismatch_detector: Arc<dyn MismatchDetector>,
    write_error_sink: Arc<dyn WriteErrorSink>,
    concurrent_batch_enabled: bool,
}

impl<P: TableHandle, S: TableHandle> MirroringTableBuilder<P, S> {
    pub fn new(primary: P, secondary: S) -> Self {
        MirroringTableBuilder {
            primary,
            secondary,
            flow_controller: Arc::new(crate::flow_control::UnboundedFlowController),
            read_sampler: Arc::new(crate::sampler::AlwaysSample),
            mismatch_detector: Arc::new(crate::mismatch::LoggingMismatchDetector),
            write_error_sink: Arc::new(crate::write_sink::LoggingWriteErrorSink),
            concurrent_batch_enabled: false,
        }
    }

    pub fn flow_controller(mut self, flow_controller: Arc<dyn FlowController>) -> Self {
        self.flow_controller = flow_controller;
        self
    }

    pub fn read_sampler(mut self, read_sampler: Arc<dyn ReadSampler>) -> Self {
        self.read_sampler = read_sampler;
        self
    }

    pub fn mismatch_detector(mut self, mismatch_detector: Arc<dyn MismatchDetector>) -> Self {
        self.mismatch_detector = mismatch_detector;
        self
    }

    pub fn write_error_sink(mut self, write_error_sink: Arc<dyn WriteErrorSink>) -> Self {
        self.write_error_sink = write_error_sink;
        self
    }

    /// Opts into concurrent-batch mode (§4.3) for [`MirroringTable::batch`] calls whose operations
    /// are all `Put`/`Delete`/`RowMutations`.
    pub fn concurrent_batch(mut self, enabled: bool) -> Self {
        self.concurrent_batch_enabled = enabled;
        self
    }

    pub fn build(self) -> MirroringTable<P, S> {
        let outstanding = ReferenceCounter::new();
        MirroringTable {
            primary: Arc::new(self.primary),
            secondary: SecondaryAsyncAdapter::new(self.secondary, outstanding.clone()),
            flow_controller: self.flow_controller,
            read_sampler: self.read_sampler,
            verifier: Verifier::new(self.mismatch_detector, self.write_error_sink),
            outstanding,
            concurrent_batch_enabled: self.concurrent_batch_enabled,
            close_completion: Mutex::new(None),
            listener_notifier_spawned: AtomicBool::new(false),
            on_close_listeners: Mutex::new(Vec::new()),
        }
    }
}

/// The table-level dispatcher. Fronts a primary and secondary [`TableHandle`], fanning every
/// operation across both per §4.1–§4.3 while returning only the primary's result to the caller.
pub struct MirroringTable<P: TableHandle, S: TableHandle> {
    primary: Arc<P>,
    secondary: SecondaryAsyncAdapter<S>,
    flow_controller: Arc<dyn FlowController>,
    read_sampler: Arc<dyn ReadSampler>,
    verifier: Verifier,
    outstanding: ReferenceCounter,
    concurrent_batch_enabled: bool,
    close_completion: Mutex<Option<Completion>>,
    listener_notifier_spawned: AtomicBool,
    on_close_listeners: Mutex<Vec<Box<dyn FnOnce() + Send>>>,
}

impl<P: TableHandle, S: TableHandle> MirroringTable<P, S> {
    pub fn builder(primary: P, secondary: S) -> MirroringTableBuilder<P, S> {
        MirroringTableBuilder::new(primary, secondary)
    }

    async fn run_on_primary<F, T>(&self, kind: OperationKind, f: F) -> MirroringResult<T>
    where
        F: FnOnce(&P) -> Result<T, P::Error> + Send + 'static,
        T: Send + 'static,
        P: 'static,
    {
        let primary = self.primary.clone();
        let start = std::time::Instant::now();
        let result = tokio::task::spawn_blocking(move || f(&primary))
            .await
            .map_err(|join_err| MirroringError::Interrupted(join_err.to_string()))?
            .map_err(|e| MirroringError::primary(kind, e));
        mirroring_client_metrics::record_dispatch_latency(kind, start.elapsed().as_secs_f64());
        result
    }

    // ---- Read path (§4.1a) -------------------------------------------------------------------

    #[tracing::instrument(skip(self))]
    pub async fn exists(&self, key: Bytes) -> MirroringResult<bool> {
        let op = Operation::Exists(key);
        let result = self
            .run_on_primary(OperationKind::Exists, {
                let op = op.clone();
                move |p| p.batch(std::slice::from_ref(&op)).into_single()
            })
            .await?;
        let exists = result.as_bool().expect("Exists always returns Bool");
        self.maybe_verify_read(op, OperationResult::Bool(exists)).await;
        Ok(exists)
    }

    #[tracing::instrument(skip(self, keys))]
    pub async fn exists_all(&self, keys: Vec<Bytes>) -> MirroringResult<Vec<bool>> {
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            out.push(self.exists(key).await?);
        }
        Ok(out)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get(&self, key: Bytes) -> MirroringResult<Option<Row>> {
        let op = Operation::Get(key);
        let result = self
            .run_on_primary(OperationKind::Get, {
                let op = op.clone();
                move |p| p.batch(std::slice::from_ref(&op)).into_single()
            })
            .await?;
        let row = result.as_row().cloned().expect("Get always returns Row");
        self.maybe_verify_read(op, OperationResult::Row(row.clone())).await;
        Ok(row)
    }

    #[tracing::instrument(skip(self, keys))]
    pub async fn get_list(&self, keys: Vec<Bytes>) -> MirroringResult<Vec<Option<Row>>> {
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            out.push(self.get(key).await?);
        }
        Ok(out)
    }

    /// Opens a streaming scan, mirrored row-by-row per §4.4.
    #[tracing::instrument(skip(self))]
    pub async fn get_scanner(&self, scan: Scan) -> MirroringResult<MirroringScanner<P, S>>
    where
        P: 'static,
    {
        let primary = self.primary.clone();
        let scan_for_primary = scan.clone();
        let primary_scanner = tokio::task::spawn_blocking(move || primary.open_scanner(&scan_for_primary))
            .await
            .map_err(|join_err| MirroringError::Interrupted(join_err.to_string()))?
            .map_err(|e| MirroringError::primary(OperationKind::Scan, e))?;

        let sampled = self.read_sampler.should_next_read_operation_be_sampled();
        let secondary_scanner = if sampled {
            match self.secondary.open_scanner(scan).await {
                Ok(scanner) => Some(scanner),
                Err(error) => {
                    // Opening the secondary's scan is itself a sampled "read"; a failure here is
                    // advisory like any other secondary read failure, not caller-visible.
                    tracing::warn!(operation_kind = %OperationKind::Scan, %error, "failed to open secondary scanner");
                    None
                }
            }
        } else {
            None
        };

        Ok(MirroringScanner::new(
            primary_scanner,
            secondary_scanner,
            self.verifier.clone(),
            self.outstanding.clone(),
        ))
    }

    /// Runs the read-with-verification pipeline of §4.2 once the primary result is known.
    async fn maybe_verify_read(&self, op: Operation, primary_result: OperationResult) {
        if !self.read_sampler.should_next_read_operation_be_sampled() {
            return;
        }
        let kind = op.kind();
        let Some(_reservation) = self
            .flow_controller
            .acquire(RequestResourcesDescription::for_operation(&op))
            .await
        else {
            // Admission denial on a sampled read is silently dropped per §4.1, but still counted.
            mirroring_client_metrics::record_admission_denied(kind);
            return;
        };

        let secondary = self.secondary.clone();
        let verifier = self.verifier.clone();
        let guard = self.outstanding.hold();

        tokio::spawn(
            async move {
                let outcome = secondary.dispatch(kind, vec![op.clone()]).await;
                let secondary_result = outcome.into_single();
                verifier.verify_read(&op, &primary_result, secondary_result);
                drop(guard);
            }
            .instrument(tracing::debug_span!("verify_read", operation_kind = %kind)),
        );
    }

    // ---- Single-write path (§4.1b) -----------------------------------------------------------

    #[tracing::instrument(skip(self, row))]
    pub async fn put(&self, row: Row) -> MirroringResult<()> {
        let op = Operation::Put(row);
        self.run_on_primary(OperationKind::Put, {
            let op = op.clone();
            move |p| p.batch(std::slice::from_ref(&op)).into_single().map(|_| ())
        })
        .await?;
        self.dispatch_write(op.clone(), op, OperationKind::Put).await;
        Ok(())
    }

    #[tracing::instrument(skip(self, rows))]
    pub async fn put_list(&self, rows: Vec<Row>) -> MirroringResult<()> {
        for row in rows {
            self.put(row).await?;
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, delete))]
    pub async fn delete(&self, delete: Delete) -> MirroringResult<()> {
        let op = Operation::Delete(delete);
        self.run_on_primary(OperationKind::Delete, {
            let op = op.clone();
            move |p| p.batch(std::slice::from_ref(&op)).into_single().map(|_| ())
        })
        .await?;
        self.dispatch_write(op.clone(), op, OperationKind::Delete).await;
        Ok(())
    }

    #[tracing::instrument(skip(self, deletes))]
    pub async fn delete_list(&self, deletes: Vec<Delete>) -> MirroringResult<()> {
        for delete in deletes {
            self.delete(delete).await?;
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, mutations))]
    pub async fn mutate_row(&self, mutations: RowMutations) -> MirroringResult<()> {
        let op = Operation::RowMutations(mutations);
        self.run_on_primary(OperationKind::MutateRow, {
            let op = op.clone();
            move |p| p.batch(std::slice::from_ref(&op)).into_single().map(|_| ())
        })
        .await?;
        self.dispatch_write(op.clone(), op, OperationKind::MutateRow).await;
        Ok(())
    }

    #[tracing::instrument(skip(self, row))]
    pub async fn append(&self, row: Row) -> MirroringResult<Row> {
        let op = Operation::Append(row);
        let result = self
            .run_on_primary(OperationKind::Append, {
                let op = op.clone();
                move |p| p.batch(std::slice::from_ref(&op)).into_single()
            })
            .await?;
        let resulting_row = result
            .as_row()
            .cloned()
            .flatten()
            .expect("Append always returns a Row");

        let rewritten = rewrite_for_secondary(&op, &OperationResult::Row(Some(resulting_row.clone())));
        self.dispatch_write(rewritten, op, OperationKind::Append).await;
        Ok(resulting_row)
    }

    #[tracing::instrument(skip(self, increment))]
    pub async fn increment(&self, increment: Increment) -> MirroringResult<Row> {
        let op = Operation::Increment(increment);
        let result = self
            .run_on_primary(OperationKind::Increment, {
                let op = op.clone();
                move |p| p.batch(std::slice::from_ref(&op)).into_single()
            })
            .await?;
        let resulting_row = result
            .as_row()
            .cloned()
            .flatten()
            .expect("Increment always returns a Row");

        let rewritten = rewrite_for_secondary(&op, &OperationResult::Row(Some(resulting_row.clone())));
        self.dispatch_write(rewritten, op, OperationKind::Increment).await;
        Ok(resulting_row)
    }

    /// A convenience single-column increment, matching the exposed `increment_column_value` API
    /// (§6) over the general [`Self::increment`].
    pub async fn increment_column_value(
        &self,
        key: Bytes,
        family: Bytes,
        qualifier: Bytes,
        amount: i64,
    ) -> MirroringResult<i64> {
        let row = self
            .increment(Increment {
                key,
                amounts: vec![crate::operation::Amount {
                    family: family.clone(),
                    qualifier: qualifier.clone(),
                    delta: amount,
                }],
            })
            .await?;
        let value = row
            .cells
            .iter()
            .find(|c| c.family == family && c.qualifier == qualifier)
            .map(|c| std::str::from_utf8(&c.value).ok().and_then(|s| s.parse().ok()).unwrap_or(0))
            .unwrap_or(0);
        Ok(value)
    }

    #[tracing::instrument(skip(self, cam))]
    pub async fn check_and_mutate(&self, cam: CheckAndMutate) -> MirroringResult<bool> {
        let CheckAndMutate {
            key,
            predicate,
            mutations,
        } = cam;
        let op = Operation::CheckAndMutate(CheckAndMutate {
            key: key.clone(),
            predicate,
            mutations: mutations.clone(),
        });
        let result = self
            .run_on_primary(OperationKind::CheckAndMutate, {
                let op = op.clone();
                move |p| p.batch(std::slice::from_ref(&op)).into_single()
            })
            .await?;
        let matched = check_and_mutate_matched(&result);

        if matched {
            let secondary_op = check_and_mutate_to_row_mutations(key, mutations);
            self.dispatch_write(secondary_op, op, OperationKind::CheckAndMutate).await;
        }
        Ok(matched)
    }

    pub async fn check_and_put(&self, key: Bytes, family: Bytes, qualifier: Bytes, expected_value: Option<Bytes>, row: Row) -> MirroringResult<bool> {
        let mutations = row
            .cells
            .into_iter()
            .map(crate::operation::Modification::Put)
            .collect();
        self.check_and_mutate(CheckAndMutate {
            key,
            predicate: crate::operation::Predicate {
                family,
                qualifier,
                expected_value,
            },
            mutations,
        })
        .await
    }

    pub async fn check_and_delete(&self, key: Bytes, family: Bytes, qualifier: Bytes, expected_value: Option<Bytes>, delete: Delete) -> MirroringResult<bool> {
        let mutations = if delete.cells.is_empty() {
            vec![crate::operation::Modification::DeleteFamily(family.clone())]
        } else {
            delete
                .cells
                .into_iter()
                .map(|(family, qualifier)| crate::operation::Modification::DeleteColumn { family, qualifier })
                .collect()
        };
        self.check_and_mutate(CheckAndMutate {
            key,
            predicate: crate::operation::Predicate {
                family,
                qualifier,
                expected_value,
            },
            mutations,
        })
        .await
    }

    /// Schedules the secondary side of a single write once the primary has already succeeded
    /// (§4.1b), reserving admission first and notifying the Write-Error Sink on denial.
    async fn dispatch_write(&self, secondary_op: Operation, original_op: Operation, kind: OperationKind) {
        let Some(_reservation) = self
            .flow_controller
            .acquire(RequestResourcesDescription::for_operation(&secondary_op))
            .await
        else {
            mirroring_client_metrics::record_admission_denied(kind);
            self.verifier.notify_admission_denied(original_op, kind);
            return;
        };

        let secondary = self.secondary.clone();
        let verifier = self.verifier.clone();
        let guard = self.outstanding.hold();

        tokio::spawn(
            async move {
                let outcome = secondary.dispatch(kind, vec![secondary_op]).await;
                verifier.verify_write(original_op, kind, outcome.into_single());
                drop(guard);
            }
            .instrument(tracing::debug_span!("verify_write", operation_kind = %kind)),
        );
    }

    // ---- Batch path (§4.3) --------------------------------------------------------------------

    /// Sequential batch mode: always available. Executes the whole batch on the primary, then
    /// schedules the secondary over the successful subset regardless of whether the primary batch
    /// call itself raised (§9 open question — preserved intentionally).
    #[tracing::instrument(skip(self, ops))]
    pub async fn batch(&self, ops: Vec<Operation>) -> MirroringResult<Vec<Result<OperationResult, MirroringError>>> {
        if self.concurrent_batch_enabled && ops.iter().all(is_concurrent_eligible) {
            return self.batch_concurrent(ops).await;
        }
        self.batch_sequential(ops).await
    }

    async fn batch_sequential(
        &self,
        ops: Vec<Operation>,
    ) -> MirroringResult<Vec<Result<OperationResult, MirroringError>>> {
        let primary = self.primary.clone();
        let ops_for_primary = ops.clone();
        let outcome = tokio::task::spawn_blocking(move || primary.batch(&ops_for_primary))
            .await
            .map_err(|join_err| MirroringError::Interrupted(join_err.to_string()))?;

        let caller_results: Vec<Result<OperationResult, MirroringError>> = outcome
            .results
            .iter()
            .map(|r| {
                r.as_ref()
                    .map(Clone::clone)
                    .map_err(|e| MirroringError::primary_message(OperationKind::Batch, format!("{e}")))
            })
            .collect();

        self.schedule_batch_secondary(&ops, &outcome.results).await;

        if let Some(error) = outcome.error {
            return Err(MirroringError::primary(OperationKind::Batch, error));
        }
        Ok(caller_results)
    }

    /// Concurrent batch mode (§4.3): admission is reserved against the whole batch; the secondary
    /// launches before the primary executes, and verification runs after the secondary completes.
    async fn batch_concurrent(
        &self,
        ops: Vec<Operation>,
    ) -> MirroringResult<Vec<Result<OperationResult, MirroringError>>> {
        let Some(_reservation) = self
            .flow_controller
            .acquire(RequestResourcesDescription::for_batch(&ops))
            .await
        else {
            mirroring_client_metrics::record_admission_denied(OperationKind::Batch);
            return Err(MirroringError::AdmissionDenied {
                kind: OperationKind::Batch,
                reason: "flow controller denied the concurrent batch reservation".to_string(),
            });
        };

        let secondary = self.secondary.clone();
        let secondary_ops = ops.clone();
        let guard = self.outstanding.hold();
        let secondary_fut = tokio::spawn(async move { secondary.dispatch(OperationKind::Batch, secondary_ops).await });

        let primary = self.primary.clone();
        let ops_for_primary = ops.clone();
        let outcome = tokio::task::spawn_blocking(move || primary.batch(&ops_for_primary))
            .await
            .map_err(|join_err| MirroringError::Interrupted(join_err.to_string()))?;

        let caller_results: Vec<Result<OperationResult, MirroringError>> = outcome
            .results
            .iter()
            .map(|r| {
                r.as_ref()
                    .map(Clone::clone)
                    .map_err(|e| MirroringError::primary_message(OperationKind::Batch, format!("{e}")))
            })
            .collect();

        let verifier = self.verifier.clone();
        let primary_results = outcome.results;
        tokio::spawn(
            async move {
                if let Ok(secondary_outcome) = secondary_fut.await {
                    verify_batch(&verifier, &ops, &primary_results, secondary_outcome);
                }
                drop(guard);
            }
            .instrument(tracing::debug_span!("verify_batch_concurrent")),
        );

        if let Some(error) = outcome.error {
            return Err(MirroringError::primary(OperationKind::Batch, error));
        }
        Ok(caller_results)
    }

    /// Splits, rewrites, and schedules the secondary side of a sequential batch (§4.3 splitting
    /// discipline), then verifies once the secondary completes.
    async fn schedule_batch_secondary(&self, ops: &[Operation], primary_results: &[Result<OperationResult, P::Error>]) {
        let sample_reads = self.read_sampler.should_next_read_operation_be_sampled();
        let split = split_for_secondary(ops, primary_results, sample_reads);
        if split.forwarded_indices.is_empty() {
            return;
        }

        let forwarded_ops: Vec<Operation> = split
            .forwarded_indices
            .iter()
            .map(|&i| rewrite_for_secondary(&ops[i], primary_results[i].as_ref().expect("forwarded index is successful")))
            .collect();
        let description = RequestResourcesDescription::for_batch(&forwarded_ops);

        let Some(_reservation) = self.flow_controller.acquire(description).await else {
            for &i in &split.forwarded_indices {
                mirroring_client_metrics::record_admission_denied(ops[i].kind());
                if !ops[i].is_read() {
                    self.verifier.notify_admission_denied(ops[i].clone(), ops[i].kind());
                }
            }
            return;
        };

        let secondary = self.secondary.clone();
        let verifier = self.verifier.clone();
        let guard = self.outstanding.hold();
        let original_ops: Vec<Operation> = split.forwarded_indices.iter().map(|&i| ops[i].clone()).collect();
        let original_results: Vec<OperationResult> = split
            .forwarded_indices
            .iter()
            .map(|&i| primary_results[i].as_ref().expect("forwarded index is successful").clone())
            .collect();

        tokio::spawn(
            async move {
                let outcome = secondary.dispatch(OperationKind::Batch, forwarded_ops).await;
                for (i, original_result) in outcome.results.into_iter().enumerate() {
                    let original_op = &original_ops[i];
                    if original_op.is_read() {
                        verifier.verify_read(original_op, &original_results[i], original_result);
                    } else {
                        verifier.verify_write(original_op.clone(), original_op.kind(), original_result);
                    }
                }
                drop(guard);
            }
            .instrument(tracing::debug_span!("verify_batch_sequential")),
        );
    }

    // ---- Lifecycle (§4.8) ---------------------------------------------------------------------

    /// Registers a listener invoked (on a background task) once [`Self::close`]'s drain completes.
    pub fn add_on_close_listener(&self, listener: impl FnOnce() + Send + 'static) {
        self.on_close_listeners.lock().push(Box::new(listener));
    }

    /// Implements the close protocol of §4.8: idempotent, initiates the close of both the primary
    /// and the Secondary Async Adapter, accumulates either side's error, and otherwise returns a
    /// completion handle the caller may await for full secondary drain.
    #[tracing::instrument(skip(self))]
    pub async fn close(&self) -> MirroringResult<Completion>
    where
        P: 'static,
    {
        let completion = {
            let mut slot = self.close_completion.lock();
            if let Some(completion) = slot.as_ref() {
                return Ok(completion.clone());
            }
            let completion = self.outstanding.close();
            *slot = Some(completion.clone());
            completion
        };

        let primary = self.primary.clone();
        let primary_close = tokio::task::spawn_blocking(move || primary.close())
            .await
            .map_err(|join_err| MirroringError::Interrupted(join_err.to_string()));

        let secondary_close = self
            .secondary
            .close()
            .await
            .map_err(|e| MirroringError::Close(e.to_string()));

        self.spawn_close_listener_notifier(completion.clone());

        match primary_close {
            Ok(Ok(())) => secondary_close.map(|()| completion),
            Ok(Err(e)) => Err(MirroringError::Close(e.to_string())),
            Err(e) => Err(e),
        }
    }

    // ---- Unsupported API surface (§6) ---------------------------------------------------------

    pub fn get_configuration(&self) -> MirroringResult<std::convert::Infallible> {
        Err(MirroringError::Unsupported("get_configuration"))
    }

    pub fn get_table_descriptor(&self) -> MirroringResult<std::convert::Infallible> {
        Err(MirroringError::Unsupported("get_table_descriptor"))
    }

    pub fn coprocessor_service(&self) -> MirroringResult<std::convert::Infallible> {
        Err(MirroringError::Unsupported("coprocessor_service"))
    }

    pub fn get_write_buffer_size(&self) -> MirroringResult<std::convert::Infallible> {
        Err(MirroringError::Unsupported("get_write_buffer_size"))
    }

    pub fn set_write_buffer_size(&self, _size: u64) -> MirroringResult<std::convert::Infallible> {
        Err(MirroringError::Unsupported("set_write_buffer_size"))
    }

    pub fn get_rpc_timeout(&self) -> MirroringResult<std::convert::Infallible> {
        Err(MirroringError::Unsupported("get_rpc_timeout"))
    }

    pub fn set_rpc_timeout(&self, _millis: u64) -> MirroringResult<std::convert::Infallible> {
        Err(MirroringError::Unsupported("set_rpc_timeout"))
    }

    fn spawn_close_listener_notifier(&self, completion: Completion) {
        if self.listener_notifier_spawned.swap(true, Ordering::SeqCst) {
            return;
        }
        let listeners = std::mem::take(&mut *self.on_close_listeners.lock());
        tokio::spawn(async move {
            completion.wait().await;
            for listener in listeners {
                listener();
            }
        });
    }
}

fn is_concurrent_eligible(op: &Operation) -> bool {
    matches!(op, Operation::Put(_) | Operation::Delete(_) | Operation::RowMutations(_))
}

fn verify_batch<PE, SE>(
    verifier: &Verifier,
    ops: &[Operation],
    primary_results: &[Result<OperationResult, PE>],
    secondary_outcome: crate::backend::BatchOutcome<SE>,
) where
    SE: std::error::Error + Send + Sync + 'static,
{
    for (i, secondary_result) in secondary_outcome.results.into_iter().enumerate() {
        let Ok(primary_result) = &primary_results[i] else {
            continue;
        };
        if ops[i].is_read() {
            verifier.verify_read(&ops[i], primary_result, secondary_result);
        } else {
            verifier.verify_write(ops[i].clone(), ops[i].kind(), secondary_result);
        }
    }
}
