use super::config::{Cancellation, ExecutionMode, TransactionConfig};
use super::operation::{Fetched, Operation, OperationKind, Outcome, Step, StepRecord, StepStatus};
use super::{TxError, TxResult};
use crate::db::{BackendGuard, ConnectionProvider, SqliteTx, TxHandle};
use crate::mapper::{Mapper, MapperResult};
use crate::model::entity::{ColumnMap, ColumnValue, Entity};
use crate::query::ReadOptions;
use log::{debug, error, info, warn};
use rusqlite::types::Value;
use rusqlite::Connection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    /// Deferred session accepting operations.
    Building,
    /// Immediate session, or deferred session replaying its queue.
    Running,
    Committed,
    RolledBack,
}

impl TxState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::RolledBack)
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Building => "building",
            Self::Running => "running",
            Self::Committed => "committed",
            Self::RolledBack => "rolled_back",
        }
    }
}

enum Strategy<'a> {
    Deferred {
        queue: Vec<Operation<'a>>,
    },
    Immediate {
        last: Outcome,
        committable: bool,
        failure: Option<TxError>,
    },
}

enum Verdict {
    Commit,
    /// Roll back; `Some` carries the failure reported to the caller.
    Abort(Option<TxError>),
}

enum StepError {
    /// The step aborted the chain.
    Abort(TxError),
    /// A rollback marker was reached.
    RollbackRequested,
}

/// One database transaction driving mapper operations.
///
/// ```ignore
/// let mut session = Session::begin(&provider, None, TransactionConfig::deferred())?;
/// session.save(&mut teacher);
/// session.save(&mut student);
/// session.execute()?;
/// ```
pub struct Session<'a, H: TxHandle> {
    handle: H,
    mode: ExecutionMode,
    allow_zero_rows: bool,
    cancellation: Option<Cancellation>,
    strategy: Strategy<'a>,
    records: Vec<StepRecord>,
    state: TxState,
}

impl<'a> Session<'a, SqliteTx<BackendGuard<'a>>> {
    /// Locks the routed backend of `provider` and begins a transaction on it.
    pub fn begin(
        provider: &'a ConnectionProvider,
        hint: Option<&str>,
        config: TransactionConfig,
    ) -> TxResult<Self> {
        let handle = provider
            .begin(hint)
            .map_err(|cause| TxError::BeginFailed { cause })?;
        Ok(Self::new(handle, config))
    }
}

impl<'a, H: TxHandle> Session<'a, H> {
    /// Wraps an already begun handle.
    pub fn new(handle: H, config: TransactionConfig) -> Self {
        let (strategy, state) = match config.mode {
            ExecutionMode::Deferred => (Strategy::Deferred { queue: Vec::new() }, TxState::Building),
            ExecutionMode::Immediate => (
                Strategy::Immediate {
                    last: Outcome::NotInvoked,
                    committable: true,
                    failure: None,
                },
                TxState::Running,
            ),
        };
        debug!(
            "event=tx_begin module=tx status=ok mode={} allow_zero_rows={}",
            config.mode.as_str(),
            config.allow_zero_affected_rows
        );
        Self {
            handle,
            mode: config.mode,
            allow_zero_rows: config.allow_zero_affected_rows,
            cancellation: config.cancellation,
            strategy,
            records: Vec::new(),
            state,
        }
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn state(&self) -> TxState {
        self.state
    }

    /// Every operation handed to the session, in order.
    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    /// False once a step failed, a write hit zero rows under the disallow
    /// policy, or a rollback was requested.
    pub fn is_committable(&self) -> bool {
        match &self.strategy {
            Strategy::Deferred { queue } => {
                !self.state.is_terminal()
                    && !queue
                        .iter()
                        .any(|operation| operation.kind() == OperationKind::Rollback)
            }
            Strategy::Immediate { committable, .. } => *committable && !self.state.is_terminal(),
        }
    }

    /// Outcome of the latest step that ran in immediate mode.
    pub fn last_outcome(&self) -> Outcome {
        match &self.strategy {
            Strategy::Immediate { last, .. } => *last,
            Strategy::Deferred { .. } => Outcome::NotInvoked,
        }
    }

    /// First failure recorded in immediate mode, until `execute` reports it.
    pub fn last_error(&self) -> Option<&TxError> {
        match &self.strategy {
            Strategy::Immediate { failure, .. } => failure.as_ref(),
            Strategy::Deferred { .. } => None,
        }
    }

    /// Connection of the underlying handle.
    pub fn connection(&self) -> &Connection {
        self.handle.connection()
    }

    /// Queues `operation` (deferred) or runs it now (immediate).
    ///
    /// Returns the step outcome only when it ran now and succeeded.
    pub fn queue_or_run(&mut self, operation: Operation<'a>) -> Option<Outcome> {
        let index = self.records.len();
        self.records.push(StepRecord {
            index,
            kind: operation.kind(),
            label: operation.label().to_string(),
            status: StepStatus::Pending,
        });

        if self.state.is_terminal() {
            warn!(
                "event=tx_step module=tx status=skipped index={index} kind={} reason=terminal state={}",
                operation.kind().as_str(),
                self.state.as_str()
            );
            self.mark(index, StepStatus::Skipped);
            return None;
        }

        match &mut self.strategy {
            Strategy::Deferred { queue } => {
                queue.push(operation);
                None
            }
            Strategy::Immediate { committable, .. } => {
                if !*committable {
                    debug!(
                        "event=tx_step module=tx status=skipped index={index} kind={} reason=not_committable",
                        operation.kind().as_str()
                    );
                    self.mark(index, StepStatus::Skipped);
                    return None;
                }
                self.run_immediate(index, operation)
            }
        }
    }

    /// Marks the session non-committable.
    ///
    /// In deferred mode, operations queued before this call still run during
    /// `execute`, operations queued after it never do; `execute` rolls back.
    pub fn rollback(&mut self) {
        self.queue_or_run(Operation::rollback_marker());
    }

    /// Ends the session with COMMIT or ROLLBACK.
    ///
    /// A second call reports the terminal state reached by the first without
    /// touching the handle. A deferred session with an empty queue fails with
    /// `NoOperationsQueued` and stays open.
    pub fn execute(&mut self) -> TxResult<TxState> {
        if self.state.is_terminal() {
            debug!(
                "event=tx_execute module=tx status=noop state={}",
                self.state.as_str()
            );
            return Ok(self.state);
        }

        let verdict = match &mut self.strategy {
            Strategy::Deferred { queue } => {
                if queue.is_empty() {
                    warn!("event=tx_execute module=tx status=error reason=no_operations");
                    return Err(TxError::NoOperationsQueued);
                }
                let queue = std::mem::take(queue);
                self.state = TxState::Running;
                self.replay(queue)
            }
            Strategy::Immediate {
                committable,
                failure,
                ..
            } => match failure.take() {
                Some(err) => Verdict::Abort(Some(err)),
                None if *committable => Verdict::Commit,
                None => Verdict::Abort(None),
            },
        };
        self.finish(verdict)
    }

    /// Upserts `entity` on its primary key; a generated key is written back
    /// once the step runs.
    pub fn save<T: Entity + 'a>(&mut self, entity: &'a mut T) -> Option<Outcome> {
        self.queue_or_run(Operation::new(
            OperationKind::Insert,
            T::table_name(),
            move |conn| Ok(Mapper::<T>::with_connection(conn).upsert_returning(entity, &[])?.into()),
        ))
    }

    pub fn insert<T: Entity + 'a>(&mut self, entity: &'a mut T) -> Option<Outcome> {
        self.queue_or_run(Operation::new(
            OperationKind::Insert,
            T::table_name(),
            move |conn| Ok(Mapper::<T>::with_connection(conn).insert_returning(entity, &[])?.into()),
        ))
    }

    pub fn select_by_id<T, K>(&mut self, id: K, options: ReadOptions<'a>) -> Fetched<Option<T>>
    where
        T: Entity + 'a,
        K: ColumnValue + 'a,
    {
        self.read(move |mapper: Mapper<'_, T>| {
            let row = mapper.select_by_id(&id, &options)?;
            let rows = u64::from(row.is_some());
            Ok((row, rows))
        })
    }

    pub fn select_by_condition<T: Entity + 'a>(
        &mut self,
        filter: T,
        options: ReadOptions<'a>,
    ) -> Fetched<Vec<T>> {
        self.read(move |mapper: Mapper<'_, T>| {
            let rows = mapper.select_by_condition(&filter, &options)?;
            let count = rows.len() as u64;
            Ok((rows, count))
        })
    }

    pub fn select_by_map<T: Entity + 'a>(
        &mut self,
        filter: ColumnMap,
        options: ReadOptions<'a>,
    ) -> Fetched<Vec<T>> {
        self.read(move |mapper: Mapper<'_, T>| {
            let rows = mapper.select_by_map(&filter, &options)?;
            let count = rows.len() as u64;
            Ok((rows, count))
        })
    }

    pub fn select_by_where<T: Entity + 'a>(
        &mut self,
        predicate: &'a str,
        args: Vec<Value>,
        options: ReadOptions<'a>,
    ) -> Fetched<Vec<T>> {
        self.read(move |mapper: Mapper<'_, T>| {
            let rows = mapper.select_by_where(predicate, args, &options)?;
            let count = rows.len() as u64;
            Ok((rows, count))
        })
    }

    /// See [`Mapper::update_by_id`].
    pub fn update_by_id<T: Entity + 'a>(
        &mut self,
        entity: T,
        columns: &'a [&'a str],
    ) -> Option<Outcome> {
        self.write::<T, _>(OperationKind::Update, move |mapper| {
            mapper.update_by_id(&entity, columns)
        })
    }

    pub fn update_by_id_without_zero_field<T: Entity + 'a>(
        &mut self,
        entity: T,
        always_include: &'a [&'a str],
    ) -> Option<Outcome> {
        self.write::<T, _>(OperationKind::Update, move |mapper| {
            mapper.update_by_id_without_zero_field(&entity, always_include)
        })
    }

    pub fn update_by_condition<T: Entity + 'a>(&mut self, values: T, filter: T) -> Option<Outcome> {
        self.write::<T, _>(OperationKind::Update, move |mapper| {
            mapper.update_by_condition(&values, &filter)
        })
    }

    pub fn update_by_map<T: Entity + 'a>(
        &mut self,
        values: ColumnMap,
        filter: ColumnMap,
    ) -> Option<Outcome> {
        self.write::<T, _>(OperationKind::Update, move |mapper| {
            mapper.update_by_map(&values, &filter)
        })
    }

    pub fn update_by_where<T: Entity + 'a>(
        &mut self,
        values: ColumnMap,
        predicate: &'a str,
        args: Vec<Value>,
    ) -> Option<Outcome> {
        self.write::<T, _>(OperationKind::Update, move |mapper| {
            mapper.update_by_where(&values, predicate, args)
        })
    }

    pub fn delete_by_id<T, K>(&mut self, id: K) -> Option<Outcome>
    where
        T: Entity + 'a,
        K: ColumnValue + 'a,
    {
        self.write::<T, _>(OperationKind::Delete, move |mapper| mapper.delete_by_id(&id))
    }

    pub fn delete_by_condition<T: Entity + 'a>(&mut self, filter: T) -> Option<Outcome> {
        self.write::<T, _>(OperationKind::Delete, move |mapper| {
            mapper.delete_by_condition(&filter)
        })
    }

    pub fn delete_by_map<T: Entity + 'a>(&mut self, filter: ColumnMap) -> Option<Outcome> {
        self.write::<T, _>(OperationKind::Delete, move |mapper| {
            mapper.delete_by_map(&filter)
        })
    }

    pub fn delete_by_where<T: Entity + 'a>(
        &mut self,
        predicate: &'a str,
        args: Vec<Value>,
    ) -> Option<Outcome> {
        self.write::<T, _>(OperationKind::Delete, move |mapper| {
            mapper.delete_by_where(predicate, args)
        })
    }

    /// Runs caller SQL on the session connection.
    ///
    /// Return `Outcome::Affected` for writes that should honor the zero-rows
    /// policy, `Matched` or `NotInvoked` otherwise.
    pub fn customize<F>(&mut self, label: impl Into<String>, run: F) -> Option<Outcome>
    where
        F: FnOnce(&Connection) -> MapperResult<Outcome> + 'a,
    {
        self.queue_or_run(Operation::new(OperationKind::Custom, label, run))
    }

    fn read<T, R, F>(&mut self, run: F) -> Fetched<R>
    where
        T: Entity + 'a,
        R: 'a,
        F: FnOnce(Mapper<'_, T>) -> MapperResult<(R, u64)> + 'a,
    {
        let fetched = Fetched::new();
        let slot = fetched.clone();
        self.queue_or_run(Operation::new(
            OperationKind::Select,
            T::table_name(),
            move |conn| {
                let (value, rows) = run(Mapper::with_connection(conn))?;
                slot.fill(value);
                Ok(Outcome::Matched { rows })
            },
        ));
        fetched
    }

    fn write<T, F>(&mut self, kind: OperationKind, run: F) -> Option<Outcome>
    where
        T: Entity + 'a,
        F: FnOnce(Mapper<'_, T>) -> MapperResult<u64> + 'a,
    {
        self.queue_or_run(Operation::new(kind, T::table_name(), move |conn| {
            Ok(Outcome::affected(run(Mapper::with_connection(conn))?))
        }))
    }

    fn run_immediate(&mut self, index: usize, operation: Operation<'a>) -> Option<Outcome> {
        let result = self.run_step(index, operation);
        let Strategy::Immediate {
            last,
            committable,
            failure,
        } = &mut self.strategy
        else {
            return None;
        };
        match result {
            Ok(outcome) => {
                *last = outcome;
                Some(outcome)
            }
            Err(StepError::RollbackRequested) => {
                *committable = false;
                None
            }
            Err(StepError::Abort(err)) => {
                if let Some(outcome) = self.records[index].executed_outcome() {
                    *last = outcome;
                }
                *committable = false;
                if failure.is_none() {
                    *failure = Some(err);
                }
                None
            }
        }
    }

    fn replay(&mut self, queue: Vec<Operation<'a>>) -> Verdict {
        let mut verdict = Verdict::Commit;
        let mut stopped = false;
        for (index, operation) in queue.into_iter().enumerate() {
            if stopped {
                self.mark(index, StepStatus::Skipped);
                continue;
            }
            match self.run_step(index, operation) {
                Ok(_) => {}
                Err(StepError::RollbackRequested) => {
                    verdict = Verdict::Abort(None);
                    stopped = true;
                }
                Err(StepError::Abort(err)) => {
                    verdict = Verdict::Abort(Some(err));
                    stopped = true;
                }
            }
        }
        verdict
    }

    fn run_step(&mut self, index: usize, operation: Operation<'a>) -> Result<Outcome, StepError> {
        let kind = operation.kind();
        if self
            .cancellation
            .as_ref()
            .is_some_and(Cancellation::is_cancelled)
        {
            warn!(
                "event=tx_step module=tx status=cancelled index={index} kind={}",
                kind.as_str()
            );
            self.mark(index, StepStatus::Cancelled);
            return Err(StepError::Abort(TxError::Cancelled { index }));
        }

        let run = match operation.step {
            Step::Run(run) => run,
            Step::RollbackMarker => {
                info!("event=tx_step module=tx status=rollback_requested index={index}");
                self.mark(index, StepStatus::Executed(Outcome::NotInvoked));
                return Err(StepError::RollbackRequested);
            }
        };

        match run(self.handle.connection()) {
            Ok(outcome) => {
                self.mark(index, StepStatus::Executed(outcome));
                debug!(
                    "event=tx_step module=tx status=ok index={index} kind={} label={} rows={}",
                    kind.as_str(),
                    operation.label,
                    outcome.rows().map_or_else(|| "-".to_string(), |rows| rows.to_string())
                );
                if outcome.is_zero_row_write() && !self.allow_zero_rows {
                    warn!(
                        "event=tx_step module=tx status=zero_rows index={index} kind={} label={}",
                        kind.as_str(),
                        operation.label
                    );
                    return Err(StepError::Abort(TxError::ZeroRowsPolicyViolation { index }));
                }
                Ok(outcome)
            }
            Err(cause) => {
                warn!(
                    "event=tx_step module=tx status=error index={index} kind={} label={} error={cause}",
                    kind.as_str(),
                    operation.label
                );
                self.mark(index, StepStatus::Failed);
                Err(StepError::Abort(TxError::StepFailed { index, cause }))
            }
        }
    }

    fn finish(&mut self, verdict: Verdict) -> TxResult<TxState> {
        match verdict {
            Verdict::Commit => match self.handle.commit() {
                Ok(()) => {
                    self.state = TxState::Committed;
                    info!(
                        "event=tx_commit module=tx status=ok mode={} steps={}",
                        self.mode.as_str(),
                        self.records.len()
                    );
                    Ok(TxState::Committed)
                }
                Err(cause) => {
                    error!("event=tx_commit module=tx status=error error={cause}");
                    if let Err(rollback_err) = self.handle.rollback() {
                        error!(
                            "event=tx_rollback module=tx status=error trigger=commit_failed error={rollback_err}"
                        );
                    }
                    self.state = TxState::RolledBack;
                    Err(TxError::CommitFailed { cause })
                }
            },
            Verdict::Abort(failure) => {
                let rolled_back = self.handle.rollback();
                self.state = TxState::RolledBack;
                match (failure, rolled_back) {
                    (None, Ok(())) => {
                        info!(
                            "event=tx_rollback module=tx status=ok mode={} trigger=requested",
                            self.mode.as_str()
                        );
                        Ok(TxState::RolledBack)
                    }
                    (Some(err), Ok(())) => {
                        warn!(
                            "event=tx_rollback module=tx status=ok mode={} trigger=step error={err}",
                            self.mode.as_str()
                        );
                        Err(err)
                    }
                    (Some(err), Err(rollback_err)) => {
                        error!(
                            "event=tx_rollback module=tx status=error trigger=step cause={err} error={rollback_err}"
                        );
                        Err(err)
                    }
                    (None, Err(cause)) => {
                        error!(
                            "event=tx_rollback module=tx status=error trigger=requested error={cause}"
                        );
                        Err(TxError::RollbackFailed { cause })
                    }
                }
            }
        }
    }

    fn mark(&mut self, index: usize, status: StepStatus) {
        if let Some(record) = self.records.get_mut(index) {
            record.status = status;
        }
    }
}

impl<H: TxHandle> Drop for Session<'_, H> {
    fn drop(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        let pending = match &self.strategy {
            Strategy::Deferred { queue } => queue.len(),
            Strategy::Immediate { .. } => self.records.len(),
        };
        if pending > 0 {
            warn!(
                "event=tx_abandoned module=tx status=warn mode={} steps={pending}",
                self.mode.as_str()
            );
        }
    }
}
