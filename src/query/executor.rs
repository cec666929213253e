//! Execution adapter: drives compiled pipelines to exhaustion.
//!
//! The executor is the only component that steps sources. It checks the
//! cancellation token and the deadline between steps; operators themselves
//! never observe either.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};
use crate::query::entry::{compile_plan, PlanEntry, PreparedPlan};
use crate::query::physical::{BoxRowSource, RelRef, Step};
use crate::query::profile::{profile_timer, record_profile_timer, record_steps, QueryProfileKind};
use crate::query::schema::{Row, RowSchema};
use crate::query::sink::{LateBind, LazySink, ResultBuffer, RowSink};

/// Executor tuning.
#[derive(Clone, Debug, Default)]
pub struct ExecutorOptions {
    /// Abort a run that takes longer than this.
    pub timeout: Option<Duration>,
}

/// Counters for one driven pipeline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Number of source steps, including the final `Done`.
    pub steps: u64,
    /// Wall time spent driving.
    pub elapsed: Duration,
}

/// Materialised result returned by [`Executor::execute`].
#[derive(Debug, Serialize)]
pub struct QueryResult {
    /// Output schema.
    pub schema: RowSchema,
    /// Rows in the order they reached the terminal continuation.
    pub rows: Vec<Row>,
    /// Drive counters.
    #[serde(skip)]
    pub stats: RunStats,
}

/// Drives compiled pipelines.
#[derive(Clone, Debug, Default)]
pub struct Executor {
    opts: ExecutorOptions,
}

impl Executor {
    /// Creates an executor with the given options.
    pub fn new(opts: ExecutorOptions) -> Self {
        Self { opts }
    }

    /// Options in effect.
    pub fn options(&self) -> &ExecutorOptions {
        &self.opts
    }

    /// Compiles and runs `plan`, collecting every row into memory.
    pub fn execute(&self, plan: &RelRef, cancel: Option<Arc<AtomicBool>>) -> Result<QueryResult> {
        let schema = plan.schema().clone();
        let buffer = ResultBuffer::new(schema.clone());
        let then = LazySink::new(schema.clone());
        then.bind(buffer.clone())?;
        let entry = PlanEntry::new(Arc::clone(plan), then)?;
        let stats = self.run(&entry, cancel)?;
        Ok(QueryResult {
            schema,
            rows: buffer.take_rows(),
            stats,
        })
    }

    /// Compiles the entry's plan against its terminal continuation and drives
    /// it to end-of-data.
    pub fn run(&self, entry: &PlanEntry, cancel: Option<Arc<AtomicBool>>) -> Result<RunStats> {
        entry.then().ensure_bound()?;
        let source = compile_plan(entry.plan(), entry.then().clone())?;
        self.drive_source(source, entry.then().as_ref(), cancel)
    }

    /// Drives a prepared plan whose consumer has been bound.
    pub fn drive(&self, prepared: PreparedPlan, cancel: Option<Arc<AtomicBool>>) -> Result<RunStats> {
        let (source, then) = prepared.into_parts()?;
        self.drive_source(source, then.as_ref(), cancel)
    }

    fn drive_source(
        &self,
        mut source: BoxRowSource,
        terminal: &dyn RowSink,
        cancel: Option<Arc<AtomicBool>>,
    ) -> Result<RunStats> {
        let started = Instant::now();
        let deadline = self.opts.timeout.map(|timeout| started + timeout);
        let timer = profile_timer();
        debug!(source = source.name(), "executor.drive.start");
        let mut steps = 0u64;
        let outcome = loop {
            if let Some(flag) = &cancel {
                if flag.load(Ordering::SeqCst) {
                    warn!(steps, "executor.drive.cancelled");
                    break Err(PipelineError::Cancelled);
                }
            }
            if let (Some(deadline), Some(timeout)) = (deadline, self.opts.timeout) {
                if Instant::now() >= deadline {
                    let timeout_ms = timeout.as_millis().min(u64::MAX as u128) as u64;
                    warn!(steps, timeout_ms, "executor.drive.timeout");
                    break Err(PipelineError::Timeout { timeout_ms });
                }
            }
            steps += 1;
            match source.step() {
                Ok(Step::Continue) => {}
                Ok(Step::Done) => break Ok(()),
                Err(err) => break Err(err),
            }
        };
        record_profile_timer(QueryProfileKind::Drive, timer);
        record_steps(steps);
        outcome?;
        terminal.finish()?;
        let stats = RunStats {
            steps,
            elapsed: started.elapsed(),
        };
        info!(
            source = source.name(),
            steps,
            elapsed_us = stats.elapsed.as_micros().min(u64::MAX as u128) as u64,
            "executor.drive.finish"
        );
        Ok(stats)
    }
}
