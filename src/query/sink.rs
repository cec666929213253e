//! Continuations: the downstream targets producers push rows into.
//!
//! A continuation is shared, never copied. Every branch of a union receives a
//! clone of the same [`Continuation`] handle, so a sink must tolerate pushes from
//! several producers. The sinks in this crate are either stateless or guard
//! their state with a lock; the bundled executor also steps branches one at a
//! time.

use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::query::schema::{Row, RowSchema};

/// Consumer of rows.
pub trait RowSink: Send + Sync {
    /// Schema of the rows this sink accepts.
    fn schema(&self) -> &RowSchema;

    /// Receives the next row.
    fn push(&self, row: Row) -> Result<()>;

    /// Called once by the driver on the terminal continuation after every
    /// source reached end-of-data.
    fn finish(&self) -> Result<()> {
        Ok(())
    }
}

/// Shared handle to a sink.
pub type Continuation = Arc<dyn RowSink>;

/// Attaches a continuation to something compiled before its consumer existed.
pub trait LateBind {
    /// Binds the continuation. Succeeds at most once per instance.
    fn bind(&self, next: Continuation) -> Result<()>;
}

/// Terminal sink that materializes rows.
pub struct ResultBuffer {
    schema: RowSchema,
    state: Mutex<BufferState>,
}

#[derive(Default)]
struct BufferState {
    rows: Vec<Row>,
    finished: bool,
}

impl ResultBuffer {
    /// Creates an empty buffer for rows of `schema`.
    pub fn new(schema: RowSchema) -> Arc<Self> {
        Arc::new(Self {
            schema,
            state: Mutex::new(BufferState::default()),
        })
    }

    /// Number of rows received so far.
    pub fn len(&self) -> usize {
        self.state.lock().rows.len()
    }

    /// True when no row has been received.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the driver signalled completion.
    pub fn is_finished(&self) -> bool {
        self.state.lock().finished
    }

    /// Takes the received rows, leaving the buffer empty.
    pub fn take_rows(&self) -> Vec<Row> {
        std::mem::take(&mut self.state.lock().rows)
    }

    /// Copies the received rows.
    pub fn rows(&self) -> Vec<Row> {
        self.state.lock().rows.clone()
    }
}

impl RowSink for ResultBuffer {
    fn schema(&self) -> &RowSchema {
        &self.schema
    }

    fn push(&self, row: Row) -> Result<()> {
        self.state.lock().rows.push(row);
        Ok(())
    }

    fn finish(&self) -> Result<()> {
        self.state.lock().finished = true;
        Ok(())
    }
}

impl fmt::Debug for ResultBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultBuffer")
            .field("schema", &self.schema)
            .field("rows", &self.len())
            .finish()
    }
}

/// Continuation whose real target is attached after the producers compiled
/// against it.
///
/// The target slot is write-once: the first [`LateBind::bind`] wins and every
/// later attempt fails with [`PipelineError::AlreadyBound`]. Pushing before the
/// slot is filled fails with [`PipelineError::Unbound`].
pub struct LazySink {
    schema: RowSchema,
    target: OnceLock<Continuation>,
}

impl LazySink {
    /// Creates an unbound sink that accepts rows of `schema`.
    pub fn new(schema: RowSchema) -> Arc<Self> {
        Arc::new(Self {
            schema,
            target: OnceLock::new(),
        })
    }

    /// Whether a target has been attached.
    pub fn is_bound(&self) -> bool {
        self.target.get().is_some()
    }

    /// Fails with [`PipelineError::Unbound`] unless a target is attached.
    pub fn ensure_bound(&self) -> Result<()> {
        self.target().map(|_| ())
    }

    fn target(&self) -> Result<&Continuation> {
        self.target
            .get()
            .ok_or(PipelineError::Unbound { sink: "lazy sink" })
    }
}

impl LateBind for LazySink {
    fn bind(&self, next: Continuation) -> Result<()> {
        if self.is_bound() {
            return Err(PipelineError::AlreadyBound { sink: "lazy sink" });
        }
        if !next.schema().accepts(&self.schema) {
            return Err(PipelineError::schema_mismatch(
                "late bind",
                next.schema(),
                &self.schema,
            ));
        }
        self.target
            .set(next)
            .map_err(|_| PipelineError::AlreadyBound { sink: "lazy sink" })?;
        debug!(schema = %self.schema, "pipeline.lazy_sink.bound");
        Ok(())
    }
}

impl RowSink for LazySink {
    fn schema(&self) -> &RowSchema {
        &self.schema
    }

    fn push(&self, row: Row) -> Result<()> {
        self.target()?.push(row)
    }

    fn finish(&self) -> Result<()> {
        self.target()?.finish()
    }
}

impl fmt::Debug for LazySink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazySink")
            .field("schema", &self.schema)
            .field("bound", &self.is_bound())
            .finish()
    }
}
