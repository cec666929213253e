//! Row pipeline protocol: planned nodes compile into executable row sources.
//!
//! Compilation runs top-down. A parent hands its continuation (the sink that
//! should receive its output) to [`PhysicalRel::compile`], and the node either
//! produces rows into it directly or wraps it in a sink of its own and compiles
//! its inputs against that. Rows then flow bottom-up at run time: the driver
//! steps the returned [`RowSource`], which pushes rows into the continuation.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::query::schema::RowSchema;
use crate::query::sink::Continuation;

/// Execution-mode marker carried by every planned node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Convention {
    /// Abstract operator that has not been lowered; cannot be compiled.
    Logical,
    /// Fully lowered operator that compiles into a row source.
    #[default]
    Physical,
}

impl fmt::Display for Convention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Convention::Logical => f.write_str("NONE"),
            Convention::Physical => f.write_str("PHYSICAL"),
        }
    }
}

/// Shared handle to a planned node.
pub type RelRef = Arc<dyn PhysicalRel>;

/// A planned relational node that compiles into an executable row source.
///
/// Implementations are immutable once wrapped in a [`RelRef`]. Adding an
/// operator kind means adding a new implementation; nothing dispatches on a
/// central list of kinds.
pub trait PhysicalRel: Send + Sync + fmt::Debug {
    /// Operator name used in errors and EXPLAIN output.
    fn name(&self) -> &'static str;

    /// Execution-mode marker.
    fn convention(&self) -> Convention;

    /// Schema of every row this node produces.
    fn schema(&self) -> &RowSchema;

    /// Input nodes in order.
    fn inputs(&self) -> &[RelRef];

    /// Compiles the node so that its output rows are pushed into `next`.
    ///
    /// Fails when the node is not physical or when `next` does not accept this
    /// node's schema. Compiling the same node twice yields two independent
    /// sources over the same plan.
    fn compile(&self, next: Continuation) -> Result<BoxRowSource>;

    /// One-line description for EXPLAIN.
    fn display(&self) -> String {
        self.name().to_string()
    }

    /// Indented operator tree.
    fn explain(&self, indent: usize) -> String {
        let prefix = "  ".repeat(indent);
        let mut output = format!("{prefix}{}\n", self.display());
        for input in self.inputs() {
            output.push_str(&input.explain(indent + 1));
        }
        output
    }
}

/// Outcome of a single [`RowSource::step`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// Progress was made; at most one row was pushed. Step again.
    Continue,
    /// End of data. Further steps keep returning `Done`.
    Done,
}

/// Executable unit handed to the driver.
///
/// A source owns everything it needs to produce rows, including the
/// continuation it was compiled against. The driver resumes it one step at a
/// time; abandoning a query is simply not stepping it again, and any resource
/// the source holds is released when it is dropped.
pub trait RowSource: Send {
    /// Operator name for logging.
    fn name(&self) -> &'static str;

    /// Advances the source by one unit of work.
    fn step(&mut self) -> Result<Step>;
}

/// Boxed row source.
pub type BoxRowSource = Box<dyn RowSource>;

/// Rejects a node that is not in the physical convention.
pub fn ensure_physical(operator: &'static str, found: Convention) -> Result<()> {
    if found != Convention::Physical {
        return Err(PipelineError::ConventionMismatch {
            operator,
            expected: Convention::Physical,
            found,
        });
    }
    Ok(())
}

/// Rejects any input that is not in the physical convention.
pub fn ensure_physical_inputs(operator: &'static str, inputs: &[RelRef]) -> Result<()> {
    inputs
        .iter()
        .try_for_each(|input| ensure_physical(operator, input.convention()))
}

/// Checks that `next` accepts rows shaped like `produced`.
pub fn ensure_accepts(
    context: &'static str,
    next: &Continuation,
    produced: &RowSchema,
) -> Result<()> {
    if !next.schema().accepts(produced) {
        return Err(PipelineError::schema_mismatch(context, next.schema(), produced));
    }
    Ok(())
}

/// Compile-time checks every operator performs before compiling: its own
/// convention, then the continuation's schema.
pub fn check_compile(rel: &dyn PhysicalRel, next: &Continuation) -> Result<()> {
    ensure_physical(rel.name(), rel.convention())?;
    ensure_accepts(rel.name(), next, rel.schema())
}
