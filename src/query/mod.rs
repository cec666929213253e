#![forbid(unsafe_code)]

//! Physical plan compilation and the row pipeline protocol.
//!
//! A finished plan is a tree of [`physical::PhysicalRel`] nodes. Compiling it
//! against a terminal continuation yields a single [`physical::RowSource`];
//! the [`executor::Executor`] steps that source until it reports `Done`.

/// Plan entry point and the two-phase prepared plan.
pub mod entry;

/// Execution adapter.
///
/// Steps compiled sources to exhaustion and enforces cancellation and timeouts.
pub mod executor;

/// Scalar expressions evaluated by filters, projections, and joins.
pub mod expr;

/// Physical operator implementations.
pub mod operators;

/// Physical plan nodes and the producer side of the protocol.
pub mod physical;

/// Serialized plan documents.
pub mod plan_spec;

/// Performance profiling for compilation and execution.
///
/// Collects timing and count statistics when `ROWPIPE_PROFILE` is set.
pub mod profile;

/// Row shapes.
pub mod schema;

/// Continuations: the consumer side of the protocol.
pub mod sink;

/// Pluggable table sources.
pub mod source;

/// Scalar values and their types.
pub mod value;

pub use entry::{compile_plan, PlanEntry, PreparedPlan};
pub use executor::{Executor, ExecutorOptions, QueryResult, RunStats};
pub use physical::{BoxRowSource, Convention, PhysicalRel, RelRef, RowSource, Step};
pub use plan_spec::{PlanDocument, PlanSpec};
pub use schema::{Column, Row, RowSchema};
pub use sink::{Continuation, LateBind, LazySink, ResultBuffer, RowSink};
pub use value::{DataType, Value};
