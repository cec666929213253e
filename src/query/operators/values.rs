//! Literal values source.

use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::query::physical::{
    check_compile, BoxRowSource, Convention, PhysicalRel, RelRef, RowSource, Step,
};
use crate::query::schema::{Row, RowSchema};
use crate::query::sink::Continuation;

/// Constant table supplied by the planner, e.g. the rows of `VALUES (...)`.
///
/// Tuples are trusted to match the schema; the planner type-checked them.
#[derive(Debug, Clone)]
pub struct ValuesRel {
    schema: RowSchema,
    tuples: Arc<[Row]>,
    convention: Convention,
}

impl ValuesRel {
    /// Creates a physical values node.
    pub fn new(schema: RowSchema, tuples: Vec<Row>) -> Self {
        Self {
            schema,
            tuples: tuples.into(),
            convention: Convention::Physical,
        }
    }

    /// Overrides the execution-mode marker.
    pub fn with_convention(mut self, convention: Convention) -> Self {
        self.convention = convention;
        self
    }

    /// Literal tuples in declaration order.
    pub fn tuples(&self) -> &[Row] {
        &self.tuples
    }
}

impl PhysicalRel for ValuesRel {
    fn name(&self) -> &'static str {
        "Values"
    }

    fn convention(&self) -> Convention {
        self.convention
    }

    fn schema(&self) -> &RowSchema {
        &self.schema
    }

    fn inputs(&self) -> &[RelRef] {
        &[]
    }

    fn compile(&self, next: Continuation) -> Result<BoxRowSource> {
        check_compile(self, &next)?;
        debug!(rows = self.tuples.len(), "pipeline.compile.values");
        Ok(Box::new(ValuesSource {
            tuples: Arc::clone(&self.tuples),
            cursor: 0,
            next,
        }))
    }

    fn display(&self) -> String {
        format!("Values(rows={})", self.tuples.len())
    }
}

/// Pushes one literal tuple per step, then reports `Done`.
struct ValuesSource {
    tuples: Arc<[Row]>,
    cursor: usize,
    next: Continuation,
}

impl RowSource for ValuesSource {
    fn name(&self) -> &'static str {
        "Values"
    }

    fn step(&mut self) -> Result<Step> {
        let Some(row) = self.tuples.get(self.cursor) else {
            return Ok(Step::Done);
        };
        self.cursor += 1;
        self.next.push(row.clone())?;
        Ok(Step::Continue)
    }
}
