//! Row filter.

use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::query::expr::{check_predicate, ScalarExpr};
use crate::query::physical::{
    check_compile, ensure_physical_inputs, BoxRowSource, Convention, PhysicalRel, RelRef,
};
use crate::query::profile::{profile_timer, record_profile_timer, QueryProfileKind};
use crate::query::schema::{Row, RowSchema};
use crate::query::sink::{Continuation, RowSink};

/// Forwards input rows whose predicate evaluates to `TRUE`.
#[derive(Debug, Clone)]
pub struct FilterRel {
    input: [RelRef; 1],
    predicate: ScalarExpr,
}

impl FilterRel {
    /// Creates a filter; the predicate must be boolean over the input schema.
    pub fn new(input: RelRef, predicate: ScalarExpr) -> Result<Self> {
        ensure_physical_inputs("Filter", std::slice::from_ref(&input))?;
        check_predicate(&predicate, input.schema())?;
        Ok(Self {
            input: [input],
            predicate,
        })
    }

    /// Filter predicate.
    pub fn predicate(&self) -> &ScalarExpr {
        &self.predicate
    }
}

impl PhysicalRel for FilterRel {
    fn name(&self) -> &'static str {
        "Filter"
    }

    fn convention(&self) -> Convention {
        Convention::Physical
    }

    fn schema(&self) -> &RowSchema {
        self.input[0].schema()
    }

    fn inputs(&self) -> &[RelRef] {
        &self.input
    }

    fn compile(&self, next: Continuation) -> Result<BoxRowSource> {
        check_compile(self, &next)?;
        debug!(predicate = %self.predicate, "pipeline.compile.filter");
        let sink = Arc::new(FilterSink {
            schema: self.schema().clone(),
            predicate: self.predicate.clone(),
            next,
        });
        self.input[0].compile(sink)
    }

    fn display(&self) -> String {
        format!("Filter({})", self.predicate)
    }
}

/// Input slot of a filter: stateless apart from its immutable predicate.
struct FilterSink {
    schema: RowSchema,
    predicate: ScalarExpr,
    next: Continuation,
}

impl RowSink for FilterSink {
    fn schema(&self) -> &RowSchema {
        &self.schema
    }

    fn push(&self, row: Row) -> Result<()> {
        let timer = profile_timer();
        let keep = self.predicate.matches(&row);
        record_profile_timer(QueryProfileKind::Filter, timer);
        if keep? {
            self.next.push(row)?;
        }
        Ok(())
    }
}
