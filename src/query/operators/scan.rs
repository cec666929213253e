//! Table scan over a pluggable source.

use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::query::physical::{
    check_compile, BoxRowSource, Convention, PhysicalRel, RelRef, RowSource, Step,
};
use crate::query::schema::RowSchema;
use crate::query::sink::Continuation;
use crate::query::source::{RowIter, TableSource};

/// Reads every row of a [`TableSource`].
#[derive(Debug, Clone)]
pub struct ScanRel {
    table: Arc<dyn TableSource>,
    convention: Convention,
}

impl ScanRel {
    /// Creates a physical scan.
    pub fn new(table: Arc<dyn TableSource>) -> Self {
        Self {
            table,
            convention: Convention::Physical,
        }
    }

    /// Scanned source.
    pub fn table(&self) -> &Arc<dyn TableSource> {
        &self.table
    }
}

impl PhysicalRel for ScanRel {
    fn name(&self) -> &'static str {
        "Scan"
    }

    fn convention(&self) -> Convention {
        self.convention
    }

    fn schema(&self) -> &RowSchema {
        self.table.schema()
    }

    fn inputs(&self) -> &[RelRef] {
        &[]
    }

    fn compile(&self, next: Continuation) -> Result<BoxRowSource> {
        check_compile(self, &next)?;
        let rows = self.table.open()?;
        debug!(table = self.table.name(), "pipeline.compile.scan");
        Ok(Box::new(ScanSource { rows, next }))
    }

    fn display(&self) -> String {
        format!("Scan({})", self.table.name())
    }
}

struct ScanSource {
    rows: RowIter,
    next: Continuation,
}

impl RowSource for ScanSource {
    fn name(&self) -> &'static str {
        "Scan"
    }

    fn step(&mut self) -> Result<Step> {
        match self.rows.next() {
            Some(row) => {
                self.next.push(row?)?;
                Ok(Step::Continue)
            }
            None => Ok(Step::Done),
        }
    }
}
