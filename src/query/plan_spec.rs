//! Serialized plan documents.
//!
//! The planner normally hands over a tree of [`RelRef`]s directly. Plan
//! documents are the file form of that tree, used by the CLI and by tests that
//! keep fixtures on disk.
//!
//! ```json
//! {
//!   "tables": {
//!     "people": {
//!       "columns": [{"name": "id", "data_type": "Int"}],
//!       "rows": [[{"t": "Int", "v": 1}]]
//!     }
//!   },
//!   "plan": {"op": "scan", "table": "people"}
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::query::expr::ScalarExpr;
use crate::query::operators::{
    FilterRel, NestedLoopJoinRel, ProjectField, ProjectRel, ScanRel, UnionRel, ValuesRel,
};
use crate::query::physical::{Convention, RelRef};
use crate::query::schema::{Column, Row, RowSchema};
use crate::query::source::{MemoryTable, ParquetFile, TableRegistry};

/// In-memory table declared inside a plan document.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TableSpec {
    /// Declared columns.
    pub columns: Vec<Column>,
    /// Table rows.
    #[serde(default)]
    pub rows: Vec<Row>,
}

/// One planned node.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PlanSpec {
    /// Literal tuples.
    Values {
        /// Declared columns.
        columns: Vec<Column>,
        /// Tuples in declaration order.
        #[serde(default)]
        rows: Vec<Row>,
        /// Execution-mode marker; defaults to physical.
        #[serde(default)]
        convention: Convention,
    },
    /// N-ary union.
    Union {
        /// Declared columns.
        columns: Vec<Column>,
        /// Keep duplicates.
        #[serde(default = "default_all")]
        all: bool,
        /// Inputs.
        inputs: Vec<PlanSpec>,
    },
    /// Scan of a table declared in the document.
    Scan {
        /// Table name.
        table: String,
    },
    /// Scan of a columnar file on disk.
    File {
        /// File path.
        path: String,
        /// Declared columns.
        columns: Vec<Column>,
    },
    /// Row filter.
    Filter {
        /// Boolean predicate.
        predicate: ScalarExpr,
        /// Input.
        input: Box<PlanSpec>,
    },
    /// Projection.
    Project {
        /// Output fields.
        fields: Vec<ProjectField>,
        /// Input.
        input: Box<PlanSpec>,
    },
    /// Nested-loop inner join.
    Join {
        /// Optional join condition over the combined row.
        #[serde(default)]
        condition: Option<ScalarExpr>,
        /// Left input.
        left: Box<PlanSpec>,
        /// Right input.
        right: Box<PlanSpec>,
    },
}

fn default_all() -> bool {
    true
}

impl PlanSpec {
    /// Builds the node tree, resolving scans against `tables`.
    pub fn build(&self, tables: &TableRegistry) -> Result<RelRef> {
        let rel: RelRef = match self {
            PlanSpec::Values {
                columns,
                rows,
                convention,
            } => {
                let schema = RowSchema::new(columns.clone());
                schema.check_rows("Values tuples", rows)?;
                Arc::new(ValuesRel::new(schema, rows.clone()).with_convention(*convention))
            }
            PlanSpec::Union {
                columns,
                all,
                inputs,
            } => {
                let inputs = inputs
                    .iter()
                    .map(|input| input.build(tables))
                    .collect::<Result<Vec<_>>>()?;
                Arc::new(UnionRel::new(RowSchema::new(columns.clone()), inputs, *all)?)
            }
            PlanSpec::Scan { table } => Arc::new(ScanRel::new(tables.resolve(table)?)),
            PlanSpec::File { path, columns } => Arc::new(ScanRel::new(Arc::new(
                ParquetFile::new(path, RowSchema::new(columns.clone())),
            ))),
            PlanSpec::Filter { predicate, input } => {
                Arc::new(FilterRel::new(input.build(tables)?, predicate.clone())?)
            }
            PlanSpec::Project { fields, input } => {
                Arc::new(ProjectRel::new(input.build(tables)?, fields.clone())?)
            }
            PlanSpec::Join {
                condition,
                left,
                right,
            } => Arc::new(NestedLoopJoinRel::new(
                left.build(tables)?,
                right.build(tables)?,
                condition.clone(),
            )?),
        };
        Ok(rel)
    }
}

/// A plan plus the tables it scans.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlanDocument {
    /// Tables available to `scan` nodes.
    #[serde(default)]
    pub tables: BTreeMap<String, TableSpec>,
    /// Root node.
    pub plan: PlanSpec,
}

impl PlanDocument {
    /// Parses a document from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Reads and parses a document from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Registers the document's tables. Fails if a table row does not fit its
    /// declared columns.
    pub fn registry(&self) -> Result<TableRegistry> {
        let mut registry = TableRegistry::new();
        for (name, table) in &self.tables {
            registry.register(Arc::new(MemoryTable::new(
                name.clone(),
                RowSchema::new(table.columns.clone()),
                table.rows.clone(),
            )?));
        }
        Ok(registry)
    }

    /// Builds the root node.
    pub fn build(&self) -> Result<RelRef> {
        let registry = self.registry()?;
        let plan = self.plan.build(&registry)?;
        debug!(tables = registry.len(), root = plan.name(), "plan_document.build");
        Ok(plan)
    }
}
