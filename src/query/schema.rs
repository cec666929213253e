//! Row schemas fixed at compile time.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::query::value::{DataType, Value};

/// Single output row: one value per schema column, in column order.
pub type Row = Vec<Value>;

/// Column declared by the planner for a node's output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name; informational only, never compared.
    pub name: String,
    /// Declared type.
    pub data_type: DataType,
    /// Whether the column may carry nulls.
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

fn default_nullable() -> bool {
    true
}

impl Column {
    /// Creates a nullable column.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
        }
    }

    /// Creates a column that never carries nulls.
    pub fn not_null(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: false,
        }
    }
}

/// Ordered list of columns describing every row a node produces.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowSchema {
    columns: Vec<Column>,
}

impl RowSchema {
    /// Creates a schema from its columns.
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    /// Number of columns.
    pub fn arity(&self) -> usize {
        self.columns.len()
    }

    /// Columns in order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column at `index`, if any.
    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// Column names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|column| column.name.as_str())
    }

    /// Returns a schema with `other`'s columns appended after these.
    pub fn concat(&self, other: &RowSchema) -> RowSchema {
        let mut columns = self.columns.clone();
        columns.extend(other.columns.iter().cloned());
        RowSchema { columns }
    }

    /// Whether rows declared by `producer` may be pushed into a consumer with
    /// this schema.
    ///
    /// Arity and per-position types must match exactly. A nullable producer
    /// column cannot feed a non-nullable consumer column. Names are ignored.
    pub fn accepts(&self, producer: &RowSchema) -> bool {
        self.arity() == producer.arity()
            && self
                .columns
                .iter()
                .zip(&producer.columns)
                .all(|(consumer, produced)| {
                    consumer.data_type == produced.data_type
                        && (consumer.nullable || !produced.nullable)
                })
    }

    /// Whether `row` has this schema's arity and every value fits its column.
    pub fn admits(&self, row: &[Value]) -> bool {
        row.len() == self.arity()
            && self.columns.iter().zip(row).all(|(column, value)| {
                match value.data_type() {
                    None => column.nullable,
                    Some(ty) => ty == column.data_type,
                }
            })
    }

    /// Fails with `SchemaMismatch` on the first row this schema does not admit.
    pub fn check_rows(&self, context: &'static str, rows: &[Row]) -> Result<()> {
        match rows.iter().position(|row| !self.admits(row)) {
            Some(idx) => Err(PipelineError::schema_mismatch(
                context,
                self,
                format!("row {idx} {:?}", rows[idx]),
            )),
            None => Ok(()),
        }
    }
}

impl fmt::Display for RowSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (idx, column) in self.columns.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} {}", column.name, column.data_type)?;
            if !column.nullable {
                f.write_str(" NOT NULL")?;
            }
        }
        f.write_str(")")
    }
}

impl FromIterator<Column> for RowSchema {
    fn from_iter<I: IntoIterator<Item = Column>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
