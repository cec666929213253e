//! Pluggable table sources consumed through a uniform scan interface.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{PipelineError, Result};
use crate::query::schema::{Row, RowSchema};

/// Iterator over a source's rows.
pub type RowIter = Box<dyn Iterator<Item = Result<Row>> + Send>;

/// Data that lives outside the plan tree.
///
/// A source must only produce rows matching [`TableSource::schema`] and must
/// end deterministically. Sources that cannot be read fail in
/// [`TableSource::open`], which the scan operator calls at compile time.
pub trait TableSource: Send + Sync + fmt::Debug {
    /// Name used in EXPLAIN output.
    fn name(&self) -> &str;

    /// Declared row schema.
    fn schema(&self) -> &RowSchema;

    /// Starts a fresh pass over the rows.
    fn open(&self) -> Result<RowIter>;
}

/// Rows held in memory, typically test fixtures or mock tables.
#[derive(Debug, Clone)]
pub struct MemoryTable {
    name: String,
    schema: RowSchema,
    rows: Arc<[Row]>,
}

impl MemoryTable {
    /// Creates a table over `rows`. Every row must fit `schema`.
    pub fn new(name: impl Into<String>, schema: RowSchema, rows: Vec<Row>) -> Result<Self> {
        schema.check_rows("MemoryTable rows", &rows)?;
        Ok(Self {
            name: name.into(),
            schema,
            rows: rows.into(),
        })
    }
}

impl TableSource for MemoryTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> &RowSchema {
        &self.schema
    }

    fn open(&self) -> Result<RowIter> {
        let rows = Arc::clone(&self.rows);
        Ok(Box::new((0..rows.len()).map(move |idx| Ok(rows[idx].clone()))))
    }
}

/// Columnar file on local disk. Reading is not implemented yet; opening fails.
#[derive(Debug, Clone)]
pub struct ParquetFile {
    label: String,
    path: PathBuf,
    schema: RowSchema,
}

impl ParquetFile {
    /// Creates a source for the file at `path`.
    pub fn new(path: impl Into<PathBuf>, schema: RowSchema) -> Self {
        let path = path.into();
        Self {
            label: format!("file:{}", path.display()),
            path,
            schema,
        }
    }

    /// Location on disk.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl TableSource for ParquetFile {
    fn name(&self) -> &str {
        &self.label
    }

    fn schema(&self) -> &RowSchema {
        &self.schema
    }

    fn open(&self) -> Result<RowIter> {
        Err(PipelineError::unsupported("parquet file scan"))
    }
}

/// Name-to-source lookup used when plans reference tables by name.
#[derive(Debug, Default, Clone)]
pub struct TableRegistry {
    tables: HashMap<String, Arc<dyn TableSource>>,
}

impl TableRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `source` under its own name, replacing any previous entry.
    pub fn register(&mut self, source: Arc<dyn TableSource>) -> &mut Self {
        self.tables.insert(source.name().to_owned(), source);
        self
    }

    /// Resolves a table by name.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn TableSource>> {
        self.tables
            .get(name)
            .cloned()
            .ok_or_else(|| PipelineError::UnknownTable {
                name: name.to_owned(),
            })
    }

    /// Number of registered tables.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::schema::Column;
    use crate::query::value::{DataType, Value};

    fn schema() -> RowSchema {
        RowSchema::new(vec![Column::new("n", DataType::Int)])
    }

    #[test]
    fn memory_table_reopens_from_the_start() -> Result<()> {
        let table = MemoryTable::new("nums", schema(), vec![vec![Value::Int(1)], vec![Value::Int(2)]])?;
        let first: Vec<Row> = table.open()?.collect::<Result<_>>()?;
        let second: Vec<Row> = table.open()?.collect::<Result<_>>()?;
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        Ok(())
    }

    #[test]
    fn parquet_file_is_unsupported() {
        let file = ParquetFile::new("/tmp/data.parquet", schema());
        let err = file.open().err().expect("open must fail");
        assert_eq!(err.code(), "Unsupported");
        assert_eq!(file.name(), "file:/tmp/data.parquet");
    }

    #[test]
    fn memory_table_rejects_rows_outside_its_schema() {
        let ids = RowSchema::new(vec![
            Column::not_null("id", DataType::Int),
            Column::new("s", DataType::String),
        ]);
        let wrong_type = MemoryTable::new("t", ids.clone(), vec![vec![Value::from("oops")]]);
        assert_eq!(wrong_type.unwrap_err().code(), "SchemaMismatch");

        let null_in_not_null = MemoryTable::new("t", ids, vec![vec![Value::Null, Value::Int(5)]]);
        assert_eq!(null_in_not_null.unwrap_err().code(), "SchemaMismatch");
    }

    #[test]
    fn registry_resolves_by_name() -> Result<()> {
        let mut registry = TableRegistry::new();
        assert!(registry.is_empty());
        registry.register(Arc::new(MemoryTable::new("nums", schema(), Vec::new())?));
        assert_eq!(registry.len(), 1);
        assert!(registry.resolve("nums").is_ok());
        let err = registry.resolve("missing").unwrap_err();
        assert!(matches!(err, PipelineError::UnknownTable { name } if name == "missing"));
        Ok(())
    }
}
