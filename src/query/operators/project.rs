//! Projection.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::query::expr::{project_column, ScalarExpr};
use crate::query::physical::{
    check_compile, ensure_physical_inputs, BoxRowSource, Convention, PhysicalRel, RelRef,
};
use crate::query::schema::{Row, RowSchema};
use crate::query::sink::{Continuation, RowSink};

/// Output column computed from an input row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectField {
    /// Expression over the input columns.
    pub expr: ScalarExpr,
    /// Output column name.
    pub alias: String,
}

impl ProjectField {
    /// Creates a projected field.
    pub fn new(expr: ScalarExpr, alias: impl Into<String>) -> Self {
        Self {
            expr,
            alias: alias.into(),
        }
    }
}

/// Evaluates one expression per output column.
#[derive(Debug, Clone)]
pub struct ProjectRel {
    input: [RelRef; 1],
    fields: Arc<[ProjectField]>,
    schema: RowSchema,
}

impl ProjectRel {
    /// Creates a projection; the output schema is derived from the field types.
    pub fn new(input: RelRef, fields: Vec<ProjectField>) -> Result<Self> {
        ensure_physical_inputs("Project", std::slice::from_ref(&input))?;
        let schema = fields
            .iter()
            .map(|field| project_column(&field.expr, &field.alias, input.schema()))
            .collect::<Result<RowSchema>>()?;
        Ok(Self {
            input: [input],
            fields: fields.into(),
            schema,
        })
    }

    /// Projected fields.
    pub fn fields(&self) -> &[ProjectField] {
        &self.fields
    }
}

impl PhysicalRel for ProjectRel {
    fn name(&self) -> &'static str {
        "Project"
    }

    fn convention(&self) -> Convention {
        Convention::Physical
    }

    fn schema(&self) -> &RowSchema {
        &self.schema
    }

    fn inputs(&self) -> &[RelRef] {
        &self.input
    }

    fn compile(&self, next: Continuation) -> Result<BoxRowSource> {
        check_compile(self, &next)?;
        debug!(fields = self.fields.len(), "pipeline.compile.project");
        let sink = Arc::new(ProjectSink {
            schema: self.input[0].schema().clone(),
            fields: Arc::clone(&self.fields),
            next,
        });
        self.input[0].compile(sink)
    }

    fn display(&self) -> String {
        let fields: Vec<String> = self
            .fields
            .iter()
            .map(|field| format!("{} AS {}", field.expr, field.alias))
            .collect();
        format!("Project({})", fields.join(", "))
    }
}

struct ProjectSink {
    schema: RowSchema,
    fields: Arc<[ProjectField]>,
    next: Continuation,
}

impl RowSink for ProjectSink {
    fn schema(&self) -> &RowSchema {
        &self.schema
    }

    fn push(&self, row: Row) -> Result<()> {
        let projected = self
            .fields
            .iter()
            .map(|field| field.expr.eval(&row))
            .collect::<Result<Row>>()?;
        self.next.push(projected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::expr::CmpOp;
    use crate::query::operators::values::ValuesRel;
    use crate::query::physical::Step;
    use crate::query::schema::Column;
    use crate::query::sink::ResultBuffer;
    use crate::query::value::{DataType, Value};

    fn input() -> RelRef {
        Arc::new(ValuesRel::new(
            RowSchema::new(vec![
                Column::not_null("id", DataType::Int),
                Column::new("name", DataType::String),
            ]),
            vec![
                vec![Value::Int(1), Value::from("a")],
                vec![Value::Int(2), Value::Null],
            ],
        ))
    }

    #[test]
    fn derives_schema_and_evaluates_fields() -> Result<()> {
        let project = ProjectRel::new(
            input(),
            vec![
                ProjectField::new(ScalarExpr::col(1), "label"),
                ProjectField::new(
                    ScalarExpr::cmp(CmpOp::Eq, ScalarExpr::col(0), ScalarExpr::lit(2i64)),
                    "is_two",
                ),
            ],
        )?;
        assert_eq!(
            project.schema(),
            &RowSchema::new(vec![
                Column::new("label", DataType::String),
                Column::not_null("is_two", DataType::Bool),
            ])
        );

        let buffer = ResultBuffer::new(project.schema().clone());
        let mut source = project.compile(buffer.clone())?;
        while source.step()? == Step::Continue {}
        assert_eq!(
            buffer.rows(),
            vec![
                vec![Value::from("a"), Value::Bool(false)],
                vec![Value::Null, Value::Bool(true)],
            ]
        );
        Ok(())
    }

    #[test]
    fn out_of_range_column_fails_construction() {
        let err = ProjectRel::new(input(), vec![ProjectField::new(ScalarExpr::col(2), "x")])
            .unwrap_err();
        assert_eq!(err.code(), "ColumnOutOfRange");
    }
}
