//! Nested-loop inner join.
//!
//! The right input is compiled into a private build buffer and the left input
//! into a probe sink that reads it. [`JoinSource`] steps the build side to
//! end-of-data before the first probe step, so the probe always sees the
//! complete right relation.

use std::sync::{Arc, OnceLock};

use tracing::debug;

use crate::error::Result;
use crate::query::expr::{check_predicate, ScalarExpr};
use crate::query::physical::{
    check_compile, ensure_physical_inputs, BoxRowSource, Convention, PhysicalRel, RelRef,
    RowSource, Step,
};
use crate::query::schema::{Row, RowSchema};
use crate::query::sink::{Continuation, ResultBuffer, RowSink};

/// Inner join of two inputs; without a condition it is a cross product.
///
/// Output rows are the left columns followed by the right columns.
#[derive(Debug, Clone)]
pub struct NestedLoopJoinRel {
    inputs: [RelRef; 2],
    condition: Option<ScalarExpr>,
    schema: RowSchema,
}

impl NestedLoopJoinRel {
    /// Creates a join. The condition is checked against the combined schema.
    pub fn new(left: RelRef, right: RelRef, condition: Option<ScalarExpr>) -> Result<Self> {
        let inputs = [left, right];
        ensure_physical_inputs("NestedLoopJoin", &inputs)?;
        let schema = inputs[0].schema().concat(inputs[1].schema());
        if let Some(condition) = &condition {
            check_predicate(condition, &schema)?;
        }
        Ok(Self {
            inputs,
            condition,
            schema,
        })
    }

    /// Join condition, if any.
    pub fn condition(&self) -> Option<&ScalarExpr> {
        self.condition.as_ref()
    }
}

impl PhysicalRel for NestedLoopJoinRel {
    fn name(&self) -> &'static str {
        "NestedLoopJoin"
    }

    fn convention(&self) -> Convention {
        Convention::Physical
    }

    fn schema(&self) -> &RowSchema {
        &self.schema
    }

    fn inputs(&self) -> &[RelRef] {
        &self.inputs
    }

    fn compile(&self, next: Continuation) -> Result<BoxRowSource> {
        check_compile(self, &next)?;
        let [left, right] = &self.inputs;
        let build = ResultBuffer::new(right.schema().clone());
        let build_source = right.compile(build.clone())?;
        let probe = Arc::new(JoinProbeSink {
            schema: left.schema().clone(),
            build,
            frozen: OnceLock::new(),
            condition: self.condition.clone(),
            next,
        });
        let probe_source = left.compile(probe)?;
        debug!(
            condition = self.condition.is_some(),
            "pipeline.compile.nested_loop_join"
        );
        Ok(Box::new(JoinSource {
            build: Some(build_source),
            probe: probe_source,
        }))
    }

    fn display(&self) -> String {
        match &self.condition {
            Some(condition) => format!("NestedLoopJoin({condition})"),
            None => "NestedLoopJoin(cross)".to_string(),
        }
    }
}

struct JoinProbeSink {
    schema: RowSchema,
    build: Arc<ResultBuffer>,
    frozen: OnceLock<Arc<[Row]>>,
    condition: Option<ScalarExpr>,
    next: Continuation,
}

impl JoinProbeSink {
    fn build_rows(&self) -> &Arc<[Row]> {
        self.frozen.get_or_init(|| self.build.take_rows().into())
    }
}

impl RowSink for JoinProbeSink {
    fn schema(&self) -> &RowSchema {
        &self.schema
    }

    fn push(&self, left: Row) -> Result<()> {
        for right in self.build_rows().iter() {
            let mut joined = Vec::with_capacity(left.len() + right.len());
            joined.extend(left.iter().cloned());
            joined.extend(right.iter().cloned());
            let keep = match &self.condition {
                Some(condition) => condition.matches(&joined)?,
                None => true,
            };
            if keep {
                self.next.push(joined)?;
            }
        }
        Ok(())
    }
}

/// Drains the build side, then steps the probe side.
pub struct JoinSource {
    build: Option<BoxRowSource>,
    probe: BoxRowSource,
}

impl RowSource for JoinSource {
    fn name(&self) -> &'static str {
        "NestedLoopJoin"
    }

    fn step(&mut self) -> Result<Step> {
        if let Some(build) = self.build.as_mut() {
            if build.step()? == Step::Done {
                self.build = None;
            }
            return Ok(Step::Continue);
        }
        self.probe.step()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::query::expr::CmpOp;
    use crate::query::operators::values::ValuesRel;
    use crate::query::schema::Column;
    use crate::query::value::{DataType, Value};

    fn people() -> RelRef {
        Arc::new(ValuesRel::new(
            RowSchema::new(vec![
                Column::new("id", DataType::Int),
                Column::new("name", DataType::String),
            ]),
            vec![
                vec![Value::Int(1), Value::from("ada")],
                vec![Value::Int(2), Value::from("alan")],
            ],
        ))
    }

    fn pets() -> RelRef {
        Arc::new(ValuesRel::new(
            RowSchema::new(vec![
                Column::new("owner", DataType::Int),
                Column::new("pet", DataType::String),
            ]),
            vec![
                vec![Value::Int(2), Value::from("cat")],
                vec![Value::Int(1), Value::from("dog")],
                vec![Value::Int(2), Value::from("owl")],
            ],
        ))
    }

    fn run(join: &NestedLoopJoinRel) -> Result<Vec<Row>> {
        let buffer = ResultBuffer::new(join.schema().clone());
        let mut source = join.compile(buffer.clone())?;
        while source.step()? == Step::Continue {}
        Ok(buffer.take_rows())
    }

    #[test]
    fn equi_join_pairs_matching_rows() -> Result<()> {
        let join = NestedLoopJoinRel::new(
            people(),
            pets(),
            Some(ScalarExpr::cmp(CmpOp::Eq, ScalarExpr::col(0), ScalarExpr::col(2))),
        )?;
        assert_eq!(join.schema().arity(), 4);
        let rows = run(&join)?;
        assert_eq!(
            rows,
            vec![
                vec![Value::Int(1), Value::from("ada"), Value::Int(1), Value::from("dog")],
                vec![Value::Int(2), Value::from("alan"), Value::Int(2), Value::from("cat")],
                vec![Value::Int(2), Value::from("alan"), Value::Int(2), Value::from("owl")],
            ]
        );
        Ok(())
    }

    #[test]
    fn missing_condition_is_a_cross_product() -> Result<()> {
        let join = NestedLoopJoinRel::new(people(), pets(), None)?;
        assert_eq!(run(&join)?.len(), 6);
        Ok(())
    }

    #[test]
    fn condition_is_checked_against_combined_schema() {
        let err = NestedLoopJoinRel::new(
            people(),
            pets(),
            Some(ScalarExpr::cmp(CmpOp::Eq, ScalarExpr::col(1), ScalarExpr::col(2))),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::TypeMismatch { .. }));
    }
}
