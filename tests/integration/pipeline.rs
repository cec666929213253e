#![allow(missing_docs)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rowpipe::error::{PipelineError, Result};
use rowpipe::query::expr::{CmpOp, ScalarExpr};
use rowpipe::query::operators::{
    FilterRel, NestedLoopJoinRel, ProjectField, ProjectRel, ScanRel, UnionRel, ValuesRel,
};
use rowpipe::query::source::MemoryTable;
use rowpipe::query::{
    compile_plan, Column, Continuation, Convention, DataType, Executor, LateBind, LazySink,
    PhysicalRel, PlanEntry, PreparedPlan, RelRef, ResultBuffer, Row, RowSchema, RowSink, Step,
    Value,
};

/// Terminal sink that rejects any row not matching its declared schema.
struct ShapeCheckingSink {
    schema: RowSchema,
    rows: Mutex<Vec<Row>>,
    finishes: AtomicUsize,
}

impl ShapeCheckingSink {
    fn new(schema: RowSchema) -> Arc<Self> {
        Arc::new(Self {
            schema,
            rows: Mutex::new(Vec::new()),
            finishes: AtomicUsize::new(0),
        })
    }

    fn rows(&self) -> Vec<Row> {
        self.rows.lock().clone()
    }
}

impl RowSink for ShapeCheckingSink {
    fn schema(&self) -> &RowSchema {
        &self.schema
    }

    fn push(&self, row: Row) -> Result<()> {
        if !self.schema.admits(&row) {
            return Err(PipelineError::Eval(format!(
                "row {row:?} does not fit {}",
                self.schema
            )));
        }
        self.rows.lock().push(row);
        Ok(())
    }

    fn finish(&self) -> Result<()> {
        self.finishes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn id_name() -> RowSchema {
    RowSchema::new(vec![
        Column::not_null("id", DataType::Int),
        Column::new("name", DataType::String),
    ])
}

fn literal_rows() -> Vec<Row> {
    vec![
        vec![Value::Int(1), Value::from("a")],
        vec![Value::Int(2), Value::from("b")],
    ]
}

fn values(rows: Vec<Row>) -> RelRef {
    Arc::new(ValuesRel::new(id_name(), rows))
}

fn run_checked(plan: &RelRef) -> Result<Vec<Row>> {
    let sink = ShapeCheckingSink::new(plan.schema().clone());
    let then = LazySink::new(plan.schema().clone());
    then.bind(sink.clone())?;
    let entry = PlanEntry::new(Arc::clone(plan), then)?;
    Executor::default().run(&entry, None)?;
    assert_eq!(sink.finishes.load(Ordering::SeqCst), 1);
    Ok(sink.rows())
}

#[test]
fn every_operator_produces_its_declared_schema() -> Result<()> {
    let scan: RelRef = Arc::new(ScanRel::new(Arc::new(MemoryTable::new(
        "people",
        id_name(),
        literal_rows(),
    )?)));
    let union: RelRef = Arc::new(UnionRel::new(
        id_name(),
        vec![values(literal_rows()), Arc::clone(&scan)],
        true,
    )?);
    let filter: RelRef = Arc::new(FilterRel::new(
        Arc::clone(&union),
        ScalarExpr::cmp(CmpOp::Ge, ScalarExpr::col(0), ScalarExpr::lit(2i64)),
    )?);
    let project: RelRef = Arc::new(ProjectRel::new(
        Arc::clone(&filter),
        vec![
            ProjectField::new(ScalarExpr::col(1), "label"),
            ProjectField::new(
                ScalarExpr::cmp(CmpOp::Eq, ScalarExpr::col(0), ScalarExpr::lit(2i64)),
                "is_two",
            ),
        ],
    )?);
    let join: RelRef = Arc::new(NestedLoopJoinRel::new(
        Arc::clone(&scan),
        values(literal_rows()),
        Some(ScalarExpr::cmp(
            CmpOp::Eq,
            ScalarExpr::col(0),
            ScalarExpr::col(2),
        )),
    )?);

    assert_eq!(run_checked(&scan)?.len(), 2);
    assert_eq!(run_checked(&union)?.len(), 4);
    assert_eq!(run_checked(&filter)?.len(), 2);
    assert_eq!(
        run_checked(&project)?,
        vec![
            vec![Value::from("b"), Value::Bool(true)],
            vec![Value::from("b"), Value::Bool(true)],
        ]
    );
    assert_eq!(run_checked(&join)?.len(), 2);
    Ok(())
}

#[test]
fn late_binding_happens_exactly_once() -> Result<()> {
    let prepared = PreparedPlan::prepare(values(literal_rows()))?;
    let first = ResultBuffer::new(id_name());
    let second = ResultBuffer::new(id_name());

    prepared.bind(first.clone())?;
    let err = prepared.bind(second.clone()).unwrap_err();
    assert!(matches!(err, PipelineError::AlreadyBound { .. }));

    Executor::default().drive(prepared, None)?;
    assert_eq!(first.rows(), literal_rows());
    assert!(first.is_finished());
    assert!(second.is_empty());
    Ok(())
}

#[test]
fn binding_an_incompatible_consumer_fails() {
    let then = LazySink::new(id_name());
    let narrow = RowSchema::new(vec![Column::new("id", DataType::Int)]);
    let err = then.bind(ResultBuffer::new(narrow)).unwrap_err();
    assert!(matches!(err, PipelineError::SchemaMismatch { .. }));
    assert!(!then.is_bound());
}

#[test]
fn union_fans_in_every_branch_row() -> Result<()> {
    let branches: Vec<RelRef> = (0..4i64)
        .map(|branch| {
            values(
                (0..branch + 1)
                    .map(|n| vec![Value::Int(branch * 10 + n), Value::from("x")])
                    .collect(),
            )
        })
        .collect();
    let union: RelRef = Arc::new(UnionRel::new(id_name(), branches, true)?);
    let mut ids: Vec<i64> = run_checked(&union)?
        .into_iter()
        .map(|row| match row[0] {
            Value::Int(id) => id,
            _ => -1,
        })
        .collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![0, 10, 11, 20, 21, 22, 30, 31, 32, 33]);
    Ok(())
}

#[test]
fn union_without_all_keeps_duplicates() -> Result<()> {
    let union: RelRef = Arc::new(UnionRel::new(
        id_name(),
        vec![values(literal_rows()), values(literal_rows())],
        false,
    )?);
    assert_eq!(run_checked(&union)?.len(), 4);
    Ok(())
}

#[test]
fn literal_source_yields_tuples_in_order_then_done() -> Result<()> {
    let buffer = ResultBuffer::new(id_name());
    let next: Continuation = buffer.clone();
    let mut source = compile_plan(&values(literal_rows()), next)?;

    assert_eq!(source.step()?, Step::Continue);
    assert_eq!(source.step()?, Step::Continue);
    assert_eq!(source.step()?, Step::Done);
    assert_eq!(source.step()?, Step::Done);
    assert_eq!(buffer.rows(), literal_rows());
    Ok(())
}

#[test]
fn zero_input_union_completes_without_rows() -> Result<()> {
    let union: RelRef = Arc::new(UnionRel::new(id_name(), Vec::new(), true)?);
    let result = Executor::default().execute(&union, None)?;
    assert!(result.rows.is_empty());
    assert_eq!(result.stats.steps, 1);
    Ok(())
}

#[test]
fn logical_union_input_is_rejected_before_any_row() {
    let logical: RelRef =
        Arc::new(ValuesRel::new(id_name(), literal_rows()).with_convention(Convention::Logical));
    let err = UnionRel::new(id_name(), vec![values(literal_rows()), Arc::clone(&logical)], true)
        .unwrap_err();
    assert!(matches!(err, PipelineError::ConventionMismatch { .. }));
    assert!(err.is_compile_time());

    let buffer = ResultBuffer::new(id_name());
    let err = compile_plan(&logical, buffer.clone()).err().expect("logical root");
    assert!(matches!(err, PipelineError::ConventionMismatch { .. }));
    assert!(buffer.is_empty());
}
