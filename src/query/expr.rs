//! Scalar expressions evaluated against a single row.
//!
//! Expressions reference input columns by ordinal. They are type checked once
//! against the input schema when an operator is constructed, so evaluation only
//! fails on data-level problems.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::query::schema::{Column, RowSchema};
use crate::query::value::{DataType, Value};

/// Comparison operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CmpOp {
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl CmpOp {
    fn test(self, ord: Ordering) -> bool {
        match self {
            CmpOp::Eq => ord.is_eq(),
            CmpOp::Ne => ord.is_ne(),
            CmpOp::Lt => ord.is_lt(),
            CmpOp::Le => ord.is_le(),
            CmpOp::Gt => ord.is_gt(),
            CmpOp::Ge => ord.is_ge(),
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "<>",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }
}

/// Expression tree over the columns of one input row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarExpr {
    /// Input column by ordinal.
    Column(usize),
    /// Constant.
    Literal(Value),
    /// Binary comparison.
    Cmp {
        /// Operator.
        op: CmpOp,
        /// Left operand.
        left: Box<ScalarExpr>,
        /// Right operand.
        right: Box<ScalarExpr>,
    },
    /// Logical AND.
    And(Vec<ScalarExpr>),
    /// Logical OR.
    Or(Vec<ScalarExpr>),
    /// Logical NOT.
    Not(Box<ScalarExpr>),
    /// `expr IS NULL`
    IsNull(Box<ScalarExpr>),
}

/// Static type of an expression. `data_type` is `None` only for an untyped
/// `NULL` literal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExprType {
    /// Result type, if known.
    pub data_type: Option<DataType>,
    /// Whether evaluation may produce `NULL`.
    pub nullable: bool,
}

impl ExprType {
    fn boolean(nullable: bool) -> Self {
        Self {
            data_type: Some(DataType::Bool),
            nullable,
        }
    }
}

impl ScalarExpr {
    /// Column reference.
    pub fn col(index: usize) -> Self {
        ScalarExpr::Column(index)
    }

    /// Literal constant.
    pub fn lit(value: impl Into<Value>) -> Self {
        ScalarExpr::Literal(value.into())
    }

    /// Comparison of two expressions.
    pub fn cmp(op: CmpOp, left: ScalarExpr, right: ScalarExpr) -> Self {
        ScalarExpr::Cmp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Type checks the expression against `input`.
    pub fn resolve(&self, input: &RowSchema) -> Result<ExprType> {
        match self {
            ScalarExpr::Column(index) => {
                let column = input.column(*index).ok_or(PipelineError::ColumnOutOfRange {
                    index: *index,
                    arity: input.arity(),
                })?;
                Ok(ExprType {
                    data_type: Some(column.data_type),
                    nullable: column.nullable,
                })
            }
            ScalarExpr::Literal(value) => Ok(ExprType {
                data_type: value.data_type(),
                nullable: value.is_null(),
            }),
            ScalarExpr::Cmp { op, left, right } => {
                let lhs = left.resolve(input)?;
                let rhs = right.resolve(input)?;
                if let (Some(a), Some(b)) = (lhs.data_type, rhs.data_type) {
                    let comparable = a == b || (a.is_numeric() && b.is_numeric());
                    if !comparable {
                        return Err(PipelineError::type_mismatch(
                            "comparison",
                            format!("cannot compare {a} {} {b}", op.symbol()),
                        ));
                    }
                }
                Ok(ExprType::boolean(lhs.nullable || rhs.nullable))
            }
            ScalarExpr::And(children) | ScalarExpr::Or(children) => {
                let mut nullable = false;
                for child in children {
                    nullable |= resolve_boolean(child, input, "logical operand")?.nullable;
                }
                Ok(ExprType::boolean(nullable))
            }
            ScalarExpr::Not(child) => {
                let ty = resolve_boolean(child, input, "NOT operand")?;
                Ok(ExprType::boolean(ty.nullable))
            }
            ScalarExpr::IsNull(child) => {
                child.resolve(input)?;
                Ok(ExprType::boolean(false))
            }
        }
    }

    /// Evaluates the expression. Comparisons and logic follow SQL
    /// three-valued semantics.
    pub fn eval(&self, row: &[Value]) -> Result<Value> {
        match self {
            ScalarExpr::Column(index) => row.get(*index).cloned().ok_or_else(|| {
                PipelineError::Eval(format!(
                    "column #{index} missing from row of arity {}",
                    row.len()
                ))
            }),
            ScalarExpr::Literal(value) => Ok(value.clone()),
            ScalarExpr::Cmp { op, left, right } => {
                let lhs = left.eval(row)?;
                let rhs = right.eval(row)?;
                if lhs.is_null() || rhs.is_null() {
                    return Ok(Value::Null);
                }
                let ord = lhs.sql_cmp(&rhs).ok_or_else(|| {
                    PipelineError::Eval(format!("cannot compare {lhs} {} {rhs}", op.symbol()))
                })?;
                Ok(Value::Bool(op.test(ord)))
            }
            ScalarExpr::And(children) => {
                let mut saw_null = false;
                for child in children {
                    match truth(child.eval(row)?)? {
                        Some(false) => return Ok(Value::Bool(false)),
                        Some(true) => {}
                        None => saw_null = true,
                    }
                }
                Ok(if saw_null { Value::Null } else { Value::Bool(true) })
            }
            ScalarExpr::Or(children) => {
                let mut saw_null = false;
                for child in children {
                    match truth(child.eval(row)?)? {
                        Some(true) => return Ok(Value::Bool(true)),
                        Some(false) => {}
                        None => saw_null = true,
                    }
                }
                Ok(if saw_null { Value::Null } else { Value::Bool(false) })
            }
            ScalarExpr::Not(child) => Ok(match truth(child.eval(row)?)? {
                Some(v) => Value::Bool(!v),
                None => Value::Null,
            }),
            ScalarExpr::IsNull(child) => Ok(Value::Bool(child.eval(row)?.is_null())),
        }
    }

    /// Evaluates a predicate; only `TRUE` passes.
    pub fn matches(&self, row: &[Value]) -> Result<bool> {
        Ok(truth(self.eval(row)?)? == Some(true))
    }
}

fn resolve_boolean(expr: &ScalarExpr, input: &RowSchema, context: &'static str) -> Result<ExprType> {
    let ty = expr.resolve(input)?;
    match ty.data_type {
        None | Some(DataType::Bool) => Ok(ty),
        Some(other) => Err(PipelineError::type_mismatch(
            context,
            format!("expected BOOLEAN, found {other}"),
        )),
    }
}

fn truth(value: Value) -> Result<Option<bool>> {
    match value {
        Value::Bool(v) => Ok(Some(v)),
        Value::Null => Ok(None),
        other => Err(PipelineError::Eval(format!("expected boolean, found {other}"))),
    }
}

/// Checks that `predicate` is a boolean expression over `input`.
pub fn check_predicate(predicate: &ScalarExpr, input: &RowSchema) -> Result<()> {
    resolve_boolean(predicate, input, "filter predicate").map(|_| ())
}

/// Derives the output column for a projected expression.
pub fn project_column(expr: &ScalarExpr, alias: &str, input: &RowSchema) -> Result<Column> {
    let ty = expr.resolve(input)?;
    let data_type = ty.data_type.ok_or_else(|| {
        PipelineError::type_mismatch("projection", format!("'{alias}' is an untyped NULL"))
    })?;
    Ok(Column {
        name: alias.to_owned(),
        data_type,
        nullable: ty.nullable,
    })
}

impl fmt::Display for ScalarExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarExpr::Column(index) => write!(f, "${index}"),
            ScalarExpr::Literal(Value::String(s)) => write!(f, "'{s}'"),
            ScalarExpr::Literal(value) => write!(f, "{value}"),
            ScalarExpr::Cmp { op, left, right } => write!(f, "{left} {} {right}", op.symbol()),
            ScalarExpr::And(children) => write_joined(f, children, " AND "),
            ScalarExpr::Or(children) => write_joined(f, children, " OR "),
            ScalarExpr::Not(child) => write!(f, "NOT ({child})"),
            ScalarExpr::IsNull(child) => write!(f, "{child} IS NULL"),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, children: &[ScalarExpr], sep: &str) -> fmt::Result {
    f.write_str("(")?;
    for (idx, child) in children.iter().enumerate() {
        if idx > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{child}")?;
    }
    f.write_str(")")
}
