//! N-ary union.

use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::query::physical::{
    check_compile, ensure_physical, ensure_physical_inputs, BoxRowSource, Convention,
    PhysicalRel, RelRef, RowSource, Step,
};
use crate::query::schema::RowSchema;
use crate::query::sink::Continuation;

/// Combines the rows of every input.
///
/// Each input is compiled with the same continuation handle, so all branches
/// feed one consumer. `all` is carried for the planner's benefit; this operator
/// never deduplicates.
#[derive(Debug, Clone)]
pub struct UnionRel {
    schema: RowSchema,
    inputs: Vec<RelRef>,
    all: bool,
    convention: Convention,
}

impl UnionRel {
    /// Creates a physical union.
    ///
    /// Every input must already be physical and produce rows the union's
    /// schema accepts. Zero inputs is legal and yields no rows.
    pub fn new(schema: RowSchema, inputs: Vec<RelRef>, all: bool) -> Result<Self> {
        ensure_physical_inputs("Union", &inputs)?;
        for input in &inputs {
            if !schema.accepts(input.schema()) {
                return Err(PipelineError::schema_mismatch(
                    "Union input",
                    &schema,
                    input.schema(),
                ));
            }
        }
        Ok(Self {
            schema,
            inputs,
            all,
            convention: Convention::Physical,
        })
    }

    /// Rebuilds the union with new inputs and flag under `convention`, which
    /// must be physical.
    pub fn copy(&self, convention: Convention, inputs: Vec<RelRef>, all: bool) -> Result<Self> {
        ensure_physical("Union", convention)?;
        Self::new(self.schema.clone(), inputs, all)
    }

    /// Compiles every input against `next` and returns the concrete source, so
    /// a driver can take the branches apart with [`UnionSource::into_branches`].
    pub fn compile_branches(&self, next: Continuation) -> Result<UnionSource> {
        check_compile(self, &next)?;
        let branches = self
            .inputs
            .iter()
            .map(|input| input.compile(next.clone()))
            .collect::<Result<Vec<_>>>()?;
        debug!(branches = branches.len(), all = self.all, "pipeline.compile.union");
        Ok(UnionSource::new(branches))
    }

    /// `true` for `UNION ALL`, `false` for `UNION DISTINCT`.
    pub fn all(&self) -> bool {
        self.all
    }
}

impl PhysicalRel for UnionRel {
    fn name(&self) -> &'static str {
        "Union"
    }

    fn convention(&self) -> Convention {
        self.convention
    }

    fn schema(&self) -> &RowSchema {
        &self.schema
    }

    fn inputs(&self) -> &[RelRef] {
        &self.inputs
    }

    fn compile(&self, next: Continuation) -> Result<BoxRowSource> {
        Ok(Box::new(self.compile_branches(next)?))
    }

    fn display(&self) -> String {
        if self.all {
            "Union(all)".to_string()
        } else {
            "Union(distinct)".to_string()
        }
    }
}

/// Steps each branch to exhaustion in input order.
pub struct UnionSource {
    branches: Vec<BoxRowSource>,
    current: usize,
}

impl UnionSource {
    /// Aggregates independently compiled branches.
    pub fn new(branches: Vec<BoxRowSource>) -> Self {
        Self {
            branches,
            current: 0,
        }
    }

    /// Splits the union back into its branches so a driver can schedule them
    /// itself.
    pub fn into_branches(self) -> Vec<BoxRowSource> {
        self.branches
    }
}

impl RowSource for UnionSource {
    fn name(&self) -> &'static str {
        "Union"
    }

    fn step(&mut self) -> Result<Step> {
        while let Some(branch) = self.branches.get_mut(self.current) {
            match branch.step()? {
                Step::Continue => return Ok(Step::Continue),
                Step::Done => self.current += 1,
            }
        }
        Ok(Step::Done)
    }
}
