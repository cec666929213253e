//! Handoff objects between the compiler and the execution substrate.
//!
//! [`PlanEntry`] pairs a finished plan with its terminal continuation.
//! [`PreparedPlan`] is the two-phase path: the plan is compiled first against a
//! [`LazySink`], and the real consumer is attached afterwards with
//! [`LateBind::bind`].

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::query::physical::{ensure_physical, BoxRowSource, RelRef};
use crate::query::profile::{profile_timer, record_profile_timer, QueryProfileKind};
use crate::query::schema::RowSchema;
use crate::query::sink::{Continuation, LateBind, LazySink};

/// Compiles the root of a plan against `next`.
///
/// Any failure aborts the whole compilation; no partial source is returned.
pub fn compile_plan(plan: &RelRef, next: Continuation) -> Result<BoxRowSource> {
    ensure_physical(plan.name(), plan.convention())?;
    let timer = profile_timer();
    let source = plan.compile(next);
    record_profile_timer(QueryProfileKind::Compile, timer);
    let source = source?;
    debug!(root = plan.name(), "pipeline.compile.finish");
    Ok(source)
}

/// A finished plan plus the terminal continuation its rows go to.
///
/// Only constructible once the continuation is bound.
#[derive(Clone)]
pub struct PlanEntry {
    plan: RelRef,
    then: Arc<LazySink>,
}

impl PlanEntry {
    /// Bundles `plan` with `then`. Fails with `Unbound` if `then` has no
    /// target yet.
    pub fn new(plan: RelRef, then: Arc<LazySink>) -> Result<Self> {
        then.ensure_bound()?;
        Ok(Self { plan, then })
    }

    /// Finished plan.
    pub fn plan(&self) -> &RelRef {
        &self.plan
    }

    /// Terminal continuation.
    pub fn then(&self) -> &Arc<LazySink> {
        &self.then
    }
}

impl fmt::Debug for PlanEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlanEntry")
            .field("root", &self.plan.name())
            .field("then", &self.then)
            .finish()
    }
}

/// Plan compiled before its consumer exists.
pub struct PreparedPlan {
    plan: RelRef,
    source: BoxRowSource,
    then: Arc<LazySink>,
}

impl PreparedPlan {
    /// Compiles `plan` against a fresh unbound continuation.
    pub fn prepare(plan: RelRef) -> Result<Self> {
        let then = LazySink::new(plan.schema().clone());
        let source = compile_plan(&plan, then.clone())?;
        Ok(Self { plan, source, then })
    }

    /// Output schema of the prepared plan.
    pub fn schema(&self) -> &RowSchema {
        self.plan.schema()
    }

    /// Planned root.
    pub fn plan(&self) -> &RelRef {
        &self.plan
    }

    /// Whether the consumer has been attached.
    pub fn is_bound(&self) -> bool {
        self.then.is_bound()
    }

    /// Terminal continuation the source pushes into.
    pub fn then(&self) -> &Arc<LazySink> {
        &self.then
    }

    /// Splits into the compiled source and its terminal continuation. Fails
    /// with `Unbound` unless the consumer has been attached.
    pub fn into_parts(self) -> Result<(BoxRowSource, Arc<LazySink>)> {
        self.then.ensure_bound()?;
        Ok((self.source, self.then))
    }
}

impl LateBind for PreparedPlan {
    fn bind(&self, next: Continuation) -> Result<()> {
        self.then.bind(next)
    }
}

impl fmt::Debug for PreparedPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedPlan")
            .field("root", &self.plan.name())
            .field("source", &self.source.name())
            .field("then", &self.then)
            .finish()
    }
}
