//! Physical operator implementations.

mod filter;
mod join;
mod project;
mod scan;
mod union;
mod values;

pub use filter::FilterRel;
pub use join::{JoinSource, NestedLoopJoinRel};
pub use project::{ProjectField, ProjectRel};
pub use scan::ScanRel;
pub use union::{UnionRel, UnionSource};
pub use values::ValuesRel;
