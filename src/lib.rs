//! Rowpipe: physical-plan compiler and row pipeline protocol.
//!
//! Finished relational plans are compiled bottom-up in continuation-passing
//! style: every operator is handed the consumer of its output rows and returns
//! a steppable [`query::RowSource`]. The [`query::Executor`] drives that source
//! to exhaustion.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod logging;
pub mod query;

pub use error::{PipelineError, Result};
