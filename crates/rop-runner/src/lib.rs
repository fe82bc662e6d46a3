//! Run orchestration for rop.
//!
//! Resolves the target pod and container, uploads the local file through an
//! exec session, runs it and removes it again. The cluster and the operator
//! are reached only through the traits in [`rop_core`].

pub mod orchestrator;
pub mod resolver;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use orchestrator::{App, CleanupOutcome, RunReport, Stage, StageError};
pub use resolver::ResolvedTarget;
