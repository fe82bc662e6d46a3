//! Core domain types and traits for rop.
//!
//! This crate contains:
//! - The execution request and its builder
//! - Cluster client and connector traits (pod lookup, exec sessions)
//! - The prompter trait used for container selection and confirmation
//! - The run planner (script/binary classification, interpreter lookup)

pub mod cluster;
pub mod error;
pub mod planner;
pub mod prompt;
pub mod request;

pub use error::{Error, Result};
pub use request::{ExecutionRequest, FileType};
