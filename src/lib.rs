#![recursion_limit = "256"]

//! Config-driven train / eval / publish loops on top of Burn.
//!
//! An exec is described by one configuration file naming four
//! nodes (data, model, loss, optimizer) and an environment.
//! [`exec::ExecNode`] resolves it, [`exec::Trainer`] runs it, and
//! the `infra` layer records what happened.

pub mod application;
pub mod data;
pub mod domain;
pub mod error;
pub mod exec;
pub mod infra;
pub mod nodes;

pub use error::{ExecError, Result};
