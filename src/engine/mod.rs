//! Functional execution model.
//!
//! This module implements what happens behind the command register:
//!
//! - [`job`]: the staging area and architectural state of one
//!   accelerator instance ([`JobDescriptor`]), including the absolute
//!   to incremental stride translation and configuration validation
//! - [`driver`]: the recursive loop-nest walker and the live execution
//!   registers ([`ExecutionContext`])
//! - [`opcode`]: the nine operation state machines, each a triple of
//!   init/execute/store phases
//! - [`broadcast`]: staging fan-out over a group of sibling instances
//!
//! A job runs synchronously: [`JobDescriptor::issue`] returns only
//! after the entire nest has executed, with all memory traffic applied
//! in loop order.

pub mod broadcast;
pub mod driver;
pub mod job;
pub mod opcode;

pub use broadcast::BroadcastGroup;
pub use driver::ExecutionContext;
pub use job::{JobDescriptor, JobError};
pub use opcode::{aux, InitSelect, Opcode};
