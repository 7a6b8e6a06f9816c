//! Hardware-facing surface of the accelerator.
//!
//! This module holds what the rest of the system sees of the device:
//! the shared scratchpad the address generators dereference, the
//! command-word layout and the register map. The execution model that
//! sits behind the command register lives in [`crate::engine`].

pub mod command;
pub mod scratchpad;

pub use command::{register_name, CommandWord, HW_LOOP_WIDTH, N_AGUS, N_HW_LOOPS};
pub use scratchpad::{MemoryError, Scratchpad, DEFAULT_WORDS};
