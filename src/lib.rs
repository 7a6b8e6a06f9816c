//! tau-emu library
//!
//! Bit-accurate functional emulation of the TAU fp32 tensor
//! co-processor: a register-programmed accelerator that runs one of
//! nine kernels over a five-deep hardware loop nest, streaming 32-bit
//! words through three address generators into a shared scratchpad and
//! accumulating in a 284-bit fixed-point register for exact reductions.
//!
//! # Module Organization
//!
//! - [`fp32`]: raw fp32 word field manipulation
//! - [`accu`]: the wide fixed-point accumulator and the fused MAC
//! - [`device`]: scratchpad memory, command word, register map
//! - [`engine`]: job staging, the loop-nest driver, the nine opcodes,
//!   broadcast fan-out
//! - [`testing`]: deterministic test-vector generation
//! - [`config`]: layered configuration (files + environment)
//!
//! # Example
//!
//! ```
//! use tau_emu::device::Scratchpad;
//! use tau_emu::engine::JobDescriptor;
//!
//! // dot product of two 4-element vectors into word 0
//! let mut mem = Scratchpad::new(64);
//! for k in 0..4 {
//!     mem.store_f32(8 + k, 1.5);
//!     mem.store_f32(16 + k, 2.0);
//! }
//!
//! let mut job = JobDescriptor::new();
//! job.stage_loop_nest(1, 1, 1, &[4, 0, 0, 0, 0], &[
//!     [1, 0, 0, 0, 0],
//!     [1, 0, 0, 0, 0],
//!     [0, 0, 0, 0, 0],
//! ]).unwrap();
//! job.stage_agu_offs(8 * 4, 16 * 4, 0);
//! job.stage_cmd(0, 3, 0, 0, false); // reduction MAC, accu cleared at init
//! job.issue(&mut mem).unwrap();
//!
//! assert_eq!(mem.load_f32(0), 12.0);
//! ```

pub mod accu;
pub mod config;
pub mod device;
pub mod engine;
pub mod fp32;
pub mod testing;
