//! Nested-loop driver.
//!
//! The accelerator walks a loop nest of up to five levels. Three level
//! pointers staged with the job steer the opcode's phases through the
//! walk:
//!
//! ```text
//! level = outer ──────────────► full nest, entered once
//!   │
//!   ├── level == init:  opcode init phase (before any body below)
//!   │
//!   ├── level == 0:     opcode execute phase (innermost body)
//!   │     otherwise recurse over loop_bound[level-1] + 1 iterations
//!   │
//!   ├── level == inner: opcode store phase (after all bodies below)
//!   │
//!   └── AGU advance by stride[agu][level], skipped on the last
//!       iteration of the parent frame
//! ```
//!
//! Because `inner <= init`, an init frame encloses one or more store
//! frames: a single accumulator initialization can feed a whole row of
//! results, which is how multi-output reductions are expressed.
//!
//! The walk is entered at the outer level with `is_last = true`, so no
//! AGU advance happens after the outermost frame; the stride tables
//! describe intra-job steps only.

use crate::accu::Accu;
use crate::device::command::{N_AGUS, N_HW_LOOPS};
use crate::device::scratchpad::Scratchpad;
use crate::engine::job::{JobDescriptor, JobError};
use crate::engine::opcode::{InitSelect, OpContext, Opcode};

/// Live per-job execution registers.
///
/// The opcode phases own this state between init and store; the
/// `tst`/`op_a`/`op_b` scratch fields only carry values from one
/// execute phase to the following store.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    /// Live AGU byte pointers into the scratchpad.
    pub agu: [u32; N_AGUS],
    /// Wide fixed-point accumulator.
    pub accu: Accu,
    /// Scalar fp32 register (latched operand, incumbent extremum, ...).
    pub alu: u32,
    /// Execute-phase counter, reset by init.
    pub cnt: u32,
    /// Counter value that produced the current extremum.
    pub idx: u32,

    /// Outcome of the last compare, consumed by store.
    pub(crate) tst: bool,
    /// Operand captured during execute for the store phase.
    pub(crate) op_a: u32,
    /// Compare operand captured for the threshold passthrough.
    pub(crate) op_b: u32,
}

/// One synchronous run of the functional model.
pub(crate) struct LoopDriver<'a> {
    job: &'a JobDescriptor,
    mem: &'a mut Scratchpad,
    ctx: ExecutionContext,
    opcode: Opcode,
    init_sel: InitSelect,
}

impl<'a> LoopDriver<'a> {
    pub fn new(
        job: &'a JobDescriptor,
        mem: &'a mut Scratchpad,
        opcode: Opcode,
        init_sel: InitSelect,
    ) -> Self {
        let ctx = ExecutionContext { agu: *job.agu_bases(), ..Default::default() };
        Self { job, mem, ctx, opcode, init_sel }
    }

    /// Run the nest to completion.
    pub fn run(&mut self) -> Result<(), JobError> {
        self.frame(self.job.outer_level(), true)
    }

    /// One recursion frame at `level`. `is_last` is true when this is
    /// the final iteration of the enclosing frame, which suppresses the
    /// trailing AGU advance.
    fn frame(&mut self, level: u8, is_last: bool) -> Result<(), JobError> {
        self.check_agu_window()?;

        log::trace!("frame level={} last={} agu={:?}", level, is_last, self.ctx.agu);

        if level == self.job.init_level() {
            self.opcode.init(&mut self.phase_context())?;
        }

        if level == 0 {
            self.opcode.execute(&mut self.phase_context())?;
        } else {
            let bound = self.job.loop_bounds()[level as usize - 1];
            for k in 0..=bound {
                self.frame(level - 1, k == bound)?;
            }
        }

        if level == self.job.inner_level() {
            self.opcode.store(&mut self.phase_context())?;
        }

        if (level as usize) < N_HW_LOOPS && !is_last {
            for (agu, strides) in self.ctx.agu.iter_mut().zip(self.job.strides()) {
                *agu = agu.wrapping_add_signed(strides[level as usize]);
            }
        }

        Ok(())
    }

    fn phase_context(&mut self) -> OpContext<'_> {
        OpContext {
            mem: self.mem,
            state: &mut self.ctx,
            init_sel: self.init_sel,
            aux: self.job.aux_func(),
            polarity: self.job.polarity(),
        }
    }

    fn check_agu_window(&self) -> Result<(), JobError> {
        let Some((low, high)) = self.job.address_window() else {
            return Ok(());
        };
        for (agu, &addr) in self.ctx.agu.iter().enumerate() {
            if addr < low || addr > high {
                return Err(JobError::AguOutOfRange { agu, addr, low, high });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Stage a MAC reduction over all-ones operands. Every execute adds
    /// exactly 1.0, every store writes the sum since the last init, so
    /// the memory image after the run reveals the phase schedule.
    fn ones_mac(
        levels: (u8, u8, u8),
        counts: [u32; N_HW_LOOPS],
        res_stride: [i32; N_HW_LOOPS],
        res_word: usize,
    ) -> Scratchpad {
        let mut mem = Scratchpad::new(64);
        for k in 0..16 {
            mem.store_f32(k, 1.0);
        }

        let mut job = JobDescriptor::new();
        job.stage_loop_nest(levels.0, levels.1, levels.2, &counts, &[
            [0; N_HW_LOOPS],
            [0; N_HW_LOOPS],
            res_stride,
        ])
        .unwrap();
        job.stage_agu_offs(0, 0, (res_word * 4) as u32);
        job.stage_cmd(0, 3, 0, 0, false); // MAC, init with zero
        job.issue(&mut mem).unwrap();
        mem
    }

    #[test]
    fn test_execute_count_1d() {
        let mem = ones_mac((1, 1, 1), [7, 0, 0, 0, 0], [0; 5], 20);
        assert_eq!(mem.load_f32(20), 7.0);
    }

    #[test]
    fn test_execute_count_2d_single_store() {
        let mem = ones_mac((2, 2, 2), [5, 3, 0, 0, 0], [0; 5], 20);
        assert_eq!(mem.load_f32(20), 15.0);
    }

    #[test]
    fn test_one_init_many_stores() {
        // init at level 2, store per level-1 frame: the accumulator is
        // never re-zeroed, so successive rows see a running sum
        let mem = ones_mac((2, 1, 2), [4, 3, 0, 0, 0], [0, 1, 0, 0, 0], 20);
        assert_eq!(mem.load_f32(20), 4.0);
        assert_eq!(mem.load_f32(21), 8.0);
        assert_eq!(mem.load_f32(22), 12.0);
        // only three stores happened
        assert_eq!(mem.words()[23], 0);
    }

    #[test]
    fn test_init_per_store_frame() {
        // init and store both at level 3 over a full 5-deep nest: each
        // of the four stores sees a freshly zeroed accumulator
        let mem = ones_mac((3, 3, 5), [2, 2, 2, 2, 2], [0, 0, 0, 1, 2], 20);
        for word in 20..24 {
            assert_eq!(mem.load_f32(word), 8.0, "word {word}");
        }
        assert_eq!(mem.words()[24], 0);
    }

    #[test]
    fn test_agu_advance_skips_last_iteration() {
        // three executes with a one-element result stride: the pointer
        // advances after the first two iterations only, so the single
        // store at level 1 lands two words past the base
        let mut mem = Scratchpad::new(16);
        mem.store_f32(0, 2.5);

        let mut job = JobDescriptor::new();
        job.stage_loop_nest(1, 1, 1, &[3, 0, 0, 0, 0], &[
            [0, 0, 0, 0, 0],
            [0, 0, 0, 0, 0],
            [1, 0, 0, 0, 0],
        ])
        .unwrap();
        job.stage_agu_offs(0, 0, 8 * 4);
        job.stage_cmd(8, 0, 0, 0, false); // replicate the word at AGU0
        job.issue(&mut mem).unwrap();

        assert_eq!(mem.load_f32(10), 2.5);
        assert_eq!(mem.words()[8], 0);
        assert_eq!(mem.words()[9], 0);
    }

    #[test]
    fn test_address_window_violation() {
        let mut mem = Scratchpad::new(16);
        let mut job = JobDescriptor::new();
        job.stage_loop_nest(1, 1, 1, &[8, 0, 0, 0, 0], &[
            [4, 0, 0, 0, 0], // walks off the 8-word window
            [0, 0, 0, 0, 0],
            [0, 0, 0, 0, 0],
        ])
        .unwrap();
        job.stage_agu_offs(0, 0, 0);
        job.stage_cmd(8, 3, 1, 0, false); // copy-vector reads AGU0
        job.enable_address_check(0, 7 * 4);

        let err = job.issue(&mut mem).unwrap_err();
        assert!(matches!(err, JobError::AguOutOfRange { agu: 0, .. }));
    }

    #[test]
    fn test_memory_oob_is_fatal() {
        let mut mem = Scratchpad::new(4);
        let mut job = JobDescriptor::new();
        job.stage_loop_nest(1, 1, 1, &[8, 0, 0, 0, 0], &[
            [1, 0, 0, 0, 0],
            [0, 0, 0, 0, 0],
            [0, 0, 0, 0, 0],
        ])
        .unwrap();
        job.stage_agu_offs(0, 0, 0);
        job.stage_cmd(8, 3, 1, 0, false);

        let err = job.issue(&mut mem).unwrap_err();
        assert!(matches!(err, JobError::Memory(_)));
    }
}
