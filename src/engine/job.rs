//! Job descriptor and staging.
//!
//! A job is prepared in three steps, mirroring the register interface
//! of the real device:
//!
//! 1. [`JobDescriptor::stage_loop_nest`] — loop levels, bounds and the
//!    per-AGU stride tables (absolute element strides on this surface,
//!    translated to incremental byte strides as the hardware wants them).
//! 2. [`JobDescriptor::stage_agu_offs`] — the three AGU byte base
//!    addresses into the scratchpad.
//! 3. [`JobDescriptor::stage_cmd`] — opcode, init source, auxiliary
//!    function, interrupt configuration and polarity.
//!
//! [`JobDescriptor::issue`] then validates the configuration and runs
//! the functional model synchronously against a scratchpad. On real
//! hardware the same call would write the command register; here it
//! returns once the whole loop nest has executed, latching the pending
//! interrupt flag if the job asked for one.

use thiserror::Error;

use crate::device::command::{self, CommandWord, HW_LOOP_WIDTH, N_AGUS, N_HW_LOOPS};
use crate::device::scratchpad::{MemoryError, Scratchpad};
use crate::engine::driver::LoopDriver;
use crate::engine::opcode::{InitSelect, Opcode};

/// Errors raised while staging or issuing a job.
///
/// All of these are fatal to the job: configuration errors abort before
/// any state changes, address errors abort mid-flight (the hardware
/// equivalent halts the accelerator until a soft reset).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JobError {
    /// Loop level ordering violated (inner <= init <= outer <= 5).
    #[error("invalid loop levels: init={init} inner={inner} outer={outer}")]
    LevelOrder {
        /// Staged init level.
        init: u8,
        /// Staged inner level.
        inner: u8,
        /// Staged outer level.
        outer: u8,
    },

    /// A loop count of zero or past the 16-bit hardware counter.
    #[error("loop count {count} at level {level} outside 1..={max}", max = (1u32 << HW_LOOP_WIDTH) - 1)]
    LoopCount {
        /// Level of the offending bound.
        level: usize,
        /// The staged iteration count.
        count: u32,
    },

    /// Opcode outside the implemented set.
    #[error("unknown opcode {0}")]
    UnknownOpcode(u8),

    /// Auxiliary function bits undefined for the staged opcode.
    #[error("aux function {aux} undefined for {opcode:?}")]
    UndefinedAux {
        /// The staged opcode.
        opcode: Opcode,
        /// The offending aux value.
        aux: u8,
    },

    /// An AGU left the configured scratchpad window.
    #[error("AGU{agu} at 0x{addr:08X} outside window 0x{low:08X}..=0x{high:08X}")]
    AguOutOfRange {
        /// Which address generator.
        agu: usize,
        /// Its byte pointer at the failing frame.
        addr: u32,
        /// Low window bound.
        low: u32,
        /// High window bound (inclusive).
        high: u32,
    },

    /// A dereference failed at the memory itself.
    #[error(transparent)]
    Memory(#[from] MemoryError),
}

/// Staging area and architectural state of one accelerator instance.
///
/// Exactly one job is in flight per descriptor; `issue` runs it to
/// completion before returning.
#[derive(Debug, Clone, Default)]
pub struct JobDescriptor {
    init_level: u8,
    inner_level: u8,
    outer_level: u8,
    opcode: u8,
    init_sel: u8,
    aux_func: u8,
    irq_cfg: u8,
    polarity: bool,

    /// Per-level iteration counts minus one, as the hardware stores them.
    loop_bound: [u32; N_HW_LOOPS],
    /// Incremental per-level byte strides, one row per AGU.
    agu_stride: [[i32; N_HW_LOOPS]; N_AGUS],
    /// AGU byte base addresses.
    agu_base: [u32; N_AGUS],

    /// Optional inclusive byte window asserted on every loop frame.
    address_window: Option<(u32, u32)>,
    irq_pending: bool,
}

impl JobDescriptor {
    /// Create an empty descriptor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage loop levels, bounds and stride tables.
    ///
    /// `loop_count[l]` is the iteration count of level `l` (not the
    /// hardware count-minus-one). `element_stride[a][l]` is the absolute
    /// per-iteration stride of AGU `a` at level `l` in 32-bit elements.
    /// Only levels below `outer_level` are consumed; the rest of both
    /// tables is ignored.
    ///
    /// The absolute strides are rewritten into the incremental
    /// formulation the address generators apply after each iteration:
    /// the net pointer adjustment at a level is the absolute stride
    /// minus whatever the levels below have already walked, scaled to
    /// bytes.
    pub fn stage_loop_nest(
        &mut self,
        init_level: u8,
        inner_level: u8,
        outer_level: u8,
        loop_count: &[u32; N_HW_LOOPS],
        element_stride: &[[i32; N_HW_LOOPS]; N_AGUS],
    ) -> Result<(), JobError> {
        check_levels(init_level, inner_level, outer_level)?;

        let outer = outer_level as usize;
        for level in 0..outer {
            let count = loop_count[level];
            if count == 0 || count >= 1 << HW_LOOP_WIDTH {
                return Err(JobError::LoopCount { level, count });
            }
        }

        self.init_level = init_level;
        self.inner_level = inner_level;
        self.outer_level = outer_level;

        self.loop_bound = [0; N_HW_LOOPS];
        for level in 0..outer {
            self.loop_bound[level] = loop_count[level] - 1;
        }

        self.agu_stride = [[0; N_HW_LOOPS]; N_AGUS];
        for agu in 0..N_AGUS {
            // `walked` tracks the cumulative element offset the levels
            // below have imparted by the time this level steps once
            let mut walked: i32 = 0;
            for level in 0..outer {
                let stride = element_stride[agu][level];
                self.agu_stride[agu][level] = (stride - walked) << 2;
                walked += (loop_count[level] as i32 - 1) * stride;
            }
        }

        log::debug!(
            "staged loop nest: levels=({},{},{}) bounds={:?}",
            init_level,
            inner_level,
            outer_level,
            &self.loop_bound[..outer],
        );
        Ok(())
    }

    /// Stage the three AGU base addresses (bytes into the scratchpad).
    pub fn stage_agu_offs(&mut self, base0: u32, base1: u32, base2: u32) {
        self.agu_base = [base0, base1, base2];
    }

    /// Stage the command fields that are not derived from the loop nest.
    pub fn stage_cmd(&mut self, opcode: u8, init_sel: u8, aux_func: u8, irq_cfg: u8, polarity: bool) {
        self.opcode = opcode;
        self.init_sel = init_sel & 0x3;
        self.aux_func = aux_func & 0x7;
        self.irq_cfg = irq_cfg & 0x3;
        self.polarity = polarity;
    }

    /// Enable the per-frame AGU window assertion over `low..=high`
    /// (inclusive byte addresses).
    pub fn enable_address_check(&mut self, low: u32, high: u32) {
        self.address_window = Some((low, high));
    }

    /// Enable the AGU window assertion over a whole scratchpad.
    pub fn enable_address_check_for(&mut self, mem: &Scratchpad) {
        self.enable_address_check(0, mem.high_addr());
    }

    /// The composed 32-bit command word.
    pub fn command_word(&self) -> u32 {
        CommandWord {
            opcode: self.opcode,
            init_level: self.init_level,
            inner_level: self.inner_level,
            outer_level: self.outer_level,
            init_sel: self.init_sel,
            aux_func: self.aux_func,
            irq_cfg: self.irq_cfg,
            polarity: self.polarity,
        }
        .encode()
    }

    /// Validate the staged configuration and run the job to completion.
    pub fn issue(&mut self, mem: &mut Scratchpad) -> Result<(), JobError> {
        let (opcode, init_sel) = self.validate()?;

        log::debug!(
            "issuing {:?} cmd=0x{:08X} bases={:?}",
            opcode,
            self.command_word(),
            self.agu_base
        );

        LoopDriver::new(self, mem, opcode, init_sel).run()?;

        self.irq_pending = self.irq_cfg > 0;
        Ok(())
    }

    /// Whether an interrupt is pending from a completed job.
    pub fn has_irq(&self) -> bool {
        self.irq_pending
    }

    /// Clear the pending interrupt.
    pub fn clear_irq(&mut self) {
        self.irq_pending = false;
    }

    /// Check level ordering, loop counters, opcode and aux function.
    fn validate(&self) -> Result<(Opcode, InitSelect), JobError> {
        check_levels(self.init_level, self.inner_level, self.outer_level)?;
        for (level, &bound) in self.loop_bound.iter().enumerate() {
            if bound >= 1 << HW_LOOP_WIDTH {
                return Err(JobError::LoopCount { level, count: bound + 1 });
            }
        }
        let opcode = Opcode::from_bits(self.opcode).ok_or(JobError::UnknownOpcode(self.opcode))?;
        if !opcode.aux_defined(self.aux_func) {
            return Err(JobError::UndefinedAux { opcode, aux: self.aux_func });
        }
        Ok((opcode, InitSelect::from_bits(self.init_sel)))
    }

    // accessors used by the loop driver and the dump writers

    /// Staged init level.
    pub fn init_level(&self) -> u8 {
        self.init_level
    }

    /// Staged inner (writeback) level.
    pub fn inner_level(&self) -> u8 {
        self.inner_level
    }

    /// Staged outermost level.
    pub fn outer_level(&self) -> u8 {
        self.outer_level
    }

    /// Auxiliary function bits.
    pub fn aux_func(&self) -> u8 {
        self.aux_func
    }

    /// Polarity bit.
    pub fn polarity(&self) -> bool {
        self.polarity
    }

    /// Hardware loop bounds (iteration counts minus one).
    pub fn loop_bounds(&self) -> &[u32; N_HW_LOOPS] {
        &self.loop_bound
    }

    /// Incremental byte stride table, one row per AGU.
    pub fn strides(&self) -> &[[i32; N_HW_LOOPS]; N_AGUS] {
        &self.agu_stride
    }

    /// AGU byte base addresses.
    pub fn agu_bases(&self) -> &[u32; N_AGUS] {
        &self.agu_base
    }

    /// Configured address assertion window, if any.
    pub fn address_window(&self) -> Option<(u32, u32)> {
        self.address_window
    }
}

fn check_levels(init: u8, inner: u8, outer: u8) -> Result<(), JobError> {
    if inner <= init && init <= outer && (outer as usize) <= command::N_HW_LOOPS {
        Ok(())
    } else {
        Err(JobError::LevelOrder { init, inner, outer })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stride_translation_1d() {
        let mut job = JobDescriptor::new();
        job.stage_loop_nest(1, 1, 1, &[100, 0, 0, 0, 0], &[
            [1, 0, 0, 0, 0],
            [2, 0, 0, 0, 0],
            [0, 0, 0, 0, 0],
        ])
        .unwrap();

        assert_eq!(job.loop_bounds(), &[99, 0, 0, 0, 0]);
        assert_eq!(job.strides()[0], [4, 0, 0, 0, 0]);
        assert_eq!(job.strides()[1], [8, 0, 0, 0, 0]);
        assert_eq!(job.strides()[2], [0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_stride_translation_2d_contiguous() {
        // a 10x10 row-major walk: after 9 unit steps at level 0, one more
        // element forward reaches the next row, so the level-1 increment
        // collapses to a single element
        let mut job = JobDescriptor::new();
        job.stage_loop_nest(2, 2, 2, &[10, 10, 0, 0, 0], &[
            [1, 10, 0, 0, 0],
            [1, 10, 0, 0, 0],
            [0, 0, 0, 0, 0],
        ])
        .unwrap();

        assert_eq!(job.strides()[0], [4, 4, 0, 0, 0]);
    }

    #[test]
    fn test_stride_translation_revisit() {
        // level 1 returns to the row start (stride 0 at level 1 after 19
        // unit steps at level 0 means stepping back 19 elements)
        let mut job = JobDescriptor::new();
        job.stage_loop_nest(1, 0, 2, &[20, 20, 0, 0, 0], &[
            [1, 0, 0, 0, 0],
            [0, 1, 0, 0, 0],
            [1, 20, 0, 0, 0],
        ])
        .unwrap();

        assert_eq!(job.strides()[0], [4, -76, 0, 0, 0]);
        assert_eq!(job.strides()[1], [0, 4, 0, 0, 0]);
        assert_eq!(job.strides()[2], [4, 4, 0, 0, 0]);
    }

    #[test]
    fn test_level_order_rejected() {
        let mut job = JobDescriptor::new();
        let err = job
            .stage_loop_nest(0, 1, 2, &[4, 4, 0, 0, 0], &Default::default())
            .unwrap_err();
        assert!(matches!(err, JobError::LevelOrder { .. }));

        let err = job
            .stage_loop_nest(2, 1, 6, &[4; 5], &Default::default())
            .unwrap_err();
        assert!(matches!(err, JobError::LevelOrder { .. }));
    }

    #[test]
    fn test_zero_loop_count_rejected() {
        let mut job = JobDescriptor::new();
        let err = job
            .stage_loop_nest(2, 2, 2, &[10, 0, 0, 0, 0], &Default::default())
            .unwrap_err();
        assert_eq!(err, JobError::LoopCount { level: 1, count: 0 });
    }

    #[test]
    fn test_oversized_loop_count_rejected() {
        let mut job = JobDescriptor::new();
        let err = job
            .stage_loop_nest(1, 1, 1, &[(1 << 16) + 1, 0, 0, 0, 0], &Default::default())
            .unwrap_err();
        assert!(matches!(err, JobError::LoopCount { level: 0, .. }));
    }

    #[test]
    fn test_unknown_opcode_traps_at_issue() {
        let mut job = JobDescriptor::new();
        job.stage_cmd(9, 0, 0, 0, false);
        let mut mem = Scratchpad::new(16);
        assert_eq!(job.issue(&mut mem), Err(JobError::UnknownOpcode(9)));
    }

    #[test]
    fn test_undefined_aux_traps_at_issue() {
        let mut job = JobDescriptor::new();
        job.stage_cmd(0, 3, 5, 0, false); // reduction MAC only defines aux 0 and 1
        let mut mem = Scratchpad::new(16);
        assert!(matches!(job.issue(&mut mem), Err(JobError::UndefinedAux { .. })));
    }

    #[test]
    fn test_irq_latch_and_clear() {
        let mut mem = Scratchpad::new(16);
        let mut job = JobDescriptor::new();
        job.stage_loop_nest(1, 1, 1, &[4, 0, 0, 0, 0], &Default::default())
            .unwrap();
        job.stage_agu_offs(0, 0, 0);
        job.stage_cmd(8, 3, 0, 1, false); // copy-replicate zero, irq on done
        job.issue(&mut mem).unwrap();
        assert!(job.has_irq());
        job.clear_irq();
        assert!(!job.has_irq());

        // no irq requested leaves the flag untouched
        job.stage_cmd(8, 3, 0, 0, false);
        job.issue(&mut mem).unwrap();
        assert!(!job.has_irq());
    }

    #[test]
    fn test_command_word_composition() {
        let mut job = JobDescriptor::new();
        job.stage_loop_nest(3, 3, 5, &[10; 5], &Default::default()).unwrap();
        job.stage_cmd(0, 3, 1, 1, true);

        let word = job.command_word();
        let decoded = CommandWord::decode(word);
        assert_eq!(decoded.opcode, 0);
        assert_eq!(decoded.init_level, 3);
        assert_eq!(decoded.inner_level, 3);
        assert_eq!(decoded.outer_level, 5);
        assert_eq!(decoded.init_sel, 3);
        assert_eq!(decoded.aux_func, 1);
        assert_eq!(decoded.irq_cfg, 1);
        assert!(decoded.polarity);
    }
}
