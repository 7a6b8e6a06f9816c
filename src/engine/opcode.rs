//! The nine operation state machines.
//!
//! Every opcode is a triple of phases over the execution context:
//!
//! - `init` runs when the walk enters a frame at the init level and
//!   loads or clears the working registers,
//! - `execute` runs in the innermost loop body and consumes operands
//!   through the address generators,
//! - `store` runs when a frame at the inner level completes and writes
//!   the result through AGU2.
//!
//! The set is closed, so the opcodes are a plain enum and the phases
//! dispatch with an exhaustive match; a new opcode that is not wired
//! into all three phases fails to compile.

use crate::device::scratchpad::Scratchpad;
use crate::engine::driver::ExecutionContext;
use crate::engine::job::JobError;
use crate::fp32;

/// Auxiliary function bit assignments, per opcode group.
pub mod aux {
    /// Arithmetic opcodes: clamp negative results to +0 on store.
    pub const RELU: u8 = 1;

    /// Max/min: store the extremum's index instead of its value.
    pub const ARG_INDEX: u8 = 1;

    /// Compare selectors (threshold and mask groups): alu == operand.
    pub const CMP_EQ: u8 = 0;
    /// alu > operand.
    pub const CMP_GT: u8 = 1;
    /// alu >= operand.
    pub const CMP_GE: u8 = 2;

    /// Threshold: write a 0.0/1.0 indicator instead of clipping.
    /// May be or'ed onto a compare selector.
    pub const BINARY_OUT: u8 = 4;

    /// Mask group: match the iteration counter against the latched
    /// word (a literal integer, not an fp32 encoding).
    pub const CMP_COUNTER: u8 = 4;

    /// Copy: deposit the value latched at init.
    pub const COPY_REPLICATE: u8 = 0;
    /// Copy: stream through AGU0 instead of using the init latch.
    pub const COPY_VECTOR: u8 = 1;
}

/// Init source selector (2 command-word bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitSelect {
    /// Load the initial value through AGU0.
    Agu0,
    /// Load through AGU1.
    Agu1,
    /// Load through AGU2 (the result pointer).
    Agu2,
    /// Start from zero.
    Zero,
}

impl InitSelect {
    /// Decode the 2-bit field.
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x3 {
            0 => Self::Agu0,
            1 => Self::Agu1,
            2 => Self::Agu2,
            _ => Self::Zero,
        }
    }

    /// AGU index for the non-zero sources.
    fn agu(self) -> Option<usize> {
        match self {
            Self::Agu0 => Some(0),
            Self::Agu1 => Some(1),
            Self::Agu2 => Some(2),
            Self::Zero => None,
        }
    }
}

/// Operation selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// Reduction multiply-accumulate.
    Mac,
    /// Vector add/subtract (accumulate without multiply).
    VAddSub,
    /// Elementwise multiply, no reduction.
    VMult,
    /// Outer product of a stream with a latched scalar.
    OuterProduct,
    /// Max or min scan with optional arg-index.
    MaxMin,
    /// Threshold / test against a latched value.
    Threshold,
    /// Conditional copy gated by a compare or the iteration counter.
    Mask,
    /// Masked accumulate into a read-modify-write stream.
    MaskMac,
    /// Replicate or bulk copy.
    Copy,
}

impl Opcode {
    /// Decode the 4-bit opcode field. Values outside the implemented
    /// set are rejected at issue time.
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(Self::Mac),
            1 => Some(Self::VAddSub),
            2 => Some(Self::VMult),
            3 => Some(Self::OuterProduct),
            4 => Some(Self::MaxMin),
            5 => Some(Self::Threshold),
            6 => Some(Self::Mask),
            7 => Some(Self::MaskMac),
            8 => Some(Self::Copy),
            _ => None,
        }
    }

    /// Whether an aux value is defined for this opcode.
    ///
    /// Undefined combinations are configuration errors rather than a
    /// silent always-false compare. Note the asymmetry between the
    /// threshold and mask groups: threshold takes a compare selector in
    /// the low bits plus the binary-output flag, the mask group takes
    /// either a compare selector or the counter mode.
    pub fn aux_defined(self, aux: u8) -> bool {
        match self {
            Self::Mac | Self::VAddSub | Self::VMult | Self::OuterProduct => aux <= aux::RELU,
            Self::MaxMin => aux <= aux::ARG_INDEX,
            Self::Threshold => (aux & 0x3) != 0x3,
            Self::Mask | Self::MaskMac => {
                matches!(aux, aux::CMP_EQ | aux::CMP_GT | aux::CMP_GE | aux::CMP_COUNTER)
            }
            Self::Copy => aux <= aux::COPY_VECTOR,
        }
    }
}

/// Everything a phase needs: the scratchpad, the live registers and the
/// command modifiers. Built by the loop driver for each phase call.
pub(crate) struct OpContext<'a> {
    pub mem: &'a mut Scratchpad,
    pub state: &'a mut ExecutionContext,
    pub init_sel: InitSelect,
    pub aux: u8,
    pub polarity: bool,
}

impl OpContext<'_> {
    /// Dereference an AGU.
    fn read(&self, agu: usize) -> Result<u32, JobError> {
        Ok(self.mem.read_word(self.state.agu[agu])?)
    }

    /// Write through an AGU.
    fn write(&mut self, agu: usize, value: u32) -> Result<(), JobError> {
        Ok(self.mem.write_word(self.state.agu[agu], value)?)
    }

    /// The init operand: zero, or a load through the selected AGU.
    fn init_value(&self) -> Result<u32, JobError> {
        match self.init_sel.agu() {
            Some(agu) => self.read(agu),
            None => Ok(fp32::ZERO_BITS),
        }
    }

    /// IEEE-ordered comparison of the alu register against an operand.
    fn compare(&self, selector: u8, operand: u32) -> bool {
        let alu = fp32::to_f32(self.state.alu);
        let operand = fp32::to_f32(operand);
        match selector {
            aux::CMP_EQ => alu == operand,
            aux::CMP_GT => alu > operand,
            aux::CMP_GE => alu >= operand,
            _ => false,
        }
    }

    /// Mask-group test: compare selector or counter match, then the
    /// polarity inversion.
    fn mask_test(&self, operand: u32) -> bool {
        let tst = if self.aux == aux::CMP_COUNTER {
            // one-hot selection: the latched word is a literal
            // iteration number, matched as a raw integer
            self.state.cnt == self.state.alu
        } else {
            self.compare(self.aux, operand)
        };
        tst ^ self.polarity
    }

    /// Normalize the accumulator and apply the optional ReLU clamp.
    fn store_normalized(&mut self) -> Result<(), JobError> {
        let mut res = self.state.accu.to_fp32();
        if self.aux & aux::RELU != 0 && fp32::sign(res) {
            res = fp32::ZERO_BITS;
        }
        self.write(2, res)
    }
}

impl Opcode {
    /// Init phase, run on entering a frame at the init level.
    pub(crate) fn init(self, cx: &mut OpContext) -> Result<(), JobError> {
        match self {
            Self::Mac => match cx.init_sel.agu() {
                None => cx.state.accu.clear(),
                Some(agu) => {
                    let value = cx.read(agu)?;
                    cx.state.accu.mac(value, fp32::ONE_BITS, true, false);
                }
            },

            // same as MAC but the init load honors the polarity, so a
            // subtractive pass can start from a negated bias
            Self::VAddSub => match cx.init_sel.agu() {
                None => cx.state.accu.clear(),
                Some(agu) => {
                    let value = cx.read(agu)?;
                    cx.state.accu.mac(value, fp32::ONE_BITS, true, cx.polarity);
                }
            },

            Self::VMult => {}

            Self::OuterProduct => {
                cx.state.alu = cx.init_value()?;
                cx.state.accu.clear();
            }

            Self::MaxMin | Self::Mask => {
                cx.state.alu = cx.init_value()?;
                cx.state.cnt = 0;
            }

            Self::Threshold => {
                cx.state.alu = cx.init_value()?;
            }

            // the compare value always comes through AGU1 here; the
            // init select only chooses between that and zero
            Self::MaskMac => {
                cx.state.alu = match cx.init_sel {
                    InitSelect::Zero => fp32::ZERO_BITS,
                    _ => cx.read(1)?,
                };
                let value = cx.read(0)?;
                cx.state.accu.mac(value, fp32::ONE_BITS, true, false);
                cx.state.cnt = 0;
            }

            Self::Copy => {
                if cx.aux & aux::COPY_VECTOR == 0 {
                    cx.state.alu = cx.init_value()?;
                }
            }
        }
        Ok(())
    }

    /// Execute phase, run once per innermost iteration.
    pub(crate) fn execute(self, cx: &mut OpContext) -> Result<(), JobError> {
        match self {
            Self::Mac => {
                let a = cx.read(0)?;
                let b = cx.read(1)?;
                cx.state.accu.mac(a, b, false, cx.polarity);
            }

            Self::VAddSub => {
                let a = cx.read(0)?;
                cx.state.accu.mac(a, fp32::ONE_BITS, false, false);
            }

            Self::VMult => {
                let a = cx.read(0)?;
                let b = cx.read(1)?;
                cx.state.accu.mac(a, b, true, cx.polarity);
            }

            Self::OuterProduct => {
                let a = cx.read(0)?;
                let scalar = cx.state.alu;
                cx.state.accu.mac(a, scalar, true, cx.polarity);
            }

            Self::MaxMin => {
                let b = cx.read(1)?;
                // polarity 0 keeps the larger value, polarity 1 the smaller
                let replace =
                    (fp32::to_f32(cx.state.alu) > fp32::to_f32(b)) ^ !cx.polarity;
                if replace {
                    cx.state.alu = b;
                    cx.state.idx = cx.state.cnt;
                }
                cx.state.cnt += 1;
            }

            Self::Threshold => {
                let b = cx.read(1)?;
                cx.state.tst = cx.compare(cx.aux & 0x3, b) ^ cx.polarity;
                cx.state.op_b = b;
            }

            Self::Mask => {
                cx.state.op_a = cx.read(0)?;
                let b = cx.read(1)?;
                cx.state.tst = cx.mask_test(b);
                cx.state.cnt += 1;
            }

            Self::MaskMac => {
                // the result stream is read-modify-write
                cx.state.op_a = cx.read(2)?;
                let b = if cx.aux & aux::CMP_COUNTER == 0 {
                    cx.read(1)?
                } else {
                    cx.state.op_a
                };
                cx.state.tst = cx.mask_test(b);
                cx.state.cnt += 1;
            }

            Self::Copy => {
                if cx.aux & aux::COPY_VECTOR != 0 {
                    cx.state.alu = cx.read(0)?;
                }
            }
        }
        Ok(())
    }

    /// Store phase, run when a frame at the inner level completes.
    pub(crate) fn store(self, cx: &mut OpContext) -> Result<(), JobError> {
        match self {
            Self::Mac | Self::VAddSub | Self::VMult | Self::OuterProduct => {
                cx.store_normalized()?;
            }

            Self::MaxMin => {
                let out = if cx.aux != 0 { cx.state.idx } else { cx.state.alu };
                cx.write(2, out)?;
            }

            Self::Threshold => {
                let out = if cx.aux & aux::BINARY_OUT != 0 {
                    if cx.state.tst { fp32::ONE_BITS } else { fp32::ZERO_BITS }
                } else if cx.state.tst {
                    cx.state.op_b
                } else {
                    cx.state.alu
                };
                cx.write(2, out)?;
            }

            Self::Mask => {
                let out = if cx.state.tst { cx.state.op_a } else { fp32::ZERO_BITS };
                cx.write(2, out)?;
            }

            Self::MaskMac => {
                if cx.state.tst {
                    let addend = cx.state.op_a;
                    cx.state.accu.mac(addend, fp32::ONE_BITS, false, false);
                    let res = cx.state.accu.to_fp32();
                    cx.write(2, res)?;
                }
            }

            Self::Copy => {
                let out = cx.state.alu;
                cx.write(2, out)?;
            }
        }
        Ok(())
    }
}
