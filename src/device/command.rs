//! Command word layout and register map.
//!
//! A job is described to the accelerator by a single 32-bit command
//! word plus a bank of loop and address-generator registers. The
//! command word packs the opcode, the three loop-nest levels and the
//! per-opcode modifier fields:
//!
//! ```text
//! 31      21 20 19  18 17  15 14  13 12   10 9     7 6     4 3    0
//! +---------+--+------+------+------+-------+-------+-------+------+
//! | reserved|P | irq  | aux  | isel | outer | inner | init  | op   |
//! +---------+--+------+------+------+-------+-------+-------+------+
//! ```
//!
//! The register map below lists word offsets from the accelerator's
//! register base. Each AGU occupies six words: the byte base address
//! followed by the five per-level strides.

use std::fmt;

/// Number of hardware loop levels.
pub const N_HW_LOOPS: usize = 5;
/// Number of independent address generators.
pub const N_AGUS: usize = 3;
/// Loop counters are 16 bits wide.
pub const HW_LOOP_WIDTH: u32 = 16;

/// Opcode field width.
pub const OPCODE_WIDTH: u32 = 4;
/// Loop-level field width.
pub const LOOP_LEVEL_WIDTH: u32 = 3;

/// Register map word offsets.
pub mod regs {
    /// Status register.
    pub const STAT: u32 = 0x00;
    /// Control register (soft reset, memory priority).
    pub const CTRL: u32 = 0x01;
    /// Command register; a write triggers execution.
    pub const CMD: u32 = 0x02;
    /// Interrupt status register.
    pub const IRQ: u32 = 0x03;
    /// First of five loop-bound registers.
    pub const LOOP: u32 = 0x04;
    /// AGU0 base register; strides follow at +1..+5.
    pub const AGU0: u32 = 0x09;
    /// AGU1 base register.
    pub const AGU1: u32 = 0x0F;
    /// AGU2 base register.
    pub const AGU2: u32 = 0x15;
}

/// Look up a register name for debug display.
pub fn register_name(offset: u32) -> Option<&'static str> {
    match offset {
        regs::STAT => Some("STAT"),
        regs::CTRL => Some("CTRL"),
        regs::CMD => Some("CMD"),
        regs::IRQ => Some("IRQ"),
        o if (regs::LOOP..regs::LOOP + 5).contains(&o) => Some("LOOP"),
        o if (regs::AGU0..regs::AGU0 + 6).contains(&o) => Some("AGU0"),
        o if (regs::AGU1..regs::AGU1 + 6).contains(&o) => Some("AGU1"),
        o if (regs::AGU2..regs::AGU2 + 6).contains(&o) => Some("AGU2"),
        _ => None,
    }
}

/// Decoded command word fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandWord {
    /// Operation selector (4 bits).
    pub opcode: u8,
    /// Loop level at which the opcode re-initializes its state.
    pub init_level: u8,
    /// Loop level at which results are written back.
    pub inner_level: u8,
    /// Outermost loop level; the nest terminates here.
    pub outer_level: u8,
    /// Init source: AGU0/1/2 or zero (2 bits).
    pub init_sel: u8,
    /// Per-opcode auxiliary function (3 bits).
    pub aux_func: u8,
    /// Interrupt configuration (2 bits).
    pub irq_cfg: u8,
    /// Sign/comparison inversion bit.
    pub polarity: bool,
}

impl CommandWord {
    /// Pack the fields into the 32-bit register layout.
    pub fn encode(&self) -> u32 {
        let mut word = (self.opcode as u32) & 0xF;
        word |= ((self.init_level as u32) & 0x7) << OPCODE_WIDTH;
        word |= ((self.inner_level as u32) & 0x7) << (OPCODE_WIDTH + LOOP_LEVEL_WIDTH);
        word |= ((self.outer_level as u32) & 0x7) << (OPCODE_WIDTH + 2 * LOOP_LEVEL_WIDTH);
        word |= ((self.init_sel as u32) & 0x3) << 13;
        word |= ((self.aux_func as u32) & 0x7) << 15;
        word |= ((self.irq_cfg as u32) & 0x3) << 18;
        word |= (self.polarity as u32) << 20;
        word
    }

    /// Unpack a 32-bit command register value.
    pub fn decode(word: u32) -> Self {
        Self {
            opcode: (word & 0xF) as u8,
            init_level: ((word >> OPCODE_WIDTH) & 0x7) as u8,
            inner_level: ((word >> (OPCODE_WIDTH + LOOP_LEVEL_WIDTH)) & 0x7) as u8,
            outer_level: ((word >> (OPCODE_WIDTH + 2 * LOOP_LEVEL_WIDTH)) & 0x7) as u8,
            init_sel: ((word >> 13) & 0x3) as u8,
            aux_func: ((word >> 15) & 0x7) as u8,
            irq_cfg: ((word >> 18) & 0x3) as u8,
            polarity: (word >> 20) & 0x1 != 0,
        }
    }
}

impl fmt::Display for CommandWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "op={} levels=({},{},{}) isel={} aux={} irq={} pol={}",
            self.opcode,
            self.init_level,
            self.inner_level,
            self.outer_level,
            self.init_sel,
            self.aux_func,
            self.irq_cfg,
            self.polarity as u8
        )
    }
}
