//! Shared scratchpad memory.
//!
//! The accelerator's three address generators dereference a flat,
//! tightly-coupled memory of 32-bit words. The memory is owned by the
//! caller (in hardware it is the cluster's tightly-coupled data memory);
//! the emulator only needs
//! word-granular load/store access plus the byte bounds for address
//! assertions.
//!
//! All addresses on this interface are byte addresses, because that is
//! what the address generators carry internally. Words are 4-byte
//! aligned; a misaligned dereference is a programming error.

use std::io::{self, Write};

use thiserror::Error;

/// Default scratchpad size: 128 KiB of 32-bit words.
pub const DEFAULT_WORDS: usize = 32 * 1024;

/// Error type for scratchpad accesses.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MemoryError {
    /// Byte address past the end of the memory.
    #[error("address 0x{addr:08X} outside scratchpad of {words} words")]
    OutOfBounds {
        /// Offending byte address.
        addr: u32,
        /// Size of the memory in words.
        words: usize,
    },

    /// Byte address not on a word boundary.
    #[error("address 0x{addr:08X} not 32-bit aligned")]
    Misaligned {
        /// Offending byte address.
        addr: u32,
    },
}

/// Flat 32-bit word memory with byte addressing.
#[derive(Debug, Clone)]
pub struct Scratchpad {
    words: Vec<u32>,
}

impl Scratchpad {
    /// Create a zero-filled scratchpad of `words` 32-bit words.
    pub fn new(words: usize) -> Self {
        Self { words: vec![0; words] }
    }

    /// Number of words.
    #[inline]
    pub fn len_words(&self) -> usize {
        self.words.len()
    }

    /// Size in bytes.
    #[inline]
    pub fn len_bytes(&self) -> usize {
        self.words.len() * 4
    }

    /// Highest valid byte address of a word access (inclusive).
    #[inline]
    pub fn high_addr(&self) -> u32 {
        (self.len_bytes() as u32).saturating_sub(4)
    }

    /// Fill the whole memory with one word pattern.
    pub fn fill(&mut self, pattern: u32) {
        self.words.fill(pattern);
    }

    /// Load the word at a byte address.
    pub fn read_word(&self, addr: u32) -> Result<u32, MemoryError> {
        self.index(addr).map(|i| self.words[i])
    }

    /// Store a word at a byte address.
    pub fn write_word(&mut self, addr: u32, value: u32) -> Result<(), MemoryError> {
        let i = self.index(addr)?;
        self.words[i] = value;
        Ok(())
    }

    /// Direct word-indexed view, for test data setup.
    #[inline]
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Mutable word-indexed view.
    #[inline]
    pub fn words_mut(&mut self) -> &mut [u32] {
        &mut self.words
    }

    /// Store a float at a word index.
    #[inline]
    pub fn store_f32(&mut self, word_index: usize, value: f32) {
        self.words[word_index] = value.to_bits();
    }

    /// Load a float from a word index.
    #[inline]
    pub fn load_f32(&self, word_index: usize) -> f32 {
        f32::from_bits(self.words[word_index])
    }

    /// Write the full memory image as one `0xAAAAAAAA 0xDDDDDDDD` line
    /// per word (byte address, content). This is the interchange format
    /// consumed by the RTL testbenches.
    pub fn write_dump<W: Write>(&self, mut out: W) -> io::Result<()> {
        for (k, word) in self.words.iter().enumerate() {
            writeln!(out, "0x{:08x} 0x{:08x}", k << 2, word)?;
        }
        Ok(())
    }

    fn index(&self, addr: u32) -> Result<usize, MemoryError> {
        if addr & 0x3 != 0 {
            return Err(MemoryError::Misaligned { addr });
        }
        let i = (addr >> 2) as usize;
        if i >= self.words.len() {
            return Err(MemoryError::OutOfBounds { addr, words: self.words.len() });
        }
        Ok(i)
    }
}

impl Default for Scratchpad {
    fn default() -> Self {
        Self::new(DEFAULT_WORDS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_write_word() {
        let mut mem = Scratchpad::new(16);
        mem.write_word(0x10, 0xDEAD_BEEF).unwrap();
        assert_eq!(mem.read_word(0x10).unwrap(), 0xDEAD_BEEF);
        assert_eq!(mem.read_word(0x14).unwrap(), 0);
    }

    #[test]
    fn test_out_of_bounds() {
        let mem = Scratchpad::new(4);
        assert_eq!(mem.read_word(0x0C).unwrap(), 0);
        assert_eq!(
            mem.read_word(0x10),
            Err(MemoryError::OutOfBounds { addr: 0x10, words: 4 })
        );
    }

    #[test]
    fn test_misaligned() {
        let mem = Scratchpad::new(4);
        assert_eq!(mem.read_word(0x2), Err(MemoryError::Misaligned { addr: 0x2 }));
    }

    #[test]
    fn test_fill() {
        let mut mem = Scratchpad::new(8);
        mem.fill(0x5555_5555);
        assert!(mem.words().iter().all(|&w| w == 0x5555_5555));
    }

    #[test]
    fn test_dump_format() {
        let mut mem = Scratchpad::new(2);
        mem.write_word(0, 0xCAFE_0001).unwrap();
        mem.write_word(4, 0x0000_0002).unwrap();

        let mut buf = Vec::new();
        mem.write_dump(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "0x00000000 0xcafe0001\n0x00000004 0x00000002\n");
    }

    #[test]
    fn test_float_helpers() {
        let mut mem = Scratchpad::new(4);
        mem.store_f32(2, -1.5);
        assert_eq!(mem.load_f32(2), -1.5);
        assert_eq!(mem.read_word(8).unwrap(), (-1.5f32).to_bits());
    }
}
