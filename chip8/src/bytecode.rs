//! Helpers for extracting data from opcodes.
use std::fmt;

use crate::constants::Address;

/// A single 16-bit instruction word, as fetched from two consecutive bytes of memory.
///
/// The word is stored big-endian in memory, so the first byte holds
/// the instruction family in its upper nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Opcode(pub u16);

impl Opcode {
    #[inline(always)]
    pub fn from_bytes(bytes: [u8; 2]) -> Self {
        Self(u16::from_be_bytes(bytes))
    }

    /// Instruction family, stored in the first nibble.
    #[inline(always)]
    pub fn family(self) -> u8 {
        (self.0 >> 12) as u8 // 0xF000
    }

    /// Operand VX, the register index in the second nibble.
    #[inline(always)]
    pub fn x(self) -> u8 {
        ((self.0 >> 8) & 0xF) as u8 // 0x0F00
    }

    /// Operand VY, the register index in the third nibble.
    #[inline(always)]
    pub fn y(self) -> u8 {
        ((self.0 >> 4) & 0xF) as u8 // 0x00F0
    }

    /// Operand N, the last nibble.
    #[inline(always)]
    pub fn n(self) -> u8 {
        (self.0 & 0xF) as u8 // 0x000F
    }

    /// Operand NN, the lower byte.
    #[inline(always)]
    pub fn nn(self) -> u8 {
        (self.0 & 0xFF) as u8 // 0x00FF
    }

    /// Operand NNN, the lower 12 bits used as an address.
    #[inline(always)]
    pub fn nnn(self) -> Address {
        self.0 & 0xFFF // 0x0FFF
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}", self.0)
    }
}

impl From<u16> for Opcode {
    fn from(word: u16) -> Self {
        Self(word)
    }
}
