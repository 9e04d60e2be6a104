//! Result and errors.
use std::fmt::{self, Display, Formatter};

use crate::{bytecode::Opcode, constants::Address};

pub type Chip8Result<T> = std::result::Result<T, Chip8Error>;

#[derive(Debug)]
pub enum Chip8Error {
    /// Attempt to load a bytecode program that can't fit in memory.
    LargeProgram { size: usize },
    /// Font data with the wrong shape.
    Font(String),
    /// VM fault during interpreter loop. The machine is halted.
    Runtime(Fault),
    Io(std::io::Error),
}

impl Display for Chip8Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::LargeProgram { size } => write!(
                f,
                "program too large for VM memory: {size} bytes, at most {} allowed",
                crate::constants::MAX_PROGRAM_SIZE
            ),
            Self::Font(msg) => write!(f, "font error: {}", msg),
            Self::Runtime(fault) => write!(f, "runtime error: {}", fault),
            Self::Io(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for Chip8Error {}

impl From<std::io::Error> for Chip8Error {
    fn from(err: std::io::Error) -> Self {
        Chip8Error::Io(err)
    }
}

impl From<Fault> for Chip8Error {
    fn from(fault: Fault) -> Self {
        Chip8Error::Runtime(fault)
    }
}

/// Fatal condition that halts the interpreter loop.
///
/// Programs are deterministic, so none of these are retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Opcode matched no instruction pattern.
    UnknownOpcode { opcode: Opcode, pc: Address },
    /// Program counter left the program region.
    AddressEscape { address: usize },
    /// `CALL` with a full call stack.
    StackOverflow { pc: Address },
    /// `RET` with an empty call stack.
    StackUnderflow { pc: Address },
}

impl Display for Fault {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownOpcode { opcode, pc } => {
                write!(f, "unsupported opcode {opcode} at 0x{pc:03X}")
            }
            Self::AddressEscape { address } => {
                write!(f, "program counter escaped to 0x{address:04X}")
            }
            Self::StackOverflow { pc } => write!(f, "call stack overflow at 0x{pc:03X}"),
            Self::StackUnderflow { pc } => write!(f, "call stack underflow at 0x{pc:03X}"),
        }
    }
}
