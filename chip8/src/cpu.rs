//! CPU and memory state.
use std::ops::RangeInclusive;

use crate::{bytecode::Opcode, constants::*, error::Fault, timer::Timers};

/// Core state for a chip8 interpreter.
pub struct Chip8Cpu {
    // ------------------------------------------------------------------------
    // Registers
    /// Program counter pointing to the current position in the bytecode.
    pub(crate) pc: usize,
    /// Stack pointer, the number of return addresses on the stack.
    pub(crate) sp: usize,
    /// General purpose registers for temporary values.
    ///
    /// Register 16 (VF) is used for either the carry flag or borrow switch depending on opcode.
    pub(crate) registers: [u8; REGISTER_COUNT],
    /// Pointer register used for temporarily storing an address. Since addresses are 12 bits, only the
    /// lowest (rightmost) bits are used.
    pub(crate) address: Address,
    /// Delay and sound timers.
    pub(crate) timers: Timers,

    // ------------------------------------------------------------------------
    // Memory
    /// Main memory storage space.
    pub(crate) ram: Box<[u8; MEM_SIZE]>,
    /// Stack of return pointers used for jumping when a routine call finishes.
    pub(crate) stack: [Address; STACK_SIZE],
}

impl Default for Chip8Cpu {
    fn default() -> Self {
        Self {
            pc: MEM_START,
            sp: 0,
            registers: [0; REGISTER_COUNT],
            address: 0,
            timers: Timers::new(),

            ram: Box::new([0; MEM_SIZE]),
            stack: [0; STACK_SIZE],
        }
    }
}

impl Chip8Cpu {
    pub fn new() -> Self {
        Default::default()
    }

    /// Erase the contents of the memory buffers `ram` and `stack`.
    pub(crate) fn clear_memory(&mut self) {
        self.ram.fill(0);
        self.stack.fill(0);
    }

    /// Put registers, stack and timers back in their power-on state.
    pub(crate) fn reset_registers(&mut self) {
        self.pc = MEM_START;
        self.sp = 0;
        self.registers = [0; REGISTER_COUNT];
        self.address = 0;
        self.timers.reset();
    }

    /// Copy glyph data into the reserved region.
    pub(crate) fn load_font(&mut self, fontset: &[u8; FONTSET_DATA_LENGTH]) {
        let start = FONTSET_START as usize;
        self.ram[start..start + FONTSET_DATA_LENGTH].copy_from_slice(fontset);
    }

    /// Address of the glyph for the hexadecimal digit in the lower nibble.
    #[inline]
    pub fn font_address(digit: u8) -> Address {
        FONTSET_START + (digit & 0xF) as Address * FONTSET_HEIGHT as Address
    }

    /// Read a byte, wrapping the address to the 12-bit space.
    #[inline(always)]
    pub fn read(&self, addr: usize) -> u8 {
        self.ram[addr & ADDRESS_MASK]
    }

    /// Write a byte, wrapping the address to the 12-bit space.
    #[inline(always)]
    pub fn write(&mut self, addr: usize, value: u8) {
        self.ram[addr & ADDRESS_MASK] = value;
    }

    #[inline(always)]
    pub fn set_address(&mut self, addr: usize) {
        self.address = (addr & ADDRESS_MASK) as Address;
    }

    #[inline(always)]
    pub(crate) fn vx(&self, vx: u8) -> u8 {
        self.registers[vx as usize]
    }

    #[inline(always)]
    pub(crate) fn set_vx(&mut self, vx: u8, value: u8) {
        self.registers[vx as usize] = value;
    }

    /// Write a result and its flag.
    ///
    /// The flag is written last, so it wins when the destination is VF itself.
    #[inline(always)]
    pub(crate) fn set_vx_flag(&mut self, vx: u8, value: u8, flag: bool) {
        self.registers[vx as usize] = value;
        self.registers[FLAG_REGISTER] = flag as u8;
    }

    /// Extract the instruction at the current program counter.
    ///
    /// The program counter must point into the program region,
    /// with room for both bytes of the instruction.
    #[inline]
    pub fn fetch(&self) -> Result<Opcode, Fault> {
        if self.pc < MEM_START || self.pc + 1 >= MEM_SIZE {
            return Err(Fault::AddressEscape { address: self.pc });
        }

        Ok(Opcode::from_bytes([self.ram[self.pc], self.ram[self.pc + 1]]))
    }

    /// Push a return address onto the call stack.
    pub(crate) fn push(&mut self, return_address: Address) -> Result<(), Fault> {
        if self.sp >= STACK_SIZE {
            return Err(Fault::StackOverflow {
                pc: self.pc as Address,
            });
        }

        self.stack[self.sp] = return_address;
        self.sp += 1;

        Ok(())
    }

    /// Pop the most recent return address off the call stack.
    pub(crate) fn pop(&mut self) -> Result<Address, Fault> {
        match self.sp.checked_sub(1) {
            Some(sp) => {
                self.sp = sp;
                Ok(self.stack[sp])
            }
            None => Err(Fault::StackUnderflow {
                pc: self.pc as Address,
            }),
        }
    }

    /// Registers V0 through Vx.
    #[inline]
    fn register_range(vx: u8) -> RangeInclusive<usize> {
        0..=(vx as usize & 0xF)
    }

    /// Store registers V0 through Vx in memory starting at location I.
    pub(crate) fn store_registers(&mut self, vx: u8) {
        let addr = self.address as usize;
        for i in Self::register_range(vx) {
            self.write(addr + i, self.registers[i]);
        }
    }

    /// Read registers V0 through Vx from memory starting at location I.
    pub(crate) fn load_registers(&mut self, vx: u8) {
        let addr = self.address as usize;
        for i in Self::register_range(vx) {
            self.registers[i] = self.read(addr + i);
        }
    }

    /// Store the binary-coded decimal representation of a byte
    /// in the memory locations I, I+1, and I+2.
    #[rustfmt::skip]
    pub(crate) fn store_bcd(&mut self, value: u8) {
        let addr = self.address as usize;
        self.write(addr,     value / 100 % 10);
        self.write(addr + 1, value / 10  % 10);
        self.write(addr + 2, value       % 10);
    }
}
