//! Instruction execution.
use rand::Rng;

use crate::{
    constants::*,
    cpu::Chip8Cpu,
    devices::{Devices, KeyCode},
    error::Fault,
    op::Op,
    vm::{Flow, Quirks},
};

impl Chip8Cpu {
    /// Apply a decoded instruction to the machine state.
    ///
    /// The program counter must already point at the next instruction.
    pub(crate) fn exec<D, R>(
        &mut self,
        op: Op,
        devices: &mut D,
        rng: &mut R,
        quirks: &Quirks,
    ) -> Result<Flow, Fault>
    where
        D: Devices + ?Sized,
        R: Rng + ?Sized,
    {
        let mut control_flow = Flow::Ok;

        match op {
            // 0nnn (SYS addr)
            //
            // Machine code routines are not emulated.
            Op::Sys { .. } => { /* No Op */ }
            // 00E0 (CLS)
            Op::ClearScreen => {
                devices.clear_screen();
                control_flow = Flow::Draw;
            }
            // 00EE (RET)
            //
            // Set the program counter to the address at the top of the stack.
            Op::Return => {
                self.pc = self.pop()? as usize;
                control_flow = Flow::Jump;
            }
            // 1nnn (JP addr)
            Op::JumpAddress { address } => {
                self.pc = address as usize;
                control_flow = Flow::Jump;
            }
            // 2nnn (CALL addr)
            //
            // The return address is the instruction after the call.
            Op::Call { address } => {
                self.push(self.pc as Address)?;
                self.pc = address as usize;
                control_flow = Flow::Jump;
            }
            // 3xnn (SE Vx, byte)
            Op::Skip_Eq_Byte { vx, nn } => {
                if self.vx(vx) == nn {
                    self.pc += 2;
                }
            }
            // 4xnn (SNE Vx, byte)
            Op::Skip_NotEq_Byte { vx, nn } => {
                if self.vx(vx) != nn {
                    self.pc += 2;
                }
            }
            // 5xy0 (SE Vx, Vy)
            Op::Skip_Eq { vx, vy } => {
                if self.vx(vx) == self.vx(vy) {
                    self.pc += 2;
                }
            }
            // 6xnn (LD Vx, byte)
            Op::Load_Byte { vx, nn } => self.set_vx(vx, nn),
            // 7xnn (ADD Vx, byte)
            //
            // Carry flag is not set.
            Op::Add_Byte { vx, nn } => self.set_vx(vx, self.vx(vx).wrapping_add(nn)),
            // 9xy0 (SNE Vx, Vy)
            Op::Skip_NotEq { vx, vy } => {
                if self.vx(vx) != self.vx(vy) {
                    self.pc += 2;
                }
            }
            // Annn (LD I, addr)
            Op::Load_Address { address } => self.set_address(address as usize),
            // Bnnn (JP V0, addr)
            //
            // The destination is not wrapped, so jumping out of memory
            // faults on the next fetch.
            Op::Jump_V0 { address } => {
                self.pc = address as usize + self.registers[0] as usize;
                control_flow = Flow::Jump;
            }
            // Cxnn (RND Vx, byte)
            //
            // Set register VX to the result of bitwise AND between a random number and NN.
            Op::Random { vx, nn } => self.set_vx(vx, nn & rng.gen::<u8>()),
            // Dxyn (DRW Vx, Vy, nibble)
            Op::Draw { vx, vy, n } => {
                self.draw_sprite(devices, vx, vy, n);
                control_flow = Flow::Draw;
            }
            // Ex9E (SKP Vx)
            Op::Skip_Key { vx } => {
                if devices.is_key_down(KeyCode::from_nibble(self.vx(vx))) {
                    self.pc += 2;
                }
            }
            // ExA1 (SKNP Vx)
            Op::Skip_NotKey { vx } => {
                if !devices.is_key_down(KeyCode::from_nibble(self.vx(vx))) {
                    self.pc += 2;
                }
            }
            // 8xy0 (LD Vx, Vy)
            Op::Load_Vx_Vy { vx, vy } => self.set_vx(vx, self.vx(vy)),
            // 8xy1 (OR Vx, Vy)
            Op::Or_Vx_Vy { vx, vy } => self.set_vx(vx, self.vx(vx) | self.vx(vy)),
            // 8xy2 (AND Vx, Vy)
            Op::And_Vx_Vy { vx, vy } => self.set_vx(vx, self.vx(vx) & self.vx(vy)),
            // 8xy3 (XOR Vx, Vy)
            Op::Xor_Vx_Vy { vx, vy } => self.set_vx(vx, self.vx(vx) ^ self.vx(vy)),
            // 8xy4 (ADD Vx, Vy)
            //
            // If overflow, set VF to 1, else 0.
            Op::Add_Vx_Vy { vx, vy } => {
                let (result, carry) = self.vx(vx).overflowing_add(self.vx(vy));
                self.set_vx_flag(vx, result, carry);
            }
            // 8xy5 (SUB Vx, Vy)
            //
            // VF is set to 0 when there is a borrow, set to 1 when there isn't.
            Op::Sub_Vx_Vy { vx, vy } => {
                let (result, borrow) = self.vx(vx).overflowing_sub(self.vx(vy));
                self.set_vx_flag(vx, result, !borrow);
            }
            // 8xy6 (SHR Vx)
            //
            // The least-significant bit is shifted out into VF.
            Op::ShiftRight { vx } => {
                let x = self.vx(vx);
                self.set_vx_flag(vx, x >> 1, x & 1 == 1);
            }
            // 8xy7 (SUBN Vx, Vy)
            //
            // Subtracts VX from VY, and stores the result in VX.
            Op::SubReverse_Vx_Vy { vx, vy } => {
                let (result, borrow) = self.vx(vy).overflowing_sub(self.vx(vx));
                self.set_vx_flag(vx, result, !borrow);
            }
            // 8xyE (SHL Vx)
            //
            // The most-significant bit is shifted out into VF.
            Op::ShiftLeft { vx } => {
                let x = self.vx(vx);
                self.set_vx_flag(vx, x << 1, x >> 7 == 1);
            }
            // Fx07 (LD Vx, DT)
            Op::Load_Vx_DT { vx } => self.set_vx(vx, self.timers.delay),
            // Fx0A (LD Vx, K)
            //
            // All execution stops until a key is pressed. The interpreter
            // loop owns the wait, and stores the key in Vx.
            Op::Load_Vx_Key { .. } => control_flow = Flow::KeyWait,
            // Fx15 (LD DT, Vx)
            Op::Load_DT_Vx { vx } => self.timers.delay = self.vx(vx),
            // Fx18 (LD ST, Vx)
            Op::Load_ST_Vx { vx } => {
                self.timers.sound = self.vx(vx);
                control_flow = Flow::Sound;
            }
            // Fx1E (ADD I, Vx)
            //
            // The sum wraps to 12 bits and VF is not touched, like the COSMAC VIP.
            Op::Add_I_Vx { vx } => {
                self.set_address(self.address as usize + self.vx(vx) as usize);
            }
            // Fx29 (LD F, Vx)
            Op::Load_Font { vx } => self.address = Self::font_address(self.vx(vx)),
            // Fx33 (LD B, Vx)
            Op::Load_Bcd { vx } => self.store_bcd(self.vx(vx)),
            // Fx55 (LD [I], Vx)
            Op::Store_Registers { vx } => {
                self.store_registers(vx);
                if quirks.load_store_increments_address {
                    self.set_address(self.address as usize + vx as usize + 1);
                }
            }
            // Fx65 (LD Vx, [I])
            Op::Load_Registers { vx } => {
                self.load_registers(vx);
                if quirks.load_store_increments_address {
                    self.set_address(self.address as usize + vx as usize + 1);
                }
            }
        }

        Ok(control_flow)
    }

    /// Dxyn (DRW Vx, Vy, nibble)
    ///
    /// Sprite is encoded as 8 pixels wide, N pixels high, stored in bits
    /// located in memory pointed to by address register I. Rows past the
    /// bottom edge wrap around to the top.
    ///
    /// If the drawing operation erases existing pixels, register VF is set
    /// to 1, and set to 0 if no pixels are unset.
    fn draw_sprite<D>(&mut self, devices: &mut D, vx: u8, vy: u8, n: u8)
    where
        D: Devices + ?Sized,
    {
        let x = (self.vx(vx) as usize & DISPLAY_WIDTH_MASK) as u8;
        let y = self.vx(vy) as usize;
        let addr = self.address as usize;
        let mut is_erased = false;

        for r in 0..n as usize {
            let row = self.read(addr + r);
            let row_y = ((y + r) & DISPLAY_HEIGHT_MASK) as u8;
            is_erased |= devices.draw_row(row, x, row_y);
        }

        self.registers[FLAG_REGISTER] = is_erased as u8;
    }
}

#[cfg(test)]
mod test {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::display::Headless;

    struct Rig {
        cpu: Chip8Cpu,
        devices: Headless,
        rng: StdRng,
        quirks: Quirks,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                cpu: Chip8Cpu::default(),
                devices: Headless::new(),
                rng: StdRng::seed_from_u64(0),
                quirks: Quirks::default(),
            }
        }

        fn exec(&mut self, op: Op) -> Result<Flow, Fault> {
            self.cpu
                .exec(op, &mut self.devices, &mut self.rng, &self.quirks)
        }
    }

    #[test]
    fn test_add_sets_carry_exhaustive() {
        let mut rig = Rig::new();

        for x in 0..=255_u8 {
            for y in 0..=255_u8 {
                rig.cpu.registers[1] = x;
                rig.cpu.registers[2] = y;
                rig.exec(Op::Add_Vx_Vy { vx: 1, vy: 2 }).unwrap();

                assert_eq!(rig.cpu.registers[1], ((x as u16 + y as u16) % 256) as u8);
                assert_eq!(rig.cpu.registers[0xF], (x as u16 + y as u16 > 255) as u8);
            }
        }
    }

    #[test]
    fn test_sub_sets_not_borrow_exhaustive() {
        let mut rig = Rig::new();

        for x in 0..=255_u8 {
            for y in 0..=255_u8 {
                rig.cpu.registers[1] = x;
                rig.cpu.registers[2] = y;
                rig.exec(Op::Sub_Vx_Vy { vx: 1, vy: 2 }).unwrap();

                assert_eq!(rig.cpu.registers[1], x.wrapping_sub(y));
                assert_eq!(rig.cpu.registers[0xF], (x >= y) as u8);

                rig.cpu.registers[1] = x;
                rig.exec(Op::SubReverse_Vx_Vy { vx: 1, vy: 2 }).unwrap();

                assert_eq!(rig.cpu.registers[1], y.wrapping_sub(x));
                assert_eq!(rig.cpu.registers[0xF], (y >= x) as u8);
            }
        }
    }

    #[test]
    fn test_shift_flag_ignores_previous_vf() {
        let mut rig = Rig::new();

        for x in 0..=255_u8 {
            for vf in [0, 1, 0xFF] {
                rig.cpu.registers[3] = x;
                rig.cpu.registers[0xF] = vf;
                rig.exec(Op::ShiftRight { vx: 3 }).unwrap();
                assert_eq!(rig.cpu.registers[3], x >> 1);
                assert_eq!(rig.cpu.registers[0xF], x & 1);

                rig.cpu.registers[3] = x;
                rig.cpu.registers[0xF] = vf;
                rig.exec(Op::ShiftLeft { vx: 3 }).unwrap();
                assert_eq!(rig.cpu.registers[3], x << 1);
                assert_eq!(rig.cpu.registers[0xF], x >> 7);
            }
        }
    }

    /// When VF is the destination, the flag is the value left behind.
    #[test]
    fn test_flag_wins_over_vf_destination() {
        let mut rig = Rig::new();

        rig.cpu.registers[0xF] = 200;
        rig.cpu.registers[1] = 100;
        rig.exec(Op::Add_Vx_Vy { vx: 0xF, vy: 1 }).unwrap();
        assert_eq!(rig.cpu.registers[0xF], 1);

        rig.cpu.registers[0xF] = 0b0000_0010;
        rig.exec(Op::ShiftRight { vx: 0xF }).unwrap();
        assert_eq!(rig.cpu.registers[0xF], 0);

        rig.cpu.registers[0xF] = 5;
        rig.cpu.registers[1] = 3;
        rig.exec(Op::Sub_Vx_Vy { vx: 0xF, vy: 1 }).unwrap();
        assert_eq!(rig.cpu.registers[0xF], 1);
    }

    #[test]
    fn test_logic_ops() {
        let mut rig = Rig::new();
        let set = |rig: &mut Rig| {
            rig.cpu.registers[0] = 0b1100;
            rig.cpu.registers[1] = 0b1010;
        };

        set(&mut rig);
        rig.exec(Op::Or_Vx_Vy { vx: 0, vy: 1 }).unwrap();
        assert_eq!(rig.cpu.registers[0], 0b1110);

        set(&mut rig);
        rig.exec(Op::And_Vx_Vy { vx: 0, vy: 1 }).unwrap();
        assert_eq!(rig.cpu.registers[0], 0b1000);

        set(&mut rig);
        rig.exec(Op::Xor_Vx_Vy { vx: 0, vy: 1 }).unwrap();
        assert_eq!(rig.cpu.registers[0], 0b0110);

        set(&mut rig);
        rig.exec(Op::Load_Vx_Vy { vx: 0, vy: 1 }).unwrap();
        assert_eq!(rig.cpu.registers[0], 0b1010);
    }

    #[test]
    fn test_add_byte_no_carry() {
        let mut rig = Rig::new();
        rig.cpu.registers[2] = 0xFF;
        rig.cpu.registers[0xF] = 0x42;

        rig.exec(Op::Add_Byte { vx: 2, nn: 2 }).unwrap();

        assert_eq!(rig.cpu.registers[2], 1);
        assert_eq!(rig.cpu.registers[0xF], 0x42);
    }

    #[test]
    fn test_skips() {
        let mut rig = Rig::new();
        rig.cpu.pc = 0x202;
        rig.cpu.registers[0] = 7;
        rig.cpu.registers[1] = 7;

        rig.exec(Op::Skip_Eq_Byte { vx: 0, nn: 7 }).unwrap();
        assert_eq!(rig.cpu.pc, 0x204);
        rig.exec(Op::Skip_NotEq_Byte { vx: 0, nn: 7 }).unwrap();
        assert_eq!(rig.cpu.pc, 0x204);
        rig.exec(Op::Skip_Eq { vx: 0, vy: 1 }).unwrap();
        assert_eq!(rig.cpu.pc, 0x206);
        rig.exec(Op::Skip_NotEq { vx: 0, vy: 1 }).unwrap();
        assert_eq!(rig.cpu.pc, 0x206);

        rig.cpu.registers[2] = 0x1B;
        rig.exec(Op::Skip_Key { vx: 2 }).unwrap();
        assert_eq!(rig.cpu.pc, 0x206);
        rig.exec(Op::Skip_NotKey { vx: 2 }).unwrap();
        assert_eq!(rig.cpu.pc, 0x208);

        rig.devices.press(KeyCode::KeyB);
        rig.exec(Op::Skip_Key { vx: 2 }).unwrap();
        assert_eq!(rig.cpu.pc, 0x20A);
        rig.exec(Op::Skip_NotKey { vx: 2 }).unwrap();
        assert_eq!(rig.cpu.pc, 0x20A);
    }

    #[test]
    fn test_call_and_return() {
        let mut rig = Rig::new();
        rig.cpu.pc = 0x206; // CALL at 0x204, already advanced

        assert_eq!(rig.exec(Op::Call { address: 0x300 }), Ok(Flow::Jump));
        assert_eq!(rig.cpu.pc, 0x300);
        assert_eq!(rig.cpu.sp, 1);
        assert_eq!(rig.cpu.stack[0], 0x206);

        assert_eq!(rig.exec(Op::Return), Ok(Flow::Jump));
        assert_eq!(rig.cpu.pc, 0x206);
        assert_eq!(rig.cpu.sp, 0);

        assert_eq!(
            rig.exec(Op::Return),
            Err(Fault::StackUnderflow { pc: 0x206 })
        );
    }

    #[test]
    fn test_jump_v0() {
        let mut rig = Rig::new();
        rig.cpu.registers[0] = 0x10;

        rig.exec(Op::Jump_V0 { address: 0x300 }).unwrap();

        assert_eq!(rig.cpu.pc, 0x310);
    }

    #[test]
    fn test_random_is_masked() {
        let mut rig = Rig::new();

        for _ in 0..100 {
            rig.exec(Op::Random { vx: 4, nn: 0x0F }).unwrap();
            assert_eq!(rig.cpu.registers[4] & 0xF0, 0);
        }

        rig.exec(Op::Random { vx: 4, nn: 0 }).unwrap();
        assert_eq!(rig.cpu.registers[4], 0);
    }

    #[test]
    fn test_draw_collision() {
        let mut rig = Rig::new();

        // Draw two sprites next to each other.
        // The zero bits of the second draw must not erase
        // the pixels of the first draw
        //
        // draw sprite 1
        // ____####, vf == 0
        //
        // draw sprite 2
        // ########, vf == 0
        rig.cpu.ram[0x300] = 0b1111_0000;
        rig.cpu.address = 0x300;
        rig.cpu.registers[0] = 4;
        rig.cpu.registers[1] = 0;

        assert_eq!(rig.exec(Op::Draw { vx: 0, vy: 1, n: 1 }), Ok(Flow::Draw));
        assert_eq!(rig.cpu.registers[0xF], 0);

        rig.cpu.registers[0] = 0;
        rig.exec(Op::Draw { vx: 0, vy: 1, n: 1 }).unwrap();
        assert_eq!(rig.cpu.registers[0xF], 0);

        let fb = rig.devices.framebuffer();
        assert!((0..8).all(|x| fb.pixel(x, 0)));

        // Drawing over lit pixels is a collision.
        rig.exec(Op::Draw { vx: 0, vy: 1, n: 1 }).unwrap();
        assert_eq!(rig.cpu.registers[0xF], 1);
    }

    #[test]
    fn test_draw_wraps_vertically() {
        let mut rig = Rig::new();
        rig.cpu.ram[0x300..0x302].copy_from_slice(&[0x80, 0x80]);
        rig.cpu.address = 0x300;
        rig.cpu.registers[0] = 64 + 3; // wraps to column 3
        rig.cpu.registers[1] = 31;

        rig.exec(Op::Draw { vx: 0, vy: 1, n: 2 }).unwrap();

        let fb = rig.devices.framebuffer();
        assert!(fb.pixel(3, 31));
        assert!(fb.pixel(3, 0));
    }

    #[test]
    fn test_draw_zero_rows() {
        let mut rig = Rig::new();
        rig.cpu.registers[0xF] = 1;

        rig.exec(Op::Draw { vx: 0, vy: 0, n: 0 }).unwrap();

        assert_eq!(rig.cpu.registers[0xF], 0);
        assert!(rig.devices.framebuffer().is_blank());
    }

    #[test]
    fn test_address_ops() {
        let mut rig = Rig::new();

        rig.exec(Op::Load_Address { address: 0xFFE }).unwrap();
        assert_eq!(rig.cpu.address, 0xFFE);

        rig.cpu.registers[0xF] = 0x42;
        rig.cpu.registers[1] = 4;
        rig.exec(Op::Add_I_Vx { vx: 1 }).unwrap();
        assert_eq!(rig.cpu.address, 0x002);
        assert_eq!(rig.cpu.registers[0xF], 0x42, "VF is untouched");

        rig.cpu.registers[1] = 0xA;
        rig.exec(Op::Load_Font { vx: 1 }).unwrap();
        assert_eq!(rig.cpu.address, 0x100 + 0xA * 5);
    }

    #[test]
    fn test_timer_registers() {
        let mut rig = Rig::new();
        rig.cpu.registers[5] = 30;

        rig.exec(Op::Load_DT_Vx { vx: 5 }).unwrap();
        assert_eq!(rig.cpu.timers.delay, 30);

        assert_eq!(rig.exec(Op::Load_ST_Vx { vx: 5 }), Ok(Flow::Sound));
        assert_eq!(rig.cpu.timers.sound, 30);

        rig.cpu.timers.delay = 12;
        rig.exec(Op::Load_Vx_DT { vx: 6 }).unwrap();
        assert_eq!(rig.cpu.registers[6], 12);
    }

    #[test]
    fn test_load_store_leaves_address() {
        let mut rig = Rig::new();
        rig.cpu.address = 0x400;
        rig.cpu.registers[..4].copy_from_slice(&[1, 2, 3, 4]);

        rig.exec(Op::Store_Registers { vx: 3 }).unwrap();
        assert_eq!(&rig.cpu.ram[0x400..0x404], &[1, 2, 3, 4]);
        assert_eq!(rig.cpu.address, 0x400);

        rig.cpu.registers = [0; REGISTER_COUNT];
        rig.exec(Op::Load_Registers { vx: 3 }).unwrap();
        assert_eq!(&rig.cpu.registers[..4], &[1, 2, 3, 4]);
        assert_eq!(rig.cpu.address, 0x400);
    }

    #[test]
    fn test_load_store_increment_quirk() {
        let mut rig = Rig::new();
        rig.quirks.load_store_increments_address = true;
        rig.cpu.address = 0x400;

        rig.exec(Op::Store_Registers { vx: 3 }).unwrap();
        assert_eq!(rig.cpu.address, 0x404);

        rig.exec(Op::Load_Registers { vx: 0 }).unwrap();
        assert_eq!(rig.cpu.address, 0x405);
    }

    #[test]
    fn test_key_wait_flow() {
        let mut rig = Rig::new();
        rig.cpu.pc = 0x202;

        assert_eq!(rig.exec(Op::Load_Vx_Key { vx: 1 }), Ok(Flow::KeyWait));
        assert_eq!(rig.cpu.pc, 0x202);
    }

    /// Every instruction the decoder can produce has an arm in `exec`.
    #[test]
    fn test_every_decoded_op_executes() {
        let mut rig = Rig::new();
        let mut executed = 0;

        for word in 0..=u16::MAX {
            if let Some(op) = Op::decode(crate::bytecode::Opcode(word)) {
                rig.cpu.pc = MEM_START;
                rig.cpu.sp = 0;
                let _ = rig.exec(op);
                executed += 1;
            }
        }

        assert!(executed > 0);
    }

    #[test]
    fn test_sys_is_noop() {
        let mut rig = Rig::new();
        rig.cpu.pc = 0x202;

        assert_eq!(rig.exec(Op::Sys { address: 0x123 }), Ok(Flow::Ok));
        assert_eq!(rig.cpu.pc, 0x202);
        assert_eq!(rig.cpu.sp, 0);
    }
}
