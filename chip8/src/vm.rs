//! Virtual machine.
use std::time::Duration;

use log::{debug, error, info, trace};
use rand::{rngs::StdRng, SeedableRng};

use crate::{
    clock::{Clock, Hz},
    constants::*,
    cpu::Chip8Cpu,
    devices::{Devices, Signal},
    error::{Chip8Error, Chip8Result, Fault},
    op::Op,
};

pub struct Chip8Vm {
    cpu: Chip8Cpu,
    /// Throttles instruction execution.
    clock: Clock,
    /// Measures wall time for the delay and sound timers.
    timer: Clock,
    rng: StdRng,
    state: State,
    /// Last buzzer state sent to the devices.
    buzzer_state: bool,
    conf: Chip8Conf,
}

impl Chip8Vm {
    pub fn new(conf: Chip8Conf) -> Self {
        let mut vm = Chip8Vm {
            cpu: Chip8Cpu::new(),
            clock: Clock::new(conf.clock_frequency.unwrap_or_default().into()),
            timer: Clock::new(Duration::ZERO),
            rng: seed_rng(conf.seed),
            state: State::Running,
            buzzer_state: false,
            conf,
        };

        // The font is in place even before a program is loaded.
        vm.cpu.load_font(&FONTSET);

        vm
    }

    pub fn load_builtin_font(&mut self) {
        self.cpu.load_font(&FONTSET);
    }

    pub fn load_font(&mut self, fontset: &[u8]) -> Chip8Result<()> {
        let fontset: &[u8; FONTSET_DATA_LENGTH] = fontset.try_into().map_err(|_| {
            Chip8Error::Font(format!(
                "fontset data must be {FONTSET_DATA_LENGTH} bytes, got {}",
                fontset.len()
            ))
        })?;

        self.cpu.load_font(fontset);

        Ok(())
    }

    /// Load a program at the start of program memory, and prepare the machine to run it.
    pub fn load_bytecode(&mut self, bytecode: &[u8]) -> Chip8Result<()> {
        if bytecode.len() > MAX_PROGRAM_SIZE {
            return Err(Chip8Error::LargeProgram {
                size: bytecode.len(),
            });
        }

        // Start with clean memory to avoid leaking previous program.
        self.cpu.clear_memory();

        // Reset fonts
        self.load_builtin_font();

        // Load program into virtual RAM
        self.cpu.ram[MEM_START..MEM_START + bytecode.len()].copy_from_slice(bytecode);

        // Reset the program counter to prepare for execution.
        self.cpu.reset_registers();

        self.reset();

        info!("loaded program of {} bytes", bytecode.len());

        Ok(())
    }
}

/// Outcome of a single step of the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Ok,
    /// The host asked the machine to stop.
    Interrupt,
    /// Program counter has jumped to a new address.
    ///
    /// This is useful for the caller to avoid being
    /// blocked on infinite or long running loops.
    ///
    /// This is returned when the interpreter encounters:
    ///
    /// - 1nnn (`JP addr`)
    /// - 2nnn (`CALL addr`)
    /// - 00EE (`RET`)
    /// - Bnnn (`JP V0, addr`)
    Jump,
    /// The screen was changed.
    Draw,
    Sound,
    /// Wait for a keypress.
    ///
    /// This is triggered by the opcode `Fx0A` (`LD Vx, K`), which stops
    /// execution until a key is pressed, and loads the key value into `Vx`.
    KeyWait,
}

/// Run state of the interpreter loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum State {
    Running,
    /// Stalled on `Fx0A`, the key goes into register `vx`.
    AwaitingKey { vx: u8 },
    Halted(Halt),
}

/// Reason the machine stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Halt {
    /// Stopped by the host.
    Quit,
    Fault(Fault),
}

/// VM Configuration Parameters.
#[derive(Debug, Default, Clone)]
pub struct Chip8Conf {
    /// Instruction rate. Runs as fast as possible when `None`.
    pub clock_frequency: Option<Hz>,
    /// Seed for the `RND` instruction, for repeatable runs.
    pub seed: Option<u64>,
    pub quirks: Quirks,
}

/// Behaviours that differ between historical interpreters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Quirks {
    /// `Fx55` and `Fx65` leave `I` pointing past the last register
    /// transferred, as on the COSMAC VIP. When off, `I` is unchanged.
    pub load_store_increments_address: bool,
}

fn seed_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Interpreter
impl Chip8Vm {
    /// Clear internal state in preparation for a fresh startup.
    fn reset(&mut self) {
        self.clock.reset();
        self.timer.reset();
        self.rng = seed_rng(self.conf.seed);
        self.state = State::Running;
        self.buzzer_state = false;
    }

    /// Run until the host quits, or the machine faults.
    pub fn execute<D>(&mut self, devices: &mut D) -> Chip8Result<()>
    where
        D: Devices + ?Sized,
    {
        self.clock.reset();
        self.timer.reset();

        loop {
            self.clock.wait();

            if let Flow::Interrupt = self.step(devices)? {
                break;
            }
        }

        Ok(())
    }

    /// Run at most the given number of cycles.
    ///
    /// Returns the flow of the last cycle.
    pub fn run_steps<D>(&mut self, step_count: usize, devices: &mut D) -> Chip8Result<Flow>
    where
        D: Devices + ?Sized,
    {
        let mut control_flow = Flow::Ok;

        for _ in 0..step_count {
            self.clock.wait();

            control_flow = self.step(devices)?;
            if let Flow::Interrupt = control_flow {
                break;
            }
        }

        Ok(control_flow)
    }

    /// Run a single cycle: poll the host, execute one instruction
    /// (or keep waiting for a key), then count down the timers.
    ///
    /// A halted machine keeps returning the reason it halted.
    pub fn step<D>(&mut self, devices: &mut D) -> Chip8Result<Flow>
    where
        D: Devices + ?Sized,
    {
        match &self.state {
            State::Halted(Halt::Quit) => return Ok(Flow::Interrupt),
            State::Halted(Halt::Fault(fault)) => return Err(Chip8Error::Runtime(fault.clone())),
            _ => {}
        }

        if devices.poll_events() == Signal::Quit {
            info!("quit requested at 0x{:04X}", self.cpu.pc);
            self.state = State::Halted(Halt::Quit);
            return Ok(Flow::Interrupt);
        }

        let control_flow = match self.state {
            State::AwaitingKey { vx } => match devices.wait_for_key() {
                Some(key) => {
                    debug!("key wait ended with {key}");
                    self.cpu.set_vx(vx, key.as_u8());
                    self.state = State::Running;
                    Flow::Ok
                }
                None => Flow::KeyWait,
            },
            _ => match self.cycle(devices) {
                Ok(control_flow) => control_flow,
                Err(fault) => {
                    error!("halting: {fault}");
                    self.state = State::Halted(Halt::Fault(fault.clone()));
                    return Err(Chip8Error::Runtime(fault));
                }
            },
        };

        let elapsed = self.timer.lap();
        self.advance_timers(elapsed);
        self.update_buzzer(devices);

        Ok(control_flow)
    }

    /// Fetch, decode and execute the instruction at the program counter.
    fn cycle<D>(&mut self, devices: &mut D) -> Result<Flow, Fault>
    where
        D: Devices + ?Sized,
    {
        let pc = self.cpu.pc;
        let opcode = self.cpu.fetch()?;
        let op = Op::decode(opcode).ok_or(Fault::UnknownOpcode {
            opcode,
            pc: pc as Address,
        })?;

        trace!("0x{pc:04X}: {opcode} {op}");

        // Each instruction is two bytes.
        self.cpu.pc += 2;

        let control_flow = self
            .cpu
            .exec(op, devices, &mut self.rng, &self.conf.quirks)?;

        if let (Flow::KeyWait, Op::Load_Vx_Key { vx }) = (control_flow, op) {
            debug!("waiting for key at 0x{pc:04X}");
            devices.flush_keys();
            self.state = State::AwaitingKey { vx };
        }

        Ok(control_flow)
    }

    /// Feed elapsed time into the delay and sound timers.
    ///
    /// The VM does this itself from the wall clock on every step. Hosts
    /// that simulate time can call this directly.
    pub fn advance_timers(&mut self, elapsed: Duration) -> u32 {
        self.cpu.timers.advance(elapsed)
    }

    /// Buzzer should be on while sound timer counts down,
    /// then turned off when the timer reaches zero.
    fn update_buzzer<D>(&mut self, devices: &mut D)
    where
        D: Devices + ?Sized,
    {
        let sounding = self.cpu.timers.is_sounding();
        if sounding != self.buzzer_state {
            debug!("buzzer {}", if sounding { "on" } else { "off" });
            self.buzzer_state = sounding;
            devices.buzz(sounding);
        }
    }
}

/// State inspection
impl Chip8Vm {
    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn is_halted(&self) -> bool {
        matches!(self.state, State::Halted(_))
    }

    pub fn pc(&self) -> usize {
        self.cpu.pc
    }

    /// Number of return addresses on the call stack.
    pub fn sp(&self) -> usize {
        self.cpu.sp
    }

    pub fn stack(&self) -> &[Address] {
        &self.cpu.stack[..self.cpu.sp]
    }

    pub fn registers(&self) -> &[u8; REGISTER_COUNT] {
        &self.cpu.registers
    }

    /// Address register `I`.
    pub fn address(&self) -> Address {
        self.cpu.address
    }

    pub fn delay_timer(&self) -> u8 {
        self.cpu.timers.delay
    }

    pub fn sound_timer(&self) -> u8 {
        self.cpu.timers.sound
    }

    pub fn ram(&self) -> &[u8; MEM_SIZE] {
        &self.cpu.ram
    }
}
