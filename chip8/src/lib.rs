//! Chip-8 virtual machine.
//!
//! The interpreter owns memory and registers, and reaches the screen and
//! keyboard only through the [`Devices`](devices::Devices) trait, which
//! is passed in on every step.
mod bytecode;
mod clock;
pub mod constants;
mod cpu;
pub mod devices;
mod display;
mod error;
mod exec;
mod op;
mod timer;
mod vm;

pub use self::{
    bytecode::Opcode,
    clock::Hz,
    devices::{KeyCode, Signal},
    error::{Chip8Error, Chip8Result, Fault},
    op::Op,
    timer::{Timers, TIMER_PERIOD},
};

pub const IMPL_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod prelude {
    pub use super::{
        devices::{Devices, KeyCode, Signal},
        display::{Framebuffer, Headless},
        error::{Chip8Error, Chip8Result, Fault},
        vm::{Chip8Conf, Chip8Vm, Flow, Halt, Quirks, State},
        Hz,
    };
}
