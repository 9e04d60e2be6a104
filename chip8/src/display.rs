//! In-memory display and keyboard.
use std::{
    collections::VecDeque,
    fmt::{self, Write},
};

use crate::{
    constants::*,
    devices::{Devices, KeyCode, Signal},
};

/// Monochrome 64x32 screen buffer, separate from the VM's main memory.
#[derive(Clone)]
pub struct Framebuffer {
    pixels: Box<[bool; DISPLAY_BUFFER_SIZE]>,
}

impl Default for Framebuffer {
    fn default() -> Self {
        Self {
            pixels: Box::new([false; DISPLAY_BUFFER_SIZE]),
        }
    }
}

impl Framebuffer {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn clear(&mut self) {
        self.pixels.fill(false);
    }

    /// XOR a row of 8 pixels into the buffer.
    ///
    /// Returns `true` when a pixel was erased, which is used for collision detection.
    pub fn draw_row(&mut self, bits: u8, x: u8, y: u8) -> bool {
        let y = (y as usize) & DISPLAY_HEIGHT_MASK;
        let mut is_erased = false;

        for c in 0..8 {
            let d = ((x as usize + c) & DISPLAY_WIDTH_MASK) + y * DISPLAY_WIDTH;

            let old_px = self.pixels[d];
            let new_px = (bits >> (7 - c) & 1) != 0;

            // XOR erases a pixel when both the old and new values are both 1.
            is_erased |= old_px && new_px;

            self.pixels[d] = old_px ^ new_px;
        }

        is_erased
    }

    /// Pixel state, with coordinates wrapping around the screen edges.
    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> bool {
        self.pixels[(x & DISPLAY_WIDTH_MASK) + (y & DISPLAY_HEIGHT_MASK) * DISPLAY_WIDTH]
    }

    pub fn is_blank(&self) -> bool {
        self.pixels.iter().all(|px| !px)
    }

    /// Render the buffer as text, `#` for lit pixels.
    pub fn dump(&self) -> Result<String, fmt::Error> {
        let mut buf = String::with_capacity((DISPLAY_WIDTH + 1) * DISPLAY_HEIGHT);

        for y in 0..DISPLAY_HEIGHT {
            for x in 0..DISPLAY_WIDTH {
                if self.pixel(x, y) {
                    write!(buf, "#")?;
                } else {
                    write!(buf, ".")?;
                }
            }
            writeln!(buf)?;
        }

        Ok(buf)
    }
}

impl PartialEq for Framebuffer {
    fn eq(&self, other: &Self) -> bool {
        self.pixels[..] == other.pixels[..]
    }
}

impl fmt::Debug for Framebuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Framebuffer")
            .field("lit", &self.pixels.iter().filter(|px| **px).count())
            .finish()
    }
}

/// Devices without a window, driven entirely by the caller.
///
/// Key presses are queued with [`Headless::press`], and the screen
/// can be inspected through [`Headless::framebuffer`].
#[derive(Debug, Default)]
pub struct Headless {
    framebuffer: Framebuffer,
    /// Keyboard input state. Pressed is a 1 bit, released is a 0 bit.
    key_state: u16,
    /// Key down edges not yet consumed by a key wait.
    pressed: VecDeque<KeyCode>,
    buzzer: bool,
    quit: bool,
    /// Remaining number of polls before quitting.
    quit_after: Option<usize>,
}

impl Headless {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn framebuffer(&self) -> &Framebuffer {
        &self.framebuffer
    }

    /// Press a key down, leaving it held.
    pub fn press(&mut self, key: KeyCode) {
        if !self.is_key_down(key) && !self.pressed.contains(&key) {
            self.pressed.push_back(key);
        }
        self.set_key_state(key, true);
    }

    pub fn release(&mut self, key: KeyCode) {
        self.set_key_state(key, false);
    }

    fn set_key_state(&mut self, key: KeyCode, state: bool) {
        if state {
            self.key_state |= 1 << key.as_u8();
        } else {
            self.key_state &= !(1 << key.as_u8());
        }
    }

    /// Request the VM to stop after the given number of cycles.
    pub fn quit_after(&mut self, cycles: usize) {
        self.quit_after = Some(cycles);
    }

    pub fn is_buzzing(&self) -> bool {
        self.buzzer
    }
}

impl Devices for Headless {
    fn clear_screen(&mut self) {
        self.framebuffer.clear();
    }

    fn draw_row(&mut self, bits: u8, x: u8, y: u8) -> bool {
        self.framebuffer.draw_row(bits, x, y)
    }

    fn is_key_down(&self, key: KeyCode) -> bool {
        self.key_state & (1 << key.as_u8()) > 0
    }

    fn wait_for_key(&mut self) -> Option<KeyCode> {
        self.pressed.pop_front()
    }

    fn flush_keys(&mut self) {
        self.pressed.clear();
    }

    fn poll_events(&mut self) -> Signal {
        if let Some(remaining) = self.quit_after.as_mut() {
            if *remaining == 0 {
                self.quit = true;
            } else {
                *remaining -= 1;
            }
        }

        if self.quit {
            Signal::Quit
        } else {
            Signal::Continue
        }
    }

    fn buzz(&mut self, state: bool) {
        self.buzzer = state;
    }
}
