//! Text terminal devices.
//!
//! The screen is drawn to stdout as text, and keyboard input is read a
//! line at a time from stdin. Every mapped character on a line is a key
//! press that stays held for [`KEY_HOLD`].
use std::{
    collections::{HashMap, VecDeque},
    io::{self, BufRead, Write},
    sync::mpsc::{self, Receiver, TryRecvError},
    thread,
    time::{Duration, Instant},
};

use chip8::{constants::KEY_COUNT, prelude::*, TIMER_PERIOD};
use log::{debug, info, warn};

use crate::error::AppError;

/// How long a typed key counts as held down.
pub const KEY_HOLD: Duration = Duration::from_millis(100);

/// Line that asks the runner to stop.
pub const QUIT_COMMAND: &str = ":q";

/// ANSI clear screen and move cursor home.
const CLEAR: &str = "\x1b[2J\x1b[H";

const BELL: &str = "\x07";

enum Input {
    Line(String),
    Closed,
}

pub struct Terminal {
    framebuffer: Framebuffer,
    keymap: HashMap<char, KeyCode>,
    input: Receiver<Input>,
    input_closed: bool,
    /// Release deadline of each held key.
    held: [Option<Instant>; KEY_COUNT as usize],
    /// Key down edges not yet consumed by a key wait.
    pressed: VecDeque<KeyCode>,
    quit: bool,
    dirty: bool,
    last_render: Option<Instant>,
    out: Box<dyn Write>,
}

impl Terminal {
    /// Spawn the stdin reader and take over stdout.
    pub fn new(keymap: HashMap<char, KeyCode>) -> Result<Self, AppError> {
        let (tx, rx) = mpsc::channel();

        thread::Builder::new()
            .name("stdin".to_string())
            .spawn(move || {
                for line in io::stdin().lock().lines() {
                    match line {
                        Ok(line) => {
                            if tx.send(Input::Line(line)).is_err() {
                                return;
                            }
                        }
                        Err(err) => {
                            warn!("stdin: {err}");
                            break;
                        }
                    }
                }
                let _ = tx.send(Input::Closed);
            })?;

        Ok(Self::with_input(keymap, rx, Box::new(io::stdout())))
    }

    fn with_input(
        keymap: HashMap<char, KeyCode>,
        input: Receiver<Input>,
        out: Box<dyn Write>,
    ) -> Self {
        Self {
            framebuffer: Framebuffer::new(),
            keymap,
            input,
            input_closed: false,
            held: [None; KEY_COUNT as usize],
            pressed: VecDeque::new(),
            quit: false,
            dirty: true,
            last_render: None,
            out,
        }
    }

    /// Draw the screen regardless of whether it changed.
    pub fn present(&mut self) -> io::Result<()> {
        let dump = self
            .framebuffer
            .dump()
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;

        write!(self.out, "{CLEAR}{dump}")?;
        self.out.flush()?;

        self.dirty = false;
        self.last_render = Some(Instant::now());

        Ok(())
    }

    fn ring_bell(&mut self) -> io::Result<()> {
        write!(self.out, "{BELL}")?;
        self.out.flush()
    }

    /// Redraw at most once per display frame, and only when pixels changed.
    fn render(&mut self) {
        if !self.dirty {
            return;
        }

        let due = self
            .last_render
            .map_or(true, |last| last.elapsed() >= TIMER_PERIOD);

        if due {
            if let Err(err) = self.present() {
                warn!("failed to render screen: {err}");
            }
        }
    }

    fn handle_line(&mut self, line: &str) {
        if line.trim() == QUIT_COMMAND {
            info!("quit command received");
            self.quit = true;
            return;
        }

        let release_at = Instant::now() + KEY_HOLD;

        for ch in line.chars() {
            match self.keymap.get(&ch.to_ascii_lowercase()) {
                Some(&key) => {
                    let slot = &mut self.held[key.as_u8() as usize];
                    if slot.is_none() && !self.pressed.contains(&key) {
                        self.pressed.push_back(key);
                    }
                    *slot = Some(release_at);
                }
                None if ch.is_whitespace() => {}
                None => debug!("unmapped key {ch:?}"),
            }
        }
    }

    fn release_expired(&mut self, now: Instant) {
        for slot in self.held.iter_mut() {
            if matches!(slot, Some(deadline) if *deadline <= now) {
                *slot = None;
            }
        }
    }
}

impl Devices for Terminal {
    fn clear_screen(&mut self) {
        self.framebuffer.clear();
        self.dirty = true;
    }

    fn draw_row(&mut self, bits: u8, x: u8, y: u8) -> bool {
        if bits != 0 {
            self.dirty = true;
        }
        self.framebuffer.draw_row(bits, x, y)
    }

    fn is_key_down(&self, key: KeyCode) -> bool {
        self.held[key.as_u8() as usize].is_some()
    }

    fn wait_for_key(&mut self) -> Option<KeyCode> {
        self.pressed.pop_front()
    }

    fn flush_keys(&mut self) {
        self.pressed.clear();
    }

    fn poll_events(&mut self) -> Signal {
        while !self.input_closed {
            match self.input.try_recv() {
                Ok(Input::Line(line)) => self.handle_line(&line),
                Ok(Input::Closed) | Err(TryRecvError::Disconnected) => {
                    info!("input closed");
                    self.input_closed = true;
                }
                Err(TryRecvError::Empty) => break,
            }
        }

        self.release_expired(Instant::now());
        self.render();

        if self.quit {
            Signal::Quit
        } else {
            Signal::Continue
        }
    }

    fn buzz(&mut self, state: bool) {
        if state {
            if let Err(err) = self.ring_bell() {
                warn!("failed to sound buzzer: {err}");
            }
        }
    }
}
