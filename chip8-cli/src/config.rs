//! Runner configuration, read from a YAML file.
use std::{collections::HashMap, fs, path::Path};

use chip8::{prelude::*, KeyCode};
use serde::Deserialize;

use crate::error::AppError;

/// Instructions per second that most games are written for.
pub const DEFAULT_CLOCK_FREQUENCY: u64 = 500;

/// Example:
///
/// ```yaml
/// clock_frequency: 700
/// seed: 1234
/// max_steps: 100000
/// keymap:
///   - { key: "x", chip8: 0 }
///   - { key: "1", chip8: 1 }
/// ```
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Instructions per second. Zero runs unthrottled.
    pub clock_frequency: u64,
    pub seed: Option<u64>,
    pub load_store_increments_address: bool,
    /// Stop after this many cycles instead of running until quit.
    pub max_steps: Option<usize>,
    pub keymap: Vec<KeyBinding>,
}

/// Host keyboard character mapped to a Chip8 key.
#[derive(Debug, Clone, Deserialize)]
pub struct KeyBinding {
    pub key: char,
    pub chip8: KeyCode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            clock_frequency: DEFAULT_CLOCK_FREQUENCY,
            seed: None,
            load_store_increments_address: false,
            max_steps: None,
            keymap: default_keymap(),
        }
    }
}

impl Config {
    pub fn load(filepath: impl AsRef<Path>) -> Result<Self, AppError> {
        let text = fs::read_to_string(filepath)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, AppError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn vm_conf(&self) -> Chip8Conf {
        Chip8Conf {
            clock_frequency: Some(Hz(self.clock_frequency)),
            seed: self.seed,
            quirks: Quirks {
                load_store_increments_address: self.load_store_increments_address,
            },
        }
    }

    /// Lookup of host characters, case insensitive.
    pub fn key_lookup(&self) -> HashMap<char, KeyCode> {
        self.keymap
            .iter()
            .map(|binding| (binding.key.to_ascii_lowercase(), binding.chip8))
            .collect()
    }
}

/// COSMAC VIP hex keypad laid over the left side of a QWERTY keyboard.
///
/// ```text
/// 1 2 3 C      1 2 3 4
/// 4 5 6 D  =>  Q W E R
/// 7 8 9 E      A S D F
/// A 0 B F      Z X C V
/// ```
fn default_keymap() -> Vec<KeyBinding> {
    use KeyCode::*;

    [
        ('1', Key1),
        ('2', Key2),
        ('3', Key3),
        ('4', KeyC),
        ('q', Key4),
        ('w', Key5),
        ('e', Key6),
        ('r', KeyD),
        ('a', Key7),
        ('s', Key8),
        ('d', Key9),
        ('f', KeyE),
        ('z', KeyA),
        ('x', Key0),
        ('c', KeyB),
        ('v', KeyF),
    ]
    .into_iter()
    .map(|(key, chip8)| KeyBinding { key, chip8 })
    .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_default_keymap_covers_keypad() {
        let lookup = Config::default().key_lookup();

        assert_eq!(lookup.len(), 16);
        for keycode in KeyCode::ALL {
            assert!(lookup.values().any(|k| *k == keycode), "{keycode} unmapped");
        }
        assert_eq!(lookup[&'x'], KeyCode::Key0);
        assert_eq!(lookup[&'4'], KeyCode::KeyC);
    }

    #[test]
    fn test_parse_partial() {
        let config = Config::parse("seed: 99\nmax_steps: 10\n").unwrap();

        assert_eq!(config.seed, Some(99));
        assert_eq!(config.max_steps, Some(10));
        assert_eq!(config.clock_frequency, DEFAULT_CLOCK_FREQUENCY);
        assert_eq!(config.keymap.len(), 16);

        let conf = config.vm_conf();
        assert_eq!(conf.clock_frequency, Some(Hz(500)));
        assert!(!conf.quirks.load_store_increments_address);
    }

    #[test]
    fn test_parse_keymap() {
        let config = Config::parse(concat!(
            "clock_frequency: 0\n",
            "load_store_increments_address: true\n",
            "keymap:\n",
            "  - { key: \"K\", chip8: 10 }\n",
        ))
        .unwrap();

        assert_eq!(config.key_lookup()[&'k'], KeyCode::KeyA);
        assert!(config.vm_conf().quirks.load_store_increments_address);
    }

    #[test]
    fn test_parse_errors() {
        assert!(Config::parse("keymap:\n  - { key: \"k\", chip8: 16 }\n").is_err());
        assert!(Config::parse("clock_speed: 5\n").is_err());
    }
}
