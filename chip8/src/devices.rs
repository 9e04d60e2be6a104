//! IO device interface
use crate::constants::*;

/// Hooks to provide IO devices to the virtual machine.
///
/// The display and keyboard live outside the interpreter, which only
/// reaches them through these calls. The VM receives the devices as a
/// parameter on every step, so a headless implementation can stand in
/// for a real window in tests.
pub trait Devices {
    /// Turn every pixel off.
    fn clear_screen(&mut self);

    /// XOR one sprite row of 8 pixels onto the screen, most significant bit leftmost.
    ///
    /// Pixels past the right or bottom edge wrap around to the other side.
    /// Returns `true` if any pixel was switched from on to off.
    fn draw_row(&mut self, bits: u8, x: u8, y: u8) -> bool;

    /// Checks immediately whether the given key is currently pressed.
    fn is_key_down(&self, key: KeyCode) -> bool;

    /// Take the key that was pressed down since the previous call, if any.
    ///
    /// The VM calls this once per cycle for as long as it is waiting
    /// for keyboard input, so the host keeps being serviced while
    /// the program is stalled.
    fn wait_for_key(&mut self) -> Option<KeyCode>;

    /// Forget key presses that happened before a key wait began.
    ///
    /// Called once when the VM starts waiting, so only a press made
    /// during the wait can end it.
    fn flush_keys(&mut self) {
        while self.wait_for_key().is_some() {}
    }

    /// Drain pending host events.
    ///
    /// Called at least once per cycle.
    fn poll_events(&mut self) -> Signal;

    /// Turn the sound buzzer on or off.
    fn buzz(&mut self, _state: bool) {}
}

/// Request from the host, returned by [`Devices::poll_events`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Continue,
    /// The host wants the machine stopped, for example because its window was closed.
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum KeyCode {
    Key0 = 0,
    Key1,
    Key2,
    Key3,
    Key4,
    Key5,
    Key6,
    Key7,
    Key8,
    Key9,
    KeyA,
    KeyB,
    KeyC,
    KeyD,
    KeyE,
    KeyF = 0xF,
}

impl KeyCode {
    pub const ALL: [KeyCode; KEY_COUNT as usize] = [
        Self::Key0,
        Self::Key1,
        Self::Key2,
        Self::Key3,
        Self::Key4,
        Self::Key5,
        Self::Key6,
        Self::Key7,
        Self::Key8,
        Self::Key9,
        Self::KeyA,
        Self::KeyB,
        Self::KeyC,
        Self::KeyD,
        Self::KeyE,
        Self::KeyF,
    ];

    #[inline(always)]
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Keycode for the lower nibble of a register value.
    #[inline(always)]
    pub fn from_nibble(value: u8) -> Self {
        Self::ALL[(value & 0xF) as usize]
    }
}

impl std::fmt::Display for KeyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let key_id = self.as_u8();
        write!(f, "k{key_id:x}")
    }
}

impl From<KeyCode> for u8 {
    fn from(keycode: KeyCode) -> Self {
        keycode.as_u8()
    }
}

impl TryFrom<u8> for KeyCode {
    type Error = InvalidKeyCode;

    fn try_from(key_id: u8) -> Result<Self, Self::Error> {
        Self::ALL.get(key_id as usize).copied().ok_or(InvalidKeyCode)
    }
}

#[derive(Debug)]
pub struct InvalidKeyCode;

impl std::error::Error for InvalidKeyCode {}

impl std::fmt::Display for InvalidKeyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "keycode must be in range 0 <= keycode < 16")
    }
}

#[cfg(feature = "serde")]
mod de {
    use std::fmt::Display;

    use serde::de::{Deserialize, Error, Expected, Unexpected, Visitor};

    use super::*;

    impl Expected for InvalidKeyCode {
        fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            <Self as Display>::fmt(self, f)
        }
    }

    impl<'de> Deserialize<'de> for KeyCode {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: serde::Deserializer<'de>,
        {
            // YAML integer type
            deserializer.deserialize_i64(KeyCodeVisitor)
        }
    }

    struct KeyCodeVisitor;

    impl<'de> Visitor<'de> for KeyCodeVisitor {
        type Value = KeyCode;

        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            write!(f, "an integer between 0 and 15")
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: Error,
        {
            u8::try_from(v)
                .ok()
                .and_then(|key_id| KeyCode::try_from(key_id).ok())
                .ok_or_else(|| E::invalid_value(Unexpected::Signed(v), &InvalidKeyCode))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: Error,
        {
            u8::try_from(v)
                .ok()
                .and_then(|key_id| KeyCode::try_from(key_id).ok())
                .ok_or_else(|| E::invalid_value(Unexpected::Unsigned(v), &InvalidKeyCode))
        }
    }

}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_keycode_conversion() {
        for key_id in 0..KEY_COUNT {
            let keycode = KeyCode::try_from(key_id).unwrap();
            assert_eq!(u8::from(keycode), key_id);
        }
        assert!(KeyCode::try_from(KEY_COUNT).is_err());
        assert_eq!(KeyCode::from_nibble(0xA5), KeyCode::Key5);
        assert_eq!(KeyCode::KeyC.to_string(), "kc");
    }
}
