//! Controller deck: named inputs onto console port lines.
//!
//! The deck is built from the sync settings' port devices and translates
//! a frontend [`Controller`] into the electrical state the RIOT and TIA
//! ports latch each frame: joystick directions on SWCHA (active low),
//! fire buttons on INPT4/INPT5, console switches on SWCHB.

use emu_core::{Controller, ControllerDefinition};

use crate::config::{A2600SyncSettings, ControllerType};

/// SWCHB bit positions.
const SWITCH_RESET: u8 = 0x01;
const SWITCH_SELECT: u8 = 0x02;
const SWITCH_COLOR: u8 = 0x08;
const SWITCH_LEFT_DIFFICULTY: u8 = 0x40;
const SWITCH_RIGHT_DIFFICULTY: u8 = 0x80;

/// Maps named frontend inputs to the two controller ports.
pub struct ControllerDeck {
    port1: ControllerType,
    port2: ControllerType,
}

impl ControllerDeck {
    #[must_use]
    pub fn new(port1: ControllerType, port2: ControllerType) -> Self {
        Self { port1, port2 }
    }

    /// The named inputs this deck will sample.
    #[must_use]
    pub fn definition(&self) -> ControllerDefinition {
        let mut bool_buttons = Vec::new();
        for (port, device) in [(1, self.port1), (2, self.port2)] {
            if device == ControllerType::Joystick {
                for direction in ["Up", "Down", "Left", "Right", "Button"] {
                    bool_buttons.push(format!("P{port} {direction}"));
                }
            }
        }
        bool_buttons.push("Reset".to_string());
        bool_buttons.push("Select".to_string());
        ControllerDefinition {
            name: "Atari 2600 Basic Controller".to_string(),
            bool_buttons,
            axes: Vec::new(),
        }
    }

    /// SWCHA pin state: port 1 directions in the high nibble, port 2 in
    /// the low, all active low.
    #[must_use]
    pub fn read_port_a(&self, controller: &dyn Controller) -> u8 {
        let p1 = Self::direction_nibble(self.port1, 1, controller);
        let p2 = Self::direction_nibble(self.port2, 2, controller);
        (p1 << 4) | p2
    }

    /// Fire button state for (INPT4, INPT5): true while pressed.
    #[must_use]
    pub fn read_fire_buttons(&self, controller: &dyn Controller) -> (bool, bool) {
        (
            self.port1 == ControllerType::Joystick && controller.is_pressed("P1 Button"),
            self.port2 == ControllerType::Joystick && controller.is_pressed("P2 Button"),
        )
    }

    /// SWCHB pin state from the console switches. Reset and Select are
    /// momentary and active low; the TV-type and difficulty switches
    /// come from the sync settings.
    #[must_use]
    pub fn read_port_b(controller: &dyn Controller, sync: &A2600SyncSettings) -> u8 {
        let mut value = 0;
        if !controller.is_pressed("Reset") {
            value |= SWITCH_RESET;
        }
        if !controller.is_pressed("Select") {
            value |= SWITCH_SELECT;
        }
        if !sync.bw {
            value |= SWITCH_COLOR;
        }
        if sync.left_difficulty {
            value |= SWITCH_LEFT_DIFFICULTY;
        }
        if sync.right_difficulty {
            value |= SWITCH_RIGHT_DIFFICULTY;
        }
        value
    }

    /// Active-low direction bits: up=0, down=1, left=2, right=3.
    fn direction_nibble(device: ControllerType, port: u8, controller: &dyn Controller) -> u8 {
        let mut nibble = 0x0F;
        if device != ControllerType::Joystick {
            // Nothing plugged in: all lines float high.
            return nibble;
        }
        for (bit, direction) in ["Up", "Down", "Left", "Right"].iter().enumerate() {
            if controller.is_pressed(&format!("P{port} {direction}")) {
                nibble &= !(1 << bit);
            }
        }
        nibble
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    struct Pressed(HashSet<&'static str>);

    impl Controller for Pressed {
        fn is_pressed(&self, button: &str) -> bool {
            self.0.contains(button)
        }

        fn axis_value(&self, _name: &str) -> i32 {
            0
        }
    }

    fn deck() -> ControllerDeck {
        ControllerDeck::new(ControllerType::Joystick, ControllerType::Joystick)
    }

    #[test]
    fn swcha_is_active_low_per_port() {
        let c = Pressed(["P1 Up", "P2 Right"].into_iter().collect());
        // P1 up clears bit 4, P2 right clears bit 3.
        assert_eq!(deck().read_port_a(&c), 0b1110_0111);

        let none = Pressed(HashSet::new());
        assert_eq!(deck().read_port_a(&none), 0xFF);
    }

    #[test]
    fn unplugged_port_floats_high() {
        let deck = ControllerDeck::new(ControllerType::Unplugged, ControllerType::Joystick);
        let c = Pressed(["P1 Up", "P2 Up"].into_iter().collect());
        assert_eq!(deck.read_port_a(&c), 0b1111_1110);
    }

    #[test]
    fn fire_buttons_follow_the_port_device() {
        let deck = ControllerDeck::new(ControllerType::Joystick, ControllerType::Unplugged);
        let c = Pressed(["P1 Button", "P2 Button"].into_iter().collect());
        assert_eq!(deck.read_fire_buttons(&c), (true, false));
    }

    #[test]
    fn console_switches_compose_swchb() {
        let sync = A2600SyncSettings::default();
        let none = Pressed(HashSet::new());
        // Nothing pressed, color TV, both difficulty switches set.
        assert_eq!(ControllerDeck::read_port_b(&none, &sync), 0b1100_1011);

        let reset = Pressed(["Reset"].into_iter().collect());
        assert_eq!(ControllerDeck::read_port_b(&reset, &sync) & SWITCH_RESET, 0);
    }

    #[test]
    fn definition_lists_plugged_ports_only() {
        let deck = ControllerDeck::new(ControllerType::Joystick, ControllerType::Unplugged);
        let def = deck.definition();
        assert!(def.bool_buttons.iter().any(|b| b == "P1 Button"));
        assert!(!def.bool_buttons.iter().any(|b| b == "P2 Button"));
        assert!(def.bool_buttons.iter().any(|b| b == "Reset"));
    }
}
