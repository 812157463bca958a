//! Machine settings.
//!
//! Two tiers, matching the settings capability contract: `A2600Settings`
//! may change at any time and never affect deterministic replay;
//! `A2600SyncSettings` feed the emulated hardware (port devices, console
//! switches), so changing them on a live machine reports reboot-required
//! instead of applying silently.

/// Device plugged into a controller port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ControllerType {
    Unplugged,
    #[default]
    Joystick,
}

/// Presentation settings — safe to change live.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct A2600Settings {
    /// Display layer toggles, for debugging graphics.
    pub show_bg: bool,
    pub show_player1: bool,
    pub show_player2: bool,
    pub show_missile1: bool,
    pub show_missile2: bool,
    pub show_ball: bool,
    pub show_playfield: bool,
    /// PAL mode shows with SECAM (French) colors.
    pub secam_colors: bool,
    /// First/last video line to display, per standard.
    pub ntsc_top_line: u16,
    pub ntsc_bottom_line: u16,
    pub pal_top_line: u16,
    pub pal_bottom_line: u16,
    /// ARGB fill behind the image.
    pub background_color: u32,
}

impl Default for A2600Settings {
    fn default() -> Self {
        Self {
            show_bg: true,
            show_player1: true,
            show_player2: true,
            show_missile1: true,
            show_missile2: true,
            show_ball: true,
            show_playfield: true,
            secam_colors: false,
            ntsc_top_line: 24,
            ntsc_bottom_line: 248,
            pal_top_line: 24,
            pal_bottom_line: 296,
            background_color: 0xFF00_0000,
        }
    }
}

impl A2600Settings {
    /// Crop lines forced into the ranges the video standards allow.
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.ntsc_top_line = self.ntsc_top_line.min(64);
        self.ntsc_bottom_line = self.ntsc_bottom_line.clamp(192, 260);
        self.pal_top_line = self.pal_top_line.min(64);
        self.pal_bottom_line = self.pal_bottom_line.clamp(192, 310);
        self
    }
}

/// Hardware configuration — affects deterministic replay.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct A2600SyncSettings {
    /// Device in the first controller port.
    pub port1: ControllerType,
    /// Device in the second controller port.
    pub port2: ControllerType,
    /// TV Type console switch: true = B&W, false = Color.
    pub bw: bool,
    /// Left/Right Difficulty console switches.
    pub left_difficulty: bool,
    pub right_difficulty: bool,
}

impl Default for A2600SyncSettings {
    fn default() -> Self {
        Self {
            port1: ControllerType::Joystick,
            port2: ControllerType::Joystick,
            bw: false,
            left_difficulty: true,
            right_difficulty: true,
        }
    }
}

impl A2600SyncSettings {
    /// Field-by-field comparison deciding whether a put requires a
    /// machine reboot.
    #[must_use]
    pub fn needs_reboot(x: &Self, y: &Self) -> bool {
        x.port1 != y.port1
            || x.port2 != y.port2
            || x.bw != y.bw
            || x.left_difficulty != y.left_difficulty
            || x.right_difficulty != y.right_difficulty
    }
}
