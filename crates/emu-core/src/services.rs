//! Capability discovery for assembled machines.
//!
//! A machine instance registers the optional hardware-facing
//! capabilities its configuration actually supports, and callers probe
//! before use. Absence of a kind means the capability is categorically
//! unsupported for that machine — it is the designed feature-probing
//! mechanism, never a runtime error.
//!
//! Each kind carries a statically known provider trait; a machine's
//! `get_service` hands back a tagged union of borrowed provider handles,
//! so lookups stay checked without any runtime type machinery. Handles
//! are borrowed views into the machine and cannot outlive it.

use std::io::{self, Read, Write};

use bitflags::bitflags;

use crate::controller::{Controller, InputCallbacks};
use crate::serializer::SyncEnum;

/// Closed set of capability kinds a machine can provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    /// The machine object itself: frame stepping and counters. Always
    /// present; registered automatically and cannot be unregistered.
    Emulator,
    /// Cart/mapper/board identification.
    BoardInfo,
    /// ROM hashes and load decisions, formatted for user consumption.
    RomInfo,
    /// Display standard of the emulated machine.
    Region,
    /// Settings get/put with reboot-required signalling.
    Settable,
    /// Binary save/load of the whole machine state.
    Statable,
    /// Register access and cycle counting for debuggers.
    Debuggable,
    /// Lag-frame tracking and input-poll callbacks.
    InputPollable,
    /// Execution trace capture.
    Traceable,
    /// Pixel buffer output.
    VideoProvider,
    /// Audio sample output.
    SoundProvider,
}

impl ServiceKind {
    /// Every kind, in registry order.
    pub const ALL: [ServiceKind; 11] = [
        ServiceKind::Emulator,
        ServiceKind::BoardInfo,
        ServiceKind::RomInfo,
        ServiceKind::Region,
        ServiceKind::Settable,
        ServiceKind::Statable,
        ServiceKind::Debuggable,
        ServiceKind::InputPollable,
        ServiceKind::Traceable,
        ServiceKind::VideoProvider,
        ServiceKind::SoundProvider,
    ];
}

/// Table of the capability kinds a machine instance provides.
///
/// Populated once, during machine construction, after every sub-object
/// (mapper, chip models, controller deck) exists — registering a kind
/// exposes a live provider, so nothing registers before its backing
/// object is ready. At most one provider exists per kind per machine.
#[derive(Debug, Clone)]
pub struct ServiceRegistry {
    registered: [bool; ServiceKind::ALL.len()],
}

impl ServiceRegistry {
    /// A registry with only the base `Emulator` capability registered.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self {
            registered: [false; ServiceKind::ALL.len()],
        };
        registry.register(ServiceKind::Emulator);
        registry
    }

    /// Register a kind. Registering a kind twice replaces the (single)
    /// provider slot — it never accumulates.
    pub fn register(&mut self, kind: ServiceKind) {
        self.registered[kind as usize] = true;
    }

    /// Pure predicate: is this capability supported?
    #[must_use]
    pub fn has_service(&self, kind: ServiceKind) -> bool {
        self.registered[kind as usize]
    }

    /// Enumerate all currently registered kinds.
    pub fn available_services(&self) -> impl Iterator<Item = ServiceKind> + '_ {
        ServiceKind::ALL
            .into_iter()
            .filter(|kind| self.registered[*kind as usize])
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Base capability: stepping the machine one whole frame at a time.
pub trait Emulator {
    /// Advance exactly one frame, sampling `controller` for input.
    fn frame_advance(&mut self, controller: &dyn Controller, render: bool);

    /// Completed frame count.
    fn frame(&self) -> u64;

    /// Zero the frame and lag counters without touching emulated state.
    fn reset_counters(&mut self);
}

/// Identifies the cart/mapper/board the machine decided to emulate.
pub trait BoardInfo {
    fn board_name(&self) -> &str;
}

/// ROM details (hashes, size, load decisions), formatted for display.
pub trait RomInfo {
    fn rom_details(&self) -> &str;
}

/// Display standard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayType {
    #[default]
    Ntsc,
    Pal,
    Secam,
}

impl SyncEnum for DisplayType {
    fn to_discriminant(self) -> i32 {
        match self {
            DisplayType::Ntsc => 0,
            DisplayType::Pal => 1,
            DisplayType::Secam => 2,
        }
    }

    fn from_discriminant(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(DisplayType::Ntsc),
            1 => Some(DisplayType::Pal),
            2 => Some(DisplayType::Secam),
            _ => None,
        }
    }
}

/// Which display standard the machine is emulating.
pub trait Regionable {
    fn region(&self) -> DisplayType;
}

bitflags! {
    /// What the caller must do for a settings change to take effect.
    ///
    /// An empty set means the change applied live. `REBOOT_CORE` means
    /// the machine must be rebuilt — callers recording a deterministic
    /// session use this to avoid silently breaking sync.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PutSettingsDirtyBits: u32 {
        const REBOOT_CORE = 1;
        const SCREEN_LAYOUT_CHANGED = 2;
    }
}

/// Settings mutation capability.
///
/// `Settings` may change during the life of a machine and never affect
/// deterministic replay; `SyncSettings` affect replay, so putting a
/// changed value reports `REBOOT_CORE` rather than applying silently.
/// Getters return clones — mutating a returned value has no effect until
/// it is put back.
pub trait Settable {
    type Settings: Clone;
    type SyncSettings: Clone;

    fn get_settings(&self) -> Self::Settings;

    fn get_sync_settings(&self) -> Self::SyncSettings;

    fn put_settings(&mut self, settings: Self::Settings) -> PutSettingsDirtyBits;

    fn put_sync_settings(&mut self, sync_settings: Self::SyncSettings) -> PutSettingsDirtyBits;
}

/// Binary save/load of the whole machine state.
///
/// The stream is flat and schema-less; producer and consumer agree
/// out-of-band on the exact sequence of sync calls (a fixed, versioned
/// routine per machine configuration). A load whose layout does not
/// match produces undefined results — the format cannot detect it.
pub trait Statable {
    /// Hint that this machine's states are too expensive to rewind.
    fn avoid_rewind(&self) -> bool {
        false
    }

    fn save_state(&mut self, writer: &mut dyn Write) -> io::Result<()>;

    fn load_state(&mut self, reader: &mut dyn Read) -> io::Result<()>;

    /// Clone the current state into a fresh buffer. Allocates — not for
    /// performance-sensitive paths.
    fn save_state_bytes(&mut self) -> io::Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.save_state(&mut buffer)?;
        Ok(buffer)
    }
}

/// Granularity of a debugger step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepType {
    Into,
    Over,
    Out,
}

/// Register access and cycle counting for debugger frontends.
pub trait Debuggable {
    /// Snapshot of all CPU registers and flags, by name.
    fn cpu_registers(&self) -> Vec<(&'static str, u32)>;

    /// Set a CPU register by name.
    fn set_cpu_register(&mut self, name: &str, value: u32) -> Result<(), String>;

    /// Whether [`step`](Self::step) supports the given granularity.
    /// Probing this first is the contract; the default provider supports
    /// none.
    fn can_step(&self, _type: StepType) -> bool {
        false
    }

    /// Execute one debugger step at the given granularity.
    fn step(&mut self, step_type: StepType) -> Result<(), String> {
        Err(format!("{step_type:?} stepping is not implemented"))
    }

    /// Total executed CPU cycles since power-up.
    fn total_executed_cycles(&self) -> u64;
}

/// Lag-frame tracking and input-poll callbacks.
///
/// A lag frame is one during which the emulated program never polled
/// input; recording frontends count them to keep movies aligned.
pub trait InputPollable {
    fn lag_count(&self) -> u32;

    fn set_lag_count(&mut self, count: u32);

    fn is_lag_frame(&self) -> bool;

    /// Callbacks fired whenever the running program polls input.
    fn input_callbacks(&mut self) -> &mut InputCallbacks;
}

/// Pixel buffer output. The bus core never implements this itself — it
/// belongs to an external video chip model.
pub trait VideoProvider {
    /// ARGB32 pixels, row-major.
    fn video_buffer(&self) -> &[u32];

    fn buffer_width(&self) -> u32;

    fn buffer_height(&self) -> u32;
}

/// Audio sample output, likewise provided by an external chip model.
pub trait SoundProvider {
    /// Drain pending samples (interleaved stereo, signed 16-bit).
    fn take_samples(&mut self) -> Vec<i16>;
}
