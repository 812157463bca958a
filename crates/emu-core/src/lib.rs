//! Core traits and types for cycle-accurate emulation.
//!
//! A machine is stepped one clock cycle at a time; every memory access
//! routes through a [`Bus`], every stateful component persists itself
//! through the [`Serializer`], and everything optional a machine can do
//! is discovered through the [`ServiceRegistry`]. Single-threaded and
//! deterministic throughout: no operation blocks, suspends, or yields
//! mid-step.

mod bus;
mod controller;
mod cpu;
mod domain;
mod game;
mod serializer;
mod services;
mod tickable;
mod timing;
mod tracer;

pub use bus::Bus;
pub use controller::{Controller, ControllerDefinition, InputCallbacks, NullController};
pub use cpu::{Cpu, NullCpu};
pub use domain::{DomainInfo, MemoryDomain, SliceDomain, SliceDomainMut};
pub use game::{GameDb, GameInfo};
pub use serializer::{Bit, Serializer, SyncEnum};
pub use services::{
    BoardInfo, Debuggable, DisplayType, Emulator, InputPollable, PutSettingsDirtyBits, Regionable,
    RomInfo, ServiceKind, ServiceRegistry, Settable, SoundProvider, Statable, StepType,
    VideoProvider,
};
pub use tickable::Tickable;
pub use timing::{MasterClock, Ticks};
pub use tracer::{TraceBuffer, TraceEntry};
