//! Atari 2600 memory bus, cartridge mappers, and state management.
//!
//! The 6507 only brings 13 address lines to the cartridge slot, so the
//! whole machine lives in an 8K window: TIA registers, 128 bytes of RAM,
//! RIOT registers, and 4K of cartridge space that the bank-switching
//! boards multiplex. This crate is that window — address decode with its
//! side effects, the mapper state machines, bit-exact binary state
//! save/load, and the capability registry tooling probes.
//!
//! The CPU interpreter, pixel/sample synthesis, and the game database
//! are external collaborators, supplied through the `emu-core` traits.

mod atari;
mod bus;
mod cartridge;
mod config;
mod controller;
mod riot;
mod tia;

pub use atari::{A2600Service, Atari2600};
pub use bus::{ADDRESSABLE, Console, RAM_SIZE, SystemBus, SystemBusDomain};
pub use cartridge::CartMapper;
pub use config::{A2600Settings, A2600SyncSettings, ControllerType};
pub use controller::ControllerDeck;
pub use riot::Riot;
pub use tia::Tia;
