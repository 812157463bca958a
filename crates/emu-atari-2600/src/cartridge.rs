//! Cartridge mappers: bank-switching state machines.
//!
//! One live mapper per cartridge, selected from the game's mapper code
//! (or detected from the ROM length) at construction. Supports 2K and 4K
//! flat carts, F8 (Atari 8K), F6SC (Atari 16K with Superchip RAM), and
//! SB "SUPERbanking" (128K-256K).
//!
//! Shared decode contract, all variants:
//! - Bank decode runs *before* the value for the same access is
//!   computed. Switching is immediate on real hardware, including for
//!   the instruction bytes that caused it, so a trigger address inside
//!   the 4K window reads from the *new* bank.
//! - Any side-effecting access triggers decode — reads and writes alike.
//! - Peek/poke reuse the value logic but skip decode entirely: no bank
//!   changes, no RAM write-port quirks.
//! - Addresses below `$1000` are not cartridge space and delegate to the
//!   base console region.
//!
//! Mappers borrow the ROM per access; they never own it. Bank state (and
//! cart RAM where present) is exactly what `sync_state` persists — ROM
//! bytes are supplied at construction and never serialized.

use std::io;

use emu_core::Serializer;

use crate::bus::Console;

/// The closed set of supported cartridge boards, dispatched by `match`
/// so the hot read/write path has no virtual calls and exhaustiveness is
/// compiler-checked.
pub enum CartMapper {
    M2k(M2k),
    M4k(M4k),
    F8(F8),
    F6Sc(F6Sc),
    Sb(Sb),
}

impl CartMapper {
    /// Construct the mapper a code names. Unrecognised codes and ROMs
    /// whose length does not fit the board are construction errors —
    /// there is no fallback mapper.
    pub fn from_code(code: &str, rom: &[u8]) -> Result<Self, String> {
        match code {
            "2K" => {
                expect_len(rom, &[2048], "2K")?;
                Ok(CartMapper::M2k(M2k))
            }
            "4K" => {
                expect_len(rom, &[4096], "4K")?;
                Ok(CartMapper::M4k(M4k))
            }
            "F8" => {
                expect_len(rom, &[8192], "F8")?;
                Ok(CartMapper::F8(F8::new()))
            }
            "F6SC" => {
                expect_len(rom, &[16384], "F6SC")?;
                Ok(CartMapper::F6Sc(F6Sc::new()))
            }
            "SB" => Ok(CartMapper::Sb(Sb::new(rom)?)),
            _ => Err(format!("unrecognized mapper code \"{code}\"")),
        }
    }

    /// Pick a mapper code from the ROM length, for games whose metadata
    /// carries none.
    pub fn detect(rom: &[u8]) -> Result<&'static str, String> {
        match rom.len() {
            2048 => Ok("2K"),
            4096 => Ok("4K"),
            8192 => Ok("F8"),
            16384 => Ok("F6SC"),
            131_072 | 262_144 => Ok("SB"),
            n => Err(format!("no known mapper for a {n}-byte ROM")),
        }
    }

    #[must_use]
    pub fn board_name(&self) -> &'static str {
        match self {
            CartMapper::M2k(_) => "2K",
            CartMapper::M4k(_) => "4K",
            CartMapper::F8(_) => "F8",
            CartMapper::F6Sc(_) => "F6SC",
            CartMapper::Sb(_) => "SB",
        }
    }

    /// Side-effecting read: runs bank decode, then computes the value.
    pub fn read(&mut self, addr: u16, rom: &[u8], console: &mut Console) -> u8 {
        match self {
            CartMapper::M2k(m) => m.read(addr, rom, console),
            CartMapper::M4k(m) => m.read(addr, rom, console),
            CartMapper::F8(m) => m.read(addr, rom, console),
            CartMapper::F6Sc(m) => m.read(addr, rom, console),
            CartMapper::Sb(m) => m.read(addr, rom, console),
        }
    }

    /// Pure read: same value, no decode, no write-port quirks.
    #[must_use]
    pub fn peek(&self, addr: u16, rom: &[u8], console: &Console) -> u8 {
        match self {
            CartMapper::M2k(m) => m.peek(addr, rom, console),
            CartMapper::M4k(m) => m.peek(addr, rom, console),
            CartMapper::F8(m) => m.peek(addr, rom, console),
            CartMapper::F6Sc(m) => m.peek(addr, rom, console),
            CartMapper::Sb(m) => m.peek(addr, rom, console),
        }
    }

    /// Side-effecting write: runs bank decode, then stores.
    pub fn write(&mut self, addr: u16, value: u8, console: &mut Console) {
        match self {
            CartMapper::M2k(m) => m.write(addr, value, console),
            CartMapper::M4k(m) => m.write(addr, value, console),
            CartMapper::F8(m) => m.write(addr, value, console),
            CartMapper::F6Sc(m) => m.write(addr, value, console),
            CartMapper::Sb(m) => m.write(addr, value, console),
        }
    }

    /// Pure write: mutates exactly the addressed byte, never bank state.
    pub fn poke(&mut self, addr: u16, value: u8, console: &mut Console) {
        match self {
            CartMapper::M2k(_) | CartMapper::M4k(_) | CartMapper::F8(_) | CartMapper::Sb(_) => {
                if addr < 0x1000 {
                    console.poke(addr, value);
                }
            }
            CartMapper::F6Sc(m) => m.poke(addr, value, console),
        }
    }

    /// Reset bank state to its power-up value. ROM is untouched.
    pub fn hard_reset(&mut self) {
        match self {
            CartMapper::M2k(_) | CartMapper::M4k(_) => {}
            CartMapper::F8(m) => m.bank_4k = 0,
            CartMapper::F6Sc(m) => {
                m.bank_4k = 0;
                m.aux_ram.fill(0);
            }
            CartMapper::Sb(m) => m.bank_4k = 0,
        }
    }

    /// Persist exactly the mutable fields, in a fixed order shared by
    /// save and load.
    pub fn sync_state(&mut self, ser: &mut Serializer<'_>) -> io::Result<()> {
        ser.begin_section("mapper");
        match self {
            CartMapper::M2k(_) | CartMapper::M4k(_) => {}
            CartMapper::F8(m) => ser.sync_u32("bank_4k", &mut m.bank_4k)?,
            CartMapper::F6Sc(m) => {
                ser.sync_u32("bank_4k", &mut m.bank_4k)?;
                ser.sync_u8_arr("aux_ram", &mut m.aux_ram)?;
            }
            CartMapper::Sb(m) => ser.sync_u32("bank_4k", &mut m.bank_4k)?,
        }
        ser.end_section();
        Ok(())
    }

    /// On-cartridge RAM, where the board carries any.
    #[must_use]
    pub fn cart_ram(&self) -> Option<&[u8]> {
        match self {
            CartMapper::F6Sc(m) => Some(&m.aux_ram),
            _ => None,
        }
    }

    pub fn cart_ram_mut(&mut self) -> Option<&mut [u8]> {
        match self {
            CartMapper::F6Sc(m) => Some(&mut m.aux_ram),
            _ => None,
        }
    }
}

fn expect_len(rom: &[u8], allowed: &[usize], code: &str) -> Result<(), String> {
    if allowed.contains(&rom.len()) {
        Ok(())
    } else {
        Err(format!(
            "mapper {code} cannot use a {}-byte ROM",
            rom.len()
        ))
    }
}

/// 2K cart: one 2K ROM, mirrored twice across the 4K window.
pub struct M2k;

impl M2k {
    fn read(&self, addr: u16, rom: &[u8], console: &mut Console) -> u8 {
        if addr < 0x1000 {
            return console.read(addr);
        }
        rom[(addr & 0x7FF) as usize]
    }

    fn peek(&self, addr: u16, rom: &[u8], console: &Console) -> u8 {
        if addr < 0x1000 {
            return console.peek(addr);
        }
        rom[(addr & 0x7FF) as usize]
    }

    fn write(&self, addr: u16, value: u8, console: &mut Console) {
        if addr < 0x1000 {
            console.write(addr, value);
        }
    }
}

/// 4K cart: the whole window, no switching.
pub struct M4k;

impl M4k {
    fn read(&self, addr: u16, rom: &[u8], console: &mut Console) -> u8 {
        if addr < 0x1000 {
            return console.read(addr);
        }
        rom[(addr & 0xFFF) as usize]
    }

    fn peek(&self, addr: u16, rom: &[u8], console: &Console) -> u8 {
        if addr < 0x1000 {
            return console.peek(addr);
        }
        rom[(addr & 0xFFF) as usize]
    }

    fn write(&self, addr: u16, value: u8, console: &mut Console) {
        if addr < 0x1000 {
            console.write(addr, value);
        }
    }
}

/// F8 (Atari 8K): two 4K banks. Any live access to `$1FF8` selects bank
/// 0, to `$1FF9` bank 1; the bank persists until the next such access.
/// Games keep a stub of code at the same offset in both banks so the
/// instruction stream survives the switch.
pub struct F8 {
    bank_4k: u32,
}

impl F8 {
    fn new() -> Self {
        Self { bank_4k: 0 }
    }

    fn read(&mut self, addr: u16, rom: &[u8], console: &mut Console) -> u8 {
        self.address(addr);
        self.value(addr, rom, console)
    }

    fn peek(&self, addr: u16, rom: &[u8], console: &Console) -> u8 {
        if addr < 0x1000 {
            return console.peek(addr);
        }
        rom[self.rom_offset(addr)]
    }

    fn write(&mut self, addr: u16, value: u8, console: &mut Console) {
        self.address(addr);
        if addr < 0x1000 {
            console.write(addr, value);
        }
    }

    fn value(&self, addr: u16, rom: &[u8], console: &mut Console) -> u8 {
        if addr < 0x1000 {
            return console.read(addr);
        }
        rom[self.rom_offset(addr)]
    }

    fn rom_offset(&self, addr: u16) -> usize {
        ((self.bank_4k as usize) << 12) | (addr & 0xFFF) as usize
    }

    fn address(&mut self, addr: u16) {
        match addr {
            0x1FF8 => self.bank_4k = 0,
            0x1FF9 => self.bank_4k = 1,
            _ => {}
        }
    }
}

/// F6SC (Atari 16K + Superchip): four 4K banks selected by live accesses
/// to `$1FF6`-`$1FF9`, plus 128 bytes of RAM mapped at the bottom of the
/// window — write port at `$00`-`$7F`, read port at `$80`-`$FF`.
///
/// Reading the write port is a documented hardware quirk: the access
/// drives open bus onto the RAM cell, so the live read *stores* a
/// sentinel into the cell and returns it. `0xFF` stands in for the
/// undefined open-bus value to keep emulation deterministic. The quirk
/// is decode-path behavior, so peeks return the cell's prior contents
/// and write nothing.
pub struct F6Sc {
    bank_4k: u32,
    aux_ram: Vec<u8>,
}

impl F6Sc {
    fn new() -> Self {
        Self {
            bank_4k: 0,
            aux_ram: vec![0; 128],
        }
    }

    fn read(&mut self, addr: u16, rom: &[u8], console: &mut Console) -> u8 {
        self.address(addr);
        if addr < 0x1000 {
            return console.read(addr);
        }
        if addr < 0x1080 {
            // Write-port read quirk (live path only).
            self.aux_ram[(addr & 0x7F) as usize] = 0xFF;
            return 0xFF;
        }
        if addr < 0x1100 {
            return self.aux_ram[(addr & 0x7F) as usize];
        }
        rom[self.rom_offset(addr)]
    }

    fn peek(&self, addr: u16, rom: &[u8], console: &Console) -> u8 {
        if addr < 0x1000 {
            return console.peek(addr);
        }
        if addr < 0x1100 {
            return self.aux_ram[(addr & 0x7F) as usize];
        }
        rom[self.rom_offset(addr)]
    }

    fn write(&mut self, addr: u16, value: u8, console: &mut Console) {
        self.address(addr);
        if addr < 0x1000 {
            console.write(addr, value);
        } else if (addr & 0x0FFF) < 0x80 {
            self.aux_ram[(addr & 0x7F) as usize] = value;
        }
    }

    fn poke(&mut self, addr: u16, value: u8, console: &mut Console) {
        if addr < 0x1000 {
            console.poke(addr, value);
        } else if (addr & 0x0FFF) < 0x80 {
            self.aux_ram[(addr & 0x7F) as usize] = value;
        }
    }

    fn rom_offset(&self, addr: u16) -> usize {
        ((self.bank_4k as usize) << 12) | (addr & 0xFFF) as usize
    }

    fn address(&mut self, addr: u16) {
        self.bank_4k = match addr {
            0x1FF6 => 0,
            0x1FF7 => 1,
            0x1FF8 => 2,
            0x1FF9 => 3,
            _ => self.bank_4k,
        };
    }
}

/// SB "SUPERbanking": 32 or 64 4K banks, everything derived from the ROM
/// length at construction. A live access whose address, masked with
/// `0x17FF + bank_count`, lands with bits 11-12 reading `01` selects
/// `bank = masked & (bank_count - 1)`.
///
/// The trigger window sits *below* cartridge space (`$0800`-`$0FFF` of
/// the masked value), which is why every bus access routes through the
/// mapper. The mask arithmetic only partitions cleanly when the bank
/// count is a power of two; other geometries replicate the original
/// formula as-is and are untested territory.
pub struct Sb {
    bank_4k: u32,
    bank_count: u32,
}

impl Sb {
    fn new(rom: &[u8]) -> Result<Self, String> {
        if rom.is_empty() || rom.len() % 4096 != 0 {
            return Err(format!(
                "mapper SB needs a whole number of 4K banks, got {} bytes",
                rom.len()
            ));
        }
        let bank_count = (rom.len() >> 12) as u32;
        if !bank_count.is_power_of_two() {
            log::warn!("SB with {bank_count} banks: mask formula untested for non-power-of-two");
        }
        Ok(Self {
            bank_4k: 0,
            bank_count,
        })
    }

    fn read(&mut self, addr: u16, rom: &[u8], console: &mut Console) -> u8 {
        self.address(addr);
        if addr < 0x1000 {
            return console.read(addr);
        }
        rom[self.rom_offset(addr)]
    }

    fn peek(&self, addr: u16, rom: &[u8], console: &Console) -> u8 {
        if addr < 0x1000 {
            return console.peek(addr);
        }
        rom[self.rom_offset(addr)]
    }

    fn write(&mut self, addr: u16, value: u8, console: &mut Console) {
        self.address(addr);
        if addr < 0x1000 {
            console.write(addr, value);
        }
    }

    fn rom_offset(&self, addr: u16) -> usize {
        ((self.bank_4k as usize) << 12) | (addr & 0xFFF) as usize
    }

    fn address(&mut self, addr: u16) {
        let masked = u32::from(addr) & (0x17FF + self.bank_count);
        if masked & 0x1800 == 0x0800 {
            self.bank_4k = masked & (self.bank_count - 1);
        }
    }
}
