//! Top-level Atari 2600 machine.
//!
//! Assembles the bus, cartridge mapper, chip models, and controller deck
//! around an externally supplied CPU model, and surfaces everything
//! optional through the capability registry. One instance is stepped by
//! exactly one caller at a time; nothing here blocks or yields mid-step,
//! so identical inputs always produce identical state.

use std::io::{self, Read, Write};

use emu_core::{
    BoardInfo, Controller, ControllerDefinition, Cpu, Debuggable, DisplayType, DomainInfo,
    Emulator, GameInfo, InputCallbacks, InputPollable, MasterClock, PutSettingsDirtyBits,
    Regionable, RomInfo, Serializer, ServiceKind, ServiceRegistry, Settable, SliceDomain,
    SliceDomainMut, Statable, Tickable, Ticks, TraceBuffer,
};

use crate::bus::{ADDRESSABLE, Console, SystemBus, SystemBusDomain};
use crate::cartridge::CartMapper;
use crate::config::{A2600Settings, A2600SyncSettings};
use crate::controller::ControllerDeck;

/// TIA color clocks per CPU cycle.
const TIA_CLOCKS_PER_CPU_CYCLE: u64 = 3;

/// NTSC color crystal, Hz. The CPU runs at a third of this.
const NTSC_CRYSTAL_HZ: u64 = 3_579_545;

/// PAL color crystal, Hz.
const PAL_CRYSTAL_HZ: u64 = 3_546_894;

/// A capability provider handle, borrowed from the machine.
///
/// The union is closed over the kinds this machine can ever provide;
/// [`Atari2600::get_service`] hands one out only for kinds the registry
/// lists. Handles borrow the machine and cannot outlive it.
pub enum A2600Service<'a> {
    Emulator(&'a mut dyn Emulator),
    BoardInfo(&'a dyn BoardInfo),
    RomInfo(&'a dyn RomInfo),
    Region(&'a dyn Regionable),
    Settable(&'a mut dyn Settable<Settings = A2600Settings, SyncSettings = A2600SyncSettings>),
    Statable(&'a mut dyn Statable),
    Debuggable(&'a mut dyn Debuggable),
    InputPollable(&'a mut dyn InputPollable),
    Traceable(&'a mut TraceBuffer),
}

/// An assembled Atari 2600, generic over the CPU model driving it.
pub struct Atari2600<C: Cpu> {
    cpu: C,
    bus: SystemBus,
    services: ServiceRegistry,
    deck: ControllerDeck,
    settings: A2600Settings,
    sync_settings: A2600SyncSettings,
    game: GameInfo,
    rom_details: String,
    master_clock: MasterClock,
    tracer: TraceBuffer,
    frame: u64,
    lag_count: u32,
    is_lag: bool,
}

impl<C: Cpu> core::fmt::Debug for Atari2600<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Atari2600")
            .field("board", &self.bus.cart.board_name())
            .field("frame", &self.frame)
            .finish_non_exhaustive()
    }
}

impl<C: Cpu> Atari2600<C> {
    /// Assemble a machine around a cartridge image.
    ///
    /// The mapper comes from the game metadata's code, or is detected
    /// from the ROM length when the metadata carries none. `None`
    /// settings mean defaults. Fails on an unrecognized mapper code or a
    /// ROM that fits no board — there is no fallback.
    pub fn new(
        game: GameInfo,
        rom: Vec<u8>,
        cpu: C,
        settings: Option<A2600Settings>,
        sync_settings: Option<A2600SyncSettings>,
    ) -> Result<Self, String> {
        let settings = settings.unwrap_or_default().clamped();
        let sync_settings = sync_settings.unwrap_or_default();

        let code = match &game.mapper_code {
            Some(code) => code.clone(),
            None => CartMapper::detect(&rom)?.to_string(),
        };
        let cart = CartMapper::from_code(&code, &rom)?;
        log::info!("game \"{}\" uses mapper {}", game.name, cart.board_name());

        let crystal_hz = match game.region {
            DisplayType::Ntsc => NTSC_CRYSTAL_HZ,
            DisplayType::Pal | DisplayType::Secam => PAL_CRYSTAL_HZ,
        };

        let rom_details = format!("{}\n{}\n{} bytes", game.name, game.hash, rom.len());
        let deck = ControllerDeck::new(sync_settings.port1, sync_settings.port2);
        let console = Console::new(game.region);

        // Register capabilities only once every backing object exists —
        // registration exposes a live provider. Video and sound stay
        // unregistered: the pixel/sample chips are external to this core.
        let mut services = ServiceRegistry::new();
        for kind in [
            ServiceKind::BoardInfo,
            ServiceKind::RomInfo,
            ServiceKind::Region,
            ServiceKind::Settable,
            ServiceKind::Statable,
            ServiceKind::Debuggable,
            ServiceKind::InputPollable,
            ServiceKind::Traceable,
        ] {
            services.register(kind);
        }

        let mut machine = Self {
            cpu,
            bus: SystemBus::new(console, rom, cart),
            services,
            deck,
            settings,
            sync_settings,
            game,
            rom_details,
            master_clock: MasterClock::new(crystal_hz),
            tracer: TraceBuffer::new("6507: PC, opcode, A, X, Y, P, SP"),
            frame: 0,
            lag_count: 0,
            is_lag: false,
        };
        machine.hard_reset();
        Ok(machine)
    }

    /// Power-cycle everything except the ROM: RAM and chip registers
    /// clear, the mapper returns to its power-up bank, the CPU re-reads
    /// its reset vector. Frame and lag counters survive.
    pub fn hard_reset(&mut self) {
        self.bus.console.hard_reset();
        self.bus.cart.hard_reset();
        self.cpu.reset(&mut self.bus);
    }

    /// One CPU cycle: three TIA color clocks, one RIOT tick, one CPU
    /// tick.
    pub fn cycle(&mut self) {
        self.bus.console.tia.tick_n(Ticks::new(TIA_CLOCKS_PER_CPU_CYCLE));
        self.bus.console.riot.tick();
        self.cpu.tick(&mut self.bus);
    }

    /// Walk every stateful component in fixed order. Save and load use
    /// this one routine, which is what keeps the flat stream aligned.
    ///
    /// A failure mid-load leaves the fields already processed in the new
    /// state and the remainder in the old — callers wanting stronger
    /// atomicity buffer the stream and apply on success.
    pub fn sync_state(&mut self, ser: &mut Serializer<'_>) -> io::Result<()> {
        ser.begin_section("Atari2600");
        ser.sync_u64("frame", &mut self.frame)?;
        ser.sync_u32("lag_count", &mut self.lag_count)?;
        ser.sync_bool("is_lag", &mut self.is_lag)?;
        self.cpu.sync_state(ser)?;
        self.bus.sync_state(ser)?;
        ser.end_section();
        Ok(())
    }

    /// Fetch a capability provider, or `None` where this configuration
    /// does not implement the kind. Probing for an absent capability is
    /// the normal protocol, not an error.
    pub fn get_service(&mut self, kind: ServiceKind) -> Option<A2600Service<'_>> {
        if !self.services.has_service(kind) {
            return None;
        }
        Some(match kind {
            ServiceKind::Emulator => A2600Service::Emulator(self),
            ServiceKind::BoardInfo => A2600Service::BoardInfo(self),
            ServiceKind::RomInfo => A2600Service::RomInfo(self),
            ServiceKind::Region => A2600Service::Region(self),
            ServiceKind::Settable => A2600Service::Settable(self),
            ServiceKind::Statable => A2600Service::Statable(self),
            ServiceKind::Debuggable => A2600Service::Debuggable(self),
            ServiceKind::InputPollable => A2600Service::InputPollable(self),
            ServiceKind::Traceable => A2600Service::Traceable(&mut self.tracer),
            ServiceKind::VideoProvider | ServiceKind::SoundProvider => return None,
        })
    }

    #[must_use]
    pub fn has_service(&self, kind: ServiceKind) -> bool {
        self.services.has_service(kind)
    }

    pub fn available_services(&self) -> impl Iterator<Item = ServiceKind> + '_ {
        self.services.available_services()
    }

    /// Enumerate the memory domains this machine exposes.
    #[must_use]
    pub fn memory_domains(&self) -> Vec<DomainInfo> {
        let mut domains = vec![
            DomainInfo {
                name: "Main RAM",
                size: self.bus.console.ram.len(),
                writable: true,
            },
            DomainInfo {
                name: "ROM",
                size: self.bus.rom.len(),
                writable: false,
            },
            DomainInfo {
                name: "System Bus",
                size: ADDRESSABLE,
                writable: true,
            },
        ];
        if let Some(ram) = self.bus.cart.cart_ram() {
            domains.push(DomainInfo {
                name: "Cart RAM",
                size: ram.len(),
                writable: true,
            });
        }
        domains
    }

    /// Read-only view of a slice-backed domain.
    #[must_use]
    pub fn domain(&self, name: &str) -> Option<SliceDomain<'_>> {
        match name {
            "Main RAM" => Some(SliceDomain::new("Main RAM", &self.bus.console.ram)),
            "ROM" => Some(SliceDomain::new("ROM", &self.bus.rom)),
            "Cart RAM" => self
                .bus
                .cart
                .cart_ram()
                .map(|ram| SliceDomain::new("Cart RAM", ram)),
            _ => None,
        }
    }

    /// Writable view of a slice-backed domain. ROM has none.
    pub fn domain_mut(&mut self, name: &str) -> Option<SliceDomainMut<'_>> {
        match name {
            "Main RAM" => Some(SliceDomainMut::new("Main RAM", &mut self.bus.console.ram)),
            "Cart RAM" => self
                .bus
                .cart
                .cart_ram_mut()
                .map(|ram| SliceDomainMut::new("Cart RAM", ram)),
            _ => None,
        }
    }

    /// The decoded 8K address space through the pure peek/poke path.
    pub fn system_bus_domain(&mut self) -> SystemBusDomain<'_> {
        SystemBusDomain::new(&mut self.bus)
    }

    /// The named inputs the deck will sample each frame.
    #[must_use]
    pub fn controller_definition(&self) -> ControllerDefinition {
        self.deck.definition()
    }

    /// CPU clock in Hz (a third of the color crystal).
    #[must_use]
    pub fn cpu_clock_hz(&self) -> u64 {
        self.master_clock.divided(TIA_CLOCKS_PER_CPU_CYCLE)
    }

    #[must_use]
    pub fn game(&self) -> &GameInfo {
        &self.game
    }

    #[must_use]
    pub fn bus(&self) -> &SystemBus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut SystemBus {
        &mut self.bus
    }

    #[must_use]
    pub fn cpu(&self) -> &C {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut C {
        &mut self.cpu
    }

    fn latch_inputs(&mut self, controller: &dyn Controller) {
        let porta = self.deck.read_port_a(controller);
        let portb = ControllerDeck::read_port_b(controller, &self.sync_settings);
        self.bus.console.riot.set_ports(porta, portb);

        let (fire1, fire2) = self.deck.read_fire_buttons(controller);
        self.bus.console.tia.set_fire_buttons(fire1, fire2);
    }
}

impl<C: Cpu> Emulator for Atari2600<C> {
    /// Run cycles until the TIA signals a frame boundary. The frame is a
    /// lag frame if the program never polled input during it.
    fn frame_advance(&mut self, controller: &dyn Controller, _render: bool) {
        self.latch_inputs(controller);
        self.bus.console.begin_frame();
        while !self.bus.console.tia.new_frame() {
            self.cycle();
        }
        self.frame += 1;
        self.is_lag = !self.bus.console.input_polled();
        if self.is_lag {
            self.lag_count += 1;
        }
    }

    fn frame(&self) -> u64 {
        self.frame
    }

    fn reset_counters(&mut self) {
        self.frame = 0;
        self.lag_count = 0;
        self.is_lag = false;
    }
}

impl<C: Cpu> BoardInfo for Atari2600<C> {
    fn board_name(&self) -> &str {
        self.bus.cart.board_name()
    }
}

impl<C: Cpu> RomInfo for Atari2600<C> {
    fn rom_details(&self) -> &str {
        &self.rom_details
    }
}

impl<C: Cpu> Regionable for Atari2600<C> {
    fn region(&self) -> DisplayType {
        self.game.region
    }
}

impl<C: Cpu> Settable for Atari2600<C> {
    type Settings = A2600Settings;
    type SyncSettings = A2600SyncSettings;

    fn get_settings(&self) -> A2600Settings {
        self.settings.clone()
    }

    fn get_sync_settings(&self) -> A2600SyncSettings {
        self.sync_settings.clone()
    }

    fn put_settings(&mut self, settings: A2600Settings) -> PutSettingsDirtyBits {
        self.settings = settings.clamped();
        PutSettingsDirtyBits::empty()
    }

    fn put_sync_settings(&mut self, sync_settings: A2600SyncSettings) -> PutSettingsDirtyBits {
        let reboot = A2600SyncSettings::needs_reboot(&self.sync_settings, &sync_settings);
        self.sync_settings = sync_settings;
        if reboot {
            PutSettingsDirtyBits::REBOOT_CORE
        } else {
            PutSettingsDirtyBits::empty()
        }
    }
}

impl<C: Cpu> Statable for Atari2600<C> {
    fn save_state(&mut self, writer: &mut dyn Write) -> io::Result<()> {
        let mut ser = Serializer::new_writer(writer);
        self.sync_state(&mut ser)
    }

    fn load_state(&mut self, reader: &mut dyn Read) -> io::Result<()> {
        let mut ser = Serializer::new_reader(reader);
        self.sync_state(&mut ser)
    }
}

impl<C: Cpu> Debuggable for Atari2600<C> {
    fn cpu_registers(&self) -> Vec<(&'static str, u32)> {
        self.cpu
            .register_names()
            .iter()
            .filter_map(|name| self.cpu.read_register(name).map(|value| (*name, value)))
            .collect()
    }

    fn set_cpu_register(&mut self, name: &str, value: u32) -> Result<(), String> {
        if self.cpu.write_register(name, value) {
            Ok(())
        } else {
            Err(format!("unknown register \"{name}\""))
        }
    }

    fn total_executed_cycles(&self) -> u64 {
        self.cpu.total_cycles()
    }
}

impl<C: Cpu> InputPollable for Atari2600<C> {
    fn lag_count(&self) -> u32 {
        self.lag_count
    }

    fn set_lag_count(&mut self, count: u32) {
        self.lag_count = count;
    }

    fn is_lag_frame(&self) -> bool {
        self.is_lag
    }

    fn input_callbacks(&mut self) -> &mut InputCallbacks {
        &mut self.bus.console.input_callbacks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emu_core::{Bus, MemoryDomain, NullCpu, NullController};

    fn make_game(mapper_code: Option<&str>) -> GameInfo {
        GameInfo {
            name: "Test Cart".to_string(),
            hash: "SHA1:0000".to_string(),
            mapper_code: mapper_code.map(str::to_string),
            region: DisplayType::Ntsc,
        }
    }

    fn make_machine(rom: Vec<u8>, code: Option<&str>) -> Atari2600<NullCpu> {
        Atari2600::new(make_game(code), rom, NullCpu::new(), None, None).unwrap()
    }

    #[test]
    fn construction_rejects_unknown_mapper_codes() {
        let err = Atari2600::new(
            make_game(Some("E0")),
            vec![0; 4096],
            NullCpu::new(),
            None,
            None,
        )
        .unwrap_err();
        assert!(err.contains("E0"));
    }

    #[test]
    fn mapper_detected_from_rom_length() {
        let machine = make_machine(vec![0; 8192], None);
        assert_eq!(machine.board_name(), "F8");
    }

    #[test]
    fn services_reflect_the_configuration() {
        let mut machine = make_machine(vec![0; 4096], None);
        assert!(machine.has_service(ServiceKind::Emulator));
        assert!(machine.has_service(ServiceKind::Statable));
        // The pixel/sample chips live outside this core.
        assert!(!machine.has_service(ServiceKind::VideoProvider));
        assert!(machine.get_service(ServiceKind::SoundProvider).is_none());

        match machine.get_service(ServiceKind::BoardInfo) {
            Some(A2600Service::BoardInfo(info)) => assert_eq!(info.board_name(), "4K"),
            _ => panic!("board info should be available"),
        }
    }

    #[test]
    fn sync_settings_change_requires_reboot() {
        let mut machine = make_machine(vec![0; 4096], None);

        let unchanged = machine.get_sync_settings();
        assert_eq!(
            machine.put_sync_settings(unchanged),
            PutSettingsDirtyBits::empty()
        );

        let mut changed = machine.get_sync_settings();
        changed.bw = true;
        assert_eq!(
            machine.put_sync_settings(changed),
            PutSettingsDirtyBits::REBOOT_CORE
        );
    }

    #[test]
    fn settings_apply_live_and_clamped() {
        let mut machine = make_machine(vec![0; 4096], None);
        let mut settings = machine.get_settings();
        settings.ntsc_bottom_line = 999;
        assert_eq!(machine.put_settings(settings), PutSettingsDirtyBits::empty());
        assert_eq!(machine.get_settings().ntsc_bottom_line, 260);
    }

    #[test]
    fn domains_enumerate_per_configuration() {
        let machine = make_machine(vec![0; 4096], None);
        let names: Vec<_> = machine.memory_domains().iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["Main RAM", "ROM", "System Bus"]);
        assert!(machine.domain("Cart RAM").is_none());

        let machine = make_machine(vec![0; 16384], None);
        assert!(machine.memory_domains().iter().any(|d| d.name == "Cart RAM"));
    }

    #[test]
    fn domain_views_track_the_bus() {
        let mut machine = make_machine(vec![0; 4096], None);
        machine.bus_mut().write(0x0080, 0x5A);
        assert_eq!(machine.domain("Main RAM").unwrap().peek_byte(0), 0x5A);

        machine.domain_mut("Main RAM").unwrap().poke_byte(1, 0x77);
        assert_eq!(machine.bus_mut().read(0x0081), 0x77);

        let mut sysbus = machine.system_bus_domain();
        assert_eq!(sysbus.peek_byte(0x0080), 0x5A);
        sysbus.poke_byte(0x0082, 0x33);
        assert_eq!(machine.bus_mut().read(0x0082), 0x33);
    }

    #[test]
    fn null_cpu_frames_are_lag_frames() {
        let mut machine = make_machine(vec![0; 4096], None);
        machine.frame_advance(&NullController, false);
        machine.frame_advance(&NullController, false);
        assert_eq!(machine.frame(), 2);
        assert_eq!(machine.lag_count(), 2);
        assert!(machine.is_lag_frame());

        machine.reset_counters();
        assert_eq!(machine.frame(), 0);
        assert_eq!(machine.lag_count(), 0);
    }

    #[test]
    fn frame_is_one_frame_of_cpu_cycles() {
        let mut machine = make_machine(vec![0; 4096], None);
        machine.frame_advance(&NullController, false);
        // NTSC: 228 color clocks x 262 lines / 3 clocks per CPU cycle.
        assert_eq!(machine.total_executed_cycles(), 228 * 262 / 3);
    }

    #[test]
    fn stepping_is_probed_before_use() {
        use emu_core::StepType;

        let mut machine = make_machine(vec![0; 4096], None);
        assert!(!machine.can_step(StepType::Into));
        assert!(machine.step(StepType::Into).is_err());
    }

    #[test]
    fn hard_reset_restores_power_up_state() {
        let rom = {
            let mut rom = vec![0u8; 8192];
            rom[0x1000..0x2000].iter_mut().for_each(|b| *b = 1);
            rom
        };
        let mut machine = make_machine(rom, Some("F8"));
        let _ = machine.bus_mut().read(0x1FF9);
        machine.bus_mut().write(0x0080, 0xAA);
        assert_eq!(machine.bus_mut().read(0x1000), 1);

        machine.hard_reset();
        assert_eq!(machine.bus_mut().read(0x1000), 0);
        assert_eq!(machine.bus_mut().read(0x0080), 0);
    }

    #[test]
    fn rom_details_and_region_surface() {
        let machine = make_machine(vec![0; 2048], None);
        assert!(machine.rom_details().contains("SHA1:0000"));
        assert!(machine.rom_details().contains("2048 bytes"));
        assert_eq!(machine.region(), DisplayType::Ntsc);
    }

    #[test]
    fn cpu_clock_derives_from_the_crystal() {
        let machine = make_machine(vec![0; 4096], None);
        assert_eq!(machine.cpu_clock_hz(), 3_579_545 / 3);
    }
}
