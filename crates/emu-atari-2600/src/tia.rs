//! TIA register and frame-timing model.
//!
//! The full TIA (pixel and sound synthesis) lives outside this core; the
//! bus only needs the chip's register file, the input ports it exposes,
//! and the "new frame" signal the frame loop steps on. This model latches
//! every register write, answers the readable registers, and counts
//! color clocks: 228 per scanline, 262 scanlines per NTSC frame (312 for
//! PAL).
//!
//! WSYNC's RDY line belongs to the CPU model and is not wired here.

use std::io;

use emu_core::{Bit, DisplayType, Serializer, Tickable};

/// Color clocks per scanline.
const CLOCKS_PER_LINE: u16 = 228;

/// TIA register file and frame counter.
pub struct Tia {
    /// Write registers ($00-$3F), latched as written.
    regs: Vec<u8>,
    /// Fire button latches, true while pressed. INPT4/INPT5 read these
    /// as active-low port bits.
    inpt4_pressed: bool,
    inpt5_pressed: bool,
    clock_in_line: u16,
    scanline: u16,
    lines_per_frame: u16,
    new_frame: Bit,
}

impl Tia {
    #[must_use]
    pub fn new(region: DisplayType) -> Self {
        let lines_per_frame = match region {
            DisplayType::Ntsc => 262,
            DisplayType::Pal | DisplayType::Secam => 312,
        };
        Self {
            regs: vec![0; 0x40],
            inpt4_pressed: false,
            inpt5_pressed: false,
            clock_in_line: 0,
            scanline: 0,
            lines_per_frame,
            new_frame: Bit(false),
        }
    }

    /// Read a TIA register. Reads have no side effects on this chip, so
    /// the live and diagnostic paths share this.
    #[must_use]
    pub fn read(&self, addr: u16) -> u8 {
        match addr & 0x0F {
            // Collision latches: nothing collides in a register-only model.
            0x00..=0x07 => 0x00,
            // INPT0-INPT3: paddle pots, floating high with nothing plugged.
            0x08..=0x0B => 0x80,
            // INPT4/INPT5: fire buttons, active low.
            0x0C => {
                if self.inpt4_pressed {
                    0x00
                } else {
                    0x80
                }
            }
            0x0D => {
                if self.inpt5_pressed {
                    0x00
                } else {
                    0x80
                }
            }
            _ => 0x00,
        }
    }

    /// Latch a register write.
    pub fn write(&mut self, addr: u16, value: u8) {
        self.regs[(addr & 0x3F) as usize] = value;
    }

    /// Latched value of a write register (for observation).
    #[must_use]
    pub fn register(&self, index: usize) -> u8 {
        self.regs[index & 0x3F]
    }

    /// Latch the fire button lines for the coming frame.
    pub fn set_fire_buttons(&mut self, p1_pressed: bool, p2_pressed: bool) {
        self.inpt4_pressed = p1_pressed;
        self.inpt5_pressed = p2_pressed;
    }

    /// True once a full frame of color clocks has elapsed since the last
    /// [`clear_new_frame`](Self::clear_new_frame).
    #[must_use]
    pub fn new_frame(&self) -> bool {
        self.new_frame.get()
    }

    pub fn clear_new_frame(&mut self) {
        self.new_frame = Bit(false);
    }

    pub fn hard_reset(&mut self) {
        self.regs.fill(0);
        self.inpt4_pressed = false;
        self.inpt5_pressed = false;
        self.clock_in_line = 0;
        self.scanline = 0;
        self.new_frame = Bit(false);
    }

    pub fn sync_state(&mut self, ser: &mut Serializer<'_>) -> io::Result<()> {
        ser.begin_section("TIA");
        ser.sync_u8_arr("regs", &mut self.regs)?;
        ser.sync_bool("inpt4_pressed", &mut self.inpt4_pressed)?;
        ser.sync_bool("inpt5_pressed", &mut self.inpt5_pressed)?;
        ser.sync_u16("clock_in_line", &mut self.clock_in_line)?;
        ser.sync_u16("scanline", &mut self.scanline)?;
        ser.sync_bit("new_frame", &mut self.new_frame)?;
        ser.end_section();
        Ok(())
    }
}

impl Tickable for Tia {
    /// One color clock.
    fn tick(&mut self) {
        self.clock_in_line += 1;
        if self.clock_in_line == CLOCKS_PER_LINE {
            self.clock_in_line = 0;
            self.scanline += 1;
            if self.scanline == self.lines_per_frame {
                self.scanline = 0;
                self.new_frame = Bit(true);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emu_core::Ticks;

    #[test]
    fn frame_signal_after_one_ntsc_frame_of_clocks() {
        let mut tia = Tia::new(DisplayType::Ntsc);
        tia.tick_n(Ticks::new(u64::from(CLOCKS_PER_LINE) * 262 - 1));
        assert!(!tia.new_frame());
        tia.tick();
        assert!(tia.new_frame());

        tia.clear_new_frame();
        assert!(!tia.new_frame());
    }

    #[test]
    fn pal_frames_are_longer() {
        let mut tia = Tia::new(DisplayType::Pal);
        tia.tick_n(Ticks::new(u64::from(CLOCKS_PER_LINE) * 262));
        assert!(!tia.new_frame());
        tia.tick_n(Ticks::new(u64::from(CLOCKS_PER_LINE) * 50));
        assert!(tia.new_frame());
    }

    #[test]
    fn fire_buttons_read_active_low() {
        let mut tia = Tia::new(DisplayType::Ntsc);
        assert_eq!(tia.read(0x0C), 0x80);
        tia.set_fire_buttons(true, false);
        assert_eq!(tia.read(0x0C), 0x00);
        assert_eq!(tia.read(0x0D), 0x80);
    }

    #[test]
    fn writes_latch_and_reads_are_pure() {
        let mut tia = Tia::new(DisplayType::Ntsc);
        tia.write(0x02, 0xAB);
        assert_eq!(tia.register(0x02), 0xAB);
        // Reading any register twice gives the same answer.
        assert_eq!(tia.read(0x0C), tia.read(0x0C));
    }
}
