//! RIOT (6532) I/O port and interval timer model.
//!
//! The 128 bytes of RAM the real chip carries are owned by the console
//! region, not by this model — this is the register half: two 8-bit
//! ports with data-direction control, and the interval timer with its
//! 1/8/64/1024 prescalers.
//!
//! Timer model: writing `TIMxT` loads `value << shift` into a countdown
//! counter that decrements every CPU cycle. While the counter is
//! non-negative, `INTIM` reads `counter >> shift`; once it passes zero
//! the underflow flag latches and `INTIM` counts down once per cycle
//! (`counter & 0xFF`). A live read of `INTIM` clears the latched flag;
//! a peek does not.

use std::io;

use emu_core::{Serializer, Tickable};

/// Prescaler shifts for TIM1T, TIM8T, TIM64T, T1024T.
const INTERVAL_SHIFTS: [u8; 4] = [0, 3, 6, 10];

/// RIOT register file and interval timer.
pub struct Riot {
    ddra: u8,
    ddrb: u8,
    /// Output latches, driven onto port pins where the direction
    /// register marks them as outputs.
    outa: u8,
    outb: u8,
    /// Input pin state, latched from the controller deck and console
    /// switches at the start of each frame.
    porta: u8,
    portb: u8,
    interval_shift: u8,
    /// Countdown in CPU cycles; negative after underflow.
    timer: i64,
    /// Latched when the timer passes zero; cleared by a live INTIM read
    /// or a timer write.
    irq_flag: bool,
    underflowed: bool,
}

impl Riot {
    #[must_use]
    pub fn new() -> Self {
        Self {
            ddra: 0,
            ddrb: 0,
            outa: 0,
            outb: 0,
            porta: 0xFF,
            portb: 0,
            interval_shift: 10,
            // Power-up timer value is undefined on real silicon; a fixed
            // nonzero interval keeps emulation deterministic.
            timer: 1024,
            irq_flag: false,
            underflowed: false,
        }
    }

    /// Latch the port pins for the coming frame.
    pub fn set_ports(&mut self, porta: u8, portb: u8) {
        self.porta = porta;
        self.portb = portb;
    }

    /// Live register read (`addr` is the register select, A0-A2).
    ///
    /// Reading INTIM clears the latched underflow flag — use
    /// [`peek`](Self::peek) to observe without that.
    pub fn read(&mut self, addr: u16) -> u8 {
        let value = self.peek(addr);
        if addr & 0x05 == 0x04 {
            // INTIM (0x04/0x06)
            self.irq_flag = false;
        }
        value
    }

    /// Register read without side effects.
    #[must_use]
    pub fn peek(&self, addr: u16) -> u8 {
        match addr & 0x07 {
            0x00 => (self.porta & !self.ddra) | (self.outa & self.ddra),
            0x01 => self.ddra,
            0x02 => (self.portb & !self.ddrb) | (self.outb & self.ddrb),
            0x03 => self.ddrb,
            0x04 | 0x06 => self.intim(),
            // TIMINT: bit 7 = timer flag. Bit 6 (PA7 edge detect) is not
            // modelled.
            0x05 | 0x07 => {
                if self.irq_flag {
                    0x80
                } else {
                    0x00
                }
            }
            _ => 0,
        }
    }

    /// Register write. `addr` carries A0-A4: A4 high with A2 high selects
    /// the timer, A2 high alone the (unmodelled) edge-detect control.
    pub fn write(&mut self, addr: u16, value: u8) {
        if addr & 0x14 == 0x14 {
            self.interval_shift = INTERVAL_SHIFTS[(addr & 0x03) as usize];
            self.timer = i64::from(value) << self.interval_shift;
            self.irq_flag = false;
            self.underflowed = false;
        } else if addr & 0x04 == 0 {
            match addr & 0x03 {
                0x00 => self.outa = value,
                0x01 => self.ddra = value,
                0x02 => self.outb = value,
                0x03 => self.ddrb = value,
                _ => {}
            }
        }
    }

    fn intim(&self) -> u8 {
        if self.underflowed {
            (self.timer & 0xFF) as u8
        } else {
            (self.timer >> self.interval_shift) as u8
        }
    }

    pub fn hard_reset(&mut self) {
        *self = Self::new();
    }

    pub fn sync_state(&mut self, ser: &mut Serializer<'_>) -> io::Result<()> {
        ser.begin_section("RIOT");
        ser.sync_u8("ddra", &mut self.ddra)?;
        ser.sync_u8("ddrb", &mut self.ddrb)?;
        ser.sync_u8("outa", &mut self.outa)?;
        ser.sync_u8("outb", &mut self.outb)?;
        ser.sync_u8("porta", &mut self.porta)?;
        ser.sync_u8("portb", &mut self.portb)?;
        ser.sync_u8("interval_shift", &mut self.interval_shift)?;
        ser.sync_i64("timer", &mut self.timer)?;
        ser.sync_bool("irq_flag", &mut self.irq_flag)?;
        ser.sync_bool("underflowed", &mut self.underflowed)?;
        ser.end_section();
        Ok(())
    }
}

impl Default for Riot {
    fn default() -> Self {
        Self::new()
    }
}

impl Tickable for Riot {
    /// One CPU cycle.
    fn tick(&mut self) {
        self.timer -= 1;
        if self.timer == -1 {
            self.irq_flag = true;
            self.underflowed = true;
        }
    }
}
