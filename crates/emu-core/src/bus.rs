//! Memory bus interface.

/// Memory bus interface.
///
/// Components access memory and hardware registers through this trait.
/// The bus handles address decoding and routing to the appropriate
/// device; decode is total over the address range — mirroring and
/// masking absorb out-of-range bits, so there is no invalid address.
///
/// `read`/`write` are the live access path the CPU drives: they may
/// switch cartridge banks, clear timer flags, or trigger any other
/// effect the real hardware wires to an address strobe. `peek`/`poke`
/// are the diagnostic path: same values, none of the effects.
pub trait Bus {
    /// Read a byte, with whatever side effects the address carries.
    fn read(&mut self, address: u16) -> u8;

    /// Write a byte, with whatever side effects the address carries.
    fn write(&mut self, address: u16, value: u8);

    /// Observe the byte at an address without disturbing anything.
    ///
    /// For any address, `peek` returns the same value a `read` would
    /// have — it just skips the auxiliary state changes.
    fn peek(&self, address: u16) -> u8;

    /// Mutate exactly the addressed byte, and nothing else.
    fn poke(&mut self, address: u16, value: u8);
}
