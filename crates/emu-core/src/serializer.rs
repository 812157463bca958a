//! Binary state synchronization.
//!
//! Save and load share one code path: every stateful component implements
//! a `sync_state` routine that pushes its mutable fields through a
//! [`Serializer`] bound to either a byte sink (save) or a byte source
//! (load). The stream is flat and position-dependent — no field names, no
//! type tags — so the ordering and typing of sync calls during save must
//! exactly match the ordering during load. Arrays carry a 32-bit element
//! count; nothing else has per-field overhead.

use std::io::{self, Read, Write};

/// A single-bit hardware flag, stored as a full byte on the wire.
///
/// Thin wrapper so latch fields read as bits in state structs while
/// serializing identically to `bool`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bit(pub bool);

impl Bit {
    #[must_use]
    pub const fn get(self) -> bool {
        self.0
    }
}

impl From<bool> for Bit {
    fn from(v: bool) -> Self {
        Self(v)
    }
}

impl From<Bit> for bool {
    fn from(v: Bit) -> Self {
        v.0
    }
}

/// Enum-like closed-integer types that cross the wire as an `i32`
/// discriminant.
///
/// The bound on [`Serializer::sync_enum`] makes syncing a non-enum type a
/// compile error, so the contract violation is reported immediately
/// rather than silently coerced. A discriminant read back from a stream
/// that maps to no variant is an immediate `InvalidData` error.
pub trait SyncEnum: Copy {
    /// Wire discriminant for this value.
    fn to_discriminant(self) -> i32;

    /// Value for a wire discriminant, or `None` if it maps to no variant.
    fn from_discriminant(raw: i32) -> Option<Self>
    where
        Self: Sized;
}

enum Mode<'a> {
    Write(&'a mut dyn Write),
    Read(&'a mut dyn Read),
}

/// Symmetric binary field synchronizer.
///
/// Bound to exactly one direction for its lifetime. In write mode every
/// sync call serializes the current value of its argument
/// unconditionally; in read mode every sync call overwrites its argument
/// from the stream. Each field call is atomic: a failed call leaves its
/// argument untouched.
///
/// Reading past the end of the source is fatal — the underlying I/O error
/// (`UnexpectedEof`) propagates immediately.
pub struct Serializer<'a> {
    mode: Mode<'a>,
}

macro_rules! sync_scalar {
    ($fn_name:ident, $ty:ty) => {
        pub fn $fn_name(&mut self, _name: &str, val: &mut $ty) -> io::Result<()> {
            match &mut self.mode {
                Mode::Write(w) => w.write_all(&val.to_le_bytes()),
                Mode::Read(r) => {
                    let mut buf = [0u8; std::mem::size_of::<$ty>()];
                    r.read_exact(&mut buf)?;
                    *val = <$ty>::from_le_bytes(buf);
                    Ok(())
                }
            }
        }
    };
}

macro_rules! sync_array {
    ($arr_fn:ident, $opt_fn:ident, $ty:ty) => {
        /// Length-prefixed array sync with present-but-empty semantics: a
        /// zero count reads back as an empty vector.
        pub fn $arr_fn(&mut self, _name: &str, val: &mut Vec<$ty>) -> io::Result<()> {
            match &mut self.mode {
                Mode::Write(w) => {
                    w.write_all(&(val.len() as u32).to_le_bytes())?;
                    for v in val.iter() {
                        w.write_all(&v.to_le_bytes())?;
                    }
                    Ok(())
                }
                Mode::Read(r) => {
                    let len = read_len(r)?;
                    if val.len() != len {
                        *val = vec![<$ty>::default(); len];
                    }
                    for v in val.iter_mut() {
                        let mut buf = [0u8; std::mem::size_of::<$ty>()];
                        r.read_exact(&mut buf)?;
                        *v = <$ty>::from_le_bytes(buf);
                    }
                    Ok(())
                }
            }
        }

        /// Length-prefixed array sync with null semantics: a zero count
        /// reads back as `None`, and `None` writes a zero count.
        pub fn $opt_fn(&mut self, name: &str, val: &mut Option<Vec<$ty>>) -> io::Result<()> {
            if self.is_reader() {
                let mut inner = val.take().unwrap_or_default();
                self.$arr_fn(name, &mut inner)?;
                *val = if inner.is_empty() { None } else { Some(inner) };
                Ok(())
            } else {
                match val {
                    Some(data) => self.$arr_fn(name, data),
                    None => self.$arr_fn(name, &mut Vec::new()),
                }
            }
        }
    };
}

fn read_len(r: &mut dyn Read) -> io::Result<usize> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf) as usize)
}

impl<'a> Serializer<'a> {
    /// Create a write-mode serializer wrapping a byte sink.
    pub fn new_writer(sink: &'a mut dyn Write) -> Self {
        Self {
            mode: Mode::Write(sink),
        }
    }

    /// Create a read-mode serializer wrapping a byte source.
    pub fn new_reader(source: &'a mut dyn Read) -> Self {
        Self {
            mode: Mode::Read(source),
        }
    }

    #[must_use]
    pub fn is_reader(&self) -> bool {
        matches!(self.mode, Mode::Read(_))
    }

    #[must_use]
    pub fn is_writer(&self) -> bool {
        !self.is_reader()
    }

    /// Named section boundary. Inert in the current format — retained as
    /// a hook for future format versioning. The default stream must stay
    /// flat and position-dependent.
    pub fn begin_section(&mut self, _name: &str) {}

    /// Closes the most recent [`begin_section`](Self::begin_section).
    /// Inert, like its counterpart.
    pub fn end_section(&mut self) {}

    sync_scalar!(sync_u8, u8);
    sync_scalar!(sync_i8, i8);
    sync_scalar!(sync_u16, u16);
    sync_scalar!(sync_i16, i16);
    sync_scalar!(sync_u32, u32);
    sync_scalar!(sync_i32, i32);
    sync_scalar!(sync_u64, u64);
    sync_scalar!(sync_i64, i64);
    sync_scalar!(sync_f32, f32);
    sync_scalar!(sync_f64, f64);

    /// One byte on the wire: 0 or 1.
    pub fn sync_bool(&mut self, name: &str, val: &mut bool) -> io::Result<()> {
        let mut b = u8::from(*val);
        self.sync_u8(name, &mut b)?;
        if self.is_reader() {
            *val = b != 0;
        }
        Ok(())
    }

    /// A [`Bit`] flag: one byte on the wire, like `bool`.
    pub fn sync_bit(&mut self, name: &str, val: &mut Bit) -> io::Result<()> {
        let mut b = val.0;
        self.sync_bool(name, &mut b)?;
        if self.is_reader() {
            val.0 = b;
        }
        Ok(())
    }

    /// Sync an enum through its `i32` discriminant.
    pub fn sync_enum<T: SyncEnum>(&mut self, name: &str, val: &mut T) -> io::Result<()> {
        let mut raw = val.to_discriminant();
        self.sync_i32(name, &mut raw)?;
        if self.is_reader() {
            *val = T::from_discriminant(raw).ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("{name}: discriminant {raw} maps to no variant"),
                )
            })?;
        }
        Ok(())
    }

    /// Byte array with present-but-empty semantics. On read, the
    /// destination is reused in place when its length already matches;
    /// otherwise it is reallocated to the length read.
    pub fn sync_u8_arr(&mut self, _name: &str, val: &mut Vec<u8>) -> io::Result<()> {
        match &mut self.mode {
            Mode::Write(w) => {
                w.write_all(&(val.len() as u32).to_le_bytes())?;
                w.write_all(val)
            }
            Mode::Read(r) => {
                let len = read_len(r)?;
                if val.len() != len {
                    *val = vec![0; len];
                }
                r.read_exact(val)
            }
        }
    }

    /// Byte array with null semantics: zero count reads back as `None`.
    pub fn sync_u8_arr_opt(&mut self, name: &str, val: &mut Option<Vec<u8>>) -> io::Result<()> {
        if self.is_reader() {
            let mut inner = val.take().unwrap_or_default();
            self.sync_u8_arr(name, &mut inner)?;
            *val = if inner.is_empty() { None } else { Some(inner) };
            Ok(())
        } else {
            match val {
                Some(data) => self.sync_u8_arr(name, data),
                None => self.sync_u8_arr(name, &mut Vec::new()),
            }
        }
    }

    /// Bool array, one byte per element, present-but-empty semantics.
    pub fn sync_bool_arr(&mut self, _name: &str, val: &mut Vec<bool>) -> io::Result<()> {
        match &mut self.mode {
            Mode::Write(w) => {
                w.write_all(&(val.len() as u32).to_le_bytes())?;
                for v in val.iter() {
                    w.write_all(&[u8::from(*v)])?;
                }
                Ok(())
            }
            Mode::Read(r) => {
                let len = read_len(r)?;
                if val.len() != len {
                    *val = vec![false; len];
                }
                for v in val.iter_mut() {
                    let mut b = [0u8; 1];
                    r.read_exact(&mut b)?;
                    *v = b[0] != 0;
                }
                Ok(())
            }
        }
    }

    /// Bool array with null semantics.
    pub fn sync_bool_arr_opt(
        &mut self,
        name: &str,
        val: &mut Option<Vec<bool>>,
    ) -> io::Result<()> {
        if self.is_reader() {
            let mut inner = val.take().unwrap_or_default();
            self.sync_bool_arr(name, &mut inner)?;
            *val = if inner.is_empty() { None } else { Some(inner) };
            Ok(())
        } else {
            match val {
                Some(data) => self.sync_bool_arr(name, data),
                None => self.sync_bool_arr(name, &mut Vec::new()),
            }
        }
    }

    sync_array!(sync_i16_arr, sync_i16_arr_opt, i16);
    sync_array!(sync_u16_arr, sync_u16_arr_opt, u16);
    sync_array!(sync_i32_arr, sync_i32_arr_opt, i32);
    sync_array!(sync_u32_arr, sync_u32_arr_opt, u32);
    sync_array!(sync_f32_arr, sync_f32_arr_opt, f32);
    sync_array!(sync_f64_arr, sync_f64_arr_opt, f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum TvType {
        Color,
        BlackWhite,
    }

    impl SyncEnum for TvType {
        fn to_discriminant(self) -> i32 {
            match self {
                TvType::Color => 0,
                TvType::BlackWhite => 1,
            }
        }

        fn from_discriminant(raw: i32) -> Option<Self> {
            match raw {
                0 => Some(TvType::Color),
                1 => Some(TvType::BlackWhite),
                _ => None,
            }
        }
    }

    #[test]
    fn direction_is_fixed_and_queryable() {
        let mut sink = Vec::new();
        let ser = Serializer::new_writer(&mut sink);
        assert!(ser.is_writer());
        assert!(!ser.is_reader());

        let mut source = &[0u8][..];
        let ser = Serializer::new_reader(&mut source);
        assert!(ser.is_reader());
    }

    #[test]
    fn scalar_round_trip() {
        let mut buf = Vec::new();
        {
            let mut ser = Serializer::new_writer(&mut buf);
            let mut a = 0xABu8;
            let mut b = -1234i16;
            let mut c = 0xDEAD_BEEFu32;
            let mut d = -5_000_000_000i64;
            let mut e = 0.25f64;
            let mut f = true;
            ser.sync_u8("a", &mut a).unwrap();
            ser.sync_i16("b", &mut b).unwrap();
            ser.sync_u32("c", &mut c).unwrap();
            ser.sync_i64("d", &mut d).unwrap();
            ser.sync_f64("e", &mut e).unwrap();
            ser.sync_bool("f", &mut f).unwrap();
        }

        let mut src = buf.as_slice();
        let mut ser = Serializer::new_reader(&mut src);
        let (mut a, mut b, mut c, mut d, mut e, mut f) = (0u8, 0i16, 0u32, 0i64, 0.0f64, false);
        ser.sync_u8("a", &mut a).unwrap();
        ser.sync_i16("b", &mut b).unwrap();
        ser.sync_u32("c", &mut c).unwrap();
        ser.sync_i64("d", &mut d).unwrap();
        ser.sync_f64("e", &mut e).unwrap();
        ser.sync_bool("f", &mut f).unwrap();
        assert_eq!(
            (a, b, c, d, e, f),
            (0xAB, -1234, 0xDEAD_BEEF, -5_000_000_000, 0.25, true)
        );
    }

    #[test]
    fn bit_packs_as_one_byte() {
        let mut buf = Vec::new();
        {
            let mut ser = Serializer::new_writer(&mut buf);
            ser.sync_bit("flag", &mut Bit(true)).unwrap();
        }
        assert_eq!(buf, vec![1]);

        let mut src = buf.as_slice();
        let mut ser = Serializer::new_reader(&mut src);
        let mut flag = Bit(false);
        ser.sync_bit("flag", &mut flag).unwrap();
        assert!(flag.get());
    }

    #[test]
    fn sections_add_no_stream_bytes() {
        let mut buf = Vec::new();
        let mut ser = Serializer::new_writer(&mut buf);
        ser.begin_section("outer");
        let mut v = 7u8;
        ser.sync_u8("v", &mut v).unwrap();
        ser.end_section();
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn enum_round_trip_and_bad_discriminant() {
        let mut buf = Vec::new();
        {
            let mut ser = Serializer::new_writer(&mut buf);
            ser.sync_enum("tv", &mut TvType::BlackWhite).unwrap();
        }
        let mut src = buf.as_slice();
        let mut ser = Serializer::new_reader(&mut src);
        let mut tv = TvType::Color;
        ser.sync_enum("tv", &mut tv).unwrap();
        assert_eq!(tv, TvType::BlackWhite);

        // Discriminant 9 maps to no variant.
        let bad = 9i32.to_le_bytes();
        let mut src = bad.as_slice();
        let mut ser = Serializer::new_reader(&mut src);
        let err = ser.sync_enum("tv", &mut tv).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn array_reused_in_place_when_length_matches() {
        let mut buf = Vec::new();
        {
            let mut ser = Serializer::new_writer(&mut buf);
            ser.sync_u8_arr("ram", &mut vec![1, 2, 3, 4]).unwrap();
        }

        let mut dest = vec![0u8; 4];
        let ptr = dest.as_ptr();
        let mut src = buf.as_slice();
        let mut ser = Serializer::new_reader(&mut src);
        ser.sync_u8_arr("ram", &mut dest).unwrap();
        assert_eq!(dest, vec![1, 2, 3, 4]);
        assert_eq!(dest.as_ptr(), ptr, "matching length must not reallocate");

        // Mismatched length reallocates to the length read.
        let mut dest = vec![0u8; 2];
        let mut src = buf.as_slice();
        let mut ser = Serializer::new_reader(&mut src);
        ser.sync_u8_arr("ram", &mut dest).unwrap();
        assert_eq!(dest.len(), 4);
    }

    #[test]
    fn empty_array_null_vs_present() {
        // Written as null (absent).
        let mut buf = Vec::new();
        {
            let mut ser = Serializer::new_writer(&mut buf);
            ser.sync_u8_arr_opt("aux", &mut None).unwrap();
        }
        assert_eq!(buf, 0u32.to_le_bytes());

        // Read back with null semantics: absent.
        let mut src = buf.as_slice();
        let mut ser = Serializer::new_reader(&mut src);
        let mut dest = Some(vec![9u8; 3]);
        ser.sync_u8_arr_opt("aux", &mut dest).unwrap();
        assert_eq!(dest, None);

        // Same bytes read back without null semantics: present but empty.
        let mut src = buf.as_slice();
        let mut ser = Serializer::new_reader(&mut src);
        let mut dest = vec![9u8; 3];
        ser.sync_u8_arr("aux", &mut dest).unwrap();
        assert!(dest.is_empty());
    }

    #[test]
    fn wide_element_array_round_trip() {
        let mut buf = Vec::new();
        {
            let mut ser = Serializer::new_writer(&mut buf);
            ser.sync_u16_arr("regs", &mut vec![0x1234, 0xFFFF]).unwrap();
            ser.sync_f32_arr("levels", &mut vec![0.5, -0.5]).unwrap();
        }
        // 4-byte count + 2x2 bytes, then 4-byte count + 2x4 bytes.
        assert_eq!(buf.len(), 4 + 4 + 4 + 8);

        let mut src = buf.as_slice();
        let mut ser = Serializer::new_reader(&mut src);
        let mut regs = Vec::new();
        let mut levels = Vec::new();
        ser.sync_u16_arr("regs", &mut regs).unwrap();
        ser.sync_f32_arr("levels", &mut levels).unwrap();
        assert_eq!(regs, vec![0x1234, 0xFFFF]);
        assert_eq!(levels, vec![0.5, -0.5]);
    }

    #[test]
    fn read_past_end_is_fatal() {
        let mut src = &[0xAAu8][..];
        let mut ser = Serializer::new_reader(&mut src);
        let mut v = 0u32;
        let err = ser.sync_u32("v", &mut v).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        // The argument is untouched by the failed call.
        assert_eq!(v, 0);
    }
}
