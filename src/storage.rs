//! Storage type inference for signals.
//!
//! Every signal is assigned the C-compatible type a code generator would use to
//! hold its raw value. The rules are:
//!
//! - a 1-bit signal is always `bool`, regardless of signedness;
//! - any other signal gets the smallest 8/16/32/64-bit integer that holds its
//!   bit length, signed if the signal is signed;
//! - a `SIG_VALTYPE_` directive with code `1` or `2` forces `float` or `double`,
//!   whatever the bit length.

/// Type used to store a signal's raw value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StorageType {
    /// Single-bit flag
    Bool,
    /// Unsigned 8-bit integer
    U8,
    /// Unsigned 16-bit integer
    U16,
    /// Unsigned 32-bit integer
    U32,
    /// Unsigned 64-bit integer
    U64,
    /// Signed 8-bit integer
    I8,
    /// Signed 16-bit integer
    I16,
    /// Signed 32-bit integer
    I32,
    /// Signed 64-bit integer
    I64,
    /// IEEE-754 single precision
    Float,
    /// IEEE-754 double precision
    Double,
}

impl StorageType {
    /// Infers the storage type for an integer signal of the given width.
    ///
    /// `bit_length` is expected to be in `1..=64`; wider values map to the
    /// 64-bit types.
    pub const fn infer(bit_length: u16, is_signed: bool) -> Self {
        match (bit_length, is_signed) {
            (0..=1, _) => StorageType::Bool,
            (2..=8, false) => StorageType::U8,
            (9..=16, false) => StorageType::U16,
            (17..=32, false) => StorageType::U32,
            (_, false) => StorageType::U64,
            (2..=8, true) => StorageType::I8,
            (9..=16, true) => StorageType::I16,
            (17..=32, true) => StorageType::I32,
            (_, true) => StorageType::I64,
        }
    }

    /// Maps a `SIG_VALTYPE_` code to the type it forces.
    ///
    /// Returns `None` for codes that leave the inferred type unchanged.
    pub fn from_value_type_code(code: &str) -> Option<Self> {
        match code {
            "1" => Some(StorageType::Float),
            "2" => Some(StorageType::Double),
            _ => None,
        }
    }

    /// Width of the storage type in bits.
    pub const fn bits(self) -> u16 {
        match self {
            StorageType::Bool | StorageType::U8 | StorageType::I8 => 8,
            StorageType::U16 | StorageType::I16 => 16,
            StorageType::U32 | StorageType::I32 | StorageType::Float => 32,
            StorageType::U64 | StorageType::I64 | StorageType::Double => 64,
        }
    }

    /// Returns true for `float` and `double`.
    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, StorageType::Float | StorageType::Double)
    }

    /// Returns true for the signed integer types.
    #[inline]
    pub const fn is_signed_integer(self) -> bool {
        matches!(
            self,
            StorageType::I8 | StorageType::I16 | StorageType::I32 | StorageType::I64
        )
    }

    /// C spelling of the type, as used by generated headers.
    pub const fn c_type(self) -> &'static str {
        match self {
            StorageType::Bool => "bool",
            StorageType::U8 => "uint8_t",
            StorageType::U16 => "uint16_t",
            StorageType::U32 => "uint32_t",
            StorageType::U64 => "uint64_t",
            StorageType::I8 => "int8_t",
            StorageType::I16 => "int16_t",
            StorageType::I32 => "int32_t",
            StorageType::I64 => "int64_t",
            StorageType::Float => "float",
            StorageType::Double => "double",
        }
    }
}

impl core::fmt::Display for StorageType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.c_type())
    }
}

/// Number of bytes needed to hold `bit_length` bits.
#[inline]
pub const fn bytes_for_bits(bit_length: u32) -> u32 {
    bit_length.div_ceil(8)
}
