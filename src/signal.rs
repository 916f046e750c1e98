//! Signal definitions.

use alloc::string::String;
use alloc::vec::Vec;

use crate::storage::{StorageType, bytes_for_bits};

/// Byte order of a signal within the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ByteOrder {
    /// Little-endian (Intel) byte order, `@1` in DBC notation
    LittleEndian,
    /// Big-endian (Motorola) byte order, `@0` in DBC notation
    BigEndian,
}

impl ByteOrder {
    /// Parses the DBC endianness character.
    pub fn from_dbc_char(c: char) -> Option<Self> {
        match c {
            '1' => Some(ByteOrder::LittleEndian),
            '0' => Some(ByteOrder::BigEndian),
            _ => None,
        }
    }
}

/// A named, bit-addressed field within a message payload.
///
/// Signals are owned by exactly one [`Message`](crate::Message). The storage type
/// is inferred from bit length and signedness when the signal is created and can
/// only be changed afterwards by a `SIG_VALTYPE_` override while the owning bus is
/// being parsed.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Signal {
    name: String,
    start_bit: u16,
    bit_length: u16,
    byte_order: ByteOrder,
    is_signed: bool,
    scale: f64,
    offset: f64,
    min: f64,
    max: f64,
    unit: String,
    receivers: Vec<String>,
    storage: StorageType,
}

/// Magnitude from which a raw value cannot fit any signal (2^65).
const RAW_LIMIT: f64 = 36_893_488_147_419_103_232.0;

impl Signal {
    /// Create a new unsigned little-endian signal with identity scaling.
    pub fn new(name: &str, start_bit: u16, bit_length: u16) -> Self {
        Self {
            name: String::from(name),
            start_bit,
            bit_length,
            byte_order: ByteOrder::LittleEndian,
            is_signed: false,
            scale: 1.0,
            offset: 0.0,
            min: 0.0,
            max: 0.0,
            unit: String::new(),
            receivers: Vec::new(),
            storage: StorageType::infer(bit_length, false),
        }
    }

    /// Set the scale factor.
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Set the offset.
    pub fn with_offset(mut self, offset: f64) -> Self {
        self.offset = offset;
        self
    }

    /// Set the physical range.
    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    /// Mark the signal as signed and re-infer its storage type.
    pub fn signed(mut self) -> Self {
        self.is_signed = true;
        self.storage = StorageType::infer(self.bit_length, true);
        self
    }

    /// Set the byte order to big-endian (Motorola).
    pub fn big_endian(mut self) -> Self {
        self.byte_order = ByteOrder::BigEndian;
        self
    }

    /// Set the unit string.
    pub fn with_unit(mut self, unit: &str) -> Self {
        self.unit = String::from(unit);
        self
    }

    /// Set the receiving nodes.
    pub fn with_receivers(mut self, receivers: Vec<String>) -> Self {
        self.receivers = receivers;
        self
    }

    /// Force a storage type, as a `SIG_VALTYPE_` directive does.
    pub fn with_storage(mut self, storage: StorageType) -> Self {
        self.storage = storage;
        self
    }

    pub(crate) fn set_storage(&mut self, storage: StorageType) {
        self.storage = storage;
    }

    /// Signal name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start bit as written in the DBC file.
    ///
    /// For little-endian signals this is the least significant bit, for
    /// big-endian signals the most significant bit (sawtooth numbering).
    pub fn start_bit(&self) -> u16 {
        self.start_bit
    }

    /// Number of bits.
    pub fn bit_length(&self) -> u16 {
        self.bit_length
    }

    /// Number of bytes needed to hold the raw value.
    pub fn byte_length(&self) -> u32 {
        bytes_for_bits(self.bit_length as u32)
    }

    /// Byte order.
    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Returns true for little-endian (Intel) signals.
    pub fn is_little_endian(&self) -> bool {
        self.byte_order == ByteOrder::LittleEndian
    }

    /// Returns true if the raw value is a two's complement integer.
    pub fn is_signed(&self) -> bool {
        self.is_signed
    }

    /// Scale factor: `physical = raw * scale + offset`.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Offset: `physical = raw * scale + offset`.
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Physical minimum.
    pub fn min(&self) -> f64 {
        self.min
    }

    /// Physical maximum.
    pub fn max(&self) -> f64 {
        self.max
    }

    /// Unit string, empty if none.
    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Receiving nodes.
    pub fn receivers(&self) -> &[String] {
        &self.receivers
    }

    /// Storage type used for the raw value.
    pub fn storage(&self) -> StorageType {
        self.storage
    }

    /// Check if this is an identity conversion (scale=1, offset=0).
    pub fn is_identity(&self) -> bool {
        self.scale == 1.0 && self.offset == 0.0
    }

    /// Convert a raw value to its physical value.
    #[inline]
    pub fn raw_to_physical(&self, raw: f64) -> f64 {
        raw * self.scale + self.offset
    }

    /// Apply the inverse of scale and offset without rounding.
    #[inline]
    pub fn unscale(&self, physical: f64) -> f64 {
        if self.is_identity() {
            physical
        } else {
            (physical - self.offset) / self.scale
        }
    }

    /// Convert a physical value to the nearest raw integer value.
    ///
    /// Returns `None` for non-finite results and for values beyond the range
    /// of any 64-bit signal. Whether the value fits this signal's bit width is
    /// left to the caller.
    #[inline]
    pub fn physical_to_raw(&self, physical: f64) -> Option<i128> {
        let raw = self.unscale(physical);
        if !raw.is_finite() {
            return None;
        }
        // Round half away from zero (no_std compatible)
        let rounded = if raw >= 0.0 { raw + 0.5 } else { raw - 0.5 };
        if !(-RAW_LIMIT < rounded && rounded < RAW_LIMIT) {
            return None;
        }
        Some(rounded as i128)
    }
}
