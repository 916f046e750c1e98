//! Bit-level signal packing.
//!
//! Little-endian (Intel) signals start at their least significant bit and grow
//! towards higher bit positions. Big-endian (Motorola) signals use the DBC
//! sawtooth numbering: the start bit is the most significant bit, and the field
//! continues downwards in the same byte, then from bit 7 of the next byte.
//!
//! Bit `n` of the payload is bit `n % 8` of byte `n / 8`.

use crate::signal::{ByteOrder, Signal};

/// Mask covering the low `bit_length` bits.
#[inline]
pub const fn mask(bit_length: u16) -> u64 {
    if bit_length >= 64 {
        u64::MAX
    } else {
        (1u64 << bit_length) - 1
    }
}

/// Number of payload bytes a field needs, counted from byte 0.
pub const fn span_bytes(start_bit: u16, bit_length: u16, byte_order: ByteOrder) -> usize {
    let start_byte = (start_bit / 8) as usize;
    match byte_order {
        ByteOrder::LittleEndian => (start_bit as usize + bit_length as usize).div_ceil(8),
        ByteOrder::BigEndian => {
            let in_first_byte = (start_bit % 8) as usize + 1;
            let bit_length = bit_length as usize;
            if bit_length <= in_first_byte {
                start_byte + 1
            } else {
                start_byte + 1 + (bit_length - in_first_byte).div_ceil(8)
            }
        }
    }
}

/// Number of payload bytes a signal needs.
#[inline]
pub fn bytes_spanned(signal: &Signal) -> usize {
    span_bytes(signal.start_bit(), signal.bit_length(), signal.byte_order())
}

/// One past the last payload bit a signal occupies.
///
/// For big-endian signals this is the end of the byte holding the least
/// significant bit.
pub fn end_bit(signal: &Signal) -> usize {
    match signal.byte_order() {
        ByteOrder::LittleEndian => signal.start_bit() as usize + signal.bit_length() as usize,
        ByteOrder::BigEndian => bytes_spanned(signal) * 8,
    }
}

/// Extract a raw signal value from payload data.
///
/// Returns `None` if the field does not fit in `data` or the width is not in
/// `1..=64`.
#[inline]
pub fn extract_raw(data: &[u8], start_bit: u16, bit_length: u16, byte_order: ByteOrder) -> Option<u64> {
    if bit_length == 0 || bit_length > 64 || span_bytes(start_bit, bit_length, byte_order) > data.len() {
        return None;
    }

    Some(match byte_order {
        ByteOrder::LittleEndian => extract_le(data, start_bit, bit_length),
        ByteOrder::BigEndian => extract_be(data, start_bit, bit_length),
    })
}

/// Write the low `bit_length` bits of `raw` into payload data.
///
/// Bits outside the field are left untouched. Returns `None` if the field does
/// not fit in `data` or the width is not in `1..=64`.
#[inline]
pub fn insert_raw(
    data: &mut [u8],
    start_bit: u16,
    bit_length: u16,
    byte_order: ByteOrder,
    raw: u64,
) -> Option<()> {
    if bit_length == 0 || bit_length > 64 || span_bytes(start_bit, bit_length, byte_order) > data.len() {
        return None;
    }

    match byte_order {
        ByteOrder::LittleEndian => insert_le(data, start_bit, bit_length, raw),
        ByteOrder::BigEndian => insert_be(data, start_bit, bit_length, raw),
    }
    Some(())
}

/// Extract little-endian signal.
#[inline]
fn extract_le(data: &[u8], start_bit: u16, bit_length: u16) -> u64 {
    let start_byte = (start_bit / 8) as usize;
    let bit_offset = (start_bit % 8) as u32;
    let bytes_needed = (bit_offset as usize + bit_length as usize).div_ceil(8);

    // Up to 9 bytes for a 64-bit field at a non-zero bit offset.
    let mut value: u128 = 0;
    for i in 0..bytes_needed {
        value |= (data[start_byte + i] as u128) << (i * 8);
    }

    ((value >> bit_offset) as u64) & mask(bit_length)
}

#[inline]
fn insert_le(data: &mut [u8], start_bit: u16, bit_length: u16, raw: u64) {
    let start_byte = (start_bit / 8) as usize;
    let bit_offset = (start_bit % 8) as u32;
    let bytes_needed = (bit_offset as usize + bit_length as usize).div_ceil(8);

    let field = (mask(bit_length) as u128) << bit_offset;
    let value = ((raw & mask(bit_length)) as u128) << bit_offset;

    for i in 0..bytes_needed {
        let byte_mask = (field >> (i * 8)) as u8;
        let byte_value = (value >> (i * 8)) as u8;
        let byte = &mut data[start_byte + i];
        *byte = (*byte & !byte_mask) | (byte_value & byte_mask);
    }
}

/// Extract big-endian (Motorola) signal.
#[inline]
fn extract_be(data: &[u8], start_bit: u16, bit_length: u16) -> u64 {
    let mut value: u64 = 0;
    let mut bits_remaining = bit_length;
    let mut current_byte = (start_bit / 8) as usize;
    let mut current_bit = start_bit % 8;

    while bits_remaining > 0 {
        let bits_to_take = (current_bit + 1).min(bits_remaining);
        let shift = current_bit + 1 - bits_to_take;
        let byte_value = (data[current_byte] >> shift) & (mask(bits_to_take) as u8);

        value = (value << bits_to_take) | byte_value as u64;
        bits_remaining -= bits_to_take;
        current_byte += 1;
        current_bit = 7;
    }

    value
}

#[inline]
fn insert_be(data: &mut [u8], start_bit: u16, bit_length: u16, raw: u64) {
    let raw = raw & mask(bit_length);
    let mut bits_remaining = bit_length;
    let mut current_byte = (start_bit / 8) as usize;
    let mut current_bit = start_bit % 8;

    while bits_remaining > 0 {
        let bits_to_take = (current_bit + 1).min(bits_remaining);
        let shift = current_bit + 1 - bits_to_take;
        let chunk = ((raw >> (bits_remaining - bits_to_take)) & mask(bits_to_take)) as u8;
        let byte_mask = (mask(bits_to_take) as u8) << shift;

        let byte = &mut data[current_byte];
        *byte = (*byte & !byte_mask) | ((chunk << shift) & byte_mask);

        bits_remaining -= bits_to_take;
        current_byte += 1;
        current_bit = 7;
    }
}

/// Convert a raw signal value to a signed integer.
#[inline]
pub fn sign_extend(value: u64, bit_length: u16) -> i64 {
    if bit_length == 0 || bit_length >= 64 {
        return value as i64;
    }
    let sign_bit = 1u64 << (bit_length - 1);
    if value & sign_bit != 0 {
        (value | !mask(bit_length)) as i64
    } else {
        value as i64
    }
}

/// Returns true if `value` is representable as a `bit_length`-bit two's complement integer.
#[inline]
pub fn fits_signed(value: i64, bit_length: u16) -> bool {
    if bit_length >= 64 {
        return true;
    }
    let min = -(1i64 << (bit_length - 1));
    let max = (1i64 << (bit_length - 1)) - 1;
    (min..=max).contains(&value)
}

/// Returns true if `value` is representable in `bit_length` unsigned bits.
#[inline]
pub fn fits_unsigned(value: u64, bit_length: u16) -> bool {
    value <= mask(bit_length)
}
