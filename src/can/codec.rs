use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use super::MAX_NODE_OFFSET;
use super::bits;
use super::fd::padded_len;
use crate::bus::Bus;
use crate::message::{MAX_EXTENDED_ID, MAX_STANDARD_ID, Message};
use crate::signal::Signal;
use crate::storage::StorageType;
use crate::{Error, Result};

/// A physical value supplied for one signal of an outbound frame.
///
/// Every value goes through the inverse of the signal's scale and offset.
/// For a `float` or `double` signal the result is packed as its IEEE-754 bit
/// pattern, whatever the variant. For an integer signal it is rounded half
/// away from zero and must fit the signal's bit width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SignalValue {
    /// A signed integral physical value
    Integer(i64),
    /// An unsigned integral physical value, for 64-bit signals above `i64::MAX`
    Unsigned(u64),
    /// A floating-point physical value
    Float(f64),
}

impl SignalValue {
    /// The value as a float.
    pub fn as_f64(self) -> f64 {
        match self {
            SignalValue::Integer(v) => v as f64,
            SignalValue::Unsigned(v) => v as f64,
            SignalValue::Float(v) => v,
        }
    }
}

macro_rules! impl_from_integer {
    ($($t:ty),*) => {
        $(
            impl From<$t> for SignalValue {
                fn from(value: $t) -> Self {
                    SignalValue::Integer(value as i64)
                }
            }
        )*
    };
}

impl_from_integer!(i8, i16, i32, i64, u8, u16, u32);

impl From<u64> for SignalValue {
    fn from(value: u64) -> Self {
        SignalValue::Unsigned(value)
    }
}

impl From<bool> for SignalValue {
    fn from(value: bool) -> Self {
        SignalValue::Integer(value as i64)
    }
}

impl From<f32> for SignalValue {
    fn from(value: f32) -> Self {
        SignalValue::Float(value as f64)
    }
}

impl From<f64> for SignalValue {
    fn from(value: f64) -> Self {
        SignalValue::Float(value)
    }
}

/// A signal decoded from a received payload.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DecodedSignal {
    /// Signal name
    pub name: String,
    /// The bit pattern as it appeared in the payload
    pub raw: u64,
    /// Physical value: raw interpreted per storage type, then scaled and offset
    pub value: f64,
}

/// A received frame matched against its message definition.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFrame<'a> {
    /// The matching message definition
    pub message: &'a Message,
    /// Offset of the sending node from the message's base id
    pub node_offset: u8,
    /// Decoded signals in definition order
    pub signals: Vec<DecodedSignal>,
}

impl ResolvedFrame<'_> {
    /// Look up a decoded signal by name.
    pub fn signal(&self, name: &str) -> Option<&DecodedSignal> {
        self.signals.iter().find(|s| s.name == name)
    }
}

/// An encoded outbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    /// Base id plus node offset
    pub arbitration_id: u32,
    /// True for a 29-bit identifier
    pub is_extended: bool,
    /// Payload, zero-padded to a valid frame length
    pub data: Vec<u8>,
}

impl EncodedFrame {
    /// Returns true if the payload needs a CAN FD frame.
    pub fn is_fd(&self) -> bool {
        self.data.len() > super::fd::MAX_CLASSIC_DATA_LEN
    }

    /// The identifier as an `embedded_can` id.
    #[cfg(feature = "can")]
    pub fn id(&self) -> Result<embedded_can::Id> {
        let id = if self.is_extended {
            embedded_can::ExtendedId::new(self.arbitration_id).map(embedded_can::Id::Extended)
        } else {
            u16::try_from(self.arbitration_id)
                .ok()
                .and_then(embedded_can::StandardId::new)
                .map(embedded_can::Id::Standard)
        };
        id.ok_or(Error::InvalidArbitrationId(self.arbitration_id))
    }
}

/// Raw numeric value of an `embedded_can` identifier.
#[cfg(feature = "can")]
pub(crate) fn raw_id(id: embedded_can::Id) -> u32 {
    match id {
        embedded_can::Id::Standard(id) => id.as_raw() as u32,
        embedded_can::Id::Extended(id) => id.as_raw(),
    }
}

/// Resolves and decodes received frames, and encodes outbound ones.
///
/// The codec only borrows the bus and keeps no state of its own, so one codec
/// can be shared between threads.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec<'a> {
    bus: &'a Bus,
}

impl<'a> FrameCodec<'a> {
    /// Create a codec for a parsed bus.
    pub fn new(bus: &'a Bus) -> Self {
        Self { bus }
    }

    /// The bus this codec works against.
    pub fn bus(&self) -> &'a Bus {
        self.bus
    }

    /// Find the message and node offset for an arbitration id.
    ///
    /// Offsets are tried from 0 upwards and the first base id that exists wins.
    pub fn resolve_id(&self, arbitration_id: u32) -> Option<(&'a Message, u8)> {
        (0..=MAX_NODE_OFFSET).find_map(|node_offset| {
            let base = arbitration_id.checked_sub(node_offset as u32)?;
            self.bus.message(base).map(|message| (message, node_offset))
        })
    }

    /// Resolve an arbitration id and decode the payload.
    pub fn resolve(&self, arbitration_id: u32, payload: &[u8]) -> Result<ResolvedFrame<'a>> {
        let (message, node_offset) = self
            .resolve_id(arbitration_id)
            .ok_or(Error::UnrecognizedFrame { arbitration_id })?;
        let signals = self.decode(message, payload)?;

        Ok(ResolvedFrame {
            message,
            node_offset,
            signals,
        })
    }

    /// Resolve and decode an `embedded_can` frame.
    #[cfg(feature = "can")]
    pub fn resolve_frame<F: embedded_can::Frame>(&self, frame: &F) -> Result<ResolvedFrame<'a>> {
        self.resolve(raw_id(frame.id()), frame.data())
    }

    /// Decode every signal of `message` from a payload.
    pub fn decode(&self, message: &Message, payload: &[u8]) -> Result<Vec<DecodedSignal>> {
        let expected = message.byte_length() as usize;
        if payload.len() < expected {
            return Err(Error::PayloadTooShort {
                message: String::from(message.name()),
                actual: payload.len(),
                expected,
            });
        }

        message
            .signals()
            .iter()
            .map(|signal| decode_signal(message, signal, payload))
            .collect()
    }

    /// Encode a frame for `message_name` as sent by the node at `node_offset`.
    ///
    /// Signals missing from `values` are packed as zero.
    pub fn encode(
        &self,
        message_name: &str,
        values: &[(&str, SignalValue)],
        node_offset: u8,
    ) -> Result<EncodedFrame> {
        let message = self
            .bus
            .message_by_name(message_name)
            .ok_or_else(|| Error::UnknownMessage(String::from(message_name)))?;
        if node_offset > MAX_NODE_OFFSET {
            return Err(Error::NodeOffsetOutOfRange(node_offset));
        }

        let arbitration_id = message.id() + node_offset as u32;
        let id_limit = if message.is_extended() {
            MAX_EXTENDED_ID
        } else {
            MAX_STANDARD_ID
        };
        if arbitration_id > id_limit {
            return Err(Error::InvalidArbitrationId(arbitration_id));
        }

        // Parsing keeps every signal and the declared length within 64 bytes.
        let length = padded_len(message.frame_length()).unwrap_or(super::fd::MAX_FD_DATA_LEN);
        let mut data = vec![0u8; length];

        for &(name, value) in values {
            let signal = message.signal(name).ok_or_else(|| Error::UnknownSignal {
                message: String::from(message.name()),
                signal: String::from(name),
            })?;
            let raw = encode_signal(signal, value)?;
            bits::insert_raw(
                &mut data,
                signal.start_bit(),
                signal.bit_length(),
                signal.byte_order(),
                raw,
            )
            .ok_or_else(|| Error::SignalOutOfRange {
                message: String::from(message.name()),
                signal: String::from(name),
                end_bit: bits::end_bit(signal),
                payload_bits: length * 8,
            })?;
        }

        Ok(EncodedFrame {
            arbitration_id,
            is_extended: message.is_extended(),
            data,
        })
    }
}

fn decode_signal(message: &Message, signal: &Signal, payload: &[u8]) -> Result<DecodedSignal> {
    let raw = bits::extract_raw(
        payload,
        signal.start_bit(),
        signal.bit_length(),
        signal.byte_order(),
    )
    .ok_or_else(|| Error::SignalOutOfRange {
        message: String::from(message.name()),
        signal: String::from(signal.name()),
        end_bit: bits::end_bit(signal),
        payload_bits: payload.len() * 8,
    })?;

    let value = match signal.storage() {
        StorageType::Float => f32::from_bits(raw as u32) as f64,
        StorageType::Double => f64::from_bits(raw),
        _ if signal.is_signed() => bits::sign_extend(raw, signal.bit_length()) as f64,
        _ => raw as f64,
    };

    Ok(DecodedSignal {
        name: String::from(signal.name()),
        raw,
        value: signal.raw_to_physical(value),
    })
}

fn encode_signal(signal: &Signal, value: SignalValue) -> Result<u64> {
    let out_of_range = || Error::ValueOutOfRange {
        signal: String::from(signal.name()),
        bit_length: signal.bit_length(),
    };

    let raw = match signal.storage() {
        StorageType::Double => signal.unscale(value.as_f64()).to_bits(),
        StorageType::Float => (signal.unscale(value.as_f64()) as f32).to_bits() as u64,
        _ => {
            let raw = match value {
                SignalValue::Integer(v) if signal.is_identity() => Some(v as i128),
                SignalValue::Unsigned(v) if signal.is_identity() => Some(v as i128),
                _ => signal.physical_to_raw(value.as_f64()),
            };
            return raw
                .and_then(|raw| pack_integer(signal, raw))
                .ok_or_else(out_of_range);
        }
    };

    if bits::fits_unsigned(raw, signal.bit_length()) {
        Ok(raw)
    } else {
        Err(out_of_range())
    }
}

/// Two's complement bits of `raw`, if it fits the signal's width and sign.
fn pack_integer(signal: &Signal, raw: i128) -> Option<u64> {
    let bit_length = signal.bit_length();
    if signal.is_signed() {
        let raw = i64::try_from(raw).ok()?;
        bits::fits_signed(raw, bit_length).then(|| raw as u64 & bits::mask(bit_length))
    } else {
        let raw = u64::try_from(raw).ok()?;
        bits::fits_unsigned(raw, bit_length).then_some(raw)
    }
}
