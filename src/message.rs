//! Message definitions.

use alloc::string::String;
use alloc::vec::Vec;

use crate::can::bits;
use crate::signal::Signal;
use crate::storage::bytes_for_bits;

/// Bit 31 marks an extended (29-bit) id in DBC files.
pub(crate) const DBC_EXTENDED_FLAG: u32 = 0x8000_0000;

/// Largest standard (11-bit) CAN id.
pub const MAX_STANDARD_ID: u32 = 0x7FF;

/// Largest extended (29-bit) CAN id.
pub const MAX_EXTENDED_ID: u32 = 0x1FFF_FFFF;

/// A CAN message definition (`BO_` record) and the signals packed into it.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Message {
    id: u32,
    is_extended: bool,
    name: String,
    declared_length: u16,
    sender: String,
    bit_length: u32,
    byte_length: u32,
    signals: Vec<Signal>,
}

impl Message {
    /// Create an empty message from the id column of a `BO_` record.
    ///
    /// Bit 31 of `dbc_id` is the DBC extended-frame flag and is stripped from the
    /// stored base id.
    pub(crate) fn new(dbc_id: u32, name: &str, declared_length: u16, sender: &str) -> Self {
        let id = dbc_id & !DBC_EXTENDED_FLAG;
        Self {
            id,
            is_extended: dbc_id & DBC_EXTENDED_FLAG != 0 || id > MAX_STANDARD_ID,
            name: String::from(name),
            declared_length,
            sender: String::from(sender),
            bit_length: 0,
            byte_length: 0,
            signals: Vec::new(),
        }
    }

    /// Attach a signal and add its width to the running bit total.
    ///
    /// Returns the signal back if the name is already taken.
    pub(crate) fn add_signal(&mut self, signal: Signal) -> core::result::Result<(), Signal> {
        if self.signal(signal.name()).is_some() {
            return Err(signal);
        }
        self.bit_length += signal.bit_length() as u32;
        self.signals.push(signal);
        Ok(())
    }

    pub(crate) fn signal_mut(&mut self, name: &str) -> Option<&mut Signal> {
        self.signals.iter_mut().find(|s| s.name() == name)
    }

    /// Derive the byte length from the accumulated bit length.
    ///
    /// Called once per message after every signal of the file has been attached.
    pub(crate) fn finalize(&mut self) {
        self.byte_length = bytes_for_bits(self.bit_length);
    }

    /// Base CAN id, before any node offset is added.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Whether this is an extended (29-bit) CAN id.
    pub fn is_extended(&self) -> bool {
        self.is_extended
    }

    /// Message name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Payload length declared in the `BO_` record.
    pub fn declared_length(&self) -> u16 {
        self.declared_length
    }

    /// Transmitting node.
    pub fn sender(&self) -> &str {
        &self.sender
    }

    /// Sum of the bit lengths of all signals.
    pub fn bit_length(&self) -> u32 {
        self.bit_length
    }

    /// `ceil(bit_length / 8)`.
    pub fn byte_length(&self) -> u32 {
        self.byte_length
    }

    /// Signals in definition order.
    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    /// Look up a signal by name.
    pub fn signal(&self, name: &str) -> Option<&Signal> {
        self.signals.iter().find(|s| s.name() == name)
    }

    /// Get the number of signals in this message.
    pub fn signal_count(&self) -> usize {
        self.signals.len()
    }

    /// Number of payload bytes an outbound frame carries.
    ///
    /// This is the declared length, widened if the signal layout reaches past it.
    pub fn frame_length(&self) -> usize {
        let layout = self
            .signals
            .iter()
            .map(bits::bytes_spanned)
            .max()
            .unwrap_or(0);
        layout.max(self.declared_length as usize)
    }
}
