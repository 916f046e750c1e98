//! The parsed schema of one DBC file.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

use crate::can::MAX_NODE_OFFSET;
use crate::message::Message;

/// Two base ids whose node offset windows overlap.
///
/// Arbitration ids in `upper..=lower + 15` could have been sent either by node
/// `id - upper` of the upper message or node `id - lower` of the lower one.
/// Resolution always picks the smaller offset, i.e. the upper message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetCollision {
    /// The smaller base id
    pub lower: u32,
    /// The larger base id, within 15 of `lower`
    pub upper: u32,
}

/// A parsed DBC file: its name and the messages it defines.
///
/// A bus is built once by [`dbc::load`](crate::dbc::load) and is read-only
/// afterwards. It is `Send + Sync` and can be shared behind an `Arc` between a
/// code generator and any number of frame-handling threads.
///
/// Messages are keyed by base id alone. A standard and an extended message
/// with the same numeric id (`0x123` and `0x80000123`) cannot share a bus:
/// the second one is rejected as a duplicate.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Bus {
    name: String,
    messages: Vec<Message>,
    #[cfg_attr(feature = "serde", serde(skip))]
    index: BTreeMap<u32, usize>,
}

impl Bus {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: String::from(name),
            messages: Vec::new(),
            index: BTreeMap::new(),
        }
    }

    /// Parse DBC source text into a bus named `name`.
    ///
    /// Shorthand for [`dbc::load`](crate::dbc::load).
    pub fn parse(name: &str, source: &str) -> crate::Result<Self> {
        crate::dbc::load(name, source)
    }

    /// Read and parse a DBC file.
    ///
    /// The bus is named after the file stem, so `dbc/CANBus1.dbc` yields a bus
    /// named `CANBus1`.
    #[cfg(feature = "std")]
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("bus");
        log::info!("Loading DBC file {}", path.display());
        let source = std::fs::read_to_string(path)?;
        crate::dbc::load(name, &source)
    }

    /// Register a message. Returns it back if the id is already taken.
    pub(crate) fn insert_message(&mut self, message: Message) -> core::result::Result<(), Message> {
        if self.index.contains_key(&message.id()) {
            return Err(message);
        }
        self.index.insert(message.id(), self.messages.len());
        self.messages.push(message);
        Ok(())
    }

    pub(crate) fn message_mut(&mut self, id: u32) -> Option<&mut Message> {
        let idx = *self.index.get(&id)?;
        self.messages.get_mut(idx)
    }

    /// Derive every message's byte length. Runs once, after the last line.
    pub(crate) fn finalize(&mut self) {
        for message in &mut self.messages {
            message.finalize();
            log::debug!(
                "{}: message {} (0x{:X}) has {} signals, {} bits, {} bytes",
                self.name,
                message.name(),
                message.id(),
                message.signal_count(),
                message.bit_length(),
                message.byte_length()
            );
        }
    }

    /// Name of the bus, derived from the DBC file name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Messages in definition order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Look up a message by base id.
    #[inline]
    pub fn message(&self, id: u32) -> Option<&Message> {
        self.index.get(&id).map(|&idx| &self.messages[idx])
    }

    /// Look up a message by name.
    pub fn message_by_name(&self, name: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.name() == name)
    }

    /// Number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns true if the bus defines no messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Get all base ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.index.keys().copied()
    }

    /// Find base ids whose node offset windows overlap.
    ///
    /// Frame resolution stays deterministic in that case (the smallest offset
    /// wins) but the lower message can no longer be reached from the colliding
    /// nodes.
    pub fn offset_collisions(&self) -> Vec<OffsetCollision> {
        let ids: Vec<u32> = self.ids().collect();
        let mut collisions = Vec::new();

        for (i, &lower) in ids.iter().enumerate() {
            for &upper in &ids[i + 1..] {
                if upper - lower > MAX_NODE_OFFSET as u32 {
                    break;
                }
                collisions.push(OffsetCollision { lower, upper });
            }
        }

        collisions
    }
}
