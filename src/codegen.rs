//! Render context for code generation.
//!
//! A [`RenderContext`] is the data a template engine receives when it renders
//! C++ headers for a bus: message and signal layouts with their C storage
//! types. The context is built from a finalized [`Bus`] and contains nothing
//! time-dependent, so the same DBC file always renders the same output.
//!
//! Serialized with the `serde` feature, the context looks like:
//!
//! ```text
//! {
//!   "dbc_name": "CANBus1",
//!   "libs": ["cstdlib", "cstdint", "bit", "cstring", "variant", "optional"],
//!   "message_dict": {
//!     "100": {
//!       "id": 100,
//!       "name": "Beacon",
//!       "byte_length": 1,
//!       "signal_dict": {
//!         "data": { "data_type": "uint8_t", "bit_length": 8, "byte_length": 1 }
//!       }
//!     }
//!   },
//!   "messages_for_handler": [{ "id": 100, "name": "Beacon" }],
//!   "message_types": ["Beacon"]
//! }
//! ```

use alloc::string::String;
use alloc::vec::Vec;

use crate::bus::Bus;
use crate::message::Message;
use crate::signal::Signal;

/// C++ standard headers every generated header includes.
pub const LIBS: [&str; 6] = ["cstdlib", "cstdint", "bit", "cstring", "variant", "optional"];

/// Layout of one signal as seen by the templates.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SignalContext {
    /// Signal name, the key in `signal_dict`
    #[cfg_attr(feature = "serde", serde(skip))]
    pub name: String,
    /// C spelling of the storage type
    pub data_type: &'static str,
    /// Width in bits
    pub bit_length: u16,
    /// Width in whole bytes
    pub byte_length: u32,
}

impl SignalContext {
    fn from_signal(signal: &Signal) -> Self {
        Self {
            name: String::from(signal.name()),
            data_type: signal.storage().c_type(),
            bit_length: signal.bit_length(),
            byte_length: signal.byte_length(),
        }
    }
}

/// Layout of one message as seen by the templates.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MessageContext {
    /// Base message id
    pub id: u32,
    /// Message name
    pub name: String,
    /// Payload bytes covered by the signals
    pub byte_length: u32,
    /// Signals in definition order, serialized as a map keyed by name
    #[cfg_attr(feature = "serde", serde(serialize_with = "serialize_signals"))]
    pub signal_dict: Vec<SignalContext>,
}

impl MessageContext {
    fn from_message(message: &Message) -> Self {
        Self {
            id: message.id(),
            name: String::from(message.name()),
            byte_length: message.byte_length(),
            signal_dict: message
                .signals()
                .iter()
                .map(SignalContext::from_signal)
                .collect(),
        }
    }
}

/// Entry of the message dispatch table.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct HandlerEntry {
    /// Base message id
    pub id: u32,
    /// Message name
    pub name: String,
}

/// Everything a header template needs to know about one bus.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RenderContext {
    /// Bus name, from the DBC file stem
    pub dbc_name: String,
    /// Headers to include
    pub libs: Vec<&'static str>,
    /// Messages in definition order, serialized as a map keyed by id
    #[cfg_attr(feature = "serde", serde(serialize_with = "serialize_messages"))]
    pub message_dict: Vec<MessageContext>,
    /// Dispatch table in definition order
    pub messages_for_handler: Vec<HandlerEntry>,
    /// Sorted, deduplicated message names
    pub message_types: Vec<String>,
}

impl RenderContext {
    /// Build the render context of a bus.
    ///
    /// # Example
    ///
    /// ```
    /// use canschema::codegen::RenderContext;
    ///
    /// let bus = canschema::dbc::load(
    ///     "CANBus1",
    ///     "BO_ 100 Beacon: 1 ECU\n SG_ data 0|8@1+ (1,0) [0|255] \"\" RX\n",
    /// )?;
    /// let context = RenderContext::from_bus(&bus);
    /// assert_eq!(context.dbc_name, "CANBus1");
    /// assert_eq!(context.message_dict[0].signal_dict[0].data_type, "uint8_t");
    /// assert_eq!(context.message_types, ["Beacon"]);
    /// # Ok::<(), canschema::Error>(())
    /// ```
    pub fn from_bus(bus: &Bus) -> Self {
        let message_dict: Vec<MessageContext> = bus
            .messages()
            .iter()
            .map(MessageContext::from_message)
            .collect();

        let messages_for_handler = message_dict
            .iter()
            .map(|m| HandlerEntry {
                id: m.id,
                name: m.name.clone(),
            })
            .collect();

        let mut message_types: Vec<String> = message_dict.iter().map(|m| m.name.clone()).collect();
        message_types.sort();
        message_types.dedup();

        Self {
            dbc_name: String::from(bus.name()),
            libs: LIBS.to_vec(),
            message_dict,
            messages_for_handler,
            message_types,
        }
    }

    /// Look up a message by id.
    pub fn message(&self, id: u32) -> Option<&MessageContext> {
        self.message_dict.iter().find(|m| m.id == id)
    }

    /// Render the context as pretty-printed JSON.
    ///
    /// Requires the `serde` and `serde_json` features.
    #[cfg(all(feature = "serde", feature = "serde_json"))]
    pub fn to_json(&self) -> crate::Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            crate::Error::Serialization(alloc::format!("JSON serialization failed: {}", e))
        })
    }

    /// Write the context as JSON to a file.
    ///
    /// Requires the `std`, `serde` and `serde_json` features.
    #[cfg(all(feature = "std", feature = "serde", feature = "serde_json"))]
    pub fn write_json<P: AsRef<std::path::Path>>(&self, path: P) -> crate::Result<()> {
        let json = self.to_json()?;
        std::fs::write(path, json).map_err(crate::Error::IOError)
    }
}

#[cfg(feature = "serde")]
fn serialize_messages<S>(
    messages: &[MessageContext],
    serializer: S,
) -> core::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    use serde::ser::SerializeMap;

    let mut map = serializer.serialize_map(Some(messages.len()))?;
    for message in messages {
        map.serialize_entry(&message.id, message)?;
    }
    map.end()
}

#[cfg(feature = "serde")]
fn serialize_signals<S>(signals: &[SignalContext], serializer: S) -> core::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    use serde::ser::SerializeMap;

    let mut map = serializer.serialize_map(Some(signals.len()))?;
    for signal in signals {
        map.serialize_entry(&signal.name, signal)?;
    }
    map.end()
}
