//! Error types for schema loading and frame processing.
//!
//! This module defines the [`Error`] enum which represents all possible failures
//! that can occur when parsing a DBC source, resolving received frames or
//! encoding outbound ones.
//!
//! Errors fall into three groups:
//!
//! - **Parse errors** abort loading the whole file. A schema is all-or-nothing.
//! - **Frame errors** concern a single received frame and never stop a receive
//!   loop. See [`Error::is_frame_error`].
//! - **Send errors** are returned from a single encode or send call.
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(feature = "std")]
//! use canschema::{Bus, Error, Result};
//!
//! # #[cfg(feature = "std")]
//! fn load(path: &str) -> Result<Bus> {
//!     match Bus::from_file(path) {
//!         Ok(bus) => Ok(bus),
//!         Err(e @ Error::MalformedRecord { .. }) => {
//!             eprintln!("Not a usable DBC file: {e}");
//!             Err(e)
//!         }
//!         Err(e) => Err(e),
//!     }
//! }
//! ```

use core::fmt;

use alloc::string::String;

/// Errors that can occur while loading a schema or processing frames.
#[derive(Debug)]
pub enum Error {
    /// A record had the wrong number of tokens or an unparsable field.
    MalformedRecord {
        /// 1-based line number in the source
        line: usize,
        /// Record keyword (`BO_`, `SG_`, `SIG_VALTYPE_`)
        record: &'static str,
        /// The field that was expected at this position
        field: &'static str,
        /// The text that was found instead
        found: String,
    },

    /// A `SIG_VALTYPE_` directive referenced a message or signal that does not exist.
    UnknownIdentifier {
        /// 1-based line number in the source
        line: usize,
        /// Message id named by the directive
        message_id: u32,
        /// Signal name, if the message itself was found
        signal: Option<String>,
    },

    /// Two `BO_` records used the same message id.
    DuplicateMessage {
        /// 1-based line number of the second definition
        line: usize,
        /// The repeated id
        id: u32,
    },

    /// Two `SG_` records of the same message used the same name.
    DuplicateSignal {
        /// 1-based line number of the second definition
        line: usize,
        /// Id of the owning message
        message_id: u32,
        /// The repeated name
        name: String,
    },

    /// An I/O error occurred while reading a DBC file.
    ///
    /// Only available with the `std` feature.
    #[cfg(feature = "std")]
    IOError(std::io::Error),

    /// No message is registered within the node offset window below this id.
    UnrecognizedFrame {
        /// The received arbitration id
        arbitration_id: u32,
    },

    /// The payload is shorter than the message byte length.
    PayloadTooShort {
        /// Name of the matched message
        message: String,
        /// Bytes received
        actual: usize,
        /// Bytes required
        expected: usize,
    },

    /// A signal's bit layout reaches past the end of the payload.
    SignalOutOfRange {
        /// Name of the matched message
        message: String,
        /// Name of the signal
        signal: String,
        /// One past the last bit the signal needs
        end_bit: usize,
        /// Number of bits in the payload
        payload_bits: usize,
    },

    /// No message with this name exists in the schema.
    UnknownMessage(String),

    /// The message has no signal with this name.
    UnknownSignal {
        /// Message name
        message: String,
        /// Signal name
        signal: String,
    },

    /// A raw value does not fit into the declared bit width of its signal.
    ValueOutOfRange {
        /// Signal name
        signal: String,
        /// Declared bit width
        bit_length: u16,
    },

    /// The node offset is outside `0..=15`.
    NodeOffsetOutOfRange(u8),

    /// Base id plus node offset is not a valid CAN identifier.
    InvalidArbitrationId(u32),

    /// The underlying transport rejected a frame.
    Transport(String),

    /// A render context could not be serialized.
    Serialization(String),

    /// The bus has been shut down.
    BusClosed,
}

impl Error {
    /// Returns true for errors that concern a single received frame.
    ///
    /// A receive loop logs these and moves on to the next frame.
    pub fn is_frame_error(&self) -> bool {
        matches!(
            self,
            Error::UnrecognizedFrame { .. }
                | Error::PayloadTooShort { .. }
                | Error::SignalOutOfRange { .. }
        )
    }

    /// Returns true for errors that abort loading a schema.
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            Error::MalformedRecord { .. }
                | Error::UnknownIdentifier { .. }
                | Error::DuplicateMessage { .. }
                | Error::DuplicateSignal { .. }
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MalformedRecord {
                line,
                record,
                field,
                found,
            } => write!(
                f,
                "Malformed {record} record at line {line}: expected {field}, found {found:?}"
            ),
            Error::UnknownIdentifier {
                line,
                message_id,
                signal: None,
            } => write!(f, "Unknown message id {message_id} at line {line}"),
            Error::UnknownIdentifier {
                line,
                message_id,
                signal: Some(signal),
            } => write!(
                f,
                "Unknown signal {signal:?} in message {message_id} at line {line}"
            ),
            Error::DuplicateMessage { line, id } => {
                write!(f, "Duplicate message id {id} at line {line}")
            }
            Error::DuplicateSignal {
                line,
                message_id,
                name,
            } => write!(
                f,
                "Duplicate signal {name:?} in message {message_id} at line {line}"
            ),
            #[cfg(feature = "std")]
            Error::IOError(e) => write!(f, "I/O error: {e}"),
            Error::UnrecognizedFrame { arbitration_id } => {
                write!(f, "Unrecognized frame id {arbitration_id:#x}")
            }
            Error::PayloadTooShort {
                message,
                actual,
                expected,
            } => write!(
                f,
                "Payload too short for {message}: need at least {expected} bytes, got {actual}"
            ),
            Error::SignalOutOfRange {
                message,
                signal,
                end_bit,
                payload_bits,
            } => write!(
                f,
                "Signal {message}.{signal} ends at bit {end_bit} but payload has {payload_bits} bits"
            ),
            Error::UnknownMessage(name) => write!(f, "Message {name:?} not in schema"),
            Error::UnknownSignal { message, signal } => {
                write!(f, "Message {message:?} has no signal {signal:?}")
            }
            Error::ValueOutOfRange { signal, bit_length } => write!(
                f,
                "Value for signal {signal:?} does not fit in {bit_length} bits"
            ),
            Error::NodeOffsetOutOfRange(offset) => {
                write!(f, "Node offset {offset} outside 0..=15")
            }
            Error::InvalidArbitrationId(id) => write!(f, "Invalid arbitration id {id:#x}"),
            Error::Transport(s) => write!(f, "Transport error: {s}"),
            Error::Serialization(s) => write!(f, "Serialization error: {s}"),
            Error::BusClosed => write!(f, "Bus is closed"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IOError(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(feature = "std")]
impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IOError(err)
    }
}

/// A specialized Result type for schema and frame operations.
///
/// This is defined as `core::result::Result<T, Error>` for convenience.
pub type Result<T> = core::result::Result<T, Error>;
