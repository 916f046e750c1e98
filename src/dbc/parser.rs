//! Single forward pass over a DBC source.
//!
//! Records must be applied in file order: signals belong to the message
//! declared before them, and a `SIG_VALTYPE_` directive may only name a message
//! and signal that already exist. The message currently receiving signals is
//! threaded through the loop as an explicit value.

use alloc::string::String;

use super::lexer::{Lexer, LineKind, Record, SIGNAL_KEYWORD};
use super::records::{ValueTypeRecord, parse_message, parse_signal, parse_value_type};
use crate::bus::Bus;
use crate::can::MAX_NODE_OFFSET;
use crate::message::Message;
use crate::signal::Signal;
use crate::{Error, Result};

/// Parse DBC source text into a finalized [`Bus`].
///
/// `name` identifies the bus in generated artifacts; [`Bus::from_file`] passes
/// the file stem. Any malformed record aborts the whole load.
///
/// # Example
///
/// ```
/// let bus = canschema::dbc::load(
///     "CANBus1",
///     "BO_ 100 Beacon: 1 ECU\n SG_ data 0|8@1+ (1,0) [0|255] \"\" RX\n",
/// )?;
/// let beacon = bus.message(100).unwrap();
/// assert_eq!(beacon.byte_length(), 1);
/// # Ok::<(), canschema::Error>(())
/// ```
pub fn load(name: &str, source: &str) -> Result<Bus> {
    let mut bus = Bus::new(name);
    let mut current: Option<u32> = None;

    for record in Lexer::new(source) {
        match record.kind {
            LineKind::Message => {
                current = Some(define_message(&mut bus, &record)?);
            }
            LineKind::Signal => {
                let signal = parse_signal(&record)?;
                let message = current
                    .and_then(|id| bus.message_mut(id))
                    .ok_or_else(|| Error::MalformedRecord {
                        line: record.line,
                        record: SIGNAL_KEYWORD,
                        field: "preceding BO_ record",
                        found: String::from(signal.name()),
                    })?;
                attach_signal(message, signal, record.line)?;
            }
            LineKind::ValueType => {
                let directive = parse_value_type(&record)?;
                apply_value_type(&mut bus, &directive, record.line)?;
            }
            LineKind::Namespace | LineKind::Ignored => {}
        }
    }

    bus.finalize();

    for collision in bus.offset_collisions() {
        log::warn!(
            "{}: node offset windows of 0x{:X} and 0x{:X} overlap, ids 0x{:X}..=0x{:X} resolve to 0x{:X}",
            bus.name(),
            collision.lower,
            collision.upper,
            collision.upper,
            collision.lower + MAX_NODE_OFFSET as u32,
            collision.upper
        );
    }
    log::info!("Parsed {} messages from {}", bus.len(), bus.name());

    Ok(bus)
}

/// Register the message of a `BO_` record and return its id.
fn define_message(bus: &mut Bus, record: &Record<'_>) -> Result<u32> {
    let message = parse_message(record)?;
    let id = message.id();
    bus.insert_message(message)
        .map_err(|_| Error::DuplicateMessage {
            line: record.line,
            id,
        })?;
    Ok(id)
}

fn attach_signal(message: &mut Message, signal: Signal, line: usize) -> Result<()> {
    let message_id = message.id();
    message
        .add_signal(signal)
        .map_err(|rejected| Error::DuplicateSignal {
            line,
            message_id,
            name: String::from(rejected.name()),
        })
}

fn apply_value_type(bus: &mut Bus, directive: &ValueTypeRecord<'_>, line: usize) -> Result<()> {
    let message = bus
        .message_mut(directive.message_id)
        .ok_or(Error::UnknownIdentifier {
            line,
            message_id: directive.message_id,
            signal: None,
        })?;
    let signal = message
        .signal_mut(directive.signal)
        .ok_or_else(|| Error::UnknownIdentifier {
            line,
            message_id: directive.message_id,
            signal: Some(String::from(directive.signal)),
        })?;

    if let Some(storage) = directive.storage {
        log::debug!(
            "Signal {} of message 0x{:X} stored as {}",
            directive.signal,
            directive.message_id,
            storage
        );
        signal.set_storage(storage);
    }
    Ok(())
}
