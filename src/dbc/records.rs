//! Parsers for the individual DBC record kinds.
//!
//! Each parser takes the tokens of one line, as produced by the
//! [lexer](super::lexer), and converts every numeric field to its numeric type
//! immediately. A record that does not have the expected shape yields
//! [`Error::MalformedRecord`] naming the line and the field that was expected.

use alloc::string::String;
use alloc::vec::Vec;
use core::str::FromStr;

use super::lexer::{MESSAGE_KEYWORD, Record, SIGNAL_KEYWORD, VALUE_TYPE_KEYWORD};
use crate::can::bits::span_bytes;
use crate::can::fd::MAX_FD_DATA_LEN;
use crate::message::{DBC_EXTENDED_FLAG, Message};
use crate::signal::{ByteOrder, Signal};
use crate::storage::StorageType;
use crate::{Error, Result};

/// Largest supported payload, in bits (a 64-byte CAN FD frame).
pub const MAX_PAYLOAD_BITS: u16 = 512;

/// Largest supported signal width.
pub const MAX_SIGNAL_BITS: u16 = 64;

/// A parsed `SIG_VALTYPE_` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueTypeRecord<'a> {
    /// Base id of the targeted message
    pub message_id: u32,
    /// Name of the targeted signal
    pub signal: &'a str,
    /// The forced storage type, `None` for codes that change nothing
    pub storage: Option<StorageType>,
}

fn malformed(record: &'static str, line: usize, field: &'static str, found: &str) -> Error {
    Error::MalformedRecord {
        line,
        record,
        field,
        found: String::from(found),
    }
}

/// Cursor over the tokens of one record.
struct Fields<'r, 'a> {
    record: &'static str,
    line: usize,
    tokens: &'r [&'a str],
    pos: usize,
}

impl<'r, 'a> Fields<'r, 'a> {
    fn new(record: &'static str, rec: &'r Record<'a>) -> Self {
        // Skip the keyword.
        Self {
            record,
            line: rec.line,
            tokens: &rec.tokens,
            pos: 1,
        }
    }

    fn peek(&self) -> Option<&'a str> {
        self.tokens.get(self.pos).copied()
    }

    fn next(&mut self, field: &'static str) -> Result<&'a str> {
        let token = self
            .peek()
            .ok_or_else(|| malformed(self.record, self.line, field, ""))?;
        self.pos += 1;
        Ok(token)
    }

    fn skip_colon(&mut self) {
        if self.peek() == Some(":") {
            self.pos += 1;
        }
    }

    fn rest(&self) -> &'r [&'a str] {
        &self.tokens[self.pos.min(self.tokens.len())..]
    }

    fn finish(&self) -> Result<()> {
        match self.peek() {
            None => Ok(()),
            Some(extra) => Err(malformed(self.record, self.line, "end of record", extra)),
        }
    }

    fn number<T: FromStr>(&self, field: &'static str, text: &str) -> Result<T> {
        text.parse()
            .map_err(|_| malformed(self.record, self.line, field, text))
    }

    fn error(&self, field: &'static str, found: &str) -> Error {
        malformed(self.record, self.line, field, found)
    }
}

/// Parse `BO_ <id> <name>: <dlc> <sender>`.
///
/// The colon may be attached to the name or stand alone.
pub fn parse_message(rec: &Record<'_>) -> Result<Message> {
    let mut f = Fields::new(MESSAGE_KEYWORD, rec);

    let id_text = f.next("message id")?;
    let dbc_id: u32 = f.number("message id", id_text)?;

    let name_text = f.next("message name")?;
    let name = match name_text.strip_suffix(':') {
        Some(name) => name,
        None => {
            let colon = f.next("':' after message name")?;
            if colon != ":" {
                return Err(f.error("':' after message name", colon));
            }
            name_text
        }
    };
    if name.is_empty() {
        return Err(f.error("message name", name_text));
    }

    let dlc_text = f.next("message length")?;
    let dlc: u16 = f.number("message length", dlc_text)?;
    if dlc as usize > MAX_FD_DATA_LEN {
        return Err(f.error("message length up to 64", dlc_text));
    }
    let sender = f.next("transmitter")?;
    f.finish()?;

    Ok(Message::new(dbc_id, name, dlc, sender))
}

/// Parse `SG_ <name> [:] <start>|<len>@<endian><sign> (<scale>,<offset>) [<min>|<max>] "<unit>" <receivers>`.
pub fn parse_signal(rec: &Record<'_>) -> Result<Signal> {
    let mut f = Fields::new(SIGNAL_KEYWORD, rec);

    let name = f.next("signal name")?;
    f.skip_colon();

    let layout = f.next("bit layout")?;
    let (position, format) = layout
        .split_once('@')
        .ok_or_else(|| f.error("bit layout <start>|<length>@<endian><sign>", layout))?;
    let (start_text, length_text) = position
        .split_once('|')
        .ok_or_else(|| f.error("bit layout <start>|<length>@<endian><sign>", layout))?;

    let start_bit: u16 = f.number("start bit", start_text)?;
    if start_bit >= MAX_PAYLOAD_BITS {
        return Err(f.error("start bit below 512", start_text));
    }
    let bit_length: u16 = f.number("bit length", length_text)?;
    if bit_length == 0 || bit_length > MAX_SIGNAL_BITS {
        return Err(f.error("bit length between 1 and 64", length_text));
    }

    let mut format_chars = format.chars();
    let byte_order = format_chars
        .next()
        .and_then(ByteOrder::from_dbc_char)
        .ok_or_else(|| f.error("byte order '0' or '1'", format))?;
    let is_signed = match (format_chars.next(), format_chars.next()) {
        (Some('-'), None) => true,
        (Some('+'), None) => false,
        _ => return Err(f.error("value sign '+' or '-'", format)),
    };
    if span_bytes(start_bit, bit_length, byte_order) * 8 > MAX_PAYLOAD_BITS as usize {
        return Err(f.error("signal within a 64-byte payload", layout));
    }

    let scale_offset = f.next("(scale,offset)")?;
    let (scale_text, offset_text) = scale_offset
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .and_then(|s| s.split_once(','))
        .ok_or_else(|| f.error("(scale,offset)", scale_offset))?;
    let scale: f64 = f.number("scale", scale_text)?;
    let offset: f64 = f.number("offset", offset_text)?;

    let min_max = f.next("[min|max]")?;
    let (min_text, max_text) = min_max
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .and_then(|s| s.split_once('|'))
        .ok_or_else(|| f.error("[min|max]", min_max))?;
    let min: f64 = f.number("minimum", min_text)?;
    let max: f64 = f.number("maximum", max_text)?;

    let unit_text = f.next("quoted unit")?;
    let unit = unit_text
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .ok_or_else(|| f.error("quoted unit", unit_text))?;

    let receivers: Vec<String> = f
        .rest()
        .iter()
        .flat_map(|token| token.split(','))
        .filter(|r| !r.is_empty())
        .map(String::from)
        .collect();
    if receivers.is_empty() {
        return Err(f.error("receiver", ""));
    }

    let mut signal = Signal::new(name, start_bit, bit_length)
        .with_scale(scale)
        .with_offset(offset)
        .with_range(min, max)
        .with_unit(unit)
        .with_receivers(receivers);
    if is_signed {
        signal = signal.signed();
    }
    if byte_order == ByteOrder::BigEndian {
        signal = signal.big_endian();
    }
    Ok(signal)
}

/// Parse `SIG_VALTYPE_ <message id> <signal name> [:] <code>;`.
///
/// The terminating `;` may be attached to the code or stand alone.
pub fn parse_value_type<'a>(rec: &Record<'a>) -> Result<ValueTypeRecord<'a>> {
    let mut f = Fields::new(VALUE_TYPE_KEYWORD, rec);

    let id_text = f.next("message id")?;
    let dbc_id: u32 = f.number("message id", id_text)?;
    let signal = f.next("signal name")?;
    f.skip_colon();

    let code_text = f.next("value type code")?;
    let code = match code_text.strip_suffix(';') {
        Some(code) => code,
        None => {
            let semicolon = f.next("';'")?;
            if semicolon != ";" {
                return Err(f.error("';'", semicolon));
            }
            code_text
        }
    };
    if code.is_empty() {
        return Err(f.error("value type code", code_text));
    }
    f.finish()?;

    Ok(ValueTypeRecord {
        message_id: dbc_id & !DBC_EXTENDED_FLAG,
        signal,
        storage: StorageType::from_value_type_code(code),
    })
}
