//! DBC parsing.
//!
//! This module turns DBC source text into a [`Bus`](crate::Bus). Only the subset
//! of the format needed to lay out payloads is read:
//!
//! | Record | Meaning |
//! |--------|---------|
//! | `BO_` | message definition |
//! | `SG_` | signal definition, attached to the preceding `BO_` |
//! | `SIG_VALTYPE_` | forces a signal to `float` (code 1) or `double` (code 2) |
//! | `NS_` | new symbols block, ignored up to the next blank line |
//!
//! Everything else (`VERSION`, `BU_`, `CM_`, `BA_`, `VAL_`, ...) is skipped.
//! Multiplexed signals are rejected.
//!
//! # Example
//!
//! ```
//! use canschema::StorageType;
//!
//! let source = r#"
//! BO_ 100 Beacon: 1 ECU
//!  SG_ data 0|8@1+ (1,0) [0|255] "" RX
//!
//! SIG_VALTYPE_ 100 data 1;
//! "#;
//!
//! let bus = canschema::dbc::load("CANBus1", source)?;
//! let data = bus.message(100).unwrap().signal("data").unwrap();
//! assert_eq!(data.storage(), StorageType::Float);
//! # Ok::<(), canschema::Error>(())
//! ```

pub mod lexer;
mod parser;
pub mod records;

pub use parser::load;
