#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]

//! # canschema
//!
//! A Rust library that turns CAN database (DBC) files into a typed, bit-exact
//! schema, and resolves node-addressed CAN frames against it.
//!
//! A DBC file describes the messages on one bus and the signals packed into
//! each payload. This crate reads the subset of DBC needed for payload layout,
//! infers a C storage type for every signal, and then serves two consumers:
//!
//! - **Code generation**: [`codegen::RenderContext`] is the data handed to a
//!   template engine that renders struct and codec headers.
//! - **Runtime**: [`can::FrameCodec`] decodes received frames and encodes
//!   outbound ones, and [`can::CanBus`] runs a receive loop over a CAN
//!   interface.
//!
//! ## Node offsets
//!
//! Up to sixteen nodes can share one message definition. Each sends on the base
//! id from the DBC plus its node offset (`0..=15`). A received id is resolved
//! by trying offsets from 0 upwards; the first base id that exists wins.
//!
//! ## Quick Start
//!
//! ```
//! use canschema::{Bus, StorageType};
//! use canschema::can::FrameCodec;
//!
//! let bus = Bus::parse(
//!     "CANBus1",
//!     r#"
//! VERSION ""
//!
//! BU_: ECU PDM
//!
//! BO_ 16 Status: 2 ECU
//!  SG_ mode : 0|8@1+ (1,0) [0|255] "" PDM
//!  SG_ fault : 8|1@1+ (1,0) [0|1] "" PDM
//! "#,
//! )?;
//!
//! let status = bus.message(16).unwrap();
//! assert_eq!(status.byte_length(), 2);
//! assert_eq!(status.signal("fault").unwrap().storage(), StorageType::Bool);
//!
//! let codec = FrameCodec::new(&bus);
//! let frame = codec.resolve(0x13, &[4, 1])?;
//! assert_eq!(frame.node_offset, 3);
//! assert_eq!(frame.signal("mode").unwrap().value, 4.0);
//! # Ok::<(), canschema::Error>(())
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`dbc`] | DBC lexer, record parsers and the [`dbc::load`] entry point |
//! | [`can`] | Frame resolution, bit packing, CAN FD lengths and the live bus |
//! | [`codegen`] | Render context for header generation |
//! | [`error`] | Error types and [`Result`] alias |
//!
//! ## Features
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `std` | yes | File loading, the live bus runtime, JSON output |
//! | `alloc` | via `std` | Everything else; required |
//! | `serde` | via `std` | `Serialize` for the schema and render context |
//! | `can` | yes | `embedded-can` frame integration |
//!
//! ## Logging
//!
//! The crate logs through the [`log`](https://docs.rs/log) facade and never
//! installs a logger. Loading a schema logs at `info`, per-message layout and
//! per-frame resolution at `debug`. Unrecognized frames, full receive queues and
//! overlapping node offset windows are logged at `warn`.

extern crate alloc;

mod bus;
mod message;
mod signal;
mod storage;

pub mod can;
pub mod codegen;
pub mod dbc;
pub mod error;

// Re-export commonly used types at the crate root
pub use bus::{Bus, OffsetCollision};
pub use error::{Error, Result};
pub use message::{MAX_EXTENDED_ID, MAX_STANDARD_ID, Message};
pub use signal::{ByteOrder, Signal};
pub use storage::StorageType;
