//! CAN frame processing against a parsed [`Bus`](crate::Bus).
//!
//! Several nodes may transmit the same message layout. Each one sends on the
//! base id from the DBC plus its own node offset in `0..=15`, so a single
//! message definition covers a window of sixteen arbitration ids. The
//! [`FrameCodec`] maps a received id back to the message and offset, decodes
//! the payload, and builds outbound payloads.
//!
//! With the `std` and `can` features, [`CanBus`] runs a receive loop over any
//! [`Transport`] on a dedicated thread.
//!
//! # Example
//!
//! ```
//! use canschema::can::{FrameCodec, SignalValue};
//!
//! let bus = canschema::dbc::load(
//!     "CANBus1",
//!     "BO_ 16 Status: 1 ECU\n SG_ mode 0|8@1+ (1,0) [0|255] \"\" RX\n",
//! )?;
//! let codec = FrameCodec::new(&bus);
//!
//! let frame = codec.encode("Status", &[("mode", SignalValue::from(3u8))], 5)?;
//! assert_eq!(frame.arbitration_id, 0x15);
//!
//! let resolved = codec.resolve(frame.arbitration_id, &frame.data)?;
//! assert_eq!(resolved.message.name(), "Status");
//! assert_eq!(resolved.node_offset, 5);
//! assert_eq!(resolved.signal("mode").unwrap().value, 3.0);
//! # Ok::<(), canschema::Error>(())
//! ```

pub mod bits;
mod codec;
pub mod fd;

#[cfg(all(feature = "std", feature = "can"))]
mod config;
#[cfg(all(feature = "std", feature = "can"))]
mod live;

pub use codec::{DecodedSignal, EncodedFrame, FrameCodec, ResolvedFrame, SignalValue};
pub use fd::{FdFlags, MAX_FD_DATA_LEN, dlc_to_len, len_to_dlc, padded_len};

#[cfg(feature = "can")]
pub use fd::{FdFrame, SimpleFdFrame};

#[cfg(all(feature = "std", feature = "can"))]
pub use config::{BusConfig, CanBusBuilder};
#[cfg(all(feature = "std", feature = "can"))]
pub use live::{BusStats, CanBus, ReceivedMessage, Transport};

/// Largest node offset added to a base message id.
pub const MAX_NODE_OFFSET: u8 = 0xF;
