//! CAN FD payload lengths and frames.
//!
//! CAN FD carries up to 64 bytes, but only at fixed lengths above 8:
//!
//! | DLC | Bytes |
//! |-----|-------|
//! | 0-8 | DLC |
//! | 9 | 12 |
//! | 10 | 16 |
//! | 11 | 20 |
//! | 12 | 24 |
//! | 13 | 32 |
//! | 14 | 48 |
//! | 15 | 64 |
//!
//! Encoded payloads longer than 8 bytes are zero-padded to the next of these
//! lengths, see [`padded_len`].

/// Maximum CAN FD data length in bytes.
pub const MAX_FD_DATA_LEN: usize = 64;

/// Maximum classic CAN data length in bytes.
pub const MAX_CLASSIC_DATA_LEN: usize = 8;

/// CAN FD DLC to data length mapping.
#[inline]
pub const fn dlc_to_len(dlc: u8) -> usize {
    match dlc {
        0..=8 => dlc as usize,
        9 => 12,
        10 => 16,
        11 => 20,
        12 => 24,
        13 => 32,
        14 => 48,
        _ => 64,
    }
}

/// Data length to CAN FD DLC mapping.
///
/// Returns the minimum DLC that can hold the given data length.
#[inline]
pub const fn len_to_dlc(len: usize) -> u8 {
    match len {
        0..=8 => len as u8,
        9..=12 => 9,
        13..=16 => 10,
        17..=20 => 11,
        21..=24 => 12,
        25..=32 => 13,
        33..=48 => 14,
        _ => 15,
    }
}

/// Smallest valid frame length holding `len` bytes.
///
/// Returns `None` above [`MAX_FD_DATA_LEN`].
#[inline]
pub const fn padded_len(len: usize) -> Option<usize> {
    if len > MAX_FD_DATA_LEN {
        None
    } else {
        Some(dlc_to_len(len_to_dlc(len)))
    }
}

/// CAN FD frame flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FdFlags {
    /// Bit Rate Switch: the data phase runs at the higher bitrate.
    brs: bool,
    /// Error State Indicator: the transmitter is error passive.
    esi: bool,
}

impl FdFlags {
    /// Create new FD flags.
    #[inline]
    pub const fn new(brs: bool, esi: bool) -> Self {
        Self { brs, esi }
    }

    /// Returns true if Bit Rate Switch is enabled.
    #[inline]
    pub const fn brs(&self) -> bool {
        self.brs
    }

    /// Returns true if Error State Indicator is set.
    #[inline]
    pub const fn esi(&self) -> bool {
        self.esi
    }
}

/// A frame that may also be sent as CAN FD.
///
/// `data()` returns the whole payload, up to 64 bytes for FD frames.
#[cfg(feature = "can")]
pub trait FdFrame: embedded_can::Frame {
    /// Creates a new CAN FD frame.
    ///
    /// Returns `None` if the data is longer than 64 bytes or not a valid FD length.
    fn new_fd(id: impl Into<embedded_can::Id>, data: &[u8], flags: FdFlags) -> Option<Self>;

    /// Returns true if this is a CAN FD frame.
    fn is_fd(&self) -> bool;

    /// Returns the CAN FD flags. Classic frames report both flags cleared.
    fn fd_flags(&self) -> FdFlags;
}

/// Owned frame usable as classic CAN or CAN FD.
#[cfg(feature = "can")]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleFdFrame {
    id: embedded_can::Id,
    data: [u8; MAX_FD_DATA_LEN],
    len: usize,
    flags: FdFlags,
    is_fd: bool,
    is_remote: bool,
}

#[cfg(feature = "can")]
impl SimpleFdFrame {
    fn with_payload(id: embedded_can::Id, data: &[u8], flags: FdFlags, is_fd: bool) -> Self {
        let mut frame_data = [0u8; MAX_FD_DATA_LEN];
        frame_data[..data.len()].copy_from_slice(data);
        Self {
            id,
            data: frame_data,
            len: data.len(),
            flags,
            is_fd,
            is_remote: false,
        }
    }
}

#[cfg(feature = "can")]
impl FdFrame for SimpleFdFrame {
    fn new_fd(id: impl Into<embedded_can::Id>, data: &[u8], flags: FdFlags) -> Option<Self> {
        if padded_len(data.len()) != Some(data.len()) {
            return None;
        }
        Some(Self::with_payload(id.into(), data, flags, true))
    }

    fn is_fd(&self) -> bool {
        self.is_fd
    }

    fn fd_flags(&self) -> FdFlags {
        self.flags
    }
}

#[cfg(feature = "can")]
impl embedded_can::Frame for SimpleFdFrame {
    fn new(id: impl Into<embedded_can::Id>, data: &[u8]) -> Option<Self> {
        if data.len() > MAX_CLASSIC_DATA_LEN {
            return None;
        }
        Some(Self::with_payload(id.into(), data, FdFlags::default(), false))
    }

    fn new_remote(id: impl Into<embedded_can::Id>, dlc: usize) -> Option<Self> {
        if dlc > MAX_CLASSIC_DATA_LEN {
            return None;
        }
        Some(Self {
            id: id.into(),
            data: [0u8; MAX_FD_DATA_LEN],
            len: dlc,
            flags: FdFlags::default(),
            is_fd: false,
            is_remote: true,
        })
    }

    fn is_extended(&self) -> bool {
        matches!(self.id, embedded_can::Id::Extended(_))
    }

    fn is_remote_frame(&self) -> bool {
        self.is_remote
    }

    fn id(&self) -> embedded_can::Id {
        self.id
    }

    fn dlc(&self) -> usize {
        if self.is_fd {
            len_to_dlc(self.len) as usize
        } else {
            self.len
        }
    }

    fn data(&self) -> &[u8] {
        if self.is_remote {
            &[]
        } else {
            &self.data[..self.len]
        }
    }
}
