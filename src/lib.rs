//! # CCSDS Space Packet and CSP header codecs
//!
//! This crate contains codecs for two small, fixed-size header formats which are commonly used
//! for spacecraft communication:
//!
//!  - The Space Packet primary header according to
//!    [CCSDS Blue Book 133.0-B-2](https://public.ccsds.org/Pubs/133x0b2e1.pdf), see the [sp]
//!    module.
//!  - The 4 byte header of the [CubeSat Space Protocol](https://github.com/libcsp/libcsp)
//!    version 1, see the [csp] module.
//!
//! Both codecs parse a raw byte slice into a header structure plus a borrowed view of the
//! trailing data field, and serialize those structures back into the exact byte layout.
//! The parsers never modify the passed buffer. Transport, checksum calculation, routing and
//! reassembly of segmented packets are left to the user.
//!
//! ## Features
//!
//! `spacecodecs` is suitable for `no_std` environments.
//!
//! It also offers optional support for [`serde`](https://serde.rs/). This allows serializing and
//! deserializing the header structures with an appropriate `serde` provider like
//! [`postcard`](https://github.com/jamesmunns/postcard).
//!
//! Default features:
//!
//!  - [`std`](https://doc.rust-lang.org/std/): Enables functionality relying on the standard
//!    library, for example the thread-safe sequence counters.
//!  - [`alloc`](https://doc.rust-lang.org/alloc/): Enables features which operate on containers
//!    like [`alloc::vec::Vec`](https://doc.rust-lang.org/beta/alloc/vec/struct.Vec.html).
//!    Enabled by the `std` feature.
//!
//! Optional features:
//!
//!  - `serde`: Adds `serde` support for the header structures, enumerations and errors.
//!  - `defmt`: Implements `defmt::Format` for the public data types.
//!
//! ## Example
//!
//! ```rust
//! use spacecodecs::sp::{CcsdsPacket, PacketType, SequenceFlags, SpacePacket};
//!
//! let raw = [0x10, 0x01, 0x40, 0x01, 0x00, 0x03, 0xDE, 0xAD, 0xBE, 0xEF];
//! let packet = SpacePacket::from_bytes(&raw).expect("parsing space packet failed");
//! assert_eq!(packet.packet_type(), PacketType::Tc);
//! assert_eq!(packet.apid(), 1);
//! assert_eq!(packet.seq_flags(), SequenceFlags::FirstSegment);
//! assert_eq!(packet.packet_data(), &[0xDE, 0xAD, 0xBE, 0xEF]);
//! ```
#![no_std]
#[cfg(feature = "alloc")]
extern crate alloc;
#[cfg(any(feature = "std", test))]
extern crate std;

pub mod csp;
pub mod seq_count;
pub mod sp;

/// Maximum length of a raw buffer which can be parsed by the codecs of this crate.
pub const MAX_PACKET_LEN: usize = u16::MAX as usize;

/// Generic error type for parsing raw packets.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    /// The passed buffer is smaller than the fixed header size.
    #[error("buffer with size {found} too short, expected at least {expected} bytes")]
    TooShort { found: usize, expected: usize },
    /// The passed buffer exceeds [MAX_PACKET_LEN].
    #[error("buffer with size {found} too long, maximum allowed size is {max} bytes")]
    TooLong { found: usize, max: usize },
    /// The CCSDS version field was not 0.
    #[error("invalid ccsds version {0}, only version 0 is supported")]
    InvalidVersion(u8),
    /// Raw packet type does not map to a [sp::PacketType].
    #[error("invalid packet type {0}")]
    InvalidPacketType(u8),
    /// Raw sequence flags do not map to [sp::SequenceFlags].
    #[error("invalid sequence flags {0:#04b}")]
    InvalidSequenceFlags(u8),
}

/// Error type for writing packets into raw buffers.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ByteConversionError {
    /// The passed slice is too small. Returns the passed slice length and expected minimum size
    #[error("target slice with size {found} is too small, expected size of at least {expected}")]
    ToSliceTooSmall { found: usize, expected: usize },
}

/// Checks the length of a raw buffer against a fixed header size and [MAX_PACKET_LEN].
pub(crate) fn check_packet_len(buf: &[u8], header_len: usize) -> Result<(), ParseError> {
    if buf.len() < header_len {
        return Err(ParseError::TooShort {
            found: buf.len(),
            expected: header_len,
        });
    }
    if buf.len() > MAX_PACKET_LEN {
        return Err(ParseError::TooLong {
            found: buf.len(),
            max: MAX_PACKET_LEN,
        });
    }
    Ok(())
}
