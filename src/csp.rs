//! # CubeSat Space Protocol header codec
//!
//! This module contains the codec for the 4 byte header of the CubeSat Space Protocol (CSP)
//! version 1. The header is handled as a single big endian 32 bit word with the following
//! layout, where bit 31 is the most significant bit:
//!
//! | Bits  | Field            |
//! |-------|------------------|
//! | 31    | unused, always 0 |
//! | 30    | priority         |
//! | 29-25 | source           |
//! | 24-20 | destination      |
//! | 19-14 | destination port |
//! | 13-8  | source port      |
//! | 7-4   | reserved         |
//! | 3     | HMAC flag        |
//! | 2     | XTEA flag        |
//! | 1     | RDP flag         |
//! | 0     | CRC flag         |
//!
//! The HMAC, XTEA, RDP and CRC flags are only carried. The codec does not calculate or verify
//! any checksum or authentication code. No field is validated beyond the buffer length, so any
//! bit pattern is a valid header.
//!
//! ## Example
//!
//! ```rust
//! use spacecodecs::csp::CspPacket;
//!
//! let raw = [0x40, 0x89, 0xAB, 0xC0, 0x01, 0x02, 0x03];
//! let packet = CspPacket::from_bytes(&raw).expect("parsing CSP packet failed");
//! assert_eq!(packet.header.destination, 8);
//! assert_eq!(packet.header.dest_port, 38);
//! assert_eq!(packet.data(), &[0x01, 0x02, 0x03]);
//! ```
use crate::{check_packet_len, ByteConversionError, ParseError};
#[cfg(feature = "alloc")]
use alloc::vec::Vec;

pub const CSP_HEADER_LEN: usize = 4;
pub const CSP_MAX_ADDR: u8 = 2u8.pow(5) - 1;
pub const CSP_MAX_PORT: u8 = 2u8.pow(6) - 1;

const PRIO_SHIFT: u32 = 30;
const SRC_SHIFT: u32 = 25;
const DST_SHIFT: u32 = 20;
const DPORT_SHIFT: u32 = 14;
const SPORT_SHIFT: u32 = 8;
const RESERVED_SHIFT: u32 = 4;

const PRIO_MASK: u32 = 0b1;
const ADDR_MASK: u32 = CSP_MAX_ADDR as u32;
const PORT_MASK: u32 = CSP_MAX_PORT as u32;
const RESERVED_MASK: u32 = 0b1111;

/// Optional CSP features which are signalled in the lowest 4 bits of the header.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CspFlags {
    /// HMAC authentication is used.
    pub hmac: bool,
    /// XTEA encryption is used.
    pub xtea: bool,
    /// The payload contains an RDP segment.
    pub rdp: bool,
    /// The payload is followed by a CRC32.
    pub crc: bool,
}

impl CspFlags {
    pub const fn raw(&self) -> u8 {
        ((self.hmac as u8) << 3) | ((self.xtea as u8) << 2) | ((self.rdp as u8) << 1) | self.crc as u8
    }
}

impl From<u8> for CspFlags {
    /// Only the lowest 4 bits are used.
    fn from(raw: u8) -> Self {
        CspFlags {
            hmac: (raw >> 3) & 0b1 != 0,
            xtea: (raw >> 2) & 0b1 != 0,
            rdp: (raw >> 1) & 0b1 != 0,
            crc: raw & 0b1 != 0,
        }
    }
}

/// CSP v1 header.
///
/// All fields are public. Values which exceed the width of their field are masked when the
/// header is serialized, so they never leak into neighbouring fields.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CspHeader {
    /// 1 bit
    pub priority: u8,
    /// Source address, 5 bits
    pub source: u8,
    /// Destination address, 5 bits
    pub destination: u8,
    /// 6 bits
    pub dest_port: u8,
    /// 6 bits
    pub source_port: u8,
    /// 4 bits which are passed through as they are.
    pub reserved: u8,
    pub flags: CspFlags,
}

impl CspHeader {
    /// Create a new header with cleared reserved bits and flags. Returns [None] if the priority
    /// exceeds 1, an address exceeds [CSP_MAX_ADDR] or a port exceeds [CSP_MAX_PORT].
    pub fn new(
        priority: u8,
        source: u8,
        destination: u8,
        dest_port: u8,
        source_port: u8,
    ) -> Option<Self> {
        if priority > 1
            || source > CSP_MAX_ADDR
            || destination > CSP_MAX_ADDR
            || dest_port > CSP_MAX_PORT
            || source_port > CSP_MAX_PORT
        {
            return None;
        }
        Some(CspHeader {
            priority,
            source,
            destination,
            dest_port,
            source_port,
            ..Default::default()
        })
    }

    /// Raw 32 bit header word.
    pub fn raw(&self) -> u32 {
        ((self.priority as u32 & PRIO_MASK) << PRIO_SHIFT)
            | ((self.source as u32 & ADDR_MASK) << SRC_SHIFT)
            | ((self.destination as u32 & ADDR_MASK) << DST_SHIFT)
            | ((self.dest_port as u32 & PORT_MASK) << DPORT_SHIFT)
            | ((self.source_port as u32 & PORT_MASK) << SPORT_SHIFT)
            | ((self.reserved as u32 & RESERVED_MASK) << RESERVED_SHIFT)
            | self.flags.raw() as u32
    }

    /// Parse the header from the start of the given buffer. Trailing bytes are ignored.
    pub fn from_bytes(buf: &[u8]) -> Result<Self, ParseError> {
        let zc_header = zc::CspHeader::from_bytes(buf).ok_or(ParseError::TooShort {
            found: buf.len(),
            expected: CSP_HEADER_LEN,
        })?;
        Ok(Self::from(zc_header.raw()))
    }

    /// Serialize the header. Fields exceeding their bit width are masked.
    pub fn to_bytes(&self) -> [u8; CSP_HEADER_LEN] {
        self.raw().to_be_bytes()
    }

    /// Write the header into the start of the given buffer. Returns the written length on
    /// success.
    pub fn write_to_bytes(&self, buf: &mut [u8]) -> Result<usize, ByteConversionError> {
        if buf.len() < CSP_HEADER_LEN {
            return Err(ByteConversionError::ToSliceTooSmall {
                found: buf.len(),
                expected: CSP_HEADER_LEN,
            });
        }
        buf[0..CSP_HEADER_LEN].copy_from_slice(&self.to_bytes());
        Ok(CSP_HEADER_LEN)
    }
}

impl From<u32> for CspHeader {
    /// Bit 31 of the raw word is ignored.
    fn from(raw: u32) -> Self {
        CspHeader {
            priority: ((raw >> PRIO_SHIFT) & PRIO_MASK) as u8,
            source: ((raw >> SRC_SHIFT) & ADDR_MASK) as u8,
            destination: ((raw >> DST_SHIFT) & ADDR_MASK) as u8,
            dest_port: ((raw >> DPORT_SHIFT) & PORT_MASK) as u8,
            source_port: ((raw >> SPORT_SHIFT) & PORT_MASK) as u8,
            reserved: ((raw >> RESERVED_SHIFT) & RESERVED_MASK) as u8,
            flags: CspFlags::from((raw & 0b1111) as u8),
        }
    }
}

impl From<CspHeader> for u32 {
    fn from(header: CspHeader) -> Self {
        header.raw()
    }
}

/// CSP packet consisting of the header and a data field borrowed from the raw buffer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CspPacket<'raw> {
    pub header: CspHeader,
    data: &'raw [u8],
}

impl<'raw> CspPacket<'raw> {
    pub fn new(header: CspHeader, data: &'raw [u8]) -> Self {
        Self { header, data }
    }

    /// Parse a CSP packet. The buffer must contain at least the 4 byte header and must not be
    /// larger than [crate::MAX_PACKET_LEN]. All bytes after the header form the data field.
    pub fn from_bytes(buf: &'raw [u8]) -> Result<Self, ParseError> {
        check_packet_len(buf, CSP_HEADER_LEN)?;
        let header = CspHeader::from_bytes(buf)?;
        Ok(Self {
            header,
            data: &buf[CSP_HEADER_LEN..],
        })
    }

    pub fn data(&self) -> &'raw [u8] {
        self.data
    }

    pub fn len_packed(&self) -> usize {
        CSP_HEADER_LEN + self.data.len()
    }

    /// Write the whole packet into the given buffer. Returns the written length on success.
    pub fn write_to_bytes(&self, buf: &mut [u8]) -> Result<usize, ByteConversionError> {
        let len_packed = self.len_packed();
        if buf.len() < len_packed {
            return Err(ByteConversionError::ToSliceTooSmall {
                found: buf.len(),
                expected: len_packed,
            });
        }
        self.header.write_to_bytes(buf)?;
        buf[CSP_HEADER_LEN..len_packed].copy_from_slice(self.data);
        Ok(len_packed)
    }

    /// Serialize the packet into a newly allocated vector.
    #[cfg(feature = "alloc")]
    pub fn to_vec(&self) -> Vec<u8> {
        let mut vec = Vec::with_capacity(self.len_packed());
        vec.extend_from_slice(&self.header.to_bytes());
        vec.extend_from_slice(self.data);
        vec
    }
}

pub mod zc {
    use super::{CspHeader as CspHeaderValue, CSP_HEADER_LEN};
    use zerocopy::byteorder::NetworkEndian;
    use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned, U32};

    /// Zero-copy view of the raw CSP header word in network byte order.
    #[derive(FromZeroes, FromBytes, AsBytes, Unaligned, Debug, Copy, Clone, PartialEq, Eq)]
    #[repr(C)]
    pub struct CspHeader {
        raw: U32<NetworkEndian>,
    }

    impl CspHeader {
        /// Read the header from the start of the slice. Returns [None] if the slice is shorter
        /// than the header.
        pub fn from_bytes(slice: &[u8]) -> Option<Self> {
            CspHeader::read_from_prefix(slice)
        }

        pub fn to_bytes(&self) -> [u8; CSP_HEADER_LEN] {
            let mut raw = [0; CSP_HEADER_LEN];
            raw.copy_from_slice(self.as_bytes());
            raw
        }

        #[inline]
        pub fn raw(&self) -> u32 {
            self.raw.get()
        }
    }

    impl From<CspHeaderValue> for CspHeader {
        fn from(header: CspHeaderValue) -> Self {
            CspHeader {
                raw: U32::new(header.raw()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MAX_PACKET_LEN;
    #[cfg(feature = "serde")]
    use postcard::{from_bytes, to_allocvec};

    const WORKED_EXAMPLE: [u8; 7] = [0x40, 0x89, 0xAB, 0xC0, 0x01, 0x02, 0x03];

    fn worked_example_header() -> CspHeader {
        CspHeader {
            priority: 1,
            source: 0,
            destination: 8,
            dest_port: 38,
            source_port: 43,
            reserved: 12,
            flags: CspFlags::default(),
        }
    }

    #[test]
    fn test_parse_worked_example() {
        let packet = CspPacket::from_bytes(&WORKED_EXAMPLE).expect("parsing failed");
        let header = packet.header;
        assert_eq!(header.priority, 1);
        assert_eq!(header.source, 0);
        assert_eq!(header.destination, 8);
        assert_eq!(header.dest_port, 38);
        assert_eq!(header.source_port, 43);
        assert_eq!(header.reserved, 12);
        assert!(!header.flags.hmac);
        assert!(!header.flags.xtea);
        assert!(!header.flags.rdp);
        assert!(!header.flags.crc);
        assert_eq!(packet.data(), &[0x01, 0x02, 0x03]);
        assert_eq!(header, worked_example_header());
    }

    #[test]
    fn test_serialize_worked_example() {
        let data = [0x01, 0x02, 0x03];
        let packet = CspPacket::new(worked_example_header(), &data);
        let mut buf: [u8; 12] = [0; 12];
        let written = packet.write_to_bytes(&mut buf).unwrap();
        assert_eq!(written, 7);
        assert_eq!(buf[0..7], WORKED_EXAMPLE);
        #[cfg(feature = "alloc")]
        assert_eq!(packet.to_vec(), WORKED_EXAMPLE);
    }

    #[test]
    fn test_flags() {
        let flags = CspFlags {
            hmac: true,
            xtea: false,
            rdp: true,
            crc: true,
        };
        assert_eq!(flags.raw(), 0b1011);
        assert_eq!(CspFlags::from(0b1011), flags);
        assert_eq!(CspFlags::from(0b1111_0000), CspFlags::default());

        let mut header = worked_example_header();
        header.flags = flags;
        let raw = header.to_bytes();
        assert_eq!(raw, [0x40, 0x89, 0xAB, 0xCB]);
        assert_eq!(CspHeader::from_bytes(&raw).unwrap().flags, flags);
    }

    #[test]
    fn test_round_trip_max_values() {
        let header = CspHeader {
            priority: 1,
            source: CSP_MAX_ADDR,
            destination: CSP_MAX_ADDR,
            dest_port: CSP_MAX_PORT,
            source_port: CSP_MAX_PORT,
            reserved: 0b1111,
            flags: CspFlags::from(0b1111),
        };
        assert_eq!(header.raw(), 0x7FFF_FFFF);
        let data = [0xAA; 5];
        let packet = CspPacket::new(header, &data);
        let mut buf: [u8; 9] = [0; 9];
        packet.write_to_bytes(&mut buf).unwrap();
        assert_eq!(CspPacket::from_bytes(&buf).unwrap(), packet);
    }

    #[test]
    fn test_top_bit_ignored() {
        let mut raw = WORKED_EXAMPLE;
        raw[0] |= 0x80;
        let header = CspHeader::from_bytes(&raw).unwrap();
        assert_eq!(header, worked_example_header());
        assert_eq!(header.to_bytes()[0], 0x40);
    }

    #[test]
    fn test_serialization_masks_fields() {
        let header = CspHeader {
            priority: 0,
            source: 0xFF,
            destination: 0,
            dest_port: 0,
            source_port: 0xFF,
            reserved: 0,
            flags: CspFlags::default(),
        };
        // Overflowing source bits must neither set the priority nor the unused top bit.
        assert_eq!(header.raw(), 0x3E00_3F00);
        let header_parsed = CspHeader::from(header.raw());
        assert_eq!(header_parsed.priority, 0);
        assert_eq!(header_parsed.source, CSP_MAX_ADDR);
        assert_eq!(header_parsed.destination, 0);
        assert_eq!(header_parsed.source_port, CSP_MAX_PORT);
        assert_eq!(header_parsed.reserved, 0);
    }

    #[test]
    fn test_too_short() {
        assert_eq!(
            CspPacket::from_bytes(&WORKED_EXAMPLE[0..3]).unwrap_err(),
            ParseError::TooShort {
                found: 3,
                expected: 4
            }
        );
        assert!(CspHeader::from_bytes(&[]).is_err());
    }

    #[test]
    fn test_header_only() {
        let packet = CspPacket::from_bytes(&WORKED_EXAMPLE[0..4]).unwrap();
        assert!(packet.data().is_empty());
        assert_eq!(packet.len_packed(), 4);
        assert_eq!(packet.header, worked_example_header());
    }

    #[test]
    fn test_too_long() {
        let raw = std::vec![0; MAX_PACKET_LEN + 1];
        assert_eq!(
            CspPacket::from_bytes(&raw).unwrap_err(),
            ParseError::TooLong {
                found: 65536,
                max: 65535
            }
        );
        let packet = CspPacket::from_bytes(&raw[0..MAX_PACKET_LEN]).unwrap();
        assert_eq!(packet.data().len(), MAX_PACKET_LEN - CSP_HEADER_LEN);
    }

    #[test]
    fn test_write_to_small_buf() {
        let data = [1, 2, 3];
        let packet = CspPacket::new(worked_example_header(), &data);
        let mut buf: [u8; 6] = [0; 6];
        assert_eq!(
            packet.write_to_bytes(&mut buf).unwrap_err(),
            ByteConversionError::ToSliceTooSmall {
                found: 6,
                expected: 7
            }
        );
        assert_eq!(
            packet.header.write_to_bytes(&mut buf[0..2]).unwrap_err(),
            ByteConversionError::ToSliceTooSmall {
                found: 2,
                expected: 4
            }
        );
    }

    #[test]
    fn test_new() {
        let header = CspHeader::new(1, 0, 8, 38, 43).expect("creating CSP header failed");
        assert_eq!(header.reserved, 0);
        assert_eq!(header.flags, CspFlags::default());
        assert_eq!(header.to_bytes(), [0x40, 0x89, 0xAB, 0x00]);
        assert!(CspHeader::new(2, 0, 0, 0, 0).is_none());
        assert!(CspHeader::new(0, CSP_MAX_ADDR + 1, 0, 0, 0).is_none());
        assert!(CspHeader::new(0, 0, CSP_MAX_ADDR + 1, 0, 0).is_none());
        assert!(CspHeader::new(0, 0, 0, CSP_MAX_PORT + 1, 0).is_none());
        assert!(CspHeader::new(0, 0, 0, 0, CSP_MAX_PORT + 1).is_none());
    }

    #[test]
    fn test_zc_header() {
        let header_zc = zc::CspHeader::from(worked_example_header());
        assert_eq!(header_zc.raw(), 0x4089_ABC0);
        assert_eq!(header_zc.to_bytes(), WORKED_EXAMPLE[0..4]);
        let header_zc = zc::CspHeader::from_bytes(&WORKED_EXAMPLE).unwrap();
        assert_eq!(CspHeader::from(header_zc.raw()), worked_example_header());
        assert_eq!(u32::from(worked_example_header()), 0x4089_ABC0);
        assert!(zc::CspHeader::from_bytes(&WORKED_EXAMPLE[0..3]).is_none());
    }

    #[test]
    #[cfg(feature = "serde")]
    fn test_serde_csp_header() {
        let header = worked_example_header();
        let output = to_allocvec(&header).unwrap();
        let header_deser: CspHeader = from_bytes(&output).unwrap();
        assert_eq!(header_deser, header);
    }
}
