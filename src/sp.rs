//! # CCSDS Space Packet codec
//!
//! This module contains the codec for the Space Packet primary header according to
//! [CCSDS 133.0-B-2](https://public.ccsds.org/Pubs/133x0b2e1.pdf). The [SpHeader] structure
//! represents the 6 byte primary header, while [SpacePacket] additionally carries a borrowed view
//! of the packet data field following the header.
//!
//! The packet data length field is stored exactly as it is found on the wire. The CCSDS
//! standard defines this field as the length of the packet data field minus one, but no
//! adjustment is performed by the codec. [CcsdsPacket::total_len] can be used to retrieve the
//! total packet length according to that convention.
//!
//! ## Example
//!
//! ```rust
//! use spacecodecs::sp::{CcsdsPacket, SpHeader, SpacePacket};
//!
//! let sp_header = SpHeader::tc(0x42, 12, 3).expect("error creating SP header");
//! let data = [1, 2, 3, 4];
//! let packet = SpacePacket::new(sp_header, &data);
//! let mut buf: [u8; 32] = [0; 32];
//! let written = packet.write_to_bytes(&mut buf).expect("error writing space packet");
//! assert_eq!(written, 10);
//!
//! let packet_parsed = SpacePacket::from_bytes(&buf[0..written]).expect("parsing failed");
//! assert_eq!(packet_parsed.apid(), 0x42);
//! assert_eq!(packet_parsed, packet);
//! ```
use crate::{check_packet_len, ByteConversionError, ParseError};
use delegate::delegate;
#[cfg(feature = "alloc")]
use alloc::vec::Vec;

/// Length of the CCSDS primary header.
pub const CCSDS_HEADER_LEN: usize = 6;
pub const MAX_APID: u16 = 2u16.pow(11) - 1;
pub const MAX_SEQ_COUNT: u16 = 2u16.pow(14) - 1;
/// The data length field is treated as an 11 bit field by this codec.
pub const MAX_DATA_LEN: u16 = 2u16.pow(11) - 1;

const VERSION_MASK: u16 = 0xE000;
const SSC_MASK: u16 = 0x3FFF;

/// CCSDS packet type, occupies a single bit of the primary header.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, num_enum::TryFromPrimitive, num_enum::IntoPrimitive,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum PacketType {
    /// Telemetry
    Tm = 0,
    /// Telecommand
    Tc = 1,
}

/// Position of a packet inside a segmented transfer, occupies two bits of the primary header.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, num_enum::TryFromPrimitive, num_enum::IntoPrimitive,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum SequenceFlags {
    ContinuationSegment = 0b00,
    FirstSegment = 0b01,
    LastSegment = 0b10,
    Unsegmented = 0b11,
}

/// Generic trait to access fields of a CCSDS space packet header according to CCSDS 133.0-B-2
pub trait CcsdsPacket {
    fn ccsds_version(&self) -> u8;
    fn packet_type(&self) -> PacketType;
    /// Retrieve the secondary header flag. Returns true if a secondary header is present
    /// and false if it is not
    fn sec_header_flag(&self) -> bool;
    /// Retrieve Application Process ID
    fn apid(&self) -> u16;
    fn seq_flags(&self) -> SequenceFlags;
    fn seq_count(&self) -> u16;
    /// Retrieve the raw data length field.
    fn data_len(&self) -> u16;

    /// Retrieve the total packet size based on the data length field, which is the length of the
    /// packet data field minus one.
    #[inline]
    fn total_len(&self) -> usize {
        usize::from(self.data_len()) + CCSDS_HEADER_LEN + 1
    }

    #[inline]
    fn is_tm(&self) -> bool {
        self.packet_type() == PacketType::Tm
    }

    #[inline]
    fn is_tc(&self) -> bool {
        self.packet_type() == PacketType::Tc
    }

    /// Retrieve the 13 bit Packet Identification field which consists of the packet type,
    /// the secondary header flag and the APID.
    #[inline]
    fn packet_id_raw(&self) -> u16 {
        ((self.packet_type() as u16) << 12)
            | ((self.sec_header_flag() as u16) << 11)
            | (self.apid() & MAX_APID)
    }

    /// Retrieve the 16 bit Packet Sequence Control field.
    #[inline]
    fn psc_raw(&self) -> u16 {
        ((self.seq_flags() as u16) << 14) | (self.seq_count() & SSC_MASK)
    }
}

/// Space Packet Primary Header according to CCSDS 133.0-B-2
///
/// All fields are public. Values which exceed the width of their field are truncated when the
/// header is serialized. The range checked constructors and setters can be used to avoid this.
///
/// # Arguments
///
/// * `version` - CCSDS version field, occupies the first 3 bits of the raw header. Only version
///    0 is accepted by the parser
/// * `packet_type` - Telemetry or telecommand, 1 bit
/// * `sec_header_flag` - Secondary header flag, 1 bit
/// * `apid` - Application Process ID, 11 bits
/// * `seq_flags` - Sequence flags, 2 bits
/// * `seq_count` - Packet sequence count, 14 bits
/// * `data_len` - Raw data length field, 11 bits
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpHeader {
    pub version: u8,
    pub packet_type: PacketType,
    pub sec_header_flag: bool,
    pub apid: u16,
    pub seq_flags: SequenceFlags,
    pub seq_count: u16,
    pub data_len: u16,
}

impl Default for SpHeader {
    fn default() -> Self {
        SpHeader {
            version: 0,
            packet_type: PacketType::Tm,
            sec_header_flag: false,
            apid: 0,
            seq_flags: SequenceFlags::Unsegmented,
            seq_count: 0,
            data_len: 0,
        }
    }
}

impl SpHeader {
    /// Create a new unsegmented Space Packet Header. This will return [None] if the APID,
    /// sequence count or data length argument exceed [MAX_APID], [MAX_SEQ_COUNT] or
    /// [MAX_DATA_LEN] respectively.
    pub fn new(
        packet_type: PacketType,
        sec_header_flag: bool,
        apid: u16,
        seq_count: u16,
        data_len: u16,
    ) -> Option<Self> {
        if apid > MAX_APID || seq_count > MAX_SEQ_COUNT || data_len > MAX_DATA_LEN {
            return None;
        }
        Some(SpHeader {
            packet_type,
            sec_header_flag,
            apid,
            seq_count,
            data_len,
            ..Default::default()
        })
    }

    /// Helper function for telemetry space packet headers. The packet type field will be
    /// set accordingly.
    pub fn tm(apid: u16, seq_count: u16, data_len: u16) -> Option<Self> {
        Self::new(PacketType::Tm, false, apid, seq_count, data_len)
    }

    /// Helper function for telecommand space packet headers. The packet type field will be
    /// set accordingly.
    pub fn tc(apid: u16, seq_count: u16, data_len: u16) -> Option<Self> {
        Self::new(PacketType::Tc, false, apid, seq_count, data_len)
    }

    /// Set a new Application Process ID (APID). If the passed number is invalid, the APID will
    /// not be set and false will be returned. The maximum allowed value for the 11-bit field is
    /// 2047
    pub fn set_apid(&mut self, apid: u16) -> bool {
        if apid > MAX_APID {
            return false;
        }
        self.apid = apid;
        true
    }

    /// Set a new sequence count. If the passed number is invalid, the sequence count will not be
    /// set and false will be returned. The maximum allowed value for the 14-bit field is 16383
    pub fn set_seq_count(&mut self, seq_count: u16) -> bool {
        if seq_count > MAX_SEQ_COUNT {
            return false;
        }
        self.seq_count = seq_count;
        true
    }

    /// Set the raw data length field. False is returned and the field is left untouched if the
    /// value exceeds [MAX_DATA_LEN].
    pub fn set_data_len(&mut self, data_len: u16) -> bool {
        if data_len > MAX_DATA_LEN {
            return false;
        }
        self.data_len = data_len;
        true
    }

    pub fn set_seq_flags(&mut self, seq_flags: SequenceFlags) {
        self.seq_flags = seq_flags;
    }

    pub fn set_sec_header_flag(&mut self) {
        self.sec_header_flag = true;
    }

    pub fn clear_sec_header_flag(&mut self) {
        self.sec_header_flag = false;
    }

    pub fn set_packet_type(&mut self, packet_type: PacketType) {
        self.packet_type = packet_type;
    }

    /// Parse the primary header from the start of the given buffer. Trailing bytes are ignored.
    pub fn from_bytes(buf: &[u8]) -> Result<Self, ParseError> {
        let zc_header = zc::SpHeader::from_bytes(buf).ok_or(ParseError::TooShort {
            found: buf.len(),
            expected: CCSDS_HEADER_LEN,
        })?;
        Self::try_from(zc_header)
    }

    /// Write the header into the start of the given buffer. Returns the written length on
    /// success.
    pub fn write_to_bytes(&self, buf: &mut [u8]) -> Result<usize, ByteConversionError> {
        if buf.len() < CCSDS_HEADER_LEN {
            return Err(ByteConversionError::ToSliceTooSmall {
                found: buf.len(),
                expected: CCSDS_HEADER_LEN,
            });
        }
        buf[0..CCSDS_HEADER_LEN].copy_from_slice(&self.to_bytes());
        Ok(CCSDS_HEADER_LEN)
    }

    /// Serialize the header. Fields exceeding their bit width are truncated.
    pub fn to_bytes(&self) -> [u8; CCSDS_HEADER_LEN] {
        zc::SpHeader::from(*self).to_bytes()
    }
}

impl CcsdsPacket for SpHeader {
    #[inline]
    fn ccsds_version(&self) -> u8 {
        self.version
    }

    #[inline]
    fn packet_type(&self) -> PacketType {
        self.packet_type
    }

    #[inline]
    fn sec_header_flag(&self) -> bool {
        self.sec_header_flag
    }

    #[inline]
    fn apid(&self) -> u16 {
        self.apid
    }

    #[inline]
    fn seq_flags(&self) -> SequenceFlags {
        self.seq_flags
    }

    #[inline]
    fn seq_count(&self) -> u16 {
        self.seq_count
    }

    #[inline]
    fn data_len(&self) -> u16 {
        self.data_len
    }
}

impl TryFrom<zc::SpHeader> for SpHeader {
    type Error = ParseError;

    fn try_from(zc_header: zc::SpHeader) -> Result<Self, Self::Error> {
        let version = zc_header.ccsds_version();
        if version != 0 {
            return Err(ParseError::InvalidVersion(version));
        }
        let packet_id = zc_header.packet_id_raw();
        let psc = zc_header.psc_raw();
        // Both conversions can not fail for the masked raw values. They stay fallible so that a
        // change of the field widths is caught here.
        let packet_type = PacketType::try_from(((packet_id >> 12) & 0b1) as u8)
            .map_err(|e| ParseError::InvalidPacketType(e.number))?;
        let seq_flags = SequenceFlags::try_from(((psc >> 14) & 0b11) as u8)
            .map_err(|e| ParseError::InvalidSequenceFlags(e.number))?;
        Ok(SpHeader {
            version,
            packet_type,
            sec_header_flag: ((packet_id >> 11) & 0b1) != 0,
            apid: packet_id & MAX_APID,
            seq_flags,
            seq_count: psc & SSC_MASK,
            data_len: zc_header.data_len_raw() & MAX_DATA_LEN,
        })
    }
}

/// CCSDS Space Packet consisting of the primary header and a borrowed packet data field.
///
/// The packet data field references the buffer the packet was parsed from, so the buffer can
/// not be modified while the packet is alive. Use [SpacePacket::to_vec] or
/// [SpacePacket::write_to_bytes] to get an independent copy.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpacePacket<'raw> {
    pub header: SpHeader,
    packet_data: &'raw [u8],
}

impl<'raw> SpacePacket<'raw> {
    /// Create a packet from a header and a packet data field. The data length field of the
    /// header is used as is, see [Self::set_ccsds_data_len] to update it from the data field.
    pub fn new(header: SpHeader, packet_data: &'raw [u8]) -> Self {
        Self {
            header,
            packet_data,
        }
    }

    /// Parse a space packet. The buffer must contain at least the 6 byte primary header and
    /// must not be larger than [crate::MAX_PACKET_LEN]. All bytes after the header form the
    /// packet data field, which may be empty.
    pub fn from_bytes(buf: &'raw [u8]) -> Result<Self, ParseError> {
        check_packet_len(buf, CCSDS_HEADER_LEN)?;
        let header = SpHeader::from_bytes(buf)?;
        Ok(Self {
            header,
            packet_data: &buf[CCSDS_HEADER_LEN..],
        })
    }

    pub fn packet_data(&self) -> &'raw [u8] {
        self.packet_data
    }

    /// Length of the serialized packet.
    pub fn len_packed(&self) -> usize {
        CCSDS_HEADER_LEN + self.packet_data.len()
    }

    /// Set the data length field from the length of the packet data field according to the
    /// CCSDS convention, which is the data field length minus one. An empty data field yields 0.
    /// If the resulting value exceeds [MAX_DATA_LEN], the field is not set and false is returned.
    pub fn set_ccsds_data_len(&mut self) -> bool {
        let data_len = self.packet_data.len().saturating_sub(1);
        if data_len > usize::from(MAX_DATA_LEN) {
            return false;
        }
        self.header.data_len = data_len as u16;
        true
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
        buf[CCSDS_HEADER_LEN..len_packed].copy_from_slice(self.packet_data);
        Ok(len_packed)
    }

    /// Serialize the packet into a newly allocated vector.
    #[cfg(feature = "alloc")]
    pub fn to_vec(&self) -> Vec<u8> {
        let mut vec = Vec::with_capacity(self.len_packed());
        vec.extend_from_slice(&self.header.to_bytes());
        vec.extend_from_slice(self.packet_data);
        vec
    }

    delegate!(to self.header {
        pub fn set_apid(&mut self, apid: u16) -> bool;
        pub fn set_seq_count(&mut self, seq_count: u16) -> bool;
        pub fn set_seq_flags(&mut self, seq_flags: SequenceFlags);
        pub fn set_packet_type(&mut self, packet_type: PacketType);
    });
}

impl CcsdsPacket for SpacePacket<'_> {
    delegate!(to self.header {
        fn ccsds_version(&self) -> u8;
        fn packet_type(&self) -> PacketType;
        fn sec_header_flag(&self) -> bool;
        fn apid(&self) -> u16;
        fn seq_flags(&self) -> SequenceFlags;
        fn seq_count(&self) -> u16;
        fn data_len(&self) -> u16;
    });
}

pub mod zc {
    use super::{
        CcsdsPacket, PacketType, SequenceFlags, SpHeader as SpHeaderValue, CCSDS_HEADER_LEN,
        MAX_APID, MAX_DATA_LEN, SSC_MASK, VERSION_MASK,
    };
    use zerocopy::byteorder::NetworkEndian;
    use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned, U16};

    /// Zero-copy view of the raw primary header in network byte order.
    #[derive(FromZeroes, FromBytes, AsBytes, Unaligned, Debug, Copy, Clone, PartialEq, Eq)]
    #[repr(C)]
    pub struct SpHeader {
        version_packet_id: U16<NetworkEndian>,
        psc: U16<NetworkEndian>,
        data_len: U16<NetworkEndian>,
    }

    impl SpHeader {
        /// Read the header from the start of the slice. Returns [None] if the slice is shorter
        /// than the header.
        pub fn from_bytes(slice: &[u8]) -> Option<Self> {
            SpHeader::read_from_prefix(slice)
        }

        pub fn to_bytes(&self) -> [u8; CCSDS_HEADER_LEN] {
            let mut raw = [0; CCSDS_HEADER_LEN];
            raw.copy_from_slice(self.as_bytes());
            raw
        }

        /// Raw 16 bit data length field without any masking.
        #[inline]
        pub fn data_len_raw(&self) -> u16 {
            self.data_len.get()
        }
    }

    impl CcsdsPacket for SpHeader {
        #[inline]
        fn ccsds_version(&self) -> u8 {
            ((self.version_packet_id.get() >> 13) as u8) & 0b111
        }

        #[inline]
        fn packet_type(&self) -> PacketType {
            if (self.packet_id_raw() >> 12) & 0b1 == 0 {
                PacketType::Tm
            } else {
                PacketType::Tc
            }
        }

        #[inline]
        fn sec_header_flag(&self) -> bool {
            (self.packet_id_raw() >> 11) & 0b1 != 0
        }

        #[inline]
        fn apid(&self) -> u16 {
            self.packet_id_raw() & MAX_APID
        }

        fn seq_flags(&self) -> SequenceFlags {
            match (self.psc_raw() >> 14) & 0b11 {
                0b00 => SequenceFlags::ContinuationSegment,
                0b01 => SequenceFlags::FirstSegment,
                0b10 => SequenceFlags::LastSegment,
                _ => SequenceFlags::Unsegmented,
            }
        }

        #[inline]
        fn seq_count(&self) -> u16 {
            self.psc_raw() & SSC_MASK
        }

        /// Data length field masked to [MAX_DATA_LEN].
        #[inline]
        fn data_len(&self) -> u16 {
            self.data_len.get() & MAX_DATA_LEN
        }

        #[inline]
        fn packet_id_raw(&self) -> u16 {
            self.version_packet_id.get() & (!VERSION_MASK)
        }

        #[inline]
        fn psc_raw(&self) -> u16 {
            self.psc.get()
        }
    }

    impl From<SpHeaderValue> for SpHeader {
        fn from(header: SpHeaderValue) -> Self {
            let version = ((header.version as u16) << 13) & VERSION_MASK;
            SpHeader {
                version_packet_id: U16::new(version | header.packet_id_raw()),
                psc: U16::new(header.psc_raw()),
                data_len: U16::new(header.data_len & MAX_DATA_LEN),
            }
        }
    }
}
