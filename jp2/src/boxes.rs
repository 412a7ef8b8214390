//! Box headers and box classification.
//!
//! Every box starts with an 8-byte header: a 4-byte big endian length (LBox) followed by a
//! 4-byte type (TBox). The length includes the header itself.

use std::fmt;

use crate::{Jp2Error, Result};

/// Four character box type, e.g. `*b"jp2h"`.
pub type BoxType = [u8; 4];

pub const BOX_TYPE_SIGNATURE: BoxType = [106, 80, 32, 32];
pub const BOX_TYPE_FILE_TYPE: BoxType = [102, 116, 121, 112];
pub const BOX_TYPE_HEADER: BoxType = [106, 112, 50, 104];
pub const BOX_TYPE_IMAGE_HEADER: BoxType = [105, 104, 100, 114];
pub const BOX_TYPE_COLOUR_SPECIFICATION: BoxType = [99, 111, 108, 114];
pub const BOX_TYPE_CONTIGUOUS_CODESTREAM: BoxType = [106, 112, 50, 99];
pub const BOX_TYPE_UUID: BoxType = [117, 117, 105, 100];

/// Size of the LBox and TBox fields.
pub const BOX_HEADER_SIZE: usize = 8;

/// Size of the UUID field at the start of a UUID box payload.
pub const UUID_SIZE: usize = 16;

// JPEG 2000 UUIDs for embedded metadata.
//
// IPTC-NAA: ISO/IEC JTC1/SC29/WG1 N2600, XMP: XMP Specification Part 3.
pub const UUID_EXIF: [u8; 16] = *b"JpgTiffExif->JP2";
pub const UUID_IPTC: [u8; 16] = [
    0x33, 0xc7, 0xa4, 0xd2, 0xb8, 0x1d, 0x47, 0x23, 0xa0, 0xba, 0xf1, 0xa3, 0xe0, 0x97, 0xad, 0x38,
];
pub const UUID_XMP: [u8; 16] = [
    0xbe, 0x7a, 0xcf, 0xcb, 0x97, 0xa9, 0x42, 0xe8, 0x9c, 0x71, 0x99, 0x94, 0x91, 0xe3, 0xaf, 0xac,
];

/// Box header (LBox, TBox).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoxHeader {
    /// Box length (LBox), including the 8-byte header.
    ///
    /// A value of 0 means the box extends to the end of the file, a value of 1 means the
    /// actual length is stored in an 8-byte XLBox field following the type.
    pub length: u32,

    /// Box type (TBox).
    pub box_type: BoxType,
}

impl BoxHeader {
    pub fn new(length: u32, box_type: BoxType) -> BoxHeader {
        BoxHeader { length, box_type }
    }

    /// Decode the header from 8 raw bytes, both fields big endian.
    pub fn decode(bytes: &[u8; 8]) -> BoxHeader {
        BoxHeader {
            length: u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            box_type: [bytes[4], bytes[5], bytes[6], bytes[7]],
        }
    }

    /// Decode the header at the start of `bytes`.
    ///
    /// Fails if fewer than 8 bytes are available; `offset` is only used for the error.
    pub fn decode_slice(bytes: &[u8], offset: u64) -> Result<BoxHeader> {
        if bytes.len() < BOX_HEADER_SIZE {
            return Err(Jp2Error::corrupted(offset, "truncated box header"));
        }
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&bytes[..BOX_HEADER_SIZE]);
        Ok(BoxHeader::decode(&raw))
    }

    pub fn encode(&self) -> [u8; 8] {
        let mut bytes = [0u8; 8];
        bytes[..4].copy_from_slice(&self.length.to_be_bytes());
        bytes[4..].copy_from_slice(&self.box_type);
        bytes
    }

    /// The type as a big endian 32-bit code, e.g. `0x6a703268` for `jp2h`.
    pub fn type_code(&self) -> u32 {
        u32::from_be_bytes(self.box_type)
    }

    /// Returns true for the LBox values 0 and 1, whose real extent is not given by LBox.
    pub fn extends_beyond_length(&self) -> bool {
        self.length == 0 || self.length == 1
    }
}

impl fmt::Display for BoxHeader {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({} bytes)", type_to_ascii(&self.box_type), self.length)
    }
}

/// Render a box type as four characters, replacing non-printable bytes with `.`.
pub fn type_to_ascii(box_type: &BoxType) -> String {
    box_type
        .iter()
        .map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '.'
            }
        })
        .collect()
}

/// Box roles relevant to metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxTypes {
    Signature,
    FileType,
    Header,
    ImageHeader,
    ColourSpecification,
    ContiguousCodestream,
    Uuid,
    Unknown,
}

impl fmt::Display for BoxTypes {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl BoxTypes {
    pub fn new(value: BoxType) -> BoxTypes {
        match value {
            BOX_TYPE_SIGNATURE => BoxTypes::Signature,
            BOX_TYPE_FILE_TYPE => BoxTypes::FileType,
            BOX_TYPE_HEADER => BoxTypes::Header,
            BOX_TYPE_IMAGE_HEADER => BoxTypes::ImageHeader,
            BOX_TYPE_COLOUR_SPECIFICATION => BoxTypes::ColourSpecification,
            BOX_TYPE_CONTIGUOUS_CODESTREAM => BoxTypes::ContiguousCodestream,
            BOX_TYPE_UUID => BoxTypes::Uuid,
            _ => BoxTypes::Unknown,
        }
    }
}

/// Kind of metadata selected by the identifier of a UUID box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UuidKind {
    Exif,
    Iptc,
    Xmp,
    Unknown,
}

impl UuidKind {
    /// Exact comparison against the three known identifiers.
    pub fn new(uuid: &[u8; 16]) -> UuidKind {
        match *uuid {
            UUID_EXIF => UuidKind::Exif,
            UUID_IPTC => UuidKind::Iptc,
            UUID_XMP => UuidKind::Xmp,
            _ => UuidKind::Unknown,
        }
    }

    /// The identifier written for this kind, `None` for unknown boxes.
    pub fn uuid(&self) -> Option<&'static [u8; 16]> {
        match self {
            UuidKind::Exif => Some(&UUID_EXIF),
            UuidKind::Iptc => Some(&UUID_IPTC),
            UuidKind::Xmp => Some(&UUID_XMP),
            UuidKind::Unknown => None,
        }
    }

    /// Label used by the structure printer.
    pub fn label(&self) -> &'static str {
        match self {
            UuidKind::Exif => "Exif: ",
            UuidKind::Iptc => "IPTC: ",
            UuidKind::Xmp => "XMP : ",
            UuidKind::Unknown => "????: ",
        }
    }
}

/// JPEG 2000 box trait.
///
/// Implemented by the boxes whose contents are interpreted by this crate. The contents are
/// decoded from the payload bytes that follow the box header; the caller has already
/// checked that the payload lies within the box's declared extent.
pub trait JBox {
    fn identifier(&self) -> BoxType;
    fn length(&self) -> u64;
    fn offset(&self) -> u64;

    fn decode(&mut self, payload: &[u8]) -> Result<()>;
}

/// UUID box.
///
/// A UUID box carries vendor specific information, the format of which is selected by a
/// 16-byte UUID at the start of the box contents.
///
/// See ISO/IEC 15444-1:2024 Section I.7.2 for more details on this box.
#[derive(Debug, Default)]
pub struct UuidBox {
    pub(crate) length: u64,
    pub(crate) offset: u64,
    uuid: [u8; 16],
    data: Vec<u8>,
}

impl UuidBox {
    pub fn new(offset: u64, length: u64) -> UuidBox {
        UuidBox {
            length,
            offset,
            ..Default::default()
        }
    }

    /// The 16-byte identifier.
    pub fn uuid(&self) -> &[u8; 16] {
        &self.uuid
    }

    pub fn kind(&self) -> UuidKind {
        UuidKind::new(&self.uuid)
    }

    /// The bytes following the identifier.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Build a complete UUID box: length, `uuid` type, identifier, payload.
    pub fn encode(uuid: &[u8; 16], payload: &[u8]) -> Result<Vec<u8>> {
        let total = BOX_HEADER_SIZE + UUID_SIZE + payload.len();
        if total > u32::MAX as usize {
            return Err(Jp2Error::corrupted(0, "UUID box payload too large"));
        }
        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(&BoxHeader::new(total as u32, BOX_TYPE_UUID).encode());
        out.extend_from_slice(uuid);
        out.extend_from_slice(payload);
        Ok(out)
    }
}

impl JBox for UuidBox {
    // The type of a UUID box shall be ‘uuid’ (0x7575 6964).
    fn identifier(&self) -> BoxType {
        BOX_TYPE_UUID
    }

    fn length(&self) -> u64 {
        self.length
    }

    fn offset(&self) -> u64 {
        self.offset
    }

    fn decode(&mut self, payload: &[u8]) -> Result<()> {
        if payload.len() < UUID_SIZE {
            return Err(Jp2Error::corrupted(
                self.offset,
                "UUID box too small for its identifier",
            ));
        }
        self.uuid.copy_from_slice(&payload[..UUID_SIZE]);
        self.data = payload[UUID_SIZE..].to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_header_is_big_endian() {
        let header = BoxHeader::decode(&[0x00, 0x00, 0x00, 0x2d, 0x6a, 0x70, 0x32, 0x68]);
        assert_eq!(header.length, 45);
        assert_eq!(header.box_type, BOX_TYPE_HEADER);
        assert_eq!(header.type_code(), 0x6a70_3268);
    }

    #[test]
    fn encode_is_inverse_of_decode() {
        let raw = [0x12, 0x34, 0x56, 0x78, b'u', b'u', b'i', b'd'];
        assert_eq!(BoxHeader::decode(&raw).encode(), raw);
    }

    #[test]
    fn decode_slice_rejects_short_input() {
        let result = BoxHeader::decode_slice(&[0, 0, 0, 8, b'x'], 40);
        assert!(matches!(
            result,
            Err(Jp2Error::CorruptedMetadata { offset: 40, .. })
        ));
    }

    #[test]
    fn classify_box_types() {
        assert_eq!(BoxTypes::new(*b"jp2h"), BoxTypes::Header);
        assert_eq!(BoxTypes::new(*b"ihdr"), BoxTypes::ImageHeader);
        assert_eq!(BoxTypes::new(*b"colr"), BoxTypes::ColourSpecification);
        assert_eq!(BoxTypes::new(*b"uuid"), BoxTypes::Uuid);
        assert_eq!(BoxTypes::new(*b"jp2c"), BoxTypes::ContiguousCodestream);
        assert_eq!(BoxTypes::new(*b"xxxx"), BoxTypes::Unknown);
    }

    #[test]
    fn classify_uuids_exactly() {
        assert_eq!(UuidKind::new(&UUID_EXIF), UuidKind::Exif);
        assert_eq!(UuidKind::new(&UUID_IPTC), UuidKind::Iptc);
        assert_eq!(UuidKind::new(&UUID_XMP), UuidKind::Xmp);

        for known in [UUID_EXIF, UUID_IPTC, UUID_XMP].iter() {
            for i in 0..16 {
                let mut uuid = *known;
                uuid[i] ^= 0x01;
                assert_eq!(UuidKind::new(&uuid), UuidKind::Unknown);
            }
        }
    }

    #[test]
    fn uuid_box_round_trip() {
        let encoded = UuidBox::encode(&UUID_XMP, b"<x/>").unwrap();
        assert_eq!(encoded.len(), 28);
        assert_eq!(&encoded[..8], &[0, 0, 0, 28, b'u', b'u', b'i', b'd']);

        let mut uuid_box = UuidBox::new(0, 28);
        uuid_box.decode(&encoded[8..]).unwrap();
        assert_eq!(uuid_box.kind(), UuidKind::Xmp);
        assert_eq!(uuid_box.data(), b"<x/>");
    }

    #[test]
    fn uuid_box_requires_identifier() {
        let mut uuid_box = UuidBox::new(100, 20);
        assert!(uuid_box.decode(&[0u8; 12]).is_err());
    }

    #[test]
    fn type_ascii() {
        assert_eq!(type_to_ascii(b"jP  "), "jP  ");
        assert_eq!(type_to_ascii(&[0x00, b'a', 0xff, b'b']), ".a.b");
    }
}
