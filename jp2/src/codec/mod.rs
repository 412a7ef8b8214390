//! Metadata codecs.
//!
//! The box layer only moves opaque payloads around. Turning those payloads into
//! records, and records back into payloads, is delegated to the codec traits here so
//! that callers can plug in full Exif/IPTC/XMP libraries. [`BasicCodecs`] is a small
//! bundled implementation of all three.

use std::error;
use std::fmt;
use std::io;

pub mod iptc;
pub mod tiff;
pub mod xmp;

pub use self::iptc::{IptcData, IptcDataset};
pub use self::tiff::{ExifData, IfdEntry};
pub use self::xmp::{XmpArrayKind, XmpData, XmpProperty, XmpValue};

/// Byte order of a TIFF structured stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// `II`
    LittleEndian,
    /// `MM`
    BigEndian,
}

impl ByteOrder {
    pub(crate) fn read_u16(&self, bytes: [u8; 2]) -> u16 {
        match self {
            ByteOrder::LittleEndian => u16::from_le_bytes(bytes),
            ByteOrder::BigEndian => u16::from_be_bytes(bytes),
        }
    }

    pub(crate) fn read_u32(&self, bytes: [u8; 4]) -> u32 {
        match self {
            ByteOrder::LittleEndian => u32::from_le_bytes(bytes),
            ByteOrder::BigEndian => u32::from_be_bytes(bytes),
        }
    }

    pub fn marker(&self) -> &'static str {
        match self {
            ByteOrder::LittleEndian => "II",
            ByteOrder::BigEndian => "MM",
        }
    }
}

/// The metadata families carried in UUID boxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataKind {
    Exif,
    Iptc,
    Xmp,
}

impl fmt::Display for MetadataKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MetadataKind::Exif => write!(f, "Exif"),
            MetadataKind::Iptc => write!(f, "IPTC"),
            MetadataKind::Xmp => write!(f, "XMP"),
        }
    }
}

/// Failure reported by a codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecError {
    kind: MetadataKind,
    message: String,
}

impl CodecError {
    pub fn new<M: Into<String>>(kind: MetadataKind, message: M) -> CodecError {
        CodecError {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> MetadataKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} codec: {}", self.kind, self.message)
    }
}

impl error::Error for CodecError {}

/// A decoded metadata record.
pub trait MetadataRecord: Default {
    fn is_empty(&self) -> bool;

    fn clear(&mut self) {
        *self = Self::default();
    }
}

pub trait ExifCodec {
    type Exif: MetadataRecord;

    /// Decode a TIFF structured stream, reporting the byte order it was written in.
    fn decode_exif(&self, raw: &[u8]) -> Result<(Self::Exif, ByteOrder), CodecError>;

    fn encode_exif(&self, data: &Self::Exif, byte_order: ByteOrder)
        -> Result<Vec<u8>, CodecError>;

    /// Describe the structure of a TIFF stream for the recursive structure listing.
    fn print_exif_structure(
        &self,
        _out: &mut dyn io::Write,
        _raw: &[u8],
        _depth: usize,
    ) -> io::Result<()> {
        Ok(())
    }
}

pub trait IptcCodec {
    type Iptc: MetadataRecord;

    fn decode_iptc(&self, raw: &[u8]) -> Result<Self::Iptc, CodecError>;

    fn encode_iptc(&self, data: &Self::Iptc) -> Result<Vec<u8>, CodecError>;

    fn print_iptc_structure(
        &self,
        _out: &mut dyn io::Write,
        _raw: &[u8],
        _depth: usize,
    ) -> io::Result<()> {
        Ok(())
    }
}

pub trait XmpCodec {
    type Xmp: MetadataRecord;

    fn decode_xmp(&self, packet: &str) -> Result<Self::Xmp, CodecError>;

    /// Serialize the record to a packet. An empty record gives an empty packet.
    fn encode_xmp(&self, data: &Self::Xmp) -> Result<String, CodecError>;
}

/// Bundled codecs.
#[derive(Debug, Default, Clone, Copy)]
pub struct BasicCodecs;

impl ExifCodec for BasicCodecs {
    type Exif = ExifData;

    fn decode_exif(&self, raw: &[u8]) -> Result<(ExifData, ByteOrder), CodecError> {
        let data = ExifData::from_tiff(raw)?;
        let byte_order = data.byte_order().unwrap_or(ByteOrder::LittleEndian);
        Ok((data, byte_order))
    }

    fn encode_exif(&self, data: &ExifData, byte_order: ByteOrder) -> Result<Vec<u8>, CodecError> {
        data.to_tiff(byte_order)
    }

    fn print_exif_structure(
        &self,
        out: &mut dyn io::Write,
        raw: &[u8],
        depth: usize,
    ) -> io::Result<()> {
        tiff::print_structure(out, raw, depth)
    }
}

impl IptcCodec for BasicCodecs {
    type Iptc = IptcData;

    fn decode_iptc(&self, raw: &[u8]) -> Result<IptcData, CodecError> {
        IptcData::decode(raw)
    }

    fn encode_iptc(&self, data: &IptcData) -> Result<Vec<u8>, CodecError> {
        data.encode()
    }

    fn print_iptc_structure(
        &self,
        out: &mut dyn io::Write,
        raw: &[u8],
        depth: usize,
    ) -> io::Result<()> {
        iptc::print_structure(out, raw, depth)
    }
}

impl XmpCodec for BasicCodecs {
    type Xmp = XmpData;

    fn decode_xmp(&self, packet: &str) -> Result<XmpData, CodecError> {
        XmpData::decode(packet)
    }

    fn encode_xmp(&self, data: &XmpData) -> Result<String, CodecError> {
        data.encode()
    }
}

/// Printable ASCII as is, everything else as `.`.
pub(crate) fn binary_to_string(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| {
            if (0x20..0x7f).contains(&b) {
                b as char
            } else {
                '.'
            }
        })
        .collect()
}

pub(crate) fn indent(depth: usize) -> String {
    "  ".repeat(depth)
}
