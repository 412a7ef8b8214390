//! TIFF structured Exif streams.
//!
//! The record keeps the stream as decoded and indexes the entries of IFD0, which is
//! enough to validate the stream, list it, and write it back unchanged.

use log::debug;
use std::io;

use super::{binary_to_string, indent, ByteOrder, CodecError, MetadataKind, MetadataRecord};

const TIFF_HEADER_SIZE: usize = 8;
const IFD_ENTRY_SIZE: usize = 12;
const TIFF_MAGIC: u16 = 42;

fn invalid(message: &str) -> CodecError {
    CodecError::new(MetadataKind::Exif, message)
}

/// One 12-byte IFD entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IfdEntry {
    /// Offset of the entry within the stream.
    pub offset: usize,
    pub tag: u16,
    pub field_type: u16,
    pub count: u32,
    /// The value, or the offset of the value when it does not fit in four bytes.
    pub value_offset: [u8; 4],
}

impl IfdEntry {
    fn value_size(&self) -> u64 {
        type_size(self.field_type) as u64 * self.count as u64
    }
}

fn type_size(field_type: u16) -> usize {
    match field_type {
        3 | 8 => 2,
        4 | 9 | 11 | 13 => 4,
        5 | 10 | 12 => 8,
        _ => 1,
    }
}

fn type_name(field_type: u16) -> &'static str {
    match field_type {
        1 => "BYTE",
        2 => "ASCII",
        3 => "SHORT",
        4 => "LONG",
        5 => "RATIONAL",
        6 => "SBYTE",
        7 => "UNDEFINED",
        8 => "SSHORT",
        9 => "SLONG",
        10 => "SRATIONAL",
        11 => "FLOAT",
        12 => "DOUBLE",
        13 => "IFD",
        _ => "unknown",
    }
}

/// Exif metadata held as a TIFF stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExifData {
    tiff: Vec<u8>,
    byte_order: Option<ByteOrder>,
    ifd0_offset: u32,
    entries: Vec<IfdEntry>,
}

impl ExifData {
    /// Validate and index a TIFF stream.
    pub fn from_tiff(raw: &[u8]) -> Result<ExifData, CodecError> {
        if raw.len() < TIFF_HEADER_SIZE {
            return Err(invalid("TIFF header too short"));
        }
        let byte_order = match &raw[..2] {
            b"II" => ByteOrder::LittleEndian,
            b"MM" => ByteOrder::BigEndian,
            _ => return Err(invalid("missing TIFF byte order mark")),
        };
        if byte_order.read_u16([raw[2], raw[3]]) != TIFF_MAGIC {
            return Err(invalid("bad TIFF magic number"));
        }

        let ifd0_offset = byte_order.read_u32([raw[4], raw[5], raw[6], raw[7]]);
        let entries = read_ifd(raw, byte_order, ifd0_offset)?;
        debug!(
            "TIFF stream ({}) with {} IFD0 entries",
            byte_order.marker(),
            entries.len()
        );

        Ok(ExifData {
            tiff: raw.to_vec(),
            byte_order: Some(byte_order),
            ifd0_offset,
            entries,
        })
    }

    /// The stream, unchanged.
    ///
    /// The stream keeps the byte order it was decoded with; `byte_order` only matters
    /// for a record that has none.
    pub fn to_tiff(&self, byte_order: ByteOrder) -> Result<Vec<u8>, CodecError> {
        if let Some(stored) = self.byte_order {
            if stored != byte_order {
                debug!(
                    "Keeping {} byte order of the Exif stream, {} requested",
                    stored.marker(),
                    byte_order.marker()
                );
            }
        }
        Ok(self.tiff.clone())
    }

    pub fn byte_order(&self) -> Option<ByteOrder> {
        self.byte_order
    }

    pub fn entries(&self) -> &[IfdEntry] {
        &self.entries
    }

    pub fn find(&self, tag: u16) -> Option<&IfdEntry> {
        self.entries.iter().find(|entry| entry.tag == tag)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.tiff
    }

    pub fn ifd0_offset(&self) -> u32 {
        self.ifd0_offset
    }
}

impl MetadataRecord for ExifData {
    fn is_empty(&self) -> bool {
        self.tiff.is_empty()
    }
}

fn read_ifd(raw: &[u8], byte_order: ByteOrder, ifd_offset: u32) -> Result<Vec<IfdEntry>, CodecError> {
    let start = ifd_offset as usize;
    if start < TIFF_HEADER_SIZE || start as u64 + 2 > raw.len() as u64 {
        return Err(invalid("IFD0 offset out of range"));
    }
    let count = byte_order.read_u16([raw[start], raw[start + 1]]) as usize;
    let table_end = start + 2 + count * IFD_ENTRY_SIZE;
    if table_end > raw.len() {
        return Err(invalid("IFD0 entries exceed the stream"));
    }

    let entries = raw[start + 2..table_end]
        .chunks(IFD_ENTRY_SIZE)
        .enumerate()
        .map(|(i, entry)| IfdEntry {
            offset: start + 2 + i * IFD_ENTRY_SIZE,
            tag: byte_order.read_u16([entry[0], entry[1]]),
            field_type: byte_order.read_u16([entry[2], entry[3]]),
            count: byte_order.read_u32([entry[4], entry[5], entry[6], entry[7]]),
            value_offset: [entry[8], entry[9], entry[10], entry[11]],
        })
        .collect();
    Ok(entries)
}

fn format_value(raw: &[u8], byte_order: ByteOrder, entry: &IfdEntry) -> String {
    let size = entry.value_size();
    let data: &[u8] = if size <= 4 {
        &entry.value_offset[..size as usize]
    } else {
        let offset = byte_order.read_u32(entry.value_offset) as u64;
        if offset + size > raw.len() as u64 {
            return "<out of range>".to_string();
        }
        &raw[offset as usize..(offset + size) as usize]
    };

    match entry.field_type {
        2 => binary_to_string(&data[..data.len().min(40)]),
        3 | 8 => data
            .chunks(2)
            .take(8)
            .map(|v| byte_order.read_u16([v[0], v[1]]).to_string())
            .collect::<Vec<_>>()
            .join(" "),
        4 | 9 | 13 => data
            .chunks(4)
            .take(8)
            .map(|v| byte_order.read_u32([v[0], v[1], v[2], v[3]]).to_string())
            .collect::<Vec<_>>()
            .join(" "),
        5 | 10 => data
            .chunks(8)
            .take(4)
            .map(|v| {
                format!(
                    "{}/{}",
                    byte_order.read_u32([v[0], v[1], v[2], v[3]]),
                    byte_order.read_u32([v[4], v[5], v[6], v[7]])
                )
            })
            .collect::<Vec<_>>()
            .join(" "),
        _ => data
            .iter()
            .take(16)
            .map(|b| b.to_string())
            .collect::<Vec<_>>()
            .join(" "),
    }
}

/// List the IFD0 entries of a TIFF stream.
pub fn print_structure(out: &mut dyn io::Write, raw: &[u8], depth: usize) -> io::Result<()> {
    let exif = ExifData::from_tiff(raw)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
    let byte_order = exif.byte_order.unwrap_or(ByteOrder::LittleEndian);
    let pad = indent(depth);

    writeln!(
        out,
        "{}STRUCTURE OF TIFF FILE ({}): {} bytes",
        pad,
        byte_order.marker(),
        raw.len()
    )?;
    writeln!(
        out,
        "{} address |    tag |      type |    count |    offset | value",
        pad
    )?;
    for entry in exif.entries() {
        let offset = if entry.value_size() > 4 {
            byte_order.read_u32(entry.value_offset).to_string()
        } else {
            String::new()
        };
        writeln!(
            out,
            "{}{:8} | {:#06x} | {:>9} | {:8} | {:>9} | {}",
            pad,
            entry.offset,
            entry.tag,
            type_name(entry.field_type),
            entry.count,
            offset,
            format_value(raw, byte_order, entry)
        )?;
    }
    writeln!(out, "{}END {} bytes", pad, raw.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    // II with two entries: ImageWidth SHORT 640 and Make ASCII "Canon" stored at 38.
    fn little_endian_tiff() -> Vec<u8> {
        let mut tiff = b"II*\0".to_vec();
        tiff.extend_from_slice(&8u32.to_le_bytes());
        tiff.extend_from_slice(&2u16.to_le_bytes());
        tiff.extend_from_slice(&0x0100u16.to_le_bytes());
        tiff.extend_from_slice(&3u16.to_le_bytes());
        tiff.extend_from_slice(&1u32.to_le_bytes());
        tiff.extend_from_slice(&[0x80, 0x02, 0, 0]);
        tiff.extend_from_slice(&0x010fu16.to_le_bytes());
        tiff.extend_from_slice(&2u16.to_le_bytes());
        tiff.extend_from_slice(&6u32.to_le_bytes());
        tiff.extend_from_slice(&38u32.to_le_bytes());
        tiff.extend_from_slice(&0u32.to_le_bytes());
        tiff.extend_from_slice(b"Canon\0");
        tiff
    }

    #[test]
    fn decode_little_endian() {
        let exif = ExifData::from_tiff(&little_endian_tiff()).unwrap();
        assert_eq!(exif.byte_order(), Some(ByteOrder::LittleEndian));
        assert_eq!(exif.ifd0_offset(), 8);
        assert_eq!(exif.entries().len(), 2);
        let width = exif.find(0x0100).unwrap();
        assert_eq!(width.field_type, 3);
        assert_eq!(width.offset, 10);
    }

    #[test]
    fn decode_big_endian() {
        let mut tiff = b"MM\0*".to_vec();
        tiff.extend_from_slice(&8u32.to_be_bytes());
        tiff.extend_from_slice(&0u16.to_be_bytes());
        tiff.extend_from_slice(&0u32.to_be_bytes());
        let exif = ExifData::from_tiff(&tiff).unwrap();
        assert_eq!(exif.byte_order(), Some(ByteOrder::BigEndian));
        assert!(exif.entries().is_empty());
        assert!(!exif.is_empty());
    }

    #[test]
    fn encode_is_unchanged() {
        let tiff = little_endian_tiff();
        let exif = ExifData::from_tiff(&tiff).unwrap();
        assert_eq!(exif.to_tiff(ByteOrder::LittleEndian).unwrap(), tiff);
        assert_eq!(exif.to_tiff(ByteOrder::BigEndian).unwrap(), tiff);
        assert!(ExifData::default().to_tiff(ByteOrder::BigEndian).unwrap().is_empty());
    }

    #[test]
    fn rejects_bad_headers() {
        assert!(ExifData::from_tiff(b"II*\0").is_err());
        assert!(ExifData::from_tiff(b"XX*\0\x08\0\0\0\0\0").is_err());
        assert!(ExifData::from_tiff(b"II\0*\x08\0\0\0\0\0").is_err());
        assert!(ExifData::from_tiff(b"II*\0\xff\0\0\0\0\0").is_err());
        assert!(ExifData::from_tiff(b"II*\0\x04\0\0\0\0\0").is_err());
    }

    #[test]
    fn rejects_truncated_ifd() {
        let mut tiff = little_endian_tiff();
        tiff.truncate(20);
        assert!(ExifData::from_tiff(&tiff).is_err());
    }

    #[test]
    fn prints_entries() {
        let mut out = Vec::new();
        print_structure(&mut out, &little_endian_tiff(), 1).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("  STRUCTURE OF TIFF FILE (II): 44 bytes\n"));
        assert!(text.contains("0x0100 |     SHORT |        1 |           | 640"));
        assert!(text.contains("0x010f |     ASCII |        6 |        38 | Canon."));
    }
}
