//! IPTC-IIM datasets.
//!
//! Each dataset is:
//!   Byte 0:    0x1C (tag marker)
//!   Byte 1:    Record number
//!   Byte 2:    Dataset number
//!   Bytes 3-4: Data length (big-endian u16). With the high bit set, the low 15 bits
//!              give the size of a following big-endian length field instead.
//!   Bytes 5+:  Data

use std::io;

use super::{binary_to_string, indent, CodecError, MetadataKind, MetadataRecord};

const MARKER: u8 = 0x1c;
const EXTENDED_LENGTH: u16 = 0x8000;
const MAX_LENGTH_FIELD: usize = 4;

fn invalid(message: &str) -> CodecError {
    CodecError::new(MetadataKind::Iptc, message)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IptcDataset {
    pub record: u8,
    pub dataset: u8,
    pub value: Vec<u8>,
}

impl IptcDataset {
    pub fn value_str(&self) -> String {
        String::from_utf8_lossy(&self.value).into_owned()
    }
}

/// IPTC datasets in stream order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IptcData {
    datasets: Vec<IptcDataset>,
}

impl IptcData {
    pub fn datasets(&self) -> &[IptcDataset] {
        &self.datasets
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn add(&mut self, record: u8, dataset: u8, value: Vec<u8>) {
        self.datasets.push(IptcDataset {
            record,
            dataset,
            value,
        });
    }

    /// First dataset with the given numbers.
    pub fn find(&self, record: u8, dataset: u8) -> Option<&IptcDataset> {
        self.datasets
            .iter()
            .find(|d| d.record == record && d.dataset == dataset)
    }

    /// Remove every dataset with the given numbers.
    pub fn remove(&mut self, record: u8, dataset: u8) {
        self.datasets
            .retain(|d| !(d.record == record && d.dataset == dataset));
    }

    /// Parse IIM bytes. Bytes between datasets that are not a tag marker are skipped.
    pub fn decode(raw: &[u8]) -> Result<IptcData, CodecError> {
        let mut data = IptcData::default();
        let mut pos = 0;

        while pos + 3 < raw.len() {
            if raw[pos] != MARKER {
                pos += 1;
                continue;
            }
            let record = raw[pos + 1];
            let dataset = raw[pos + 2];
            pos += 3;

            if raw.len() - pos < 2 {
                return Err(invalid("truncated dataset length"));
            }
            let length = u16::from_be_bytes([raw[pos], raw[pos + 1]]);
            pos += 2;

            let size = if length & EXTENDED_LENGTH != 0 {
                let field = (length & !EXTENDED_LENGTH) as usize;
                if field > MAX_LENGTH_FIELD {
                    return Err(invalid("extended length field too large"));
                }
                if field > raw.len() - pos {
                    return Err(invalid("truncated extended length"));
                }
                let size = raw[pos..pos + field]
                    .iter()
                    .fold(0usize, |acc, &b| (acc << 8) | b as usize);
                pos += field;
                size
            } else {
                length as usize
            };

            if size > raw.len() - pos {
                return Err(invalid("dataset exceeds the IPTC block"));
            }
            data.add(record, dataset, raw[pos..pos + size].to_vec());
            pos += size;
        }

        Ok(data)
    }

    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        for d in &self.datasets {
            out.extend_from_slice(&[MARKER, d.record, d.dataset]);
            if d.value.len() < EXTENDED_LENGTH as usize {
                out.extend_from_slice(&(d.value.len() as u16).to_be_bytes());
            } else if d.value.len() <= u32::MAX as usize {
                out.extend_from_slice(&(EXTENDED_LENGTH | 4).to_be_bytes());
                out.extend_from_slice(&(d.value.len() as u32).to_be_bytes());
            } else {
                return Err(invalid("dataset too large"));
            }
            out.extend_from_slice(&d.value);
        }
        Ok(out)
    }
}

impl MetadataRecord for IptcData {
    fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }
}

fn dataset_name(record: u8, dataset: u8) -> &'static str {
    match (record, dataset) {
        (1, 0) => "ModelVersion",
        (1, 90) => "CharacterSet",
        (2, 0) => "RecordVersion",
        (2, 5) => "ObjectName",
        (2, 15) => "Category",
        (2, 25) => "Keywords",
        (2, 55) => "DateCreated",
        (2, 80) => "Byline",
        (2, 90) => "City",
        (2, 101) => "CountryName",
        (2, 105) => "Headline",
        (2, 116) => "Copyright",
        (2, 120) => "Caption",
        _ => "",
    }
}

/// List the datasets of an IIM block.
pub fn print_structure(out: &mut dyn io::Write, raw: &[u8], depth: usize) -> io::Result<()> {
    let data = IptcData::decode(raw)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
    let pad = indent(depth);

    writeln!(
        out,
        "{}Record | DataSet | Name                     | Length | Data",
        pad
    )?;
    for d in data.datasets() {
        writeln!(
            out,
            "{}{:6} | {:7} | {:<24} | {:6} | {}",
            pad,
            d.record,
            d.dataset,
            dataset_name(d.record, d.dataset),
            d.value.len(),
            binary_to_string(&d.value[..d.value.len().min(50)])
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_datasets() {
        let raw = [
            0x1c, 2, 0, 0, 2, 0, 4, // RecordVersion
            0x1c, 2, 5, 0, 5, b'T', b'i', b't', b'l', b'e', // ObjectName
            0x1c, 2, 25, 0, 3, b'c', b'a', b't',
        ];
        let data = IptcData::decode(&raw).unwrap();
        assert_eq!(data.len(), 3);
        assert_eq!(data.find(2, 5).unwrap().value_str(), "Title");
        assert_eq!(data.datasets()[2].value, b"cat");
    }

    #[test]
    fn skips_padding_between_datasets() {
        let raw = [0, 0, 0x1c, 2, 5, 0, 1, b'x', 0, 0];
        let data = IptcData::decode(&raw).unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data.datasets()[0].value, b"x");
    }

    #[test]
    fn extended_length() {
        let mut raw = vec![0x1c, 2, 120, 0x80, 0x04];
        raw.extend_from_slice(&40000u32.to_be_bytes());
        raw.extend(vec![b'a'; 40000]);
        let data = IptcData::decode(&raw).unwrap();
        assert_eq!(data.find(2, 120).unwrap().value.len(), 40000);
        assert_eq!(data.encode().unwrap(), raw);
    }

    #[test]
    fn truncated_value_fails() {
        let raw = [0x1c, 2, 5, 0, 10, b'a', b'b'];
        assert!(IptcData::decode(&raw).is_err());
    }

    #[test]
    fn oversized_length_field_fails() {
        let raw = [0x1c, 2, 5, 0x80, 0x05, 0, 0, 0, 0, 1];
        assert!(IptcData::decode(&raw).is_err());
    }

    #[test]
    fn encode_keeps_order() {
        let mut data = IptcData::default();
        data.add(2, 120, b"caption".to_vec());
        data.add(1, 90, vec![0x1b, 0x25, 0x47]);
        data.add(2, 25, b"k".to_vec());
        let raw = data.encode().unwrap();
        assert_eq!(&raw[..5], &[0x1c, 2, 120, 0, 7]);
        assert_eq!(IptcData::decode(&raw).unwrap(), data);

        data.remove(2, 120);
        assert_eq!(data.len(), 2);
    }

    #[test]
    fn prints_datasets() {
        let raw = [0x1c, 2, 5, 0, 5, b'T', b'i', b't', b'l', b'e'];
        let mut out = Vec::new();
        print_structure(&mut out, &raw, 0).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("     2 |       5 | ObjectName               |      5 | Title"));
    }
}
