//! Box structure listing.

use log::warn;
use std::io;

use crate::boxes::{type_to_ascii, BoxTypes, JBox, UuidBox, UuidKind};
use crate::codec::{binary_to_string, ExifCodec, IptcCodec};
use crate::colour_specification::ColourSpecificationBox;
use crate::io_stream::stream_len;
use crate::walker::{BoxBudget, BoxEntry, BoxWalker};
use crate::{Jp2Error, Result};

/// What `print_structure` emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintStructureOption {
    /// One row per box and sub-box.
    Basic,
    /// Like `Basic`, and describe the Exif and IPTC payloads too.
    Recursive,
    /// Only the bytes of the embedded ICC profile.
    IccProfile,
    /// Only the bytes of the XMP packet.
    Xmp,
    /// Walk the boxes without output.
    IptcErase,
}

impl PrintStructureOption {
    fn prints_rows(self) -> bool {
        matches!(
            self,
            PrintStructureOption::Basic | PrintStructureOption::Recursive
        )
    }
}

const SUB_BOX_PREVIEW: usize = 30;
const UUID_PREVIEW: usize = 40;

struct Printer<'a> {
    out: &'a mut dyn io::Write,
    enabled: bool,
    line_open: bool,
}

impl<'a> Printer<'a> {
    fn text(&mut self, text: &str) -> Result<()> {
        if self.enabled {
            self.out
                .write_all(text.as_bytes())
                .map_err(|source| Jp2Error::ImageWriteFailed { source })?;
            self.line_open = true;
        }
        Ok(())
    }

    fn raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.out
            .write_all(bytes)
            .map_err(|source| Jp2Error::ImageWriteFailed { source })
    }

    // End the current row, if one was started.
    fn line_feed(&mut self) -> Result<()> {
        if self.line_open {
            self.line_open = false;
            self.raw(b"\n")?;
        }
        Ok(())
    }

    fn nested(&mut self, result: io::Result<()>, what: &str) -> Result<()> {
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                warn!("Cannot describe {} payload: {}", what, e);
                Ok(())
            }
            Err(source) => Err(Jp2Error::ImageWriteFailed { source }),
        }
    }
}

/// Describe the boxes of the JP2 file in `reader` to `out`.
///
/// The reader must be positioned at the start of the file; its signature has already been
/// checked. `path` is only used for the heading.
pub(crate) fn print_structure<R, C>(
    reader: &mut R,
    path: &str,
    codecs: &C,
    out: &mut dyn io::Write,
    option: PrintStructureOption,
    depth: usize,
    max_boxes: usize,
) -> Result<()>
where
    R: io::Read + io::Seek,
    C: ExifCodec + IptcCodec,
{
    let mut printer = Printer {
        out,
        enabled: option.prints_rows(),
        line_open: false,
    };
    if printer.enabled {
        printer.text(&format!("STRUCTURE OF JPEG2000 FILE: {}", path))?;
        printer.line_feed()?;
        printer.text(" address |   length | box       | data")?;
        printer.line_feed()?;
    }

    let size = stream_len(reader)?;
    let mut budget = BoxBudget::new(max_boxes);
    let mut walker = BoxWalker::new(0, size);
    while let Some(entry) = walker.next_box(reader, &mut budget)? {
        printer.text(&format!(
            "{:8} | {:8} | {}      | ",
            entry.offset,
            entry.header.length,
            type_to_ascii(&entry.header.box_type)
        ))?;

        match BoxTypes::new(entry.header.box_type) {
            BoxTypes::ContiguousCodestream => {
                printer.line_feed()?;
                break;
            }
            BoxTypes::Header => {
                printer.line_feed()?;
                print_header_box(reader, &entry, &mut budget, &mut printer, option)?;
            }
            BoxTypes::Uuid => {
                print_uuid_box(reader, &entry, codecs, &mut printer, option, depth)?;
            }
            _ => {}
        }
        printer.line_feed()?;
    }
    Ok(())
}

fn print_header_box<R: io::Read + io::Seek>(
    reader: &mut R,
    entry: &BoxEntry,
    budget: &mut BoxBudget,
    printer: &mut Printer,
    option: PrintStructureOption,
) -> Result<()> {
    let mut sub = BoxWalker::new(entry.payload_offset(), entry.end);
    while let Some(sub_entry) = sub.next_box(reader, budget)? {
        let data = sub_entry.read_payload(reader)?;
        printer.text(&format!(
            "{:8} |  {:8} |  sub:{} | {}",
            sub_entry.offset,
            sub_entry.header.length,
            type_to_ascii(&sub_entry.header.box_type),
            binary_to_string(&data[..data.len().min(SUB_BOX_PREVIEW)])
        ))?;

        if BoxTypes::new(sub_entry.header.box_type) == BoxTypes::ColourSpecification {
            let mut colr =
                ColourSpecificationBox::new(sub_entry.offset, sub_entry.end - sub_entry.offset);
            colr.decode(&data)?;
            if let Some(icc_length) = colr.icc_length() {
                let pad = colr.padding();
                printer.text(&format!(
                    " | pad: {} {} {} | iccLength:{}",
                    pad[0], pad[1], pad[2], icc_length
                ))?;
                if option == PrintStructureOption::IccProfile {
                    if let Some(profile) = colr.icc_profile() {
                        printer.raw(profile)?;
                    }
                }
            }
        }
        printer.line_feed()?;
    }
    Ok(())
}

fn print_uuid_box<R, C>(
    reader: &mut R,
    entry: &BoxEntry,
    codecs: &C,
    printer: &mut Printer,
    option: PrintStructureOption,
    depth: usize,
) -> Result<()>
where
    R: io::Read + io::Seek,
    C: ExifCodec + IptcCodec,
{
    let payload = entry.read_payload(reader)?;
    let mut uuid_box = UuidBox::new(entry.offset, entry.end - entry.offset);
    uuid_box.decode(&payload)?;
    let kind = uuid_box.kind();
    let data = uuid_box.data();

    printer.text(kind.label())?;
    printer.text(&binary_to_string(&data[..data.len().min(UUID_PREVIEW)]))?;
    printer.line_feed()?;

    let recursive = option == PrintStructureOption::Recursive;
    match kind {
        UuidKind::Exif if recursive && data.len() > 8 => {
            if data[0] == data[1] && (data[0] == b'I' || data[0] == b'M') {
                let result = codecs.print_exif_structure(printer.out, data, depth + 1);
                printer.nested(result, "Exif")?;
            }
        }
        UuidKind::Iptc if recursive => {
            let result = codecs.print_iptc_structure(printer.out, data, depth + 1);
            printer.nested(result, "IPTC")?;
        }
        UuidKind::Xmp if option == PrintStructureOption::Xmp => {
            printer.raw(data)?;
        }
        _ => {}
    }
    Ok(())
}
