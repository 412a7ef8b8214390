//! Rebuilding of the JP2 Header box with the current ICC profile.

use log::debug;
use std::io::Cursor;

use crate::boxes::{BoxHeader, BoxTypes, BOX_HEADER_SIZE, BOX_TYPE_HEADER};
use crate::colour_specification::encode_colour_specification;
use crate::walker::{BoxBudget, BoxWalker};
use crate::{Jp2Error, Result};

// Slack on top of box size + profile size for the rebuilt header.
const SCRATCH_SLACK: usize = 100;

struct Scratch {
    buf: Vec<u8>,
    capacity: usize,
}

impl Scratch {
    fn with_capacity(capacity: usize) -> Scratch {
        Scratch {
            buf: Vec::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, bytes: &[u8], offset: u64) -> Result<()> {
        if self.buf.len() + bytes.len() > self.capacity {
            return Err(Jp2Error::corrupted(
                offset,
                "rebuilt header box exceeds its size bound",
            ));
        }
        self.buf.extend_from_slice(bytes);
        Ok(())
    }
}

/// Re-encode a complete `jp2h` box (header included) with `icc_profile`.
///
/// Sub-boxes are copied unchanged up to the first Colour Specification box, which is
/// replaced by one built from `icc_profile` (the enumerated form when it is empty).
/// Everything after the replaced box is copied unchanged. A header box without a
/// Colour Specification box gets one appended. The outer length is rewritten to the
/// new size.
///
/// Sub-boxes are charged to `budget`. Offsets in errors are relative to the start of
/// `jp2h`.
pub fn encode_jp2_header(
    jp2h: &[u8],
    icc_profile: &[u8],
    budget: &mut BoxBudget,
) -> Result<Vec<u8>> {
    let header = BoxHeader::decode_slice(jp2h, 0)?;
    let declared = match header.length {
        0 => jp2h.len(),
        1 => return Err(Jp2Error::corrupted(0, "extended length header box")),
        length => length as usize,
    };
    if declared < BOX_HEADER_SIZE || declared > jp2h.len() {
        return Err(Jp2Error::corrupted(0, "header box length out of range"));
    }

    let mut scratch = Scratch::with_capacity(jp2h.len() + icc_profile.len() + SCRATCH_SLACK);
    scratch.push(&[0u8; BOX_HEADER_SIZE], 0)?;

    let mut reader = Cursor::new(&jp2h[..declared]);
    let mut walker = BoxWalker::new(BOX_HEADER_SIZE as u64, declared as u64);
    let mut colour_written = false;

    while let Some(entry) = walker.next_box(&mut reader, budget)? {
        let start = entry.offset as usize;
        let end = entry.end as usize;
        debug!(
            "Header sub-box {} at {} ({} bytes)",
            entry.header,
            start,
            end - start
        );

        if BoxTypes::new(entry.header.box_type) == BoxTypes::ColourSpecification {
            let colr = encode_colour_specification(icc_profile)?;
            scratch.push(&colr, entry.offset)?;
            scratch.push(&jp2h[end..declared], entry.end)?;
            colour_written = true;
            break;
        }
        scratch.push(&jp2h[start..end], entry.offset)?;
    }

    if !colour_written {
        debug!("No colour specification in header box, appending one");
        let colr = encode_colour_specification(icc_profile)?;
        scratch.push(&colr, walker.position())?;
    }

    let mut out = scratch.buf;
    if out.len() > u32::MAX as usize {
        return Err(Jp2Error::corrupted(0, "rebuilt header box too large"));
    }
    let outer = BoxHeader::new(out.len() as u32, BOX_TYPE_HEADER).encode();
    out[..BOX_HEADER_SIZE].copy_from_slice(&outer);
    Ok(out)
}
