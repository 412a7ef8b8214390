//! Sequential traversal of a region of boxes.
//!
//! The same walker drives the reader, the rewriter and the structure printer, so the three
//! agree on where boxes start and when a malformed length ends the walk.

use log::{debug, warn};
use std::io;

use crate::boxes::{BoxHeader, BOX_HEADER_SIZE};
use crate::{Jp2Error, Result, MAX_BOXES};

/// Budget of boxes one operation may visit, shared by top-level boxes and sub-boxes.
#[derive(Debug, Clone, Copy)]
pub struct BoxBudget {
    limit: usize,
    used: usize,
}

impl Default for BoxBudget {
    fn default() -> Self {
        BoxBudget::new(MAX_BOXES)
    }
}

impl BoxBudget {
    pub fn new(limit: usize) -> BoxBudget {
        BoxBudget { limit, used: 0 }
    }

    pub fn used(&self) -> usize {
        self.used
    }

    /// Account for one more box at `offset`.
    pub fn charge(&mut self, offset: u64) -> Result<()> {
        self.used += 1;
        if self.used > self.limit {
            warn!("Box count exceeds {} at offset {}", self.limit, offset);
            return Err(Jp2Error::corrupted(offset, "too many boxes"));
        }
        Ok(())
    }
}

/// One box found by the walker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoxEntry {
    /// Offset of the box header.
    pub offset: u64,
    pub header: BoxHeader,
    /// Offset one past the last byte of the box.
    pub end: u64,
}

impl BoxEntry {
    pub fn payload_offset(&self) -> u64 {
        self.offset + BOX_HEADER_SIZE as u64
    }

    pub fn payload_len(&self) -> u64 {
        self.end - self.payload_offset()
    }

    /// The header did not give the extent; the box was taken to run to the region end.
    pub fn extends_to_end(&self) -> bool {
        self.header.extends_beyond_length()
    }

    /// Read the whole payload of this box from `reader`.
    pub fn read_payload<R: io::Read + io::Seek>(&self, reader: &mut R) -> Result<Vec<u8>> {
        let len = usize_len(self.payload_len(), self.offset)?;
        reader.seek(io::SeekFrom::Start(self.payload_offset()))?;
        let mut payload = vec![0u8; len];
        reader.read_exact(&mut payload)?;
        Ok(payload)
    }
}

pub(crate) fn usize_len(len: u64, offset: u64) -> Result<usize> {
    if len > usize::MAX as u64 {
        return Err(Jp2Error::corrupted(offset, "box too large"));
    }
    Ok(len as usize)
}

/// Iterator-like walker over the boxes of `[start, end)`.
#[derive(Debug, Clone)]
pub struct BoxWalker {
    next: u64,
    end: u64,
    done: bool,
}

impl BoxWalker {
    pub fn new(start: u64, end: u64) -> BoxWalker {
        BoxWalker {
            next: start,
            end,
            done: start >= end,
        }
    }

    /// Offset where the next box header is expected.
    pub fn position(&self) -> u64 {
        self.next
    }

    /// Read the next box header.
    ///
    /// Returns `Ok(None)` once fewer than 8 bytes remain in the region or after a box whose
    /// length ran it to the region end. A declared length below 8 or past the region end is
    /// reported as corruption.
    pub fn next_box<R: io::Read + io::Seek>(
        &mut self,
        reader: &mut R,
        budget: &mut BoxBudget,
    ) -> Result<Option<BoxEntry>> {
        if self.done || self.end - self.next < BOX_HEADER_SIZE as u64 {
            self.done = true;
            return Ok(None);
        }

        let offset = self.next;
        reader.seek(io::SeekFrom::Start(offset))?;
        let mut raw = [0u8; 8];
        reader.read_exact(&mut raw)?;
        let header = BoxHeader::decode(&raw);
        budget.charge(offset)?;

        debug!("Box {} at offset {}", header, offset);

        let end = match header.length {
            0 => {
                self.done = true;
                self.end
            }
            1 => {
                warn!(
                    "Extended length box at offset {} is not supported, treating it as running to the end",
                    offset
                );
                self.done = true;
                self.end
            }
            length if (length as usize) < BOX_HEADER_SIZE => {
                return Err(Jp2Error::corrupted(offset, "box length below header size"));
            }
            length => {
                let end = offset + length as u64;
                if end > self.end {
                    return Err(Jp2Error::corrupted(offset, "box length exceeds its container"));
                }
                end
            }
        };

        self.next = end;
        if self.next >= self.end {
            self.done = true;
        }
        Ok(Some(BoxEntry {
            offset,
            header,
            end,
        }))
    }
}
