//! JP2 metadata.
//!
//! The JPEG 2000 file format (JP2 file format) stores application specific data (metadata) in
//! association with a JPEG 2000 codestream. All information contained within the JP2 file is
//! encapsulated in boxes: length-prefixed, typed chunks, some of which (superboxes) contain
//! other boxes.
//!
//! This crate locates, extracts and rewrites the metadata carried by those boxes:
//!
//! - the image dimensions in the Image Header box (`ihdr`) of the JP2 Header box (`jp2h`),
//! - an ICC profile embedded in the Colour Specification box (`colr`),
//! - Exif, IPTC and XMP payloads carried in UUID boxes (`uuid`) tagged with well known
//!   16-byte identifiers.
//!
//! The codestream itself is never decoded. Box lengths found in a file are never trusted:
//! every declared length is checked against the extent of the enclosing region before it is
//! used to read, seek or allocate.
//!
//! The main entry point is [`Jp2Image`]. It is bound to a [`BasicIo`] byte stream, reads the
//! metadata into in-memory records with [`Jp2Image::read_metadata`], and writes them back with
//! [`Jp2Image::write_metadata`], which assembles a complete new file before replacing the
//! content of the bound stream.
//!
//! The Exif, IPTC and XMP payloads are handed to codec collaborators (see [`codec`]).
//! [`BasicCodecs`] is used unless other codecs are supplied.

use std::error;
use std::fmt;
use std::io;

pub mod boxes;
pub mod codec;
pub mod colour_specification;
pub mod extract;
pub mod header_encoder;
pub mod image;
pub mod image_header;
pub mod io_stream;
pub mod structure;
pub mod walker;

pub use crate::boxes::{BoxHeader, BoxType, BoxTypes, UuidKind};
pub use crate::codec::{
    BasicCodecs, ByteOrder, CodecError, ExifCodec, ExifData, IptcCodec, IptcData, IptcDataset,
    MetadataKind, MetadataRecord, XmpCodec, XmpData, XmpProperty, XmpValue,
};
pub use crate::image::{ImageHandler, Jp2Image};
pub use crate::io_stream::{BasicIo, FileIo, IoCloser, MemIo};
pub use crate::structure::PrintStructureOption;
pub use crate::walker::{BoxBudget, BoxEntry, BoxWalker};

/// Result type used throughout this crate.
pub type Result<T> = std::result::Result<T, Jp2Error>;

/// Error values that may be returned from JP2 metadata functions.
#[derive(Debug)]
pub enum Jp2Error {
    /// The underlying stream could not be opened.
    DataSourceOpenFailed { path: String, source: io::Error },

    /// Not a JPEG 2000 file.
    ///
    /// The stream does not start with the JPEG 2000 Signature box.
    NotAnImage,

    /// No image in input data.
    ///
    /// Returned by the write path when the source stream does not start with the
    /// JPEG 2000 Signature box.
    NoImageInInputData,

    /// The stream reported an error while reading.
    FailedToReadImageData { source: io::Error },

    /// The stream ended before the expected number of bytes could be read.
    InputDataReadFailed,

    /// The output could not be written, or could not replace the original content.
    ImageWriteFailed { source: io::Error },

    /// Corrupted metadata.
    ///
    /// A box or sub-box length is inconsistent with the enclosing region, too many boxes were
    /// found, an ICC length field overruns its box, or a UUID box is too short to carry its
    /// identifier.
    CorruptedMetadata { offset: u64, reason: &'static str },

    /// The ICC profile does not carry a consistent size field.
    InvalidIccProfile { reason: &'static str },

    /// The setting is not supported by the JPEG 2000 container.
    InvalidSettingForImage { setting: &'static str },

    /// A metadata record could not be encoded for writing.
    MetadataEncodeFailed {
        kind: MetadataKind,
        source: CodecError,
    },
}

/// Coarse classification of [`Jp2Error`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The stream cannot be opened.
    SourceUnavailable,
    /// The stream is not a JPEG 2000 file.
    NotThisFormat,
    /// A structural inconsistency in the box tree.
    StructuralCorruption,
    /// A read or write against the stream failed.
    IoFailure,
    /// The requested edit is not supported by the container.
    UnsupportedEdit,
}

impl Jp2Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DataSourceOpenFailed { .. } => ErrorKind::SourceUnavailable,
            Self::NotAnImage | Self::NoImageInInputData => ErrorKind::NotThisFormat,
            Self::CorruptedMetadata { .. } | Self::InvalidIccProfile { .. } => {
                ErrorKind::StructuralCorruption
            }
            Self::FailedToReadImageData { .. }
            | Self::InputDataReadFailed
            | Self::ImageWriteFailed { .. }
            | Self::MetadataEncodeFailed { .. } => ErrorKind::IoFailure,
            Self::InvalidSettingForImage { .. } => ErrorKind::UnsupportedEdit,
        }
    }

    pub(crate) fn corrupted(offset: u64, reason: &'static str) -> Jp2Error {
        Jp2Error::CorruptedMetadata { offset, reason }
    }
}

impl error::Error for Jp2Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::DataSourceOpenFailed { source, .. } => Some(source),
            Self::FailedToReadImageData { source } => Some(source),
            Self::ImageWriteFailed { source } => Some(source),
            Self::MetadataEncodeFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl fmt::Display for Jp2Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::DataSourceOpenFailed { path, source } => {
                write!(f, "failed to open the data source {:?}: {}", path, source)
            }
            Self::NotAnImage => {
                write!(f, "this does not look like a JPEG-2000 image")
            }
            Self::NoImageInInputData => {
                write!(f, "input data does not contain a valid JPEG-2000 image")
            }
            Self::FailedToReadImageData { source } => {
                write!(f, "failed to read image data: {}", source)
            }
            Self::InputDataReadFailed => {
                write!(f, "input data read failed")
            }
            Self::ImageWriteFailed { source } => {
                write!(f, "failed to write image: {}", source)
            }
            Self::CorruptedMetadata { offset, reason } => {
                write!(f, "corrupted metadata at offset {}: {}", offset, reason)
            }
            Self::InvalidIccProfile { reason } => {
                write!(f, "invalid ICC profile: {}", reason)
            }
            Self::InvalidSettingForImage { setting } => {
                write!(f, "setting {} is not supported for JP2 images", setting)
            }
            Self::MetadataEncodeFailed { kind, source } => {
                write!(f, "failed to encode {} metadata: {}", kind, source)
            }
        }
    }
}

impl From<io::Error> for Jp2Error {
    fn from(error: io::Error) -> Self {
        if error.kind() == io::ErrorKind::UnexpectedEof {
            Jp2Error::InputDataReadFailed
        } else {
            Jp2Error::FailedToReadImageData { source: error }
        }
    }
}

/// Maximum number of boxes (including sub-boxes) visited in a single pass.
pub const MAX_BOXES: usize = 1000;

/// JPEG 2000 Signature box.
///
/// A fixed-length 12-byte box which shall be the first box in the file:
/// length 12, type `jP\040\040`, contents `<CR><LF><0x87><LF>`.
pub const JP2_SIGNATURE: [u8; 12] = [
    0x00, 0x00, 0x00, 0x0c, 0x6a, 0x50, 0x20, 0x20, 0x0d, 0x0a, 0x87, 0x0a,
];

/// A minimal 1x1 greyscale JP2 file.
///
/// Signature, File Type, JP2 Header (Image Header and enumerated Colour Specification) and a
/// Contiguous Codestream box of length 0.
pub const JP2_BLANK: [u8; 249] = [
    0x00, 0x00, 0x00, 0x0c, 0x6a, 0x50, 0x20, 0x20, 0x0d, 0x0a, 0x87, 0x0a, 0x00, 0x00, 0x00, 0x14,
    0x66, 0x74, 0x79, 0x70, 0x6a, 0x70, 0x32, 0x20, 0x00, 0x00, 0x00, 0x00, 0x6a, 0x70, 0x32, 0x20,
    0x00, 0x00, 0x00, 0x2d, 0x6a, 0x70, 0x32, 0x68, 0x00, 0x00, 0x00, 0x16, 0x69, 0x68, 0x64, 0x72,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x07, 0x07, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x0f, 0x63, 0x6f, 0x6c, 0x72, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x11, 0x00, 0x00, 0x00,
    0x00, 0x6a, 0x70, 0x32, 0x63, 0xff, 0x4f, 0xff, 0x51, 0x00, 0x29, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x01, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x01, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x07,
    0x01, 0x01, 0xff, 0x64, 0x00, 0x23, 0x00, 0x01, 0x43, 0x72, 0x65, 0x61, 0x74, 0x6f, 0x72, 0x3a,
    0x20, 0x4a, 0x61, 0x73, 0x50, 0x65, 0x72, 0x20, 0x56, 0x65, 0x72, 0x73, 0x69, 0x6f, 0x6e, 0x20,
    0x31, 0x2e, 0x39, 0x30, 0x30, 0x2e, 0x31, 0xff, 0x52, 0x00, 0x0c, 0x00, 0x00, 0x00, 0x01, 0x00,
    0x05, 0x04, 0x04, 0x00, 0x01, 0xff, 0x5c, 0x00, 0x13, 0x40, 0x40, 0x48, 0x48, 0x50, 0x48, 0x48,
    0x50, 0x48, 0x48, 0x50, 0x48, 0x48, 0x50, 0x48, 0x48, 0x50, 0xff, 0x90, 0x00, 0x0a, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x2d, 0x00, 0x01, 0xff, 0x5d, 0x00, 0x14, 0x00, 0x40, 0x40, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff, 0x93, 0xcf, 0xb4,
    0x04, 0x00, 0x80, 0x80, 0x80, 0x80, 0x80, 0xff, 0xd9,
];

/// Check whether the reader is positioned at a JPEG 2000 Signature box.
///
/// Reads 12 bytes and compares them with [`JP2_SIGNATURE`]. The stream position is
/// restored unless `advance` is set and the signature matched. A read error or a stream
/// shorter than 12 bytes is reported as a non-match.
pub fn is_jp2_type<R: io::Read + io::Seek>(reader: &mut R, advance: bool) -> bool {
    probe_signature(reader, advance).unwrap_or(false)
}

/// Like [`is_jp2_type`], but reports stream errors other than a premature end of data.
pub(crate) fn probe_signature<R: io::Read + io::Seek>(
    reader: &mut R,
    advance: bool,
) -> io::Result<bool> {
    let start = reader.stream_position()?;
    let mut buffer = [0u8; 12];
    let matched = match reader.read_exact(&mut buffer) {
        Ok(()) => buffer == JP2_SIGNATURE,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => false,
        Err(e) => {
            reader.seek(io::SeekFrom::Start(start))?;
            return Err(e);
        }
    };
    if !advance || !matched {
        reader.seek(io::SeekFrom::Start(start))?;
    }
    Ok(matched)
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Seek};

    use super::*;

    #[test]
    fn probe_accepts_signature_and_advances() {
        let mut cursor = Cursor::new(JP2_BLANK.to_vec());
        assert!(is_jp2_type(&mut cursor, true));
        assert_eq!(cursor.stream_position().unwrap(), 12);
    }

    #[test]
    fn probe_without_advance_restores_position() {
        let mut cursor = Cursor::new(JP2_BLANK.to_vec());
        assert!(is_jp2_type(&mut cursor, false));
        assert_eq!(cursor.stream_position().unwrap(), 0);
    }

    #[test]
    fn probe_rejects_other_data() {
        let mut data = JP2_BLANK.to_vec();
        data[11] = 0x0b;
        let mut cursor = Cursor::new(data);
        assert!(!is_jp2_type(&mut cursor, true));
        assert_eq!(cursor.stream_position().unwrap(), 0);
    }

    #[test]
    fn probe_rejects_short_input() {
        let mut cursor = Cursor::new(JP2_SIGNATURE[..7].to_vec());
        assert!(!is_jp2_type(&mut cursor, true));
        assert_eq!(cursor.stream_position().unwrap(), 0);
    }

    #[test]
    fn probe_keeps_position_of_embedded_signature() {
        let mut data = vec![0xAA; 5];
        data.extend_from_slice(&JP2_SIGNATURE);
        let mut cursor = Cursor::new(data);
        cursor.seek(io::SeekFrom::Start(5)).unwrap();
        assert!(is_jp2_type(&mut cursor, false));
        assert_eq!(cursor.stream_position().unwrap(), 5);
    }

    #[test]
    fn error_kinds() {
        assert_eq!(Jp2Error::NotAnImage.kind(), ErrorKind::NotThisFormat);
        assert_eq!(
            Jp2Error::corrupted(8, "test").kind(),
            ErrorKind::StructuralCorruption
        );
        assert_eq!(
            Jp2Error::InvalidSettingForImage {
                setting: "Image comment"
            }
            .kind(),
            ErrorKind::UnsupportedEdit
        );
        let eof: Jp2Error = io::Error::new(io::ErrorKind::UnexpectedEof, "eof").into();
        assert!(matches!(eof, Jp2Error::InputDataReadFailed));
    }

    #[test]
    fn blank_is_249_bytes() {
        assert_eq!(JP2_BLANK.len(), 249);
        assert_eq!(JP2_BLANK[..12], JP2_SIGNATURE);
    }
}
