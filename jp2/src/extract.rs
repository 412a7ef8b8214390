//! Payload clean-up applied to UUID box contents before they reach the codecs.

use log::warn;
use memchr::{memchr, memmem};

const EXIF_HEADER: &[u8] = b"Exif\0\0";

/// Find where the TIFF stream starts inside an Exif UUID payload.
///
/// Conforming files start the payload with the `II` or `MM` byte order mark. Some
/// writers put a JPEG style `Exif\0\0` header in front, in which case the stream
/// starts right after the first occurrence. Payloads of 8 bytes or less cannot hold
/// a TIFF header and yield `None`, as do payloads with neither marker.
pub fn locate_exif_start(raw: &[u8]) -> Option<usize> {
    if raw.len() <= 8 {
        return None;
    }
    if raw[0] == raw[1] && (raw[0] == b'I' || raw[0] == b'M') {
        return Some(0);
    }

    // At least one byte has to follow the header.
    let pos = memmem::find(&raw[..raw.len() - 1], EXIF_HEADER)?;
    warn!("Reading non-standard UUID-EXIF_bad box in JPEG 2000 image");
    Some(pos + EXIF_HEADER.len())
}

/// Drop anything before the first `<` of an XMP packet.
///
/// The packet bytes are returned as found; they need not be valid UTF-8.
pub fn clean_xmp_packet(raw: &[u8]) -> &[u8] {
    let start = match memchr(b'<', raw) {
        Some(idx) if idx > 0 => {
            warn!(
                "Removing {} characters from the beginning of the XMP packet",
                idx
            );
            idx
        }
        _ => 0,
    };
    &raw[start..]
}
