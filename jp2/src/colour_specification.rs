use log::debug;
use std::fmt;

use crate::boxes::{BoxHeader, BoxType, JBox, BOX_HEADER_SIZE, BOX_TYPE_COLOUR_SPECIFICATION};
use crate::{Jp2Error, Result};

type Method = u8;

const METHOD_ENUMERATED_COLOUR_SPACE: Method = 1;
const METHOD_ENUMERATED_RESTRICTED_ICC_PROFILE: Method = 2;

/// Payload length of the enumerated colour specification written when no ICC profile is set.
pub const NO_ICC_PAYLOAD_LENGTH: usize = 15;

/// Payload written when no ICC profile is set.
pub const NO_ICC_PAYLOAD: [u8; NO_ICC_PAYLOAD_LENGTH] = [
    0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x00, 0x05, 0x1c, b'u', b'u', b'i', b'd',
];

/// METH, PREC and APPROX bytes written in front of an embedded ICC profile.
pub const ICC_PREFIX: [u8; 3] = [METHOD_ENUMERATED_RESTRICTED_ICC_PROFILE, 0x00, 0x00];

// Total length of the short enumerated form found in most files (header + METH, PREC,
// APPROX, EnumCS). Boxes of this size never carry a profile.
const ENUMERATED_BOX_LENGTH: usize = 15;

#[derive(Debug, PartialEq)]
/// Colour specification methods (METH) as far as metadata handling is concerned.
pub enum ColourSpecificationMethods {
    /// Enumerated colour space, using integer codes (EnumCS).
    EnumeratedColourSpace { code: u32 },

    /// Restricted ICC method (METH 2).
    ///
    /// The PROFILE field immediately follows the APPROX field and is the last
    /// field in the box.
    RestrictedICCProfile { profile_data: Vec<u8> },

    /// Any other method whose box is sized like a profile carrier.
    ///
    /// Profile carriers are recognised by size rather than by METH, so the bytes
    /// after APPROX are read as a length prefixed ICC profile here as well.
    AnyICCProfile { method: u8, profile_data: Vec<u8> },

    /// A method this crate leaves alone.
    Reserved { value: u8 },
}

impl Default for ColourSpecificationMethods {
    fn default() -> Self {
        ColourSpecificationMethods::Reserved { value: 0 }
    }
}

impl fmt::Display for ColourSpecificationMethods {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ColourSpecificationMethods::EnumeratedColourSpace { code } => {
                write!(f, "Enumerated colourspace: {}", code)
            }
            ColourSpecificationMethods::RestrictedICCProfile { profile_data } => {
                write!(f, "Restricted ICC Profile ({} bytes)", profile_data.len())
            }
            ColourSpecificationMethods::AnyICCProfile {
                method,
                profile_data,
            } => write!(f, "ICC Profile, method {} ({} bytes)", method, profile_data.len()),
            ColourSpecificationMethods::Reserved { value } => write!(f, "{}", value),
        }
    }
}

/// Colour Specification box.
///
/// Each Colour Specification box defines one method by which an application can
/// interpret the colourspace of the decompressed image data. A conforming JP2
/// reader shall ignore all Colour Specification boxes after the first.
///
/// The first three payload bytes are METH, PREC and APPROX. When the box embeds
/// an ICC profile, the profile follows directly and starts with its own 4-byte
/// big endian size field, which is how its extent is found.
///
/// See ITU-T T.800(V4) | ISO/IEC 15444-1:2024 I.5.3.3.
#[derive(Debug, Default)]
pub struct ColourSpecificationBox {
    pub(crate) length: u64,
    pub(crate) offset: u64,
    pub(crate) method: ColourSpecificationMethods,
    pub(crate) padding: [u8; 3],
    pub(crate) icc_length: Option<u32>,
}

impl ColourSpecificationBox {
    pub fn new(offset: u64, length: u64) -> ColourSpecificationBox {
        ColourSpecificationBox {
            length,
            offset,
            ..Default::default()
        }
    }

    pub fn method(&self) -> &ColourSpecificationMethods {
        &self.method
    }

    /// The METH, PREC and APPROX bytes as stored.
    pub fn padding(&self) -> [u8; 3] {
        self.padding
    }

    /// Precedence (PREC), a signed byte.
    pub fn precedence(&self) -> i8 {
        self.padding[1] as i8
    }

    /// Colourspace approximation (APPROX).
    pub fn colourspace_approximation(&self) -> u8 {
        self.padding[2]
    }

    /// The size field of the embedded profile, if there is one.
    pub fn icc_length(&self) -> Option<u32> {
        self.icc_length
    }

    pub fn icc_profile(&self) -> Option<&[u8]> {
        match &self.method {
            ColourSpecificationMethods::RestrictedICCProfile { profile_data }
            | ColourSpecificationMethods::AnyICCProfile { profile_data, .. } => {
                Some(profile_data)
            }
            _ => None,
        }
    }

    pub fn into_icc_profile(self) -> Option<Vec<u8>> {
        match self.method {
            ColourSpecificationMethods::RestrictedICCProfile { profile_data }
            | ColourSpecificationMethods::AnyICCProfile { profile_data, .. } => {
                Some(profile_data)
            }
            _ => None,
        }
    }

    /// Whether the box holds a profile after its three method bytes.
    ///
    /// A 15-byte box never does. Two more cases are ruled out on top of that length
    /// test: METH 1 (an enumerated colour space, whatever the box size) and the 15-byte
    /// payload written for images without a profile, which gives a 23-byte box.
    fn carries_profile(&self, payload: &[u8]) -> bool {
        payload[0] != METHOD_ENUMERATED_COLOUR_SPACE
            && payload.len() + BOX_HEADER_SIZE != ENUMERATED_BOX_LENGTH
            && payload.len() != NO_ICC_PAYLOAD_LENGTH
    }
}

impl JBox for ColourSpecificationBox {
    // The type of a Colour Specification box shall be ‘colr’ (0x636F 6C72).
    fn identifier(&self) -> BoxType {
        BOX_TYPE_COLOUR_SPECIFICATION
    }

    fn length(&self) -> u64 {
        self.length
    }

    fn offset(&self) -> u64 {
        self.offset
    }

    fn decode(&mut self, payload: &[u8]) -> Result<()> {
        if payload.len() < ICC_PREFIX.len() {
            return Err(Jp2Error::corrupted(
                self.offset,
                "colour specification box too small",
            ));
        }
        self.padding.copy_from_slice(&payload[..3]);
        let method = payload[0];

        if !self.carries_profile(payload) {
            self.icc_length = None;
            self.method = if method == METHOD_ENUMERATED_COLOUR_SPACE && payload.len() >= 7 {
                ColourSpecificationMethods::EnumeratedColourSpace {
                    code: u32::from_be_bytes([payload[3], payload[4], payload[5], payload[6]]),
                }
            } else {
                ColourSpecificationMethods::Reserved { value: method }
            };
            return Ok(());
        }

        if payload.len() < 7 {
            return Err(Jp2Error::corrupted(
                self.offset,
                "colour specification box too small for an ICC profile",
            ));
        }
        let icc_length = u32::from_be_bytes([payload[3], payload[4], payload[5], payload[6]]);
        let available = payload.len() - 3;
        if icc_length as u64 > available as u64 {
            return Err(Jp2Error::corrupted(
                self.offset,
                "ICC profile length exceeds colour specification box",
            ));
        }
        debug!(
            "ICC profile of {} bytes in colour specification box at {}",
            icc_length, self.offset
        );

        let profile_data = payload[3..3 + icc_length as usize].to_vec();
        self.icc_length = Some(icc_length);
        self.method = if method == METHOD_ENUMERATED_RESTRICTED_ICC_PROFILE {
            ColourSpecificationMethods::RestrictedICCProfile { profile_data }
        } else {
            ColourSpecificationMethods::AnyICCProfile {
                method,
                profile_data,
            }
        };

        Ok(())
    }
}

/// Build a complete `colr` sub-box for `icc_profile`.
///
/// An empty profile produces the fixed enumerated form.
pub fn encode_colour_specification(icc_profile: &[u8]) -> Result<Vec<u8>> {
    let payload_len = if icc_profile.is_empty() {
        NO_ICC_PAYLOAD_LENGTH
    } else {
        ICC_PREFIX.len() + icc_profile.len()
    };
    let total = BOX_HEADER_SIZE + payload_len;
    if total > u32::MAX as usize {
        return Err(Jp2Error::InvalidIccProfile {
            reason: "profile too large for a colour specification box",
        });
    }

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&BoxHeader::new(total as u32, BOX_TYPE_COLOUR_SPECIFICATION).encode());
    if icc_profile.is_empty() {
        out.extend_from_slice(&NO_ICC_PAYLOAD);
    } else {
        out.extend_from_slice(&ICC_PREFIX);
        out.extend_from_slice(icc_profile);
    }
    Ok(out)
}

/// Check that `profile` starts with a big endian size field equal to its length.
pub fn validate_icc_profile(profile: &[u8]) -> Result<()> {
    if profile.len() < 4 {
        return Err(Jp2Error::InvalidIccProfile {
            reason: "profile shorter than its size field",
        });
    }
    let declared = u32::from_be_bytes([profile[0], profile[1], profile[2], profile[3]]);
    if declared as u64 != profile.len() as u64 {
        return Err(Jp2Error::InvalidIccProfile {
            reason: "profile size field does not match its length",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn icc(len: u32) -> Vec<u8> {
        let mut profile = len.to_be_bytes().to_vec();
        profile.resize(len as usize, 0xab);
        profile
    }

    #[test]
    fn enumerated_colourspace() {
        // colr from the blank image: sRGB greyscale, 15 bytes in total.
        let payload = [0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x11];
        let mut colr = ColourSpecificationBox::new(62, 15);
        colr.decode(&payload).unwrap();

        assert_eq!(
            colr.method(),
            &ColourSpecificationMethods::EnumeratedColourSpace { code: 17 }
        );
        assert_eq!(colr.icc_profile(), None);
        assert_eq!(colr.icc_length(), None);
        assert_eq!(colr.precedence(), 0);
        assert_eq!(colr.colourspace_approximation(), 0);
    }

    #[test]
    fn written_no_icc_form_has_no_profile() {
        let encoded = encode_colour_specification(&[]).unwrap();
        assert_eq!(encoded.len(), 23);
        let mut colr = ColourSpecificationBox::new(0, 23);
        colr.decode(&encoded[8..]).unwrap();
        assert_eq!(colr.icc_profile(), None);
    }

    #[test]
    fn enumerated_method_never_has_a_profile() {
        // METH 1 in a 23-byte box that is not the written no-profile form.
        let payload = [1, 0, 0, 0, 0, 0, 16, 9, 9, 9, 9, 9, 9, 9, 9];
        let mut colr = ColourSpecificationBox::new(0, 23);
        colr.decode(&payload).unwrap();
        assert_eq!(
            colr.method(),
            &ColourSpecificationMethods::EnumeratedColourSpace { code: 16 }
        );
        assert_eq!(colr.icc_profile(), None);
        assert_eq!(colr.icc_length(), None);

        // METH 2 in a 15-byte box.
        let mut colr = ColourSpecificationBox::new(0, 15);
        colr.decode(&[2, 0, 0, 0, 0, 0, 4]).unwrap();
        assert_eq!(colr.icc_profile(), None);
    }

    #[test]
    fn restricted_icc_profile() {
        let profile = icc(20);
        let encoded = encode_colour_specification(&profile).unwrap();
        assert_eq!(&encoded[..8], &[0, 0, 0, 31, b'c', b'o', b'l', b'r']);

        let mut colr = ColourSpecificationBox::new(0, 31);
        colr.decode(&encoded[8..]).unwrap();
        assert_eq!(colr.icc_length(), Some(20));
        assert_eq!(colr.padding(), [2, 0, 0]);
        assert_eq!(colr.into_icc_profile(), Some(profile));
    }

    #[test]
    fn trailing_bytes_after_profile_are_ignored() {
        let mut payload = ICC_PREFIX.to_vec();
        payload.extend(icc(8));
        payload.extend_from_slice(&[0xee; 5]);
        let mut colr = ColourSpecificationBox::new(0, 0);
        colr.decode(&payload).unwrap();
        assert_eq!(colr.icc_profile(), Some(&icc(8)[..]));
    }

    #[test]
    fn icc_length_overrun_is_corrupt() {
        let mut payload = ICC_PREFIX.to_vec();
        payload.extend_from_slice(&1000u32.to_be_bytes());
        payload.extend_from_slice(&[0u8; 20]);
        let mut colr = ColourSpecificationBox::new(48, 0);
        let err = colr.decode(&payload).unwrap_err();
        assert!(matches!(err, Jp2Error::CorruptedMetadata { offset: 48, .. }));
    }

    #[test]
    fn tiny_colr_is_corrupt() {
        let mut colr = ColourSpecificationBox::new(0, 10);
        assert!(colr.decode(&[2, 0]).is_err());
        assert!(colr.decode(&[2, 0, 0, 0]).is_err());
    }

    #[test]
    fn validate_profiles() {
        assert!(validate_icc_profile(&icc(4)).is_ok());
        assert!(validate_icc_profile(&icc(128)).is_ok());
        assert!(validate_icc_profile(&[0, 0, 0]).is_err());

        let mut wrong = icc(16);
        wrong.push(0);
        assert!(matches!(
            validate_icc_profile(&wrong),
            Err(Jp2Error::InvalidIccProfile { .. })
        ));
    }
}
