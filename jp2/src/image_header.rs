use crate::boxes::{BoxType, JBox, BOX_TYPE_IMAGE_HEADER};
use crate::{Jp2Error, Result};

/// Size of the Image Header box contents.
pub const IMAGE_HEADER_SIZE: usize = 14;

/// Image Header box.
///
/// This box contains fixed length generic information about the image, such
/// as the image size and number of components. The contents of the JP2 Header
/// box shall start with an Image Header box. Instances of this box in other
/// places in the file shall be ignored. The length of the Image Header box
/// shall be 22 bytes, including the box length and type fields. Much of the
/// information within the Image Header box is redundant with information
/// stored in the codestream itself.
///
/// See ITU-T T.800(V4) | ISO/IEC 15444-1:2024 Section I.5.3.1.
#[derive(Debug, Default)]
pub struct ImageHeaderBox {
    length: u64,
    offset: u64,
    height: [u8; 4],
    width: [u8; 4],
    components_num: [u8; 2],
    components_bits: [u8; 1],
    compression_type: [u8; 1],
    colourspace_unknown: [u8; 1],
    intellectual_property: [u8; 1],
}

impl ImageHeaderBox {
    pub fn new(offset: u64, length: u64) -> ImageHeaderBox {
        ImageHeaderBox {
            length,
            offset,
            ..Default::default()
        }
    }

    /// Image area height (HEIGHT).
    ///
    /// Stored as a 4-byte big endian unsigned integer.
    pub fn height(&self) -> u32 {
        u32::from_be_bytes(self.height)
    }

    /// Image area width (WIDTH).
    ///
    /// Stored as a 4-byte big endian unsigned integer.
    pub fn width(&self) -> u32 {
        u32::from_be_bytes(self.width)
    }

    /// Number of components (NC).
    pub fn components_num(&self) -> u16 {
        u16::from_be_bytes(self.components_num)
    }

    /// Raw bits per component byte (BPC).
    ///
    /// The low 7 bits hold the bit depth minus one, the high bit the signedness.
    /// 255 means the depth varies per component.
    pub fn components_bits(&self) -> u8 {
        self.components_bits[0]
    }

    /// Compression type (C), 7 for core coding system files.
    pub fn compression_type(&self) -> u8 {
        self.compression_type[0]
    }

    /// Colourspace Unknown (UnkC).
    pub fn colourspace_unknown(&self) -> u8 {
        self.colourspace_unknown[0]
    }

    /// Intellectual Property (IPR).
    pub fn intellectual_property(&self) -> u8 {
        self.intellectual_property[0]
    }
}

impl JBox for ImageHeaderBox {
    // The type of the Image Header box shall be ‘ihdr’ (0x6968 6472)
    fn identifier(&self) -> BoxType {
        BOX_TYPE_IMAGE_HEADER
    }

    fn length(&self) -> u64 {
        self.length
    }

    fn offset(&self) -> u64 {
        self.offset
    }

    fn decode(&mut self, payload: &[u8]) -> Result<()> {
        if payload.len() < IMAGE_HEADER_SIZE {
            return Err(Jp2Error::corrupted(self.offset, "image header box too small"));
        }
        self.height.copy_from_slice(&payload[0..4]);
        self.width.copy_from_slice(&payload[4..8]);
        self.components_num.copy_from_slice(&payload[8..10]);
        self.components_bits[0] = payload[10];
        self.compression_type[0] = payload[11];
        self.colourspace_unknown[0] = payload[12];
        self.intellectual_property[0] = payload[13];

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_header_box() {
        let payload = [
            0x00, 0x00, 0x01, 0x20, // height 288
            0x00, 0x00, 0x01, 0x60, // width 352
            0x00, 0x03, // components
            0x07, // 8 bits unsigned
            0x07, 0x00, 0x00,
        ];
        let mut ihdr = ImageHeaderBox::new(40, 22);
        ihdr.decode(&payload).unwrap();

        assert_eq!(ihdr.identifier(), BOX_TYPE_IMAGE_HEADER);
        assert_eq!(ihdr.offset(), 40);
        assert_eq!(ihdr.length(), 22);
        assert_eq!(ihdr.height(), 288);
        assert_eq!(ihdr.width(), 352);
        assert_eq!(ihdr.components_num(), 3);
        assert_eq!(ihdr.components_bits(), 7);
        assert_eq!(ihdr.compression_type(), 7);
        assert_eq!(ihdr.colourspace_unknown(), 0);
        assert_eq!(ihdr.intellectual_property(), 0);
    }

    #[test]
    fn truncated_image_header() {
        let mut ihdr = ImageHeaderBox::new(40, 18);
        let err = ihdr.decode(&[0u8; 10]).unwrap_err();
        assert!(matches!(err, Jp2Error::CorruptedMetadata { offset: 40, .. }));
    }
}
