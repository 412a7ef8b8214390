//! JP2 images bound to a byte stream.

use log::{debug, error, info, warn};
use std::io::{self, Write};

use crate::boxes::{
    BoxTypes, JBox, UuidBox, UuidKind, BOX_HEADER_SIZE, UUID_EXIF, UUID_IPTC, UUID_SIZE, UUID_XMP,
};
use crate::codec::{
    BasicCodecs, ByteOrder, ExifCodec, IptcCodec, MetadataKind, MetadataRecord, XmpCodec,
};
use crate::colour_specification::{validate_icc_profile, ColourSpecificationBox};
use crate::extract::{clean_xmp_packet, locate_exif_start};
use crate::header_encoder::encode_jp2_header;
use crate::image_header::ImageHeaderBox;
use crate::io_stream::{BasicIo, IoCloser, MemIo};
use crate::structure::{self, PrintStructureOption};
use crate::walker::{usize_len, BoxBudget, BoxEntry, BoxWalker};
use crate::{probe_signature, Jp2Error, Result, JP2_BLANK, JP2_SIGNATURE, MAX_BOXES};

/// Operations every image format handler offers.
pub trait ImageHandler {
    fn mime_type(&self) -> &'static str;

    /// Populate the in-memory metadata from the bound stream.
    fn read_metadata(&mut self) -> Result<()>;

    /// Write the in-memory metadata back, replacing the content of the bound stream.
    fn write_metadata(&mut self) -> Result<()>;

    fn set_comment(&mut self, comment: &str) -> Result<()>;

    /// Write a description of the file's box structure to `out`.
    fn print_structure(
        &mut self,
        out: &mut dyn io::Write,
        option: PrintStructureOption,
        depth: usize,
    ) -> Result<()>;
}

/// A JPEG 2000 image and its metadata.
///
/// The metadata records belong to the image. The stream is only opened for the duration
/// of a read, write or structure listing and is closed again afterwards.
pub struct Jp2Image<S, C = BasicCodecs>
where
    S: BasicIo,
    C: ExifCodec + IptcCodec + XmpCodec,
{
    io: S,
    codecs: C,
    exif: <C as ExifCodec>::Exif,
    iptc: <C as IptcCodec>::Iptc,
    xmp: <C as XmpCodec>::Xmp,
    xmp_packet: Vec<u8>,
    write_xmp_from_packet: bool,
    icc_profile: Vec<u8>,
    byte_order: Option<ByteOrder>,
    pixel_width: u32,
    pixel_height: u32,
    max_boxes: usize,
}

impl<S: BasicIo> Jp2Image<S, BasicCodecs> {
    pub fn new(io: S) -> Self {
        Jp2Image::with_codecs(io, BasicCodecs)
    }

    /// Replace the content of `io` with a minimal blank JP2 file and bind an image to it.
    pub fn create(io: S) -> Result<Self> {
        Jp2Image::create_with_codecs(io, BasicCodecs)
    }
}

// Metadata found during one read pass. Committed only once the whole file was walked.
struct Found<C: ExifCodec + IptcCodec + XmpCodec> {
    exif: Option<<C as ExifCodec>::Exif>,
    byte_order: Option<ByteOrder>,
    iptc: Option<<C as IptcCodec>::Iptc>,
    xmp: Option<<C as XmpCodec>::Xmp>,
    xmp_packet: Option<Vec<u8>>,
    icc_profile: Option<Vec<u8>>,
    dimensions: Option<(u32, u32)>,
}

impl<C: ExifCodec + IptcCodec + XmpCodec> Default for Found<C> {
    fn default() -> Self {
        Found {
            exif: None,
            byte_order: None,
            iptc: None,
            xmp: None,
            xmp_packet: None,
            icc_profile: None,
            dimensions: None,
        }
    }
}

fn relocate(error: Jp2Error, base: u64) -> Jp2Error {
    match error {
        Jp2Error::CorruptedMetadata { offset, reason } => Jp2Error::CorruptedMetadata {
            offset: base + offset,
            reason,
        },
        other => other,
    }
}

// Nothing behind an extended length box is visited, so the header box has to come first.
fn check_extended_length(entry: &BoxEntry, header_seen: bool) -> Result<()> {
    if entry.header.length == 1 && !header_seen {
        return Err(Jp2Error::corrupted(
            entry.offset,
            "extended length box before the header box",
        ));
    }
    Ok(())
}

fn read_box<R: io::Read + io::Seek>(reader: &mut R, entry: &BoxEntry) -> Result<Vec<u8>> {
    let len = usize_len(entry.end - entry.offset, entry.offset)?;
    reader.seek(io::SeekFrom::Start(entry.offset))?;
    let mut bytes = vec![0u8; len];
    reader.read_exact(&mut bytes)?;
    Ok(bytes)
}

fn check_uuid_box(entry: &BoxEntry) -> Result<()> {
    if entry.payload_len() < UUID_SIZE as u64 {
        return Err(Jp2Error::corrupted(
            entry.offset,
            "UUID box too small for its identifier",
        ));
    }
    Ok(())
}

impl<S, C> Jp2Image<S, C>
where
    S: BasicIo,
    C: ExifCodec + IptcCodec + XmpCodec,
{
    pub fn with_codecs(io: S, codecs: C) -> Self {
        Jp2Image {
            io,
            codecs,
            exif: Default::default(),
            iptc: Default::default(),
            xmp: Default::default(),
            xmp_packet: Vec::new(),
            write_xmp_from_packet: false,
            icc_profile: Vec::new(),
            byte_order: None,
            pixel_width: 0,
            pixel_height: 0,
            max_boxes: MAX_BOXES,
        }
    }

    pub fn create_with_codecs(mut io: S, codecs: C) -> Result<Self> {
        io.transfer(MemIo::from_vec(JP2_BLANK.to_vec()))
            .map_err(|source| Jp2Error::ImageWriteFailed { source })?;
        Ok(Jp2Image::with_codecs(io, codecs))
    }

    pub fn io(&self) -> &S {
        &self.io
    }

    pub fn io_mut(&mut self) -> &mut S {
        &mut self.io
    }

    pub fn into_io(self) -> S {
        self.io
    }

    pub fn codecs(&self) -> &C {
        &self.codecs
    }

    pub fn exif(&self) -> &<C as ExifCodec>::Exif {
        &self.exif
    }

    pub fn exif_mut(&mut self) -> &mut <C as ExifCodec>::Exif {
        &mut self.exif
    }

    pub fn iptc(&self) -> &<C as IptcCodec>::Iptc {
        &self.iptc
    }

    pub fn iptc_mut(&mut self) -> &mut <C as IptcCodec>::Iptc {
        &mut self.iptc
    }

    pub fn xmp(&self) -> &<C as XmpCodec>::Xmp {
        &self.xmp
    }

    pub fn xmp_mut(&mut self) -> &mut <C as XmpCodec>::Xmp {
        &mut self.xmp
    }

    /// The raw XMP packet, as read or as last encoded.
    pub fn xmp_packet(&self) -> &[u8] {
        &self.xmp_packet
    }

    pub fn set_xmp_packet<P: Into<Vec<u8>>>(&mut self, packet: P) {
        self.xmp_packet = packet.into();
    }

    /// Write the raw packet as is instead of encoding the XMP record.
    pub fn set_write_xmp_from_packet(&mut self, flag: bool) {
        self.write_xmp_from_packet = flag;
    }

    pub fn write_xmp_from_packet(&self) -> bool {
        self.write_xmp_from_packet
    }

    pub fn icc_profile(&self) -> &[u8] {
        &self.icc_profile
    }

    pub fn icc_profile_defined(&self) -> bool {
        !self.icc_profile.is_empty()
    }

    /// Set the ICC profile. With `test_valid`, the profile must start with a big endian
    /// size field equal to its length.
    pub fn set_icc_profile(&mut self, profile: Vec<u8>, test_valid: bool) -> Result<()> {
        if test_valid {
            validate_icc_profile(&profile)?;
        }
        self.icc_profile = profile;
        Ok(())
    }

    pub fn clear_icc_profile(&mut self) {
        self.icc_profile.clear();
    }

    /// Byte order of the Exif stream last read; `None` before any was decoded.
    pub fn byte_order(&self) -> Option<ByteOrder> {
        self.byte_order
    }

    pub fn set_byte_order(&mut self, byte_order: ByteOrder) {
        self.byte_order = Some(byte_order);
    }

    pub fn pixel_width(&self) -> u32 {
        self.pixel_width
    }

    pub fn pixel_height(&self) -> u32 {
        self.pixel_height
    }

    pub fn max_boxes(&self) -> usize {
        self.max_boxes
    }

    /// Limit on boxes (top level and nested together) visited in one pass.
    pub fn set_max_boxes(&mut self, max_boxes: usize) {
        self.max_boxes = max_boxes;
    }

    /// Drop all in-memory metadata.
    pub fn clear_metadata(&mut self) {
        self.exif.clear();
        self.iptc.clear();
        self.xmp.clear();
        self.xmp_packet.clear();
        self.icc_profile.clear();
    }

    fn open_io(&mut self) -> Result<()> {
        let path = self.io.path();
        self.io
            .open()
            .map_err(|source| Jp2Error::DataSourceOpenFailed { path, source })
    }

    fn read_header_box<R: io::Read + io::Seek>(
        reader: &mut R,
        entry: &BoxEntry,
        budget: &mut BoxBudget,
        found: &mut Found<C>,
    ) -> Result<()> {
        let mut colour_seen = false;
        let mut sub = BoxWalker::new(entry.payload_offset(), entry.end);
        while let Some(sub_entry) = sub.next_box(reader, budget)? {
            debug!("Header sub-box {} at {}", sub_entry.header, sub_entry.offset);
            match BoxTypes::new(sub_entry.header.box_type) {
                BoxTypes::ImageHeader => {
                    let payload = sub_entry.read_payload(reader)?;
                    let mut ihdr =
                        ImageHeaderBox::new(sub_entry.offset, sub_entry.end - sub_entry.offset);
                    ihdr.decode(&payload)?;
                    found.dimensions = Some((ihdr.width(), ihdr.height()));
                }
                BoxTypes::ColourSpecification if !colour_seen => {
                    colour_seen = true;
                    let payload = sub_entry.read_payload(reader)?;
                    let mut colr = ColourSpecificationBox::new(
                        sub_entry.offset,
                        sub_entry.end - sub_entry.offset,
                    );
                    colr.decode(&payload)?;
                    if let Some(profile) = colr.into_icc_profile() {
                        validate_icc_profile(&profile)?;
                        found.icc_profile = Some(profile);
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    // Encoded Exif, IPTC and XMP UUID boxes, in the order they are written.
    fn encode_metadata_boxes(&mut self) -> Result<Vec<u8>> {
        let mut boxes = Vec::new();

        if !self.exif.is_empty() {
            let byte_order = self.byte_order.unwrap_or(ByteOrder::LittleEndian);
            let raw = self
                .codecs
                .encode_exif(&self.exif, byte_order)
                .map_err(|source| Jp2Error::MetadataEncodeFailed {
                    kind: MetadataKind::Exif,
                    source,
                })?;
            if !raw.is_empty() {
                boxes.extend(UuidBox::encode(&UUID_EXIF, &raw)?);
            }
        }

        if !self.iptc.is_empty() {
            let raw = self
                .codecs
                .encode_iptc(&self.iptc)
                .map_err(|source| Jp2Error::MetadataEncodeFailed {
                    kind: MetadataKind::Iptc,
                    source,
                })?;
            if !raw.is_empty() {
                boxes.extend(UuidBox::encode(&UUID_IPTC, &raw)?);
            }
        }

        if !self.write_xmp_from_packet {
            match self.codecs.encode_xmp(&self.xmp) {
                Ok(packet) => self.xmp_packet = packet.into_bytes(),
                Err(e) => error!("Failed to encode XMP metadata: {}", e),
            }
        }
        if !self.xmp_packet.is_empty() {
            boxes.extend(UuidBox::encode(&UUID_XMP, &self.xmp_packet)?);
        }

        Ok(boxes)
    }
}

fn read_uuid_payload<C: ExifCodec + IptcCodec + XmpCodec>(
    codecs: &C,
    data: &[u8],
    kind: UuidKind,
    found: &mut Found<C>,
) {
    match kind {
        UuidKind::Exif => {
            if data.len() <= 8 {
                warn!("Failed to decode Exif metadata");
                found.exif = Some(Default::default());
                return;
            }
            let pos = match locate_exif_start(data) {
                Some(pos) => pos,
                None => {
                    debug!("No TIFF header in Exif UUID box");
                    return;
                }
            };
            match codecs.decode_exif(&data[pos..]) {
                Ok((exif, byte_order)) => {
                    found.exif = Some(exif);
                    found.byte_order = Some(byte_order);
                }
                Err(e) => {
                    warn!("Failed to decode Exif metadata: {}", e);
                    found.exif = Some(Default::default());
                }
            }
        }
        UuidKind::Iptc => match codecs.decode_iptc(data) {
            Ok(iptc) => found.iptc = Some(iptc),
            Err(e) => {
                warn!("Failed to decode IPTC metadata: {}", e);
                found.iptc = Some(Default::default());
            }
        },
        UuidKind::Xmp => {
            let packet = clean_xmp_packet(data);
            if !packet.is_empty() {
                match codecs.decode_xmp(&String::from_utf8_lossy(packet)) {
                    Ok(xmp) => found.xmp = Some(xmp),
                    Err(e) => {
                        warn!("Failed to decode XMP metadata: {}", e);
                        found.xmp = Some(Default::default());
                    }
                }
            }
            found.xmp_packet = Some(packet.to_vec());
        }
        UuidKind::Unknown => {}
    }
}

fn rewrite<R: io::Read + io::Seek>(
    reader: &mut R,
    out: &mut MemIo,
    icc_profile: &[u8],
    metadata_boxes: &[u8],
    max_boxes: usize,
) -> Result<()> {
    match probe_signature(reader, true) {
        Ok(true) => {}
        Ok(false) => return Err(Jp2Error::NoImageInInputData),
        Err(e) => return Err(Jp2Error::from(e)),
    }
    let size = crate::io_stream::stream_len(reader)?;
    out.write_all(&JP2_SIGNATURE)
        .map_err(|source| Jp2Error::ImageWriteFailed { source })?;

    let mut budget = BoxBudget::new(max_boxes);
    let mut walker = BoxWalker::new(JP2_SIGNATURE.len() as u64, size);
    let mut header_seen = false;
    while let Some(entry) = walker.next_box(reader, &mut budget)? {
        info!("Writing box {} from offset {}", entry.header, entry.offset);
        check_extended_length(&entry, header_seen)?;
        let bytes = read_box(reader, &entry)?;

        let written = if entry.header.length == 1 {
            bytes
        } else {
            match BoxTypes::new(entry.header.box_type) {
                BoxTypes::Header => {
                    header_seen = true;
                    let mut header = encode_jp2_header(&bytes, icc_profile, &mut budget)
                        .map_err(|e| relocate(e, entry.offset))?;
                    header.extend_from_slice(metadata_boxes);
                    header
                }
                BoxTypes::Uuid => {
                    check_uuid_box(&entry)?;
                    let mut uuid = [0u8; UUID_SIZE];
                    uuid.copy_from_slice(&bytes[BOX_HEADER_SIZE..BOX_HEADER_SIZE + UUID_SIZE]);
                    match UuidKind::new(&uuid) {
                        UuidKind::Unknown => bytes,
                        kind => {
                            debug!("Dropping {:?} UUID box at {}", kind, entry.offset);
                            continue;
                        }
                    }
                }
                _ => bytes,
            }
        };
        out.write_all(&written)
            .map_err(|source| Jp2Error::ImageWriteFailed { source })?;
    }
    Ok(())
}

impl<S, C> ImageHandler for Jp2Image<S, C>
where
    S: BasicIo,
    C: ExifCodec + IptcCodec + XmpCodec,
{
    fn mime_type(&self) -> &'static str {
        "image/jp2"
    }

    fn read_metadata(&mut self) -> Result<()> {
        info!("Reading metadata from {}", self.io.path());
        self.open_io()?;
        let mut found = Found::<C>::default();
        {
            let mut io = IoCloser::new(&mut self.io);
            match probe_signature(&mut *io, true) {
                Ok(true) => {}
                Ok(false) => return Err(Jp2Error::NotAnImage),
                Err(source) => return Err(Jp2Error::FailedToReadImageData { source }),
            }
            let size = io.size()?;

            let mut budget = BoxBudget::new(self.max_boxes);
            let mut walker = BoxWalker::new(JP2_SIGNATURE.len() as u64, size);
            let mut header_seen = false;
            while let Some(entry) = walker.next_box(&mut *io, &mut budget)? {
                info!("Box {} at offset {}", entry.header, entry.offset);
                check_extended_length(&entry, header_seen)?;
                if entry.extends_to_end() {
                    break;
                }
                match BoxTypes::new(entry.header.box_type) {
                    BoxTypes::Header => {
                        header_seen = true;
                        Self::read_header_box(&mut *io, &entry, &mut budget, &mut found)?
                    }
                    BoxTypes::Uuid => {
                        check_uuid_box(&entry)?;
                        let payload = entry.read_payload(&mut *io)?;
                        let mut uuid_box = UuidBox::new(entry.offset, entry.end - entry.offset);
                        uuid_box.decode(&payload)?;
                        let kind = uuid_box.kind();
                        debug!("{:?} UUID box at {}", kind, entry.offset);
                        read_uuid_payload(&self.codecs, uuid_box.data(), kind, &mut found);
                    }
                    _ => {}
                }
            }
        }

        self.exif = found.exif.unwrap_or_default();
        if found.byte_order.is_some() {
            self.byte_order = found.byte_order;
        }
        self.iptc = found.iptc.unwrap_or_default();
        self.xmp = found.xmp.unwrap_or_default();
        self.xmp_packet = found.xmp_packet.unwrap_or_default();
        self.icc_profile = found.icc_profile.unwrap_or_default();
        let (width, height) = found.dimensions.unwrap_or((0, 0));
        self.pixel_width = width;
        self.pixel_height = height;
        Ok(())
    }

    fn write_metadata(&mut self) -> Result<()> {
        info!("Writing metadata to {}", self.io.path());
        let metadata_boxes = self.encode_metadata_boxes()?;

        self.open_io()?;
        let mut out = MemIo::new();
        {
            let mut io = IoCloser::new(&mut self.io);
            rewrite(
                &mut *io,
                &mut out,
                &self.icc_profile,
                &metadata_boxes,
                self.max_boxes,
            )?;
        }

        self.io
            .transfer(out)
            .map_err(|source| Jp2Error::ImageWriteFailed { source })
    }

    fn set_comment(&mut self, _comment: &str) -> Result<()> {
        Err(Jp2Error::InvalidSettingForImage {
            setting: "Image comment",
        })
    }

    fn print_structure(
        &mut self,
        out: &mut dyn io::Write,
        option: PrintStructureOption,
        depth: usize,
    ) -> Result<()> {
        self.open_io()?;
        let path = self.io.path();
        let mut io = IoCloser::new(&mut self.io);
        match probe_signature(&mut *io, false) {
            Ok(true) => {}
            Ok(false) => return Err(Jp2Error::NotAnImage),
            Err(source) => return Err(Jp2Error::FailedToReadImageData { source }),
        }
        structure::print_structure(
            &mut *io,
            &path,
            &self.codecs,
            out,
            option,
            depth,
            self.max_boxes,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{ExifData, IptcData, XmpProperty, XmpValue};
    use crate::ErrorKind;

    fn tiny_tiff() -> Vec<u8> {
        let mut tiff = b"II*\0".to_vec();
        tiff.extend_from_slice(&8u32.to_le_bytes());
        tiff.extend_from_slice(&[0, 0, 0, 0, 0, 0]);
        tiff
    }

    fn icc(len: u32) -> Vec<u8> {
        let mut profile = len.to_be_bytes().to_vec();
        profile.resize(len as usize, 0x5a);
        profile
    }

    fn blank() -> Jp2Image<MemIo> {
        Jp2Image::new(MemIo::from_vec(JP2_BLANK.to_vec()))
    }

    #[test]
    fn reads_blank_image() {
        let mut image = blank();
        image.read_metadata().unwrap();
        assert_eq!(image.pixel_width(), 1);
        assert_eq!(image.pixel_height(), 1);
        assert!(!image.icc_profile_defined());
        assert!(image.exif().is_empty());
        assert!(image.iptc().is_empty());
        assert!(image.xmp().is_empty());
        assert_eq!(image.byte_order(), None);
        assert!(!image.io().is_open());
    }

    #[test]
    fn rejects_other_formats() {
        let mut image = Jp2Image::new(MemIo::from_vec(b"GIF89a and more bytes".to_vec()));
        let err = image.read_metadata().unwrap_err();
        assert!(matches!(err, Jp2Error::NotAnImage));

        let err = image.write_metadata().unwrap_err();
        assert!(matches!(err, Jp2Error::NoImageInInputData));
        assert_eq!(image.io().data(), b"GIF89a and more bytes");
    }

    #[test]
    fn write_then_read_back() {
        let mut image = blank();
        image.read_metadata().unwrap();
        image.set_icc_profile(icc(20), true).unwrap();
        image.iptc_mut().add(2, 5, b"Title".to_vec());
        image.xmp_mut().set(XmpProperty::text(
            "dc",
            "http://purl.org/dc/elements/1.1/",
            "format",
            "image/jp2",
        ));
        *image.exif_mut() = ExifData::from_tiff(&tiny_tiff()).unwrap();
        image.write_metadata().unwrap();
        assert!(!image.io().is_open());

        let mut reread = Jp2Image::new(MemIo::from_vec(image.io().data().to_vec()));
        reread.read_metadata().unwrap();
        assert_eq!(reread.icc_profile(), &icc(20)[..]);
        assert_eq!(reread.iptc().find(2, 5).unwrap().value_str(), "Title");
        assert_eq!(
            reread.xmp().find("dc", "format").unwrap().value,
            XmpValue::Text("image/jp2".to_string())
        );
        assert_eq!(reread.exif().as_bytes(), &tiny_tiff()[..]);
        assert_eq!(reread.byte_order(), Some(ByteOrder::LittleEndian));
        assert_eq!(reread.pixel_width(), 1);
    }

    #[test]
    fn clearing_metadata_restores_blank() {
        let mut image = blank();
        image.set_icc_profile(icc(20), true).unwrap();
        image.iptc_mut().add(2, 5, b"Title".to_vec());
        image.write_metadata().unwrap();
        assert_ne!(image.io().data(), &JP2_BLANK[..]);

        image.clear_metadata();
        image.write_metadata().unwrap();
        let data = image.io().data();
        // The enumerated colour box is written with its true length of 23.
        assert_eq!(data.len(), JP2_BLANK.len() + 8);
        assert_eq!(&data[..32], &JP2_BLANK[..32]);
        assert_eq!(&data[36..40], b"jp2h");
    }

    #[test]
    fn write_from_raw_packet() {
        let mut image = blank();
        let packet = "<x:xmpmeta xmlns:x=\"adobe:ns:meta/\"></x:xmpmeta>";
        image.set_xmp_packet(packet);
        image.set_write_xmp_from_packet(true);
        image.write_metadata().unwrap();

        let mut reread = Jp2Image::new(MemIo::from_vec(image.io().data().to_vec()));
        reread.read_metadata().unwrap();
        assert_eq!(reread.xmp_packet(), packet.as_bytes());
    }

    #[test]
    fn raw_packet_bytes_survive_a_rewrite() {
        let packet = b"<x:xmpmeta xmlns:x=\"adobe:ns:meta/\">caf\xe9</x:xmpmeta>".to_vec();
        let mut image = blank();
        image.set_xmp_packet(packet.clone());
        image.set_write_xmp_from_packet(true);
        image.write_metadata().unwrap();

        let mut reread = Jp2Image::new(MemIo::from_vec(image.io().data().to_vec()));
        reread.read_metadata().unwrap();
        assert_eq!(reread.xmp_packet(), &packet[..]);

        reread.set_write_xmp_from_packet(true);
        reread.write_metadata().unwrap();
        assert_eq!(reread.io().data(), image.io().data());
    }

    #[test]
    fn invalid_icc_profile_is_rejected() {
        let mut image = blank();
        let err = image.set_icc_profile(vec![0, 0, 0, 9, 1], true).unwrap_err();
        assert!(matches!(err, Jp2Error::InvalidIccProfile { .. }));
        assert!(!image.icc_profile_defined());

        image.set_icc_profile(vec![0, 0, 0, 9, 1], false).unwrap();
        assert!(image.icc_profile_defined());
        image.clear_icc_profile();
        assert!(!image.icc_profile_defined());
    }

    #[test]
    fn comments_are_not_supported() {
        let mut image = blank();
        let err = image.set_comment("hello").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedEdit);
        assert_eq!(image.mime_type(), "image/jp2");
    }

    #[test]
    fn create_writes_blank() {
        let image = Jp2Image::create(MemIo::from_vec(b"junk".to_vec())).unwrap();
        assert_eq!(image.io().data(), &JP2_BLANK[..]);
    }

    #[test]
    fn box_limit_applies() {
        let mut image = blank();
        image.set_max_boxes(3);
        let err = image.read_metadata().unwrap_err();
        assert!(matches!(err, Jp2Error::CorruptedMetadata { .. }));
    }

    #[test]
    fn iptc_only_record_is_written() {
        let mut iptc = IptcData::default();
        iptc.add(2, 120, b"caption".to_vec());
        let mut image = blank();
        *image.iptc_mut() = iptc.clone();
        image.write_metadata().unwrap();

        let data = image.io().data().to_vec();
        let uuid_at = 85;
        assert_eq!(&data[uuid_at + 4..uuid_at + 8], b"uuid");
        assert_eq!(&data[uuid_at + 8..uuid_at + 24], &UUID_IPTC);
        let raw = iptc.encode().unwrap();
        assert_eq!(&data[uuid_at + 24..uuid_at + 24 + raw.len()], &raw[..]);
    }
}
