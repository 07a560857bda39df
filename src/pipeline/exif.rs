//! Minimal EXIF orientation reader and APP1 splicer for JPEG and TIFF.
//!
//! Extracts one field: the Orientation tag (0x0112) from IFD0. Only the
//! three rotation-only values (3, 6, 8) are acted on; mirrored orientations
//! are treated as normal.
//!
//! For JPEG: reads from the APP1 marker ("Exif\0\0" header, TIFF payload).
//! For TIFF: reads from IFD0 directly.
//!
//! Also exposes [`exif_segment`]/[`splice_exif`] so a freshly encoded JPEG
//! can inherit the source's APP1 segment when metadata preservation is
//! requested.
//!
//! Zero external dependencies — pure Rust.

/// Rotation needed to display the raster upright, derived from the EXIF
/// orientation tag. Values are clockwise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Orientation {
    #[default]
    Normal,
    Rotate90,
    Rotate180,
    Rotate270,
}

impl Orientation {
    fn from_tag(value: u16) -> Self {
        match value {
            3 => Orientation::Rotate180,
            6 => Orientation::Rotate90,
            8 => Orientation::Rotate270,
            _ => Orientation::Normal,
        }
    }
}

/// Read the orientation from raw image bytes, dispatching on the container.
/// Returns `Normal` on any parse failure — an unreadable orientation tag is
/// never an error, it just means no rotation.
pub fn orientation(bytes: &[u8]) -> Orientation {
    if bytes.starts_with(&[0xFF, 0xD8]) {
        return find_jpeg_app1(bytes)
            .and_then(tiff_payload)
            .map(orientation_from_tiff)
            .unwrap_or_default();
    }
    if bytes.starts_with(b"MM") || bytes.starts_with(b"II") {
        return orientation_from_tiff(bytes);
    }
    Orientation::Normal
}

const EXIF_HEADER: &[u8] = b"Exif\0\0";
const ORIENTATION_TAG: u16 = 0x0112;

/// Find the payload of a JPEG's APP1 Exif segment (after the 2-byte length,
/// starting with "Exif\0\0").
fn find_jpeg_app1(data: &[u8]) -> Option<&[u8]> {
    // Skip SOI, then walk marker segments until SOS
    let mut pos = 2;
    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            return None;
        }
        let marker = data[pos + 1];
        // SOS means image data starts — stop scanning
        if marker == 0xDA {
            return None;
        }
        // Markers without a length field
        if marker == 0xD8 || marker == 0xD9 || (0xD0..=0xD7).contains(&marker) {
            pos += 2;
            continue;
        }
        let seg_len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        if seg_len < 2 || pos + 2 + seg_len > data.len() {
            return None;
        }
        let payload = &data[pos + 4..pos + 2 + seg_len];
        if marker == 0xE1 && payload.starts_with(EXIF_HEADER) {
            return Some(payload);
        }
        pos += 2 + seg_len;
    }
    None
}

/// Strip the "Exif\0\0" header from an APP1 payload, leaving TIFF bytes.
fn tiff_payload(app1: &[u8]) -> Option<&[u8]> {
    app1.strip_prefix(EXIF_HEADER)
}

/// Read the orientation tag from TIFF bytes (IFD0 only — the thumbnail IFD
/// carries its own orientation, which does not apply to the primary image).
fn orientation_from_tiff(data: &[u8]) -> Orientation {
    if data.len() < 8 {
        return Orientation::Normal;
    }

    let big_endian = match &data[0..2] {
        b"MM" => true,
        b"II" => false,
        _ => return Orientation::Normal,
    };

    let read_u16 = |offset: usize| -> Option<u16> {
        let b = data.get(offset..offset + 2)?;
        Some(if big_endian {
            u16::from_be_bytes([b[0], b[1]])
        } else {
            u16::from_le_bytes([b[0], b[1]])
        })
    };
    let read_u32 = |offset: usize| -> Option<u32> {
        let b = data.get(offset..offset + 4)?;
        Some(if big_endian {
            u32::from_be_bytes([b[0], b[1], b[2], b[3]])
        } else {
            u32::from_le_bytes([b[0], b[1], b[2], b[3]])
        })
    };

    // Verify TIFF magic (42)
    if read_u16(2) != Some(42) {
        return Orientation::Normal;
    }

    let Some(ifd_offset) = read_u32(4) else {
        return Orientation::Normal;
    };
    let ifd_offset = ifd_offset as usize;

    let Some(entry_count) = read_u16(ifd_offset) else {
        return Orientation::Normal;
    };
    let entries_start = ifd_offset + 2;

    for i in 0..entry_count as usize {
        let entry_offset = entries_start + i * 12;
        let Some(tag) = read_u16(entry_offset) else {
            return Orientation::Normal;
        };
        if tag != ORIENTATION_TAG {
            continue;
        }
        // Type must be SHORT (3) with count 1; value is inlined in the
        // first two bytes of the value field.
        if read_u16(entry_offset + 2) != Some(3) {
            return Orientation::Normal;
        }
        return read_u16(entry_offset + 8)
            .map(Orientation::from_tag)
            .unwrap_or_default();
    }

    Orientation::Normal
}

/// Extract a JPEG's full APP1 Exif payload for later splicing.
pub fn exif_segment(bytes: &[u8]) -> Option<Vec<u8>> {
    if !bytes.starts_with(&[0xFF, 0xD8]) {
        return None;
    }
    find_jpeg_app1(bytes).map(<[u8]>::to_vec)
}

/// Insert an APP1 payload into a JPEG right after SOI.
///
/// Returns the input unchanged when it is not a JPEG or the payload would
/// overflow the segment length field.
pub fn splice_exif(jpeg: Vec<u8>, app1_payload: &[u8]) -> Vec<u8> {
    if !jpeg.starts_with(&[0xFF, 0xD8]) {
        return jpeg;
    }
    // Segment length covers itself (2 bytes) plus the payload
    let seg_len = app1_payload.len() + 2;
    if seg_len > u16::MAX as usize {
        return jpeg;
    }

    let mut out = Vec::with_capacity(jpeg.len() + seg_len + 2);
    out.extend_from_slice(&[0xFF, 0xD8, 0xFF, 0xE1]);
    out.extend_from_slice(&(seg_len as u16).to_be_bytes());
    out.extend_from_slice(app1_payload);
    out.extend_from_slice(&jpeg[2..]);
    out
}
