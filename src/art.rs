//! Heuristic cover-art extraction from ID3v2-tagged audio files.
//!
//! Scans the tag for an APIC (attached picture) frame and returns the
//! embedded image bytes. Best-effort by contract: any structural anomaly
//! yields `None`, never an error, and arbitrary input must not panic.

use log::debug;

/// Only the head of the file is scanned; ID3 tags live at the front.
pub const ART_SCAN_LIMIT: usize = 2 * 1024 * 1024;

/// An image pulled out of an audio container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverArt {
    /// MIME type as declared by the tag ("image/jpeg" when absent)
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Extract an embedded picture from the leading bytes of an audio file.
pub fn extract_cover_art(data: &[u8]) -> Option<CoverArt> {
    let data = &data[..data.len().min(ART_SCAN_LIMIT)];
    if data.len() < 10 || &data[0..3] != b"ID3" {
        return None;
    }

    // Tag size is a synch-safe integer: 4 bytes of 7 significant bits each.
    let tag_size = synchsafe_u32(&data[6..10]) as usize;
    let tag_end = (10 + tag_size).min(data.len());

    let mut offset = 10usize;
    if data[5] & 0x40 != 0 {
        // Extended header present; skip its minimal footprint.
        offset += 4;
    }

    while offset + 10 <= tag_end {
        let frame_id = &data[offset..offset + 4];
        let frame_size = be_u32(&data[offset + 4..offset + 8]) as usize;
        if frame_size == 0 {
            // Padding reached
            return None;
        }

        if frame_id == b"APIC" {
            return parse_apic(data, offset + 10, frame_size);
        }

        offset = offset.checked_add(10 + frame_size)?;
    }
    None
}

/// Parse an APIC frame body: encoding byte, NUL-terminated MIME, picture
/// type byte, NUL-terminated description, then the image data.
fn parse_apic(data: &[u8], body_start: usize, body_size: usize) -> Option<CoverArt> {
    let body_end = body_start.checked_add(body_size)?.min(data.len());
    let body = data.get(body_start..body_end)?;

    let mut pos = 0usize;
    let encoding = *body.get(pos)?;
    pos += 1;

    let mime_start = pos;
    while *body.get(pos)? != 0 {
        pos += 1;
    }
    let mime = String::from_utf8_lossy(&body[mime_start..pos]).into_owned();
    pos += 1; // NUL terminator

    pos += 1; // picture type

    // Description: UTF-16 encodings use two-byte code units.
    let wide = encoding == 1 || encoding == 2;
    while *body.get(pos)? != 0 {
        pos += if wide { 2 } else { 1 };
    }
    pos += 1;

    let image = body.get(pos..)?;
    if image.is_empty() {
        debug!("APIC frame carried no image data");
        return None;
    }

    Some(CoverArt {
        mime: if mime.is_empty() {
            "image/jpeg".to_string()
        } else {
            mime
        },
        bytes: image.to_vec(),
    })
}

fn synchsafe_u32(bytes: &[u8]) -> u32 {
    ((bytes[0] as u32 & 0x7f) << 21)
        | ((bytes[1] as u32 & 0x7f) << 14)
        | ((bytes[2] as u32 & 0x7f) << 7)
        | (bytes[3] as u32 & 0x7f)
}

fn be_u32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a minimal ID3v2.3 tag containing one APIC frame.
    fn tag_with_apic(image: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.push(0u8); // encoding: ISO-8859-1
        body.extend_from_slice(b"image/png\0");
        body.push(3); // picture type: front cover
        body.extend_from_slice(b"cover\0");
        body.extend_from_slice(image);

        let mut frame = Vec::new();
        frame.extend_from_slice(b"APIC");
        frame.extend_from_slice(&(body.len() as u32).to_be_bytes());
        frame.extend_from_slice(&[0, 0]); // flags
        frame.extend_from_slice(&body);

        let tag_size = frame.len() as u32;
        let mut out = Vec::new();
        out.extend_from_slice(b"ID3");
        out.extend_from_slice(&[3, 0, 0]); // version 2.3, no flags
        out.push(((tag_size >> 21) & 0x7f) as u8);
        out.push(((tag_size >> 14) & 0x7f) as u8);
        out.push(((tag_size >> 7) & 0x7f) as u8);
        out.push((tag_size & 0x7f) as u8);
        out.extend_from_slice(&frame);
        out.extend_from_slice(b"audio data follows");
        out
    }

    #[test]
    fn test_extracts_apic_image() {
        let image = vec![0x89, 0x50, 0x4e, 0x47, 1, 2, 3, 4];
        let data = tag_with_apic(&image);

        let art = extract_cover_art(&data).expect("art should be found");
        assert_eq!(art.mime, "image/png");
        assert_eq!(art.bytes, image);
    }

    #[test]
    fn test_skips_leading_frames() {
        let image = vec![0xff, 0xd8, 0xff, 0xe0];
        let mut tagged = tag_with_apic(&image);

        // Splice a TIT2 frame in front of the APIC frame.
        let mut title = Vec::new();
        title.extend_from_slice(b"TIT2");
        title.extend_from_slice(&6u32.to_be_bytes());
        title.extend_from_slice(&[0, 0]);
        title.extend_from_slice(b"\0hello");
        tagged.splice(10..10, title);

        // Fix up the synch-safe tag size.
        let new_size = (tagged.len() - 10) as u32;
        tagged[6] = ((new_size >> 21) & 0x7f) as u8;
        tagged[7] = ((new_size >> 14) & 0x7f) as u8;
        tagged[8] = ((new_size >> 7) & 0x7f) as u8;
        tagged[9] = (new_size & 0x7f) as u8;

        let art = extract_cover_art(&tagged).expect("art should be found");
        assert_eq!(art.bytes, image);
    }

    #[test]
    fn test_untagged_data_yields_none() {
        assert_eq!(extract_cover_art(b"RIFF0000WAVE"), None);
        assert_eq!(extract_cover_art(&[]), None);
        assert_eq!(extract_cover_art(b"ID3"), None);
    }

    #[test]
    fn test_truncated_tag_yields_none() {
        let data = tag_with_apic(&[1, 2, 3, 4]);
        // Cut off mid-frame; the parser must bail out cleanly.
        assert_eq!(extract_cover_art(&data[..14]), None);
    }

    #[test]
    fn test_garbage_does_not_panic() {
        let mut garbage = b"ID3\x04\x00\x40".to_vec();
        garbage.extend_from_slice(&[0x7f; 64]);
        let _ = extract_cover_art(&garbage);
    }
}
