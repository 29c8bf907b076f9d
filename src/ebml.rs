//! EBML element framing
//!
//! Every EBML element is serialized as a variable-width identifier, a
//! variable-width size, then the payload. The payload is either raw data or
//! a sequence of child elements; a size of all one-bits means "unknown", in
//! which case the element extends to its container's boundary.
//!
//! Reading here is slice-based and lazy: [`ElementIter`] walks the children
//! of a byte range and hands out payload *ranges*, so large payloads
//! (attachment blobs, clusters) are never copied until someone asks for
//! them.
//!
//! Malformed framing never produces an error. Each element read lands in one
//! of three states: parsed, skipped (id or size bytes are unreadable, which
//! loses the framing for the rest of the container), or truncated (declared
//! size overruns the container; the payload is clamped). Skips and
//! truncations are recorded as [`Defect`] values for the caller to inspect.

use std::fmt;
use std::ops::Range;

use tracing::warn;

// EBML-level identifiers (format-independent).
pub const EBML_HEADER: u32 = 0x1A45_DFA3;
pub const EBML_VERSION: u32 = 0x4286;
pub const EBML_READ_VERSION: u32 = 0x42F7;
pub const EBML_MAX_ID_LENGTH: u32 = 0x42F2;
pub const EBML_MAX_SIZE_LENGTH: u32 = 0x42F3;
pub const DOC_TYPE: u32 = 0x4282;
pub const DOC_TYPE_VERSION: u32 = 0x4287;
pub const DOC_TYPE_READ_VERSION: u32 = 0x4285;
pub const VOID: u32 = 0xEC;
pub const CRC32: u32 = 0xBF;

/// A structural problem survived during parsing.
///
/// Defects are diagnostics, not failures: parsing continues (or stops early
/// with a partial result) and the caller decides whether to care.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Defect {
    /// Absolute byte offset of the element that could not be read cleanly
    pub offset: usize,
    pub kind: DefectKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefectKind {
    /// The identifier bytes are unreadable (zero marker byte, over-wide id,
    /// or the id runs past the container)
    BadId,
    /// The size bytes are unreadable
    BadSize,
    /// The declared payload size exceeds the bytes remaining in the
    /// container; the payload was clamped
    Overrun { declared: u64, available: u64 },
    /// Simple tag nesting exceeded the configured depth limit; deeper
    /// children were dropped
    TooDeep { limit: usize },
}

impl fmt::Display for Defect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            DefectKind::BadId => write!(f, "malformed element id at offset {}", self.offset),
            DefectKind::BadSize => write!(f, "malformed element size at offset {}", self.offset),
            DefectKind::Overrun { declared, available } => write!(
                f,
                "element at offset {} declares {} bytes but only {} remain",
                self.offset, declared, available
            ),
            DefectKind::TooDeep { limit } => write!(
                f,
                "simple tag at offset {} nested deeper than {} levels",
                self.offset, limit
            ),
        }
    }
}

/// Reads a variable-width element id starting at `pos`.
///
/// Returns the id in encoded form together with its width in bytes, or
/// `None` if the bytes do not form a valid id (ids are 1 to 4 bytes wide).
pub fn read_id(buf: &[u8], pos: usize) -> Option<(u32, usize)> {
    let head = *buf.get(pos)?;
    if head == 0 {
        return None;
    }
    let width = head.leading_zeros() as usize + 1;
    if width > 4 || pos + width > buf.len() {
        return None;
    }
    let mut id = 0u32;
    for &b in &buf[pos..pos + width] {
        id = (id << 8) | u32::from(b);
    }
    Some((id, width))
}

/// Reads a variable-width size starting at `pos`.
///
/// Returns `(Some(value), width)` for a known size, `(None, width)` for the
/// reserved all-ones "unknown size", or `None` if the bytes do not form a
/// valid size (sizes are 1 to 8 bytes wide).
pub fn read_size(buf: &[u8], pos: usize) -> Option<(Option<u64>, usize)> {
    let head = *buf.get(pos)?;
    if head == 0 {
        return None;
    }
    let width = head.leading_zeros() as usize + 1;
    if pos + width > buf.len() {
        return None;
    }
    // Mask off the length marker bit, then accumulate the tail bytes.
    let mut value = u64::from(head) & ((1u64 << (8 - width)) - 1);
    for &b in &buf[pos + 1..pos + width] {
        value = (value << 8) | u64::from(b);
    }
    let unknown = (1u64 << (7 * width)) - 1;
    if value == unknown {
        Some((None, width))
    } else {
        Some((Some(value), width))
    }
}

/// One element located in a byte buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawElement {
    /// Identifier in encoded form
    pub id: u32,
    /// Absolute offset of the first id byte
    pub start: usize,
    /// Absolute payload range (clamped to the container on truncation)
    pub data: Range<usize>,
    /// Declared payload size; `None` means unknown/unbounded
    pub size: Option<u64>,
    /// True when the declared size ran past the container boundary
    pub truncated: bool,
}

impl RawElement {
    /// The payload bytes within `buf`.
    pub fn payload<'a>(&self, buf: &'a [u8]) -> &'a [u8] {
        &buf[self.data.clone()]
    }
}

/// Walks the child elements of a byte range.
pub struct ElementIter<'a> {
    buf: &'a [u8],
    pos: usize,
    end: usize,
}

impl<'a> ElementIter<'a> {
    pub fn new(buf: &'a [u8], range: Range<usize>) -> Self {
        let end = range.end.min(buf.len());
        ElementIter { buf, pos: range.start.min(end), end }
    }

    /// Advances to the next child element.
    ///
    /// Unreadable framing pushes a [`Defect`] and ends iteration (once the
    /// id or size of one child is garbage, the positions of its siblings
    /// are unknowable). An element whose declared size overruns the
    /// container is returned with its payload clamped and `truncated` set;
    /// it is necessarily the last child. An unknown-size element extends to
    /// the end of the container.
    pub fn next(&mut self, defects: &mut Vec<Defect>) -> Option<RawElement> {
        if self.pos >= self.end {
            return None;
        }
        let start = self.pos;
        let bounded = &self.buf[..self.end];

        let (id, id_width) = match read_id(bounded, start) {
            Some(v) => v,
            None => {
                warn!(offset = start, "malformed element id, abandoning container");
                defects.push(Defect { offset: start, kind: DefectKind::BadId });
                self.pos = self.end;
                return None;
            }
        };
        let (size, size_width) = match read_size(bounded, start + id_width) {
            Some(v) => v,
            None => {
                warn!(offset = start, id, "malformed element size, abandoning container");
                defects.push(Defect { offset: start, kind: DefectKind::BadSize });
                self.pos = self.end;
                return None;
            }
        };

        let data_start = start + id_width + size_width;
        let available = (self.end - data_start) as u64;
        let (data_end, truncated) = match size {
            None => {
                self.pos = self.end;
                (self.end, false)
            }
            Some(declared) if declared > available => {
                warn!(offset = start, id, declared, available, "element overruns container");
                defects.push(Defect {
                    offset: start,
                    kind: DefectKind::Overrun { declared, available },
                });
                self.pos = self.end;
                (self.end, true)
            }
            Some(declared) => {
                let data_end = data_start + declared as usize;
                self.pos = data_end;
                (data_end, false)
            }
        };

        Some(RawElement { id, start, data: data_start..data_end, size, truncated })
    }
}

/// Decodes a big-endian unsigned integer payload (0 to 8 bytes).
pub fn parse_uint(data: &[u8]) -> u64 {
    data.iter().take(8).fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}

/// Decodes a float payload. EBML floats are 0, 4, or 8 bytes.
pub fn parse_float(data: &[u8]) -> Option<f64> {
    match data.len() {
        0 => Some(0.0),
        4 => {
            let mut b = [0u8; 4];
            b.copy_from_slice(data);
            Some(f64::from(f32::from_be_bytes(b)))
        }
        8 => {
            let mut b = [0u8; 8];
            b.copy_from_slice(data);
            Some(f64::from_be_bytes(b))
        }
        _ => None,
    }
}

/// Decodes a string payload: lossy UTF-8 with trailing NUL padding removed.
pub fn parse_string(data: &[u8]) -> String {
    let trimmed = match data.iter().rposition(|&b| b != 0) {
        Some(i) => &data[..=i],
        None => &[],
    };
    String::from_utf8_lossy(trimmed).into_owned()
}

/// Width in bytes of an id in encoded form.
pub fn id_width(id: u32) -> usize {
    match id {
        0..=0xFF => 1,
        0x100..=0xFFFF => 2,
        0x1_0000..=0xFF_FFFF => 3,
        _ => 4,
    }
}

/// Appends an id in encoded form.
pub fn write_id(out: &mut Vec<u8>, id: u32) {
    let width = id_width(id);
    out.extend_from_slice(&id.to_be_bytes()[4 - width..]);
}

/// Minimal width needed to encode `value` as a size.
///
/// The all-ones pattern of each width is reserved for "unknown", so the
/// largest value a width can carry is 2^(7·width) − 2. Values of 2^56 − 1
/// and beyond are not representable; nothing this crate serializes gets
/// near that.
pub fn size_width(value: u64) -> usize {
    for width in 1..8 {
        if value < (1u64 << (7 * width)) - 1 {
            return width;
        }
    }
    8
}

/// Appends a size with an explicit width.
pub fn write_size_with(out: &mut Vec<u8>, value: u64, width: usize) {
    debug_assert!((1..=8).contains(&width));
    debug_assert!(width == 8 || value < (1u64 << (7 * width)) - 1);
    let encoded = (1u64 << (7 * width)) | value;
    out.extend_from_slice(&encoded.to_be_bytes()[8 - width..]);
}

/// Appends a size using the minimal width.
pub fn write_size(out: &mut Vec<u8>, value: u64) {
    write_size_with(out, value, size_width(value));
}

/// Appends a complete element with a raw payload.
pub fn write_binary(out: &mut Vec<u8>, id: u32, data: &[u8]) {
    write_id(out, id);
    write_size(out, data.len() as u64);
    out.extend_from_slice(data);
}

/// Appends a complete string element.
pub fn write_string(out: &mut Vec<u8>, id: u32, value: &str) {
    write_binary(out, id, value.as_bytes());
}

/// Appends a complete unsigned integer element, minimal payload width.
pub fn write_uint(out: &mut Vec<u8>, id: u32, value: u64) {
    let width = (((64 - value.leading_zeros() as usize) + 7) / 8).max(1);
    write_id(out, id);
    write_size(out, width as u64);
    out.extend_from_slice(&value.to_be_bytes()[8 - width..]);
}

/// Appends a complete 8-byte float element.
pub fn write_float(out: &mut Vec<u8>, id: u32, value: f64) {
    write_id(out, id);
    write_size(out, 8);
    out.extend_from_slice(&value.to_be_bytes());
}

/// Appends a master element whose children are produced by `build`.
pub fn write_master(out: &mut Vec<u8>, id: u32, build: impl FnOnce(&mut Vec<u8>)) {
    let mut body = Vec::new();
    build(&mut body);
    write_binary(out, id, &body);
}

/// Appends a Void element spanning exactly `total` bytes (minimum 2).
pub fn write_void(out: &mut Vec<u8>, total: usize) {
    debug_assert!(total >= 2);
    // Width 1 covers payloads up to 126 bytes; anything larger gets the
    // full 8-byte size field so every total >= 2 is reachable.
    let size_field = if total <= 128 { 1 } else { 8 };
    let payload = total - 1 - size_field;
    write_id(out, VOID);
    write_size_with(out, payload as u64, size_field);
    out.resize(out.len() + payload, 0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_id_widths() {
        assert_eq!(read_id(&[0xAE], 0), Some((0xAE, 1)));
        assert_eq!(read_id(&[0x42, 0x86], 0), Some((0x4286, 2)));
        assert_eq!(read_id(&[0x2A, 0xD7, 0xB1], 0), Some((0x2AD7B1, 3)));
        assert_eq!(read_id(&[0x1A, 0x45, 0xDF, 0xA3], 0), Some((EBML_HEADER, 4)));
    }

    #[test]
    fn test_read_id_rejects_garbage() {
        // Zero marker byte: no width can be derived.
        assert_eq!(read_id(&[0x00, 0x80], 0), None);
        // Width 5 is valid for sizes but not ids.
        assert_eq!(read_id(&[0x08, 0, 0, 0, 0], 0), None);
        // Id runs past the buffer.
        assert_eq!(read_id(&[0x1A, 0x45], 0), None);
        assert_eq!(read_id(&[], 0), None);
    }

    #[test]
    fn test_read_size_widths() {
        assert_eq!(read_size(&[0x85], 0), Some((Some(5), 1)));
        assert_eq!(read_size(&[0x41, 0x2C], 0), Some((Some(300), 2)));
        assert_eq!(
            read_size(&[0x01, 0, 0, 0, 0, 0, 0x30, 0x39], 0),
            Some((Some(12345), 8))
        );
    }

    #[test]
    fn test_read_size_unknown() {
        assert_eq!(read_size(&[0xFF], 0), Some((None, 1)));
        assert_eq!(read_size(&[0x7F, 0xFF], 0), Some((None, 2)));
        assert_eq!(
            read_size(&[0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF], 0),
            Some((None, 8))
        );
        // Same widths, one bit shy of all-ones: known values.
        assert_eq!(read_size(&[0xFE], 0), Some((Some(126), 1)));
        assert_eq!(read_size(&[0x7F, 0xFE], 0), Some((Some(0x3FFE), 2)));
    }

    #[test]
    fn test_size_round_trip() {
        for value in [0u64, 1, 126, 127, 128, 0x3FFE, 0x3FFF, 0xFFFF, 2_000_000, u32::MAX as u64]
        {
            let mut buf = Vec::new();
            write_size(&mut buf, value);
            assert_eq!(buf.len(), size_width(value));
            assert_eq!(read_size(&buf, 0), Some((Some(value), buf.len())), "value {}", value);
        }
    }

    #[test]
    fn test_size_width_boundaries() {
        assert_eq!(size_width(126), 1);
        assert_eq!(size_width(127), 2); // 127 is the width-1 unknown pattern
        assert_eq!(size_width(0x3FFE), 2);
        assert_eq!(size_width(0x3FFF), 3);
    }

    #[test]
    fn test_id_round_trip() {
        for id in [0xAEu32, 0x4286, 0x2AD7B1, EBML_HEADER] {
            let mut buf = Vec::new();
            write_id(&mut buf, id);
            assert_eq!(read_id(&buf, 0), Some((id, buf.len())));
        }
    }

    #[test]
    fn test_uint_element_round_trip() {
        for value in [0u64, 1, 255, 256, 48_000, u64::from(u32::MAX) + 1] {
            let mut buf = Vec::new();
            write_uint(&mut buf, 0xD7, value);
            let mut iter = ElementIter::new(&buf, 0..buf.len());
            let mut defects = Vec::new();
            let el = iter.next(&mut defects).unwrap();
            assert_eq!(el.id, 0xD7);
            assert_eq!(parse_uint(el.payload(&buf)), value);
            assert!(defects.is_empty());
        }
    }

    #[test]
    fn test_float_parsing() {
        assert_eq!(parse_float(&[]), Some(0.0));
        assert_eq!(parse_float(&1120.0f32.to_be_bytes()), Some(1120.0));
        assert_eq!(parse_float(&48000.0f64.to_be_bytes()), Some(48000.0));
        assert_eq!(parse_float(&[1, 2, 3]), None);
    }

    #[test]
    fn test_string_parsing_trims_nul_padding() {
        assert_eq!(parse_string(b"lime\0\0\0"), "lime");
        assert_eq!(parse_string(b""), "");
        assert_eq!(parse_string(b"\0\0"), "");
        // Invalid UTF-8 never fails.
        assert_eq!(parse_string(&[0xFF, 0xFE]), "\u{FFFD}\u{FFFD}");
    }

    #[test]
    fn test_iter_walks_siblings() {
        let mut buf = Vec::new();
        write_string(&mut buf, 0x7BA9, "one");
        write_uint(&mut buf, 0xD7, 2);
        write_string(&mut buf, 0x7BA9, "three");

        let mut iter = ElementIter::new(&buf, 0..buf.len());
        let mut defects = Vec::new();
        let ids: Vec<u32> = std::iter::from_fn(|| iter.next(&mut defects).map(|e| e.id)).collect();
        assert_eq!(ids, vec![0x7BA9, 0xD7, 0x7BA9]);
        assert!(defects.is_empty());
    }

    #[test]
    fn test_iter_bad_id_records_defect_and_stops() {
        let mut buf = Vec::new();
        write_string(&mut buf, 0x7BA9, "ok");
        buf.push(0x00); // unreadable id
        buf.push(0x42);

        let mut iter = ElementIter::new(&buf, 0..buf.len());
        let mut defects = Vec::new();
        assert!(iter.next(&mut defects).is_some());
        assert!(iter.next(&mut defects).is_none());
        assert_eq!(defects.len(), 1);
        assert_eq!(defects[0].kind, DefectKind::BadId);
    }

    #[test]
    fn test_iter_overrun_clamps_payload() {
        let mut buf = Vec::new();
        write_id(&mut buf, 0x7BA9);
        write_size(&mut buf, 100); // declares 100 bytes
        buf.extend_from_slice(b"short"); // only 5 present

        let mut iter = ElementIter::new(&buf, 0..buf.len());
        let mut defects = Vec::new();
        let el = iter.next(&mut defects).unwrap();
        assert!(el.truncated);
        assert_eq!(el.payload(&buf), b"short");
        assert!(iter.next(&mut defects).is_none());
        assert!(matches!(defects[0].kind, DefectKind::Overrun { declared: 100, available: 5 }));
    }

    #[test]
    fn test_iter_unknown_size_extends_to_container_end() {
        let mut buf = Vec::new();
        write_id(&mut buf, crate::ids::SEGMENT);
        buf.push(0xFF); // unknown size
        let body_start = buf.len();
        write_string(&mut buf, 0x7BA9, "body");

        let mut iter = ElementIter::new(&buf, 0..buf.len());
        let mut defects = Vec::new();
        let el = iter.next(&mut defects).unwrap();
        assert_eq!(el.size, None);
        assert_eq!(el.data, body_start..buf.len());
        assert!(defects.is_empty());
    }

    #[test]
    fn test_master_nesting() {
        let mut buf = Vec::new();
        write_master(&mut buf, 0x7373, |tag| {
            write_master(tag, 0x67C8, |st| {
                write_string(st, 0x45A3, "TITLE");
                write_string(st, 0x4487, "Turning Lime");
            });
        });

        let mut defects = Vec::new();
        let mut iter = ElementIter::new(&buf, 0..buf.len());
        let tag = iter.next(&mut defects).unwrap();
        assert_eq!(tag.id, 0x7373);
        let mut inner = ElementIter::new(&buf, tag.data.clone());
        let st = inner.next(&mut defects).unwrap();
        assert_eq!(st.id, 0x67C8);
        let mut fields = ElementIter::new(&buf, st.data.clone());
        let name = fields.next(&mut defects).unwrap();
        assert_eq!(parse_string(name.payload(&buf)), "TITLE");
        let value = fields.next(&mut defects).unwrap();
        assert_eq!(parse_string(value.payload(&buf)), "Turning Lime");
        assert!(defects.is_empty());
    }

    #[test]
    fn test_void_covers_exact_span() {
        for total in [2usize, 3, 127, 128, 129, 200, 5000] {
            let mut buf = Vec::new();
            write_void(&mut buf, total);
            assert_eq!(buf.len(), total, "total {}", total);

            let mut iter = ElementIter::new(&buf, 0..buf.len());
            let mut defects = Vec::new();
            let el = iter.next(&mut defects).unwrap();
            assert_eq!(el.id, VOID);
            assert!(iter.next(&mut defects).is_none());
            assert!(defects.is_empty());
        }
    }
}
