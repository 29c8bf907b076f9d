//! Tag region writer
//!
//! Rebuilds a container image in which the tag/attachment region reflects
//! the in-memory model while every other byte of the segment payload is
//! copied through unchanged, at an unchanged offset relative to the payload
//! start. Seek entries pointing at untouched elements therefore stay valid.
//!
//! The splice works like this: the byte ranges the original Tags and
//! Attachments elements occupied are overwritten in place with Void fillers
//! of identical length; ranges sitting at the very end of the payload are
//! cut off instead, which keeps repeated saves from accreting voids. The
//! freshly serialized Attachments and Tags elements are appended at the end
//! of the payload, and the segment header is re-encoded with the new size.

use crate::attachment::{Attachment, Payload};
use crate::ebml;
use crate::error::{Error, Result};
use crate::ids;
use crate::reader::Layout;
use crate::tag::{SimpleTag, Tag, TagSet};

pub(crate) fn render(
    original: &[u8],
    layout: &Layout,
    tags: &TagSet,
    attachments: &[Attachment],
) -> Result<Vec<u8>> {
    let seg = layout.segment.as_ref().ok_or(Error::NoSegment)?;

    let base = seg.payload.start;
    let mut payload = original[seg.payload.clone()].to_vec();

    // Payload-relative ranges of the regions being replaced.
    let mut ranges: Vec<(usize, usize)> = seg
        .replaced
        .iter()
        .map(|r| (r.start - base, r.end.min(seg.payload.end) - base))
        .collect();
    ranges.sort_unstable();

    // Regions flush with the payload end are dropped outright.
    let mut end = payload.len();
    while let Some(&(start, stop)) = ranges.last() {
        if stop == end {
            end = start;
            ranges.pop();
        } else {
            break;
        }
    }
    payload.truncate(end);

    for &(start, stop) in &ranges {
        let mut filler = Vec::with_capacity(stop - start);
        ebml::write_void(&mut filler, stop - start);
        payload[start..stop].copy_from_slice(&filler);
    }

    if !attachments.is_empty() {
        serialize_attachments(&mut payload, attachments, original);
    }
    if tags.tags().iter().any(|t| !t.simple_tags.is_empty()) {
        serialize_tags(&mut payload, tags);
    }

    let mut out = Vec::with_capacity(original.len() + 64);
    out.extend_from_slice(&original[..seg.header_start]);
    ebml::write_id(&mut out, ids::SEGMENT);
    ebml::write_size(&mut out, payload.len() as u64);
    out.extend_from_slice(&payload);
    out.extend_from_slice(&original[seg.payload.end.min(original.len())..]);
    Ok(out)
}

/// Serializes the attachment list into an Attachments element. Deferred
/// payloads are pulled straight from the original image without an
/// intermediate copy.
fn serialize_attachments(out: &mut Vec<u8>, attachments: &[Attachment], original: &[u8]) {
    ebml::write_master(out, ids::ATTACHMENTS, |body| {
        for (index, att) in attachments.iter().enumerate() {
            ebml::write_master(body, ids::ATTACHED_FILE, |af| {
                if !att.description.is_empty() {
                    ebml::write_string(af, ids::FILE_DESCRIPTION, &att.description);
                }
                ebml::write_string(af, ids::FILE_NAME, &att.filename);
                ebml::write_string(af, ids::FILE_MIME_TYPE, &att.mime_type);
                let uid = if att.uid != 0 { att.uid } else { index as u64 + 1 };
                ebml::write_uint(af, ids::FILE_UID, uid);
                let data = match &att.payload {
                    Payload::Loaded(data) => data.as_slice(),
                    Payload::Deferred { offset, len } => {
                        original.get(*offset..offset + len).unwrap_or(&[])
                    }
                };
                ebml::write_binary(af, ids::FILE_DATA, data);
            });
        }
    });
}

fn serialize_tags(out: &mut Vec<u8>, tags: &TagSet) {
    ebml::write_master(out, ids::TAGS, |body| {
        for tag in tags.tags() {
            if tag.simple_tags.is_empty() {
                continue;
            }
            serialize_tag(body, tag);
        }
    });
}

fn serialize_tag(out: &mut Vec<u8>, tag: &Tag) {
    ebml::write_master(out, ids::TAG, |body| {
        ebml::write_master(body, ids::TARGETS, |t| {
            if let Some(value) = tag.target.value {
                ebml::write_uint(t, ids::TARGET_TYPE_VALUE, value);
            }
            if let Some(kind) = &tag.target.kind {
                ebml::write_string(t, ids::TARGET_TYPE, kind);
            }
            for &uid in &tag.target.track_uids {
                ebml::write_uint(t, ids::TAG_TRACK_UID, uid);
            }
            for &uid in &tag.target.edition_uids {
                ebml::write_uint(t, ids::TAG_EDITION_UID, uid);
            }
            for &uid in &tag.target.chapter_uids {
                ebml::write_uint(t, ids::TAG_CHAPTER_UID, uid);
            }
            for &uid in &tag.target.attachment_uids {
                ebml::write_uint(t, ids::TAG_ATTACHMENT_UID, uid);
            }
        });
        for st in &tag.simple_tags {
            serialize_simple_tag(body, st);
        }
    });
}

/// Depth-first, pre-order: a simple tag's fields, then its children, then
/// the element closes.
fn serialize_simple_tag(out: &mut Vec<u8>, st: &SimpleTag) {
    ebml::write_master(out, ids::SIMPLE_TAG, |body| {
        ebml::write_string(body, ids::TAG_NAME, st.name());
        if let Some(language) = &st.language {
            ebml::write_string(body, ids::TAG_LANGUAGE, language);
        }
        if !st.default {
            ebml::write_uint(body, ids::TAG_DEFAULT, 0);
        }
        if let Some(value) = &st.value {
            ebml::write_string(body, ids::TAG_STRING, value);
        }
        for child in &st.children {
            serialize_simple_tag(body, child);
        }
    });
}
