//! Container scan
//!
//! Walks one Matroska segment and pulls out everything the tag subsystem
//! cares about: the tag tree, the attachment list, the audio/video summary
//! from the track and info elements, and the byte ranges the writer will
//! later replace. Track payload (clusters), cues, and chapters are skipped
//! by length and never touched.
//!
//! Parsing never fails. Whatever framing cannot be read cleanly is recorded
//! as a defect and the model keeps the subset that parsed; a wholly
//! non-conformant input produces an empty model.

use std::ops::Range;
use std::time::Duration;

use tracing::debug;

use crate::attachment::{Attachment, Payload};
use crate::ebml::{self, Defect, DefectKind, ElementIter, RawElement};
use crate::file::{Properties, ReadOptions};
use crate::ids;
use crate::tag::{SimpleTag, Tag, TagSet, Target};

/// Where the interesting byte ranges of the source live.
#[derive(Debug, Clone, Default)]
pub(crate) struct Layout {
    pub segment: Option<SegmentLayout>,
}

#[derive(Debug, Clone)]
pub(crate) struct SegmentLayout {
    /// Offset of the segment's first id byte
    pub header_start: usize,
    /// Absolute payload range of the segment
    pub payload: Range<usize>,
    /// Absolute ranges (headers included) of the Tags and Attachments
    /// elements, to be replaced on write
    pub replaced: Vec<Range<usize>>,
}

#[derive(Debug, Default)]
pub(crate) struct Parsed {
    pub layout: Layout,
    pub tags: TagSet,
    pub attachments: Vec<Attachment>,
    pub properties: Properties,
    pub info_title: Option<String>,
    pub defects: Vec<Defect>,
}

pub(crate) fn parse(data: &[u8], options: &ReadOptions) -> Parsed {
    let mut out = Parsed::default();
    let mut iter = ElementIter::new(data, 0..data.len());
    while let Some(el) = iter.next(&mut out.defects) {
        match el.id {
            // Doctype is not enforced: a wrong or damaged header still
            // leaves the segment parseable.
            ebml::EBML_HEADER => {}
            ids::SEGMENT => {
                let mut seg = SegmentLayout {
                    header_start: el.start,
                    payload: el.data.clone(),
                    replaced: Vec::new(),
                };
                parse_segment(data, &el, &mut seg, options, &mut out);
                out.layout.segment = Some(seg);
                break;
            }
            _ => {}
        }
    }
    debug!(
        tags = out.tags.len(),
        attachments = out.attachments.len(),
        defects = out.defects.len(),
        "container scan finished"
    );
    out
}

fn parse_segment(
    data: &[u8],
    segment: &RawElement,
    seg: &mut SegmentLayout,
    options: &ReadOptions,
    out: &mut Parsed,
) {
    let mut iter = ElementIter::new(data, segment.data.clone());
    while let Some(el) = iter.next(&mut out.defects) {
        match el.id {
            ids::INFO => parse_info(data, &el, out),
            ids::TRACKS => parse_tracks(data, &el, out),
            ids::TAGS => {
                seg.replaced.push(el.start..el.data.end);
                parse_tags(data, &el, options, out);
            }
            ids::ATTACHMENTS => {
                seg.replaced.push(el.start..el.data.end);
                parse_attachments(data, &el, options, out);
            }
            _ => {}
        }
    }
}

fn parse_info(data: &[u8], info: &RawElement, out: &mut Parsed) {
    let mut scale = 1_000_000u64; // nanoseconds per tick, wire default
    let mut ticks: Option<f64> = None;
    let mut iter = ElementIter::new(data, info.data.clone());
    while let Some(el) = iter.next(&mut out.defects) {
        if el.truncated {
            continue; // clipped leaf values are discarded
        }
        match el.id {
            ids::TIMESTAMP_SCALE => scale = ebml::parse_uint(el.payload(data)),
            ids::DURATION => ticks = ebml::parse_float(el.payload(data)),
            ids::TITLE => {
                let title = ebml::parse_string(el.payload(data));
                if !title.is_empty() {
                    out.info_title = Some(title);
                }
            }
            _ => {}
        }
    }
    if let Some(t) = ticks {
        if t.is_finite() && t >= 0.0 && scale > 0 {
            out.properties.duration = Some(Duration::from_nanos((t * scale as f64) as u64));
        }
    }
}

fn parse_tracks(data: &[u8], tracks: &RawElement, out: &mut Parsed) {
    let mut iter = ElementIter::new(data, tracks.data.clone());
    while let Some(entry) = iter.next(&mut out.defects) {
        if entry.id != ids::TRACK_ENTRY {
            continue;
        }
        let mut audio: Option<Range<usize>> = None;
        let mut video: Option<Range<usize>> = None;
        let mut inner = ElementIter::new(data, entry.data.clone());
        while let Some(el) = inner.next(&mut out.defects) {
            match el.id {
                ids::AUDIO => audio = Some(el.data.clone()),
                ids::VIDEO => video = Some(el.data.clone()),
                _ => {}
            }
        }
        // First track of each kind wins.
        if let Some(range) = audio {
            if out.properties.audio_sample_rate.is_none() {
                parse_audio(data, range, out);
            }
        }
        if let Some(range) = video {
            if out.properties.video_width.is_none() {
                parse_video(data, range, out);
            }
        }
    }
}

fn parse_audio(data: &[u8], range: Range<usize>, out: &mut Parsed) {
    let mut rate = 8000.0f64; // wire default
    let mut channels = 1u64; // wire default
    let mut iter = ElementIter::new(data, range);
    while let Some(el) = iter.next(&mut out.defects) {
        if el.truncated {
            continue;
        }
        match el.id {
            ids::SAMPLING_FREQUENCY => {
                if let Some(f) = ebml::parse_float(el.payload(data)) {
                    if f.is_finite() && f > 0.0 {
                        rate = f;
                    }
                }
            }
            ids::CHANNELS => channels = ebml::parse_uint(el.payload(data)),
            _ => {}
        }
    }
    out.properties.audio_sample_rate = Some(rate.round() as u32);
    out.properties.audio_channels = Some(channels as u32);
}

fn parse_video(data: &[u8], range: Range<usize>, out: &mut Parsed) {
    let mut iter = ElementIter::new(data, range);
    while let Some(el) = iter.next(&mut out.defects) {
        if el.truncated {
            continue;
        }
        match el.id {
            ids::PIXEL_WIDTH => {
                out.properties.video_width = Some(ebml::parse_uint(el.payload(data)) as u32)
            }
            ids::PIXEL_HEIGHT => {
                out.properties.video_height = Some(ebml::parse_uint(el.payload(data)) as u32)
            }
            _ => {}
        }
    }
}

fn parse_tags(data: &[u8], tags_el: &RawElement, options: &ReadOptions, out: &mut Parsed) {
    let mut iter = ElementIter::new(data, tags_el.data.clone());
    while let Some(el) = iter.next(&mut out.defects) {
        if el.id != ids::TAG {
            continue;
        }
        let mut tag = Tag::default();
        let mut inner = ElementIter::new(data, el.data.clone());
        while let Some(child) = inner.next(&mut out.defects) {
            match child.id {
                ids::TARGETS => parse_targets(data, &child, &mut tag.target, out),
                ids::SIMPLE_TAG => {
                    if let Some(st) =
                        parse_simple_tag(data, &child, 0, options, &mut out.defects)
                    {
                        tag.simple_tags.push(st);
                    }
                }
                _ => {}
            }
        }
        out.tags.push(tag);
    }
}

fn parse_targets(data: &[u8], targets: &RawElement, target: &mut Target, out: &mut Parsed) {
    let mut iter = ElementIter::new(data, targets.data.clone());
    while let Some(el) = iter.next(&mut out.defects) {
        if el.truncated {
            continue;
        }
        match el.id {
            ids::TARGET_TYPE_VALUE => target.value = Some(ebml::parse_uint(el.payload(data))),
            ids::TARGET_TYPE => {
                let kind = ebml::parse_string(el.payload(data));
                if !kind.is_empty() {
                    target.kind = Some(kind);
                }
            }
            ids::TAG_TRACK_UID => target.track_uids.push(ebml::parse_uint(el.payload(data))),
            ids::TAG_EDITION_UID => {
                target.edition_uids.push(ebml::parse_uint(el.payload(data)))
            }
            ids::TAG_CHAPTER_UID => {
                target.chapter_uids.push(ebml::parse_uint(el.payload(data)))
            }
            ids::TAG_ATTACHMENT_UID => {
                target.attachment_uids.push(ebml::parse_uint(el.payload(data)))
            }
            _ => {}
        }
    }
    // A UID of 0 means "all entities at this level", same as no UID.
    target.track_uids.retain(|&u| u != 0);
    target.edition_uids.retain(|&u| u != 0);
    target.chapter_uids.retain(|&u| u != 0);
    target.attachment_uids.retain(|&u| u != 0);
}

fn parse_simple_tag(
    data: &[u8],
    el: &RawElement,
    depth: usize,
    options: &ReadOptions,
    defects: &mut Vec<Defect>,
) -> Option<SimpleTag> {
    let mut name = String::new();
    let mut value: Option<String> = None;
    let mut language: Option<String> = None;
    let mut default = true;
    let mut children = Vec::new();

    let mut iter = ElementIter::new(data, el.data.clone());
    while let Some(child) = iter.next(defects) {
        if child.truncated && child.id != ids::SIMPLE_TAG {
            continue; // clipped leaf values are discarded
        }
        match child.id {
            ids::TAG_NAME => name = ebml::parse_string(child.payload(data)),
            ids::TAG_LANGUAGE => {
                let lang = ebml::parse_string(child.payload(data));
                language = if lang.is_empty() || lang.eq_ignore_ascii_case("und") {
                    None
                } else {
                    Some(lang)
                };
            }
            ids::TAG_DEFAULT => default = ebml::parse_uint(child.payload(data)) != 0,
            ids::TAG_STRING => value = Some(ebml::parse_string(child.payload(data))),
            // Binary payloads are tolerated on the wire but not modelled.
            ids::TAG_BINARY => {}
            ids::SIMPLE_TAG => {
                if depth + 1 >= options.max_tag_depth {
                    defects.push(Defect {
                        offset: child.start,
                        kind: DefectKind::TooDeep { limit: options.max_tag_depth },
                    });
                } else if let Some(st) =
                    parse_simple_tag(data, &child, depth + 1, options, defects)
                {
                    children.push(st);
                }
            }
            _ => {}
        }
    }

    if name.trim().is_empty() {
        return None;
    }
    let mut tag = SimpleTag::named(&name);
    tag.value = value;
    tag.language = language;
    tag.default = default;
    tag.children = children;
    Some(tag)
}

fn parse_attachments(
    data: &[u8],
    attachments: &RawElement,
    options: &ReadOptions,
    out: &mut Parsed,
) {
    let mut iter = ElementIter::new(data, attachments.data.clone());
    while let Some(entry) = iter.next(&mut out.defects) {
        if entry.id != ids::ATTACHED_FILE {
            continue;
        }
        let mut att = Attachment::new("", "", "", Vec::new());
        let mut inner = ElementIter::new(data, entry.data.clone());
        while let Some(el) = inner.next(&mut out.defects) {
            if el.truncated {
                continue;
            }
            match el.id {
                ids::FILE_NAME => att.filename = ebml::parse_string(el.payload(data)),
                ids::FILE_MIME_TYPE => att.mime_type = ebml::parse_string(el.payload(data)),
                ids::FILE_DESCRIPTION => {
                    att.description = ebml::parse_string(el.payload(data))
                }
                ids::FILE_UID => att.uid = ebml::parse_uint(el.payload(data)),
                ids::FILE_DATA => {
                    att.payload = if options.eager_attachments {
                        Payload::Loaded(el.payload(data).to_vec())
                    } else {
                        Payload::Deferred { offset: el.data.start, len: el.data.len() }
                    };
                }
                _ => {}
            }
        }
        out.attachments.push(att);
    }
}
