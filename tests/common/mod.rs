//! Shared fixtures for the integration tests.
//!
//! `turning_lime()` builds a small but structurally complete Matroska file
//! in memory: EBML header, segment info, one audio track, a media cluster,
//! a tag tree, and a front-cover attachment. The declared metadata mirrors
//! the "Turning Lime" sample the format tests are written against.

use matroska_tags::ebml::{self, write_binary, write_float, write_master, write_string, write_uint};
use matroska_tags::ids;

pub const COVER_LEN: usize = 17307;

/// Deterministic stand-in for the cover image payload.
pub fn cover_bytes() -> Vec<u8> {
    (0..COVER_LEN).map(|i| (i % 251) as u8).collect()
}

/// Bytes the cluster carries; useful for byte-preservation assertions.
pub fn cluster_bytes() -> Vec<u8> {
    (0..512u32).map(|i| (i * 7 % 256) as u8).collect()
}

fn simple_tag(out: &mut Vec<u8>, name: &str, value: &str) {
    write_master(out, ids::SIMPLE_TAG, |st| {
        write_string(st, ids::TAG_NAME, name);
        write_string(st, ids::TAG_STRING, value);
    });
}

pub fn turning_lime() -> Vec<u8> {
    let mut buf = Vec::new();

    write_master(&mut buf, ebml::EBML_HEADER, |h| {
        write_uint(h, ebml::EBML_VERSION, 1);
        write_uint(h, ebml::EBML_READ_VERSION, 1);
        write_uint(h, ebml::EBML_MAX_ID_LENGTH, 4);
        write_uint(h, ebml::EBML_MAX_SIZE_LENGTH, 8);
        write_string(h, ebml::DOC_TYPE, "matroska");
        write_uint(h, ebml::DOC_TYPE_VERSION, 4);
        write_uint(h, ebml::DOC_TYPE_READ_VERSION, 2);
    });

    write_master(&mut buf, ids::SEGMENT, |seg| {
        write_master(seg, ids::INFO, |info| {
            write_uint(info, ids::TIMESTAMP_SCALE, 1_000_000);
            write_float(info, ids::DURATION, 1120.0);
            write_string(info, ids::MUXING_APP, "fixture");
            write_string(info, ids::WRITING_APP, "fixture");
        });

        write_master(seg, ids::TRACKS, |tracks| {
            write_master(tracks, ids::TRACK_ENTRY, |entry| {
                write_uint(entry, ids::TRACK_NUMBER, 1);
                write_uint(entry, ids::TRACK_UID, 0x77);
                write_uint(entry, ids::TRACK_TYPE, 2); // audio
                write_string(entry, ids::CODEC_ID, "A_VORBIS");
                write_master(entry, ids::AUDIO, |audio| {
                    write_float(audio, ids::SAMPLING_FREQUENCY, 48000.0);
                    write_uint(audio, ids::CHANNELS, 2);
                });
            });
        });

        write_binary(seg, ids::CLUSTER, &cluster_bytes());

        write_master(seg, ids::ATTACHMENTS, |atts| {
            write_master(atts, ids::ATTACHED_FILE, |af| {
                write_string(af, ids::FILE_DESCRIPTION, "cover.png");
                write_string(af, ids::FILE_NAME, "cover.png");
                write_string(af, ids::FILE_MIME_TYPE, "image/png");
                write_uint(af, ids::FILE_UID, 0x1234);
                write_binary(af, ids::FILE_DATA, &cover_bytes());
            });
        });

        write_master(seg, ids::TAGS, |tags| {
            write_master(tags, ids::TAG, |tag| {
                write_master(tag, ids::TARGETS, |t| {
                    write_uint(t, ids::TARGET_TYPE_VALUE, 50);
                });
                simple_tag(tag, "TITLE", "Turning Lime");
                simple_tag(tag, "DATE_RECORDED", "2017");
                simple_tag(tag, "GENRE", "Test");
                simple_tag(tag, "PERFORMER", "Lime");
                simple_tag(tag, "COMPOSER", "Starwer");
                simple_tag(tag, "CONDUCTOR", "Starwer");
                simple_tag(tag, "COPYRIGHT", "Starwer 2017");
                simple_tag(tag, "COMMENT", "no comments");
                simple_tag(
                    tag,
                    "SUMMARY",
                    "This is a test Video showing a lime moving on a table",
                );
            });
        });
    });

    buf
}
