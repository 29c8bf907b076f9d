//! File boundary
//!
//! [`MatroskaFile`] owns the source bytes, the tag tree, and the attachment
//! list, and hands out the generic facade. Opening never fails on damaged
//! structure (only on I/O); saving rewrites the tag/attachment region and
//! replaces the file atomically.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::attachment::Attachment;
use crate::ebml::Defect;
use crate::error::{Error, Result};
use crate::facade::MediaTag;
use crate::reader::{self, Layout};
use crate::tag::TagSet;
use crate::writer;

/// Parse-time knobs.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Copy attachment payloads out of the source immediately instead of
    /// deferring until first access
    pub eager_attachments: bool,
    /// Simple tags nested deeper than this are dropped (and recorded as a
    /// defect)
    pub max_tag_depth: usize,
}

impl Default for ReadOptions {
    fn default() -> Self {
        ReadOptions { eager_attachments: false, max_tag_depth: 16 }
    }
}

/// Audio/video summary sourced from the segment info and track elements.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Properties {
    pub audio_sample_rate: Option<u32>,
    pub audio_channels: Option<u32>,
    pub video_width: Option<u32>,
    pub video_height: Option<u32>,
    pub duration: Option<Duration>,
}

/// An opened Matroska file: source bytes plus the parsed tag model.
#[derive(Debug)]
pub struct MatroskaFile {
    path: Option<PathBuf>,
    options: ReadOptions,
    data: Vec<u8>,
    layout: Layout,
    tags: TagSet,
    attachments: Vec<Attachment>,
    properties: Properties,
    info_title: Option<String>,
    defects: Vec<Defect>,
}

impl MatroskaFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, ReadOptions::default())
    }

    pub fn open_with(path: impl AsRef<Path>, options: ReadOptions) -> Result<Self> {
        let data = std::fs::read(&path)?;
        let mut file = Self::from_bytes_with(data, options);
        file.path = Some(path.as_ref().to_path_buf());
        Ok(file)
    }

    /// Parses an in-memory image. Never fails: structural damage shows up
    /// in [`defects`](Self::defects), not as an error.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self::from_bytes_with(data, ReadOptions::default())
    }

    pub fn from_bytes_with(data: Vec<u8>, options: ReadOptions) -> Self {
        let parsed = reader::parse(&data, &options);
        MatroskaFile {
            path: None,
            options,
            data,
            layout: parsed.layout,
            tags: parsed.tags,
            attachments: parsed.attachments,
            properties: parsed.properties,
            info_title: parsed.info_title,
            defects: parsed.defects,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Structural defects survived while parsing.
    pub fn defects(&self) -> &[Defect] {
        &self.defects
    }

    /// The raw tag tree handle.
    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    pub fn tags_mut(&mut self) -> &mut TagSet {
        &mut self.tags
    }

    /// The generic facade over tags and attachments.
    pub fn tag(&mut self) -> MediaTag<'_> {
        self.load_attachments();
        MediaTag::new(&mut self.tags, &mut self.attachments, self.info_title.as_deref())
    }

    /// Attachments in document order, payloads materialized.
    pub fn attachments(&mut self) -> &[Attachment] {
        self.load_attachments();
        &self.attachments
    }

    /// Replaces the whole ordered attachment list; takes effect on the
    /// next save.
    pub fn set_attachments(&mut self, attachments: Vec<Attachment>) {
        self.attachments = attachments;
    }

    fn load_attachments(&mut self) {
        let source = &self.data;
        for att in &mut self.attachments {
            att.resolve(source);
        }
    }

    /// Builds the rewritten container image without touching any file.
    pub fn render(&self) -> Result<Vec<u8>> {
        writer::render(&self.data, &self.layout, &self.tags, &self.attachments)
    }

    /// Rewrites the backing file atomically, then refreshes the in-memory
    /// model from what was written.
    pub fn save(&mut self) -> Result<()> {
        let path = self.path.clone().ok_or(Error::NoPath)?;
        let rendered = self.render()?;
        atomic_write(&path, &rendered)?;
        *self = Self::from_bytes_with(rendered, self.options.clone());
        self.path = Some(path);
        Ok(())
    }

    /// Writes the rewritten image to another path, leaving this file's
    /// backing path and in-memory state untouched.
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let rendered = self.render()?;
        atomic_write(path.as_ref(), &rendered)
    }
}

/// Full-file replacement through a temp file in the destination directory:
/// either the new image lands completely or the original stays.
fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ebml::{self, write_master, write_string};
    use crate::ids;

    fn tiny_container() -> Vec<u8> {
        let mut buf = Vec::new();
        write_master(&mut buf, ebml::EBML_HEADER, |h| {
            write_string(h, ebml::DOC_TYPE, "matroska");
        });
        write_master(&mut buf, ids::SEGMENT, |seg| {
            write_master(seg, ids::TAGS, |tags| {
                write_master(tags, ids::TAG, |tag| {
                    write_master(tag, ids::SIMPLE_TAG, |st| {
                        write_string(st, ids::TAG_NAME, "TITLE");
                        write_string(st, ids::TAG_STRING, "Turning Lime");
                    });
                });
            });
        });
        buf
    }

    #[test]
    fn test_open_missing_file_is_io_error() {
        let err = MatroskaFile::open("/definitely/not/here.mkv").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_from_bytes_never_fails() {
        let mut file = MatroskaFile::from_bytes(vec![0xDE, 0xAD, 0xBE, 0xEF]);
        assert!(file.tags().is_empty());
        assert_eq!(file.tag().title(), None);
        assert!(!file.defects().is_empty());
    }

    #[test]
    fn test_save_without_path_is_usage_error() {
        let mut file = MatroskaFile::from_bytes(tiny_container());
        assert!(matches!(file.save(), Err(Error::NoPath)));
    }

    #[test]
    fn test_render_without_segment_fails_explicitly() {
        let file = MatroskaFile::from_bytes(Vec::new());
        assert!(matches!(file.render(), Err(Error::NoSegment)));
    }

    #[test]
    fn test_save_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.mkv");
        std::fs::write(&path, tiny_container()).unwrap();

        let mut file = MatroskaFile::open(&path).unwrap();
        assert_eq!(file.tag().title().as_deref(), Some("Turning Lime"));

        file.tag().set_comment(Some("no comments"));
        file.save().unwrap();

        // In-memory state stays coherent after the save.
        assert_eq!(file.tag().title().as_deref(), Some("Turning Lime"));

        let mut reopened = MatroskaFile::open(&path).unwrap();
        assert_eq!(reopened.tag().title().as_deref(), Some("Turning Lime"));
        assert_eq!(reopened.tag().comment().as_deref(), Some("no comments"));
    }

    #[test]
    fn test_save_to_leaves_original_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.mkv");
        let copy = dir.path().join("copy.mkv");
        std::fs::write(&path, tiny_container()).unwrap();

        let mut file = MatroskaFile::open(&path).unwrap();
        file.tag().set_title(Some("changed"));
        file.save_to(&copy).unwrap();

        let mut original = MatroskaFile::open(&path).unwrap();
        assert_eq!(original.tag().title().as_deref(), Some("Turning Lime"));
        let mut copied = MatroskaFile::open(&copy).unwrap();
        assert_eq!(copied.tag().title().as_deref(), Some("changed"));
    }
}
