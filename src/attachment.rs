//! Attachment store
//!
//! Matroska attachments are embedded files: cover art, lyrics, fonts,
//! anything. Each carries a UID, filename, MIME type, and description. The
//! picture role (front cover, back cover, …) is not stored in the container;
//! it is derived from the MIME type and filename/description hints.
//!
//! Payloads parsed from a file start out *deferred* (a byte range into the
//! source) and are materialized on first access through the owning
//! [`MatroskaFile`](crate::MatroskaFile), so opening a file with a large
//! attachment does not copy it until someone looks.

use std::path::Path;

use crate::error::Result;

/// Derived picture role of an attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    FrontCover,
    BackCover,
    /// An image with no cover hint
    OtherPicture,
    /// Not an image at all
    NotAPicture,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Payload {
    Loaded(Vec<u8>),
    /// Byte range into the source the attachment was parsed from
    Deferred { offset: usize, len: usize },
}

/// An embedded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Unique id within the file; 0 means "assign one on write"
    pub uid: u64,
    pub filename: String,
    pub mime_type: String,
    pub description: String,
    pub(crate) payload: Payload,
}

impl Attachment {
    pub fn new(
        filename: impl Into<String>,
        mime_type: impl Into<String>,
        description: impl Into<String>,
        data: Vec<u8>,
    ) -> Self {
        Attachment {
            uid: 0,
            filename: filename.into(),
            mime_type: mime_type.into(),
            description: description.into(),
            payload: Payload::Loaded(data),
        }
    }

    /// Builds an attachment from a file on disk, guessing the MIME type
    /// from the extension. The description starts empty.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Attachment::new(filename, mime_for_path(path), "", data))
    }

    /// Payload bytes, or `None` while still deferred.
    pub fn data(&self) -> Option<&[u8]> {
        match &self.payload {
            Payload::Loaded(data) => Some(data),
            Payload::Deferred { .. } => None,
        }
    }

    /// Payload length in bytes, known even while deferred.
    pub fn len(&self) -> usize {
        match &self.payload {
            Payload::Loaded(data) => data.len(),
            Payload::Deferred { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.payload, Payload::Loaded(_))
    }

    /// Materializes a deferred payload from the source it was parsed from.
    pub(crate) fn resolve(&mut self, source: &[u8]) {
        if let Payload::Deferred { offset, len } = self.payload {
            let data = source.get(offset..offset + len).unwrap_or(&[]).to_vec();
            self.payload = Payload::Loaded(data);
        }
    }

    /// Derives the picture role from MIME type and naming hints.
    ///
    /// Anything whose MIME type is not `image/*` is not a picture. Images
    /// whose filename or description hints "back" are back covers; "cover"
    /// or "front" hints make a front cover; other images are just pictures.
    pub fn role(&self) -> Role {
        if !self.mime_type.to_ascii_lowercase().starts_with("image/") {
            return Role::NotAPicture;
        }
        let hint =
            format!("{} {}", self.filename.to_ascii_lowercase(), self.description.to_ascii_lowercase());
        if hint.contains("back") {
            Role::BackCover
        } else if hint.contains("cover") || hint.contains("front") {
            Role::FrontCover
        } else {
            Role::OtherPicture
        }
    }
}

/// Guesses a MIME type from a path's extension, falling back to
/// `application/octet-stream`.
pub fn mime_for_path(path: impl AsRef<Path>) -> &'static str {
    let ext = path
        .as_ref()
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        "tif" | "tiff" => "image/tiff",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "flac" => "audio/flac",
        "ogg" => "audio/ogg",
        "mp4" => "video/mp4",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}
