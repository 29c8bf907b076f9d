//! # matroska-tags
//!
//! Read, edit, and write the metadata of Matroska (EBML) container files:
//! the hierarchical tag tree, embedded attachments such as cover art, and a
//! generic cross-format property facade over both.
//!
//! ## Container layout
//!
//! A Matroska file is a tree of self-framed elements (variable-width id +
//! variable-width size + payload):
//!
//! ```text
//! EBML header
//! Segment
//! ├── Info          (title, duration, timestamp scale)
//! ├── Tracks        (audio/video stream parameters)
//! ├── Cluster…      (media payload, never touched)
//! ├── Attachments   (embedded files)
//! └── Tags
//!     └── Tag       (scoped by target: file, album, track, …)
//!         └── SimpleTag   (name/value, may nest)
//! ```
//!
//! Only the `Tags` and `Attachments` regions are ever rewritten; every
//! other byte of the container is preserved, at an unchanged offset
//! relative to the segment payload.
//!
//! ## Reading and writing
//!
//! ```no_run
//! use matroska_tags::MatroskaFile;
//!
//! # fn main() -> matroska_tags::Result<()> {
//! let mut file = MatroskaFile::open("movie.mkv")?;
//! println!("{:?}", file.tag().title());
//!
//! file.tag().set_genres(&["Test"]);
//! file.tag().set("CHOREGRAPHER", None, &["Starwer"])?;
//! file.save()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Damaged input
//!
//! Opening never fails on a malformed container. Elements that cannot be
//! read cleanly are skipped or truncated, the defects are recorded on the
//! file, and whatever parsed cleanly is available. A completely
//! non-conformant input yields an empty tag model.

pub mod attachment;
pub mod ebml;
pub mod error;
pub mod facade;
pub mod file;
pub mod ids;
pub mod tag;

mod reader;
mod writer;

pub use attachment::{mime_for_path, Attachment, Role};
pub use ebml::{Defect, DefectKind};
pub use error::{Error, Result};
pub use facade::{MediaTag, Property};
pub use file::{MatroskaFile, Properties, ReadOptions};
pub use tag::{SimpleTag, Tag, TagSet, Target};
