//! Tag tree model
//!
//! A Matroska file carries zero or more `Tag` nodes, each scoped by a
//! [`Target`] (the whole file, an album/collection, a specific track, …)
//! and holding an ordered list of [`SimpleTag`] entries. Simple tags nest:
//! a PERFORMER entry can carry an INSTRUMENTS child describing that
//! performer's role.
//!
//! Names are case-normalized to their uppercase canonical form on entry.
//! Duplicate names at one level are legal and their order is meaningful:
//! "first value" queries return the first match in document order, "all
//! values" queries return every match in document order.

use crate::error::{Error, Result};

fn canonical(name: &str) -> String {
    name.trim().to_uppercase()
}

/// A named, optionally nested metadata entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleTag {
    name: String,
    /// The string value; `None` for entries that only carry children
    pub value: Option<String>,
    /// Language code; `None` stands for the format's "und" default
    pub language: Option<String>,
    /// The wire default flag (defaults to true when absent)
    pub default: bool,
    /// Nested entries, in document order
    pub children: Vec<SimpleTag>,
}

impl SimpleTag {
    /// A value-less entry with the given (canonicalized) name.
    pub fn named(name: &str) -> Self {
        SimpleTag {
            name: canonical(name),
            value: None,
            language: None,
            default: true,
            children: Vec::new(),
        }
    }

    pub fn new(name: &str, value: impl Into<String>) -> Self {
        let mut tag = SimpleTag::named(name);
        tag.value = Some(value.into());
        tag
    }

    /// Canonical (uppercase) name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this entry matches a (name, language) query key.
    ///
    /// A `None` language matches entries with no language or the "und"
    /// default; a `Some` language matches exactly (ASCII case-insensitive).
    pub fn matches(&self, name: &str, language: Option<&str>) -> bool {
        self.name == canonical(name) && self.language_matches(language)
    }

    fn language_matches(&self, language: Option<&str>) -> bool {
        match (self.language.as_deref(), language) {
            (None, None) => true,
            (Some(have), Some(want)) => have.eq_ignore_ascii_case(want),
            (Some(have), None) => have.eq_ignore_ascii_case("und"),
            (None, Some(want)) => want.eq_ignore_ascii_case("und"),
        }
    }

    /// First child with the given name, if any.
    pub fn child(&self, name: &str) -> Option<&SimpleTag> {
        let name = canonical(name);
        self.children.iter().find(|c| c.name == name)
    }
}

/// What entity a [`Tag`] describes.
///
/// The numeric level follows the Matroska target type values: 70 is a
/// collection, 50 the current medium (whole file), 30 a track, and so on.
/// An absent value means the medium level.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Target {
    pub value: Option<u64>,
    /// Free-form target type name ("ALBUM", "TRACK", …)
    pub kind: Option<String>,
    pub track_uids: Vec<u64>,
    pub edition_uids: Vec<u64>,
    pub chapter_uids: Vec<u64>,
    pub attachment_uids: Vec<u64>,
}

impl Target {
    /// Target level describing the current medium (the whole file).
    pub const MEDIUM: u64 = 50;
    /// Target level used when creating album/collection tags.
    pub const ALBUM: u64 = 70;

    pub fn with_value(value: u64) -> Self {
        Target { value: Some(value), ..Target::default() }
    }

    /// The level this target describes, defaulting to the medium.
    pub fn effective_value(&self) -> u64 {
        self.value.unwrap_or(Self::MEDIUM)
    }

    /// True when the target names no specific track/edition/chapter/
    /// attachment, i.e. applies to everything at its level.
    pub fn is_unscoped(&self) -> bool {
        self.track_uids.is_empty()
            && self.edition_uids.is_empty()
            && self.chapter_uids.is_empty()
            && self.attachment_uids.is_empty()
    }
}

/// A scoped collection of simple tags.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Tag {
    pub target: Target,
    pub simple_tags: Vec<SimpleTag>,
}

impl Tag {
    pub fn new(target: Target) -> Self {
        Tag { target, simple_tags: Vec::new() }
    }

    /// All values for (name, language), in document order. Absence is an
    /// empty vec, never an error.
    pub fn get(&self, name: &str, language: Option<&str>) -> Vec<&str> {
        let name = canonical(name);
        self.simple_tags
            .iter()
            .filter(|t| t.name == name && t.language_matches(language))
            .filter_map(|t| t.value.as_deref())
            .collect()
    }

    /// First value for (name, language) in document order.
    pub fn first(&self, name: &str, language: Option<&str>) -> Option<&str> {
        let name = canonical(name);
        self.simple_tags
            .iter()
            .filter(|t| t.name == name && t.language_matches(language))
            .find_map(|t| t.value.as_deref())
    }

    /// Replaces all values for (name, language) with `values`, creating the
    /// entries if absent. Passing no values removes the entries.
    pub fn set(&mut self, name: &str, language: Option<&str>, values: &[&str]) -> Result<()> {
        let name = canonical(name);
        if name.is_empty() {
            return Err(Error::EmptyTagName);
        }
        self.simple_tags.retain(|t| !(t.name == name && t.language_matches(language)));
        self.push_values(name, language, values);
        Ok(())
    }

    /// Adds values without removing existing ones with the same key.
    pub fn append(&mut self, name: &str, language: Option<&str>, values: &[&str]) -> Result<()> {
        let name = canonical(name);
        if name.is_empty() {
            return Err(Error::EmptyTagName);
        }
        self.push_values(name, language, values);
        Ok(())
    }

    /// Removes every entry matching (name, language).
    pub fn remove(&mut self, name: &str, language: Option<&str>) {
        let name = canonical(name);
        self.simple_tags.retain(|t| !(t.name == name && t.language_matches(language)));
    }

    fn push_values(&mut self, name: String, language: Option<&str>, values: &[&str]) {
        // "und" is the wire default; storing it as None keeps one canonical
        // representation for the no-language key.
        let language = language.filter(|l| !l.eq_ignore_ascii_case("und"));
        for value in values {
            let mut tag = SimpleTag::named(&name);
            tag.value = Some((*value).to_string());
            tag.language = language.map(str::to_string);
            self.simple_tags.push(tag);
        }
    }

    /// Matching entries themselves (including value-less ones), in document
    /// order. Used by the facade to reach nested children.
    pub(crate) fn matching(&self, name: &str, language: Option<&str>) -> Vec<&SimpleTag> {
        let name = canonical(name);
        self.simple_tags
            .iter()
            .filter(|t| t.name == name && t.language_matches(language))
            .collect()
    }

    pub(crate) fn matching_mut(
        &mut self,
        name: &str,
        language: Option<&str>,
    ) -> Vec<&mut SimpleTag> {
        let name = canonical(name);
        self.simple_tags
            .iter_mut()
            .filter(|t| t.name == name && t.language_matches(language))
            .collect()
    }
}

/// Every `Tag` of one file, in document order.
///
/// Multiple tags may share a target level; queries resolve to the first
/// matching scope in document order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TagSet {
    tags: Vec<Tag>,
}

impl TagSet {
    pub fn new() -> Self {
        TagSet::default()
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn tags_mut(&mut self) -> &mut [Tag] {
        &mut self.tags
    }

    pub fn push(&mut self, tag: Tag) {
        self.tags.push(tag);
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn clear(&mut self) {
        self.tags.clear();
    }

    /// Appends a new sibling tag scoped to the given target level and
    /// returns it. Writes through the new tag never affect its siblings.
    pub fn make_tag(&mut self, target_type_value: u64) -> &mut Tag {
        self.tags.push(Tag::new(Target::with_value(target_type_value)));
        self.tags.last_mut().expect("tag was just pushed")
    }

    /// First unscoped tag at the given target level, in document order.
    pub fn for_target(&self, value: u64) -> Option<&Tag> {
        self.tags
            .iter()
            .find(|t| t.target.effective_value() == value && t.target.is_unscoped())
    }

    /// The tag describing the whole file (medium level).
    pub fn medium(&self) -> Option<&Tag> {
        self.for_target(Target::MEDIUM)
    }

    /// The medium tag, created if absent.
    pub fn medium_mut(&mut self) -> &mut Tag {
        let pos = self.tags.iter().position(|t| {
            t.target.effective_value() == Target::MEDIUM && t.target.is_unscoped()
        });
        match pos {
            Some(i) => &mut self.tags[i],
            None => self.make_tag(Target::MEDIUM),
        }
    }

    /// The first tag above the medium level (album/collection scope), in
    /// document order.
    pub fn album(&self) -> Option<&Tag> {
        self.tags
            .iter()
            .find(|t| t.target.effective_value() > Target::MEDIUM && t.target.is_unscoped())
    }

    /// The album tag, created at the collection level if absent.
    pub fn album_mut(&mut self) -> &mut Tag {
        let pos = self.tags.iter().position(|t| {
            t.target.effective_value() > Target::MEDIUM && t.target.is_unscoped()
        });
        match pos {
            Some(i) => &mut self.tags[i],
            None => self.make_tag(Target::ALBUM),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let mut tag = Tag::default();
        tag.set("Title", None, &["Turning Lime"]).unwrap();
        assert_eq!(tag.get("TITLE", None), vec!["Turning Lime"]);
        assert_eq!(tag.first("title", None), Some("Turning Lime"));
    }

    #[test]
    fn test_get_absent_is_empty_not_error() {
        let tag = Tag::default();
        assert!(tag.get("NOPE", None).is_empty());
        assert_eq!(tag.first("NOPE", None), None);
    }

    #[test]
    fn test_set_replaces_all_values() {
        let mut tag = Tag::default();
        tag.set("GENRE", None, &["Rock", "Pop"]).unwrap();
        tag.set("GENRE", None, &["Test"]).unwrap();
        assert_eq!(tag.get("GENRE", None), vec!["Test"]);
    }

    #[test]
    fn test_set_empty_removes() {
        let mut tag = Tag::default();
        tag.set("GENRE", None, &["Rock"]).unwrap();
        tag.set("GENRE", None, &[]).unwrap();
        assert!(tag.get("GENRE", None).is_empty());
    }

    #[test]
    fn test_append_preserves_order() {
        let mut tag = Tag::default();
        tag.set("GENRE", None, &["Rock"]).unwrap();
        tag.append("GENRE", None, &["Pop", "Jazz"]).unwrap();
        assert_eq!(tag.get("GENRE", None), vec!["Rock", "Pop", "Jazz"]);
        assert_eq!(tag.first("GENRE", None), Some("Rock"));
    }

    #[test]
    fn test_empty_name_is_usage_error() {
        let mut tag = Tag::default();
        assert!(matches!(tag.set("", None, &["x"]), Err(Error::EmptyTagName)));
        assert!(matches!(tag.append("  ", None, &["x"]), Err(Error::EmptyTagName)));
    }

    #[test]
    fn test_language_key_matching() {
        let mut tag = Tag::default();
        tag.set("TITLE", Some("fre"), &["Citron Vert"]).unwrap();
        tag.set("TITLE", None, &["Turning Lime"]).unwrap();

        assert_eq!(tag.get("TITLE", Some("fre")), vec!["Citron Vert"]);
        assert_eq!(tag.get("TITLE", None), vec!["Turning Lime"]);
        // "und" is the same key as no language.
        assert_eq!(tag.get("TITLE", Some("und")), vec!["Turning Lime"]);
        assert!(tag.get("TITLE", Some("ger")).is_empty());
    }

    #[test]
    fn test_und_language_normalizes_to_none_key() {
        let mut tag = Tag::default();
        tag.set("COMMENT", Some("und"), &["no comments"]).unwrap();
        assert_eq!(tag.get("COMMENT", None), vec!["no comments"]);
    }

    #[test]
    fn test_nested_children() {
        let mut performer = SimpleTag::new("PERFORMER", "Lime");
        performer.children.push(SimpleTag::new("INSTRUMENTS", "theremin"));
        assert_eq!(
            performer.child("instruments").and_then(|c| c.value.as_deref()),
            Some("theremin")
        );
        assert!(performer.child("CHARACTER").is_none());
    }

    #[test]
    fn test_make_tag_does_not_affect_siblings() {
        let mut tags = TagSet::new();
        tags.medium_mut().set("TITLE", None, &["Turning Lime"]).unwrap();
        let album = tags.make_tag(Target::ALBUM);
        album.set("TITLE", None, &["TEST Album title"]).unwrap();

        assert_eq!(tags.medium().unwrap().get("TITLE", None), vec!["Turning Lime"]);
        assert_eq!(tags.album().unwrap().get("TITLE", None), vec!["TEST Album title"]);
    }

    #[test]
    fn test_scope_resolution_first_in_document_order() {
        let mut tags = TagSet::new();
        tags.make_tag(70).set("TITLE", None, &["first collection"]).unwrap();
        tags.make_tag(60).set("TITLE", None, &["second, lower level"]).unwrap();
        // Both are above the medium; the first in document order wins.
        assert_eq!(tags.album().unwrap().get("TITLE", None), vec!["first collection"]);
    }

    #[test]
    fn test_track_scoped_tag_is_not_the_medium() {
        let mut tags = TagSet::new();
        let mut scoped = Tag::new(Target::with_value(Target::MEDIUM));
        scoped.target.track_uids.push(7);
        scoped.set("TITLE", None, &["track only"]).unwrap();
        tags.push(scoped);

        assert!(tags.medium().is_none());
        tags.medium_mut().set("TITLE", None, &["whole file"]).unwrap();
        assert_eq!(tags.medium().unwrap().get("TITLE", None), vec!["whole file"]);
        assert_eq!(tags.len(), 2);
    }
}
