//! Generic tag facade
//!
//! Translates between a format-agnostic property set (title, performers,
//! genre, year, …) and the underlying [`TagSet`]/attachment list. The
//! facade holds no state of its own: it is a view over the model owned by
//! [`MatroskaFile`](crate::MatroskaFile), driven by a static table from
//! property to (canonical simple tag name, target scope).
//!
//! Simple tag names with no mapping here stay reachable through the raw
//! accessors ([`MediaTag::get`] / [`MediaTag::set`]) or the model itself.

use crate::attachment::Attachment;
use crate::error::Result;
use crate::tag::{SimpleTag, TagSet};

/// Generic properties with a direct simple-tag mapping.
///
/// `PerformersRole` and `Pictures` are not listed: roles live in nested
/// children and pictures in the attachment list, both handled by dedicated
/// accessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Property {
    Title,
    Performers,
    Genres,
    Year,
    Composers,
    Conductor,
    Copyright,
    Comment,
    Album,
    AlbumArtists,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    /// The tag describing the whole file
    Medium,
    /// The first tag above the medium level (album/collection)
    Album,
}

struct Mapping {
    property: Property,
    name: &'static str,
    scope: Scope,
}

/// The facade mapping table. Note the two faces of "TITLE": medium-scoped
/// it is the generic Title, album-scoped it is the generic Album.
const MAPPINGS: &[Mapping] = &[
    Mapping { property: Property::Title, name: "TITLE", scope: Scope::Medium },
    Mapping { property: Property::Performers, name: "PERFORMER", scope: Scope::Medium },
    Mapping { property: Property::Genres, name: "GENRE", scope: Scope::Medium },
    Mapping { property: Property::Year, name: "DATE_RECORDED", scope: Scope::Medium },
    Mapping { property: Property::Composers, name: "COMPOSER", scope: Scope::Medium },
    Mapping { property: Property::Conductor, name: "CONDUCTOR", scope: Scope::Medium },
    Mapping { property: Property::Copyright, name: "COPYRIGHT", scope: Scope::Medium },
    Mapping { property: Property::Comment, name: "COMMENT", scope: Scope::Medium },
    Mapping { property: Property::Album, name: "TITLE", scope: Scope::Album },
    Mapping { property: Property::AlbumArtists, name: "ARTIST", scope: Scope::Album },
];

fn mapping(property: Property) -> &'static Mapping {
    MAPPINGS
        .iter()
        .find(|m| m.property == property)
        .expect("every property has a table entry")
}

/// Nested child carrying a performer's role.
const ROLE_CHILD: &str = "INSTRUMENTS";

/// Separator used when a multi-valued property is presented as one string.
pub const ROLE_SEPARATOR: &str = "; ";

/// The format-agnostic view over one file's tags and attachments.
///
/// Obtained from [`MatroskaFile::tag`](crate::MatroskaFile::tag). Reads
/// resolve against the first matching scope in document order; writes
/// create the scoped tag on demand.
pub struct MediaTag<'a> {
    tags: &'a mut TagSet,
    attachments: &'a mut Vec<Attachment>,
    info_title: Option<&'a str>,
}

impl<'a> MediaTag<'a> {
    pub(crate) fn new(
        tags: &'a mut TagSet,
        attachments: &'a mut Vec<Attachment>,
        info_title: Option<&'a str>,
    ) -> Self {
        MediaTag { tags, attachments, info_title }
    }

    fn read_all(&self, property: Property) -> Vec<String> {
        let m = mapping(property);
        let tag = match m.scope {
            Scope::Medium => self.tags.medium(),
            Scope::Album => self.tags.album(),
        };
        tag.map(|t| t.get(m.name, None).into_iter().map(str::to_string).collect())
            .unwrap_or_default()
    }

    fn read_first(&self, property: Property) -> Option<String> {
        let m = mapping(property);
        let tag = match m.scope {
            Scope::Medium => self.tags.medium(),
            Scope::Album => self.tags.album(),
        };
        tag.and_then(|t| t.first(m.name, None)).map(str::to_string)
    }

    fn write_all(&mut self, property: Property, values: &[&str]) {
        let m = mapping(property);
        let tag = match m.scope {
            Scope::Medium => self.tags.medium_mut(),
            Scope::Album => self.tags.album_mut(),
        };
        tag.set(m.name, None, values).expect("mapped tag names are non-empty");
    }

    /// Set-or-remove for single-valued properties: empty and whitespace
    /// values remove the entry.
    fn write_single(&mut self, property: Property, value: Option<&str>) {
        match value.map(str::trim) {
            Some(v) if !v.is_empty() => self.write_all(property, &[v]),
            _ => self.write_all(property, &[]),
        }
    }

    // Title

    /// Falls back to the segment-info title when no TITLE tag exists.
    pub fn title(&self) -> Option<String> {
        self.read_first(Property::Title)
            .or_else(|| self.info_title.map(str::to_string))
    }

    pub fn set_title(&mut self, value: Option<&str>) {
        self.write_single(Property::Title, value);
    }

    // Performers

    pub fn performers(&self) -> Vec<String> {
        self.read_all(Property::Performers)
    }

    pub fn first_performer(&self) -> Option<String> {
        self.read_first(Property::Performers)
    }

    pub fn set_performers(&mut self, values: &[&str]) {
        self.write_all(Property::Performers, values);
    }

    /// One role per PERFORMER entry, read from the nested INSTRUMENTS
    /// child; entries without a role contribute an empty string. Empty when
    /// no entry carries a role.
    pub fn performers_role(&self) -> Vec<String> {
        let Some(tag) = self.tags.medium() else {
            return Vec::new();
        };
        let roles: Vec<String> = tag
            .matching("PERFORMER", None)
            .iter()
            .map(|st| st.child(ROLE_CHILD).and_then(|c| c.value.clone()).unwrap_or_default())
            .collect();
        if roles.iter().all(String::is_empty) {
            Vec::new()
        } else {
            roles
        }
    }

    /// The roles as a single "; "-joined string.
    pub fn performers_role_joined(&self) -> Option<String> {
        let roles = self.performers_role();
        if roles.is_empty() {
            None
        } else {
            Some(roles.join(ROLE_SEPARATOR))
        }
    }

    /// Assigns roles to the PERFORMER entries pairwise, in document order.
    /// Roles beyond the performer count are kept on value-less PERFORMER
    /// carriers so none are lost.
    pub fn set_performers_role(&mut self, roles: &[&str]) {
        let tag = self.tags.medium_mut();
        for st in tag.matching_mut("PERFORMER", None) {
            st.children.retain(|c| c.name() != ROLE_CHILD);
        }
        // Carriers from an earlier role assignment are now bare; drop them.
        tag.simple_tags.retain(|st| {
            !(st.name() == "PERFORMER"
                && st.value.as_deref().map_or(true, str::is_empty)
                && st.children.is_empty())
        });
        let mut remaining = roles.iter().copied();
        for st in tag.matching_mut("PERFORMER", None) {
            if let Some(role) = remaining.next() {
                if !role.is_empty() {
                    st.children.push(SimpleTag::new(ROLE_CHILD, role));
                }
            }
        }
        for role in remaining {
            let mut carrier = SimpleTag::named("PERFORMER");
            carrier.children.push(SimpleTag::new(ROLE_CHILD, role));
            tag.simple_tags.push(carrier);
        }
    }

    // Genres

    pub fn genres(&self) -> Vec<String> {
        self.read_all(Property::Genres)
    }

    pub fn first_genre(&self) -> Option<String> {
        self.read_first(Property::Genres)
    }

    pub fn set_genres(&mut self, values: &[&str]) {
        self.write_all(Property::Genres, values);
    }

    // Year

    /// Parsed from the leading four digits of DATE_RECORDED.
    pub fn year(&self) -> Option<u32> {
        let date = self.read_first(Property::Year)?;
        let digits: String =
            date.chars().take_while(char::is_ascii_digit).take(4).collect();
        if digits.len() == 4 {
            digits.parse().ok()
        } else {
            None
        }
    }

    pub fn set_year(&mut self, year: Option<u32>) {
        match year {
            Some(y) => {
                let date = y.to_string();
                self.write_all(Property::Year, &[date.as_str()]);
            }
            None => self.write_all(Property::Year, &[]),
        }
    }

    // Composers

    pub fn composers(&self) -> Vec<String> {
        self.read_all(Property::Composers)
    }

    pub fn first_composer(&self) -> Option<String> {
        self.read_first(Property::Composers)
    }

    pub fn set_composers(&mut self, values: &[&str]) {
        self.write_all(Property::Composers, values);
    }

    // Single-valued text properties

    pub fn conductor(&self) -> Option<String> {
        self.read_first(Property::Conductor)
    }

    pub fn set_conductor(&mut self, value: Option<&str>) {
        self.write_single(Property::Conductor, value);
    }

    pub fn copyright(&self) -> Option<String> {
        self.read_first(Property::Copyright)
    }

    pub fn set_copyright(&mut self, value: Option<&str>) {
        self.write_single(Property::Copyright, value);
    }

    pub fn comment(&self) -> Option<String> {
        self.read_first(Property::Comment)
    }

    pub fn set_comment(&mut self, value: Option<&str>) {
        self.write_single(Property::Comment, value);
    }

    // Album scope

    pub fn album(&self) -> Option<String> {
        self.read_first(Property::Album)
    }

    pub fn set_album(&mut self, value: Option<&str>) {
        self.write_single(Property::Album, value);
    }

    pub fn album_artists(&self) -> Vec<String> {
        self.read_all(Property::AlbumArtists)
    }

    pub fn set_album_artists(&mut self, values: &[&str]) {
        self.write_all(Property::AlbumArtists, values);
    }

    // Pictures

    /// Attachments in document order.
    pub fn pictures(&self) -> &[Attachment] {
        self.attachments.as_slice()
    }

    /// Replaces the whole ordered attachment list (takes effect on the next
    /// save).
    pub fn set_pictures(&mut self, pictures: Vec<Attachment>) {
        *self.attachments = pictures;
    }

    // Raw accessors for unmapped names (medium scope)

    pub fn get(&self, name: &str, language: Option<&str>) -> Vec<String> {
        self.tags
            .medium()
            .map(|t| t.get(name, language).into_iter().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn set(&mut self, name: &str, language: Option<&str>, values: &[&str]) -> Result<()> {
        self.tags.medium_mut().set(name, language, values)
    }

    pub fn append(&mut self, name: &str, language: Option<&str>, values: &[&str]) -> Result<()> {
        self.tags.medium_mut().append(name, language, values)
    }
}
