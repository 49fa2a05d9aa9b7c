//! Maintains the position of the reader within the document as dotted path.
//!
//! Each open element contributes one [Segment] to the [TagPath]. Structurally identical elements
//! (think of hundreds of `<connection>` siblings) are told apart by a suffix which is derived from
//! their attributes: `name[class]` if a **class** attribute is present, otherwise `name[id]` if
//! a **connection** attribute is present.
//!
//! # Example
//! ```
//! # use xsave::xml::path::{Segment, TagPath};
//! let mut path = TagPath::default();
//! path.enter(0, Segment::new("savegame", None));
//! path.enter(1, Segment::new("universe", None));
//! path.enter(2, Segment::new("component", Some("galaxy".to_owned())));
//! assert_eq!(path.as_str(), "savegame.universe.component[galaxy]");
//!
//! // A sibling of "universe" truncates the path before being appended...
//! path.enter(1, Segment::new("log", None));
//! assert_eq!(path.as_str(), "savegame.log");
//! assert_eq!(path.len(), 2);
//! ```
use quick_xml::events::BytesStart;
use std::fmt::{Display, Formatter};

/// Represents a single element within a [TagPath].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    name: String,
    suffix: Option<String>,
}

impl Segment {
    /// Creates a segment for the given element name and optional disambiguating suffix.
    pub fn new(name: impl Into<String>, suffix: Option<String>) -> Self {
        Segment {
            name: name.into(),
            suffix,
        }
    }

    /// Derives the segment of the given start tag.
    ///
    /// Note that this is invoked for every opened element, as the suffix depends on the
    /// attribute values of this very element and can therefore never be cached.
    pub fn of(element: &BytesStart) -> Segment {
        let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();

        let mut class = None;
        let mut connection = None;
        for (key, value) in crate::xml::attributes_of(element) {
            match key.as_str() {
                "class" => class = Some(value),
                "connection" => connection = Some(value),
                _ => (),
            }
        }

        Segment {
            name,
            suffix: class.or(connection),
        }
    }

    /// Returns the element name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the suffix (class or connection id) if present.
    pub fn suffix(&self) -> Option<&str> {
        self.suffix.as_deref()
    }

    fn write_to(&self, target: &mut String) {
        target.push_str(&self.name);
        if let Some(suffix) = &self.suffix {
            target.push('[');
            target.push_str(suffix);
            target.push(']');
        }
    }
}

/// Keeps the segments of all currently open elements along with their rendered string.
///
/// The string representation is maintained incrementally, as it is used for a hash lookup
/// for every element being opened.
#[derive(Debug, Default, Clone)]
pub struct TagPath {
    segments: Vec<Segment>,
    offsets: Vec<usize>,
    rendered: String,
}

impl TagPath {
    /// Places the given segment at the given depth (zero based).
    ///
    /// Everything at the same or a deeper level is discarded first, therefore the length of the
    /// path is always **depth + 1** afterwards.
    ///
    /// # Panics
    /// Panics if the given depth skips a level, which would indicate a broken event stream.
    pub fn enter(&mut self, depth: usize, segment: Segment) {
        assert!(
            depth <= self.segments.len(),
            "Cannot enter depth {} for a path of length {}",
            depth,
            self.segments.len()
        );
        self.truncate(depth);

        self.offsets.push(self.rendered.len());
        if !self.segments.is_empty() {
            self.rendered.push('.');
        }
        segment.write_to(&mut self.rendered);
        self.segments.push(segment);
    }

    /// Reduces the path to the given number of segments.
    pub fn truncate(&mut self, len: usize) {
        if len < self.segments.len() {
            self.rendered.truncate(self.offsets[len]);
            self.segments.truncate(len);
            self.offsets.truncate(len);
        }
    }

    /// Returns the rendered path like `savegame.universe.component[galaxy]`.
    pub fn as_str(&self) -> &str {
        &self.rendered
    }

    /// Returns the individual segments of this path.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Returns the number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Determines if no element is open.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl Display for TagPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.rendered)
    }
}
