//! Streams a savegame document and routes its subtrees based on their tag path.
//!
//! A savegame is a single XML document which easily reaches several hundred megabytes. Loading
//! it as a whole is therefore not an option. Instead we pull events from **quick_xml** and keep
//! track of the current [TagPath](path::TagPath). For each opened element, the
//! [ActionTable](actions::ActionTable) decides what happens to its subtree:
//!
//! * **Ignore**: the subtree is skipped natively by the reader.
//! * **WriteFragment**: the raw markup of the subtree is copied into a fragment file on disk,
//!   which is later handed to a [fragment processor](crate::processors).
//! * **ExpandTree**: the subtree is materialized as [XmlNode](tree::XmlNode) and handed to a
//!   callback right away.
//!
//! Everything else is streamed through without allocating anything but the current path.
//!
//! # Example
//!
//! ```
//! # use xsave::xml::actions::{Action, ActionTable, HandlerId};
//! # use xsave::xml::extractor::Extractor;
//! let data = r#"<savegame><info><save name="Test"/></info><stats><a/><b/></stats></savegame>"#;
//!
//! let mut actions = ActionTable::new();
//! actions.register("savegame.info", Action::ExpandTree(HandlerId::SaveInfo));
//! actions.register("savegame.stats", Action::Ignore);
//!
//! let folder = tempfile::tempdir().unwrap();
//! let mut extractor = Extractor::new(&actions, folder.path());
//! let mut names = Vec::new();
//! let stats = extractor
//!     .run(data.as_bytes(), |_, tree| {
//!         names.push(tree.child("save").unwrap().attr("name").unwrap().to_owned());
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! assert_eq!(names, vec!["Test"]);
//! assert_eq!(stats.skipped_subtrees, 1);
//! ```
use quick_xml::events::attributes::Attribute;
use quick_xml::events::BytesStart;
use quick_xml::Reader;
use std::io::BufRead;

pub mod actions;
pub mod extractor;
pub mod path;
pub mod tree;

/// Creates a reader for the given input which is configured the same way for all our use-cases.
///
/// Empty elements are expanded into a start and an end event, so that consumers only ever have
/// to track **Start** and **End** to maintain the nesting depth.
pub(crate) fn reader<B: BufRead>(input: B) -> Reader<B> {
    let mut reader = Reader::from_reader(input);
    let config = reader.config_mut();
    config.trim_text(true);
    config.expand_empty_elements = true;
    config.check_end_names = true;

    reader
}

/// Decodes all well-formed attributes of the given element.
///
/// Savegames occasionally contain entities the reader doesn't know. Such a value is kept as raw
/// text, and an attribute which cannot be parsed at all is dropped. Both are logged, as a single
/// odd attribute must not stop the whole run.
pub(crate) fn attributes_of(element: &BytesStart) -> Vec<(String, String)> {
    let mut result = Vec::new();
    for attribute in element.attributes() {
        match attribute {
            Ok(attribute) => result.push((
                String::from_utf8_lossy(attribute.key.as_ref()).into_owned(),
                attribute_value(element, &attribute),
            )),
            Err(error) => log::warn!(
                "Skipping a malformed attribute of <{}>: {}",
                String::from_utf8_lossy(element.name().as_ref()),
                error
            ),
        }
    }

    result
}

fn attribute_value(element: &BytesStart, attribute: &Attribute) -> String {
    match attribute.unescape_value() {
        Ok(value) => value.into_owned(),
        Err(error) => {
            let raw = String::from_utf8_lossy(&attribute.value).into_owned();
            log::warn!(
                "Keeping the raw value '{}' of <{} {}>: {}",
                raw,
                String::from_utf8_lossy(element.name().as_ref()),
                String::from_utf8_lossy(attribute.key.as_ref()),
                error
            );
            raw
        }
    }
}
