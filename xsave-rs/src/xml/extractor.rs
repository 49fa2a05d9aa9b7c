//! The streaming engine which walks a savegame and applies the [ActionTable].
//!
//! Processing is strictly sequential, as the tag path depends on the document order of all
//! events. Fragments are only written to disk during a run, the actual processing happens
//! afterwards via [Extractor::into_fragments].
use crate::xml::actions::{Action, ActionTable, HandlerId, ProcessorId};
use crate::xml::path::{Segment, TagPath};
use crate::xml::tree::XmlNode;
use anyhow::{bail, Context};
use quick_xml::events::{BytesDecl, BytesStart, Event};
use quick_xml::name::QName;
use quick_xml::{Reader, Writer};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Describes a fragment file which has been written and awaits processing.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingFragment {
    /// Contains the tag path of the root element of the fragment.
    pub tag_path: String,
    /// Contains the location of the fragment file.
    pub file: PathBuf,
    /// Determines the processor in charge of the fragment.
    pub processor: ProcessorId,
}

/// Collects some metrics of a run which are reported in the logs.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExtractionStats {
    /// Contains the number of elements which have been opened (outside of handled subtrees).
    pub elements: usize,
    /// Contains the number of subtrees which have been skipped.
    pub skipped_subtrees: usize,
    /// Contains the number of fragment files written.
    pub fragments: usize,
    /// Contains the number of subtrees which have been expanded in memory.
    pub expanded_trees: usize,
    /// Contains the number of expanded trees which were rejected by their handler.
    pub failed_trees: usize,
}

/// Streams a document and applies the actions of an [ActionTable].
///
/// The extractor owns the fragment counter which is used to disambiguate the files of repeated
/// siblings (e.g. one fragment per cluster) and the list of fragments written so far.
pub struct Extractor<'a> {
    actions: &'a ActionTable,
    fragment_folder: PathBuf,
    counter: usize,
    fragments: Vec<PendingFragment>,
}

impl<'a> Extractor<'a> {
    /// Creates a new extractor which places its fragments in the given folder.
    ///
    /// Note that the folder has to exist before a run is started.
    pub fn new(actions: &'a ActionTable, fragment_folder: impl Into<PathBuf>) -> Self {
        Extractor {
            actions,
            fragment_folder: fragment_folder.into(),
            counter: 0,
            fragments: Vec::new(),
        }
    }

    /// Streams the given file.
    ///
    /// Failing to open the file is fatal for the whole run.
    pub fn run_file<F>(&mut self, file: &Path, on_tree: F) -> anyhow::Result<ExtractionStats>
    where
        F: FnMut(HandlerId, XmlNode) -> anyhow::Result<()>,
    {
        let input = File::open(file)
            .with_context(|| format!("Cannot open source document {}", file.display()))?;

        self.run(BufReader::new(input), on_tree)
            .with_context(|| format!("Failed to stream {}", file.display()))
    }

    /// Streams the given input.
    ///
    /// Each expanded tree is passed into **on_tree**. If the callback fails, the tree is logged and
    /// skipped while the run continues. Errors of the underlying XML stream itself are fatal, as
    /// there is no way to re-synchronize the tag path afterwards.
    pub fn run<B, F>(&mut self, input: B, mut on_tree: F) -> anyhow::Result<ExtractionStats>
    where
        B: BufRead,
        F: FnMut(HandlerId, XmlNode) -> anyhow::Result<()>,
    {
        let mut reader = crate::xml::reader(input);
        let mut buffer = Vec::new();
        let mut scratch = Vec::new();
        let mut path = TagPath::default();
        let mut depth = 0;
        let mut stats = ExtractionStats::default();

        loop {
            match reader.read_event_into(&mut buffer)? {
                Event::Start(element) => {
                    path.enter(depth, Segment::of(&element));
                    stats.elements += 1;

                    match self.actions.lookup(&path) {
                        None => depth += 1,
                        Some(Action::Ignore) => {
                            let name = element.name().as_ref().to_vec();
                            let _ = reader.read_to_end_into(QName(&name), &mut scratch)?;
                            stats.skipped_subtrees += 1;
                        }
                        Some(Action::WriteFragment(processor)) => {
                            self.write_fragment(&mut reader, &element, &path, processor, &mut scratch)?;
                            stats.fragments += 1;
                        }
                        Some(Action::ExpandTree(handler)) => {
                            let tree = XmlNode::read_subtree(&mut reader, &element, &mut scratch)?;
                            stats.expanded_trees += 1;
                            if let Err(error) = on_tree(handler, tree) {
                                stats.failed_trees += 1;
                                log::warn!(
                                    "Handler {} failed for {} - skipping: {:#}",
                                    handler,
                                    path,
                                    error
                                );
                            }
                        }
                    }
                    scratch.clear();
                }
                Event::End(_) => {
                    depth = depth.saturating_sub(1);
                    path.truncate(depth);
                }
                Event::Eof => break,
                _ => (),
            }
            buffer.clear();
        }

        if depth > 0 {
            bail!("Unexpected end of document at {}", path);
        }

        Ok(stats)
    }

    fn write_fragment<B: BufRead>(
        &mut self,
        reader: &mut Reader<B>,
        element: &BytesStart,
        path: &TagPath,
        processor: ProcessorId,
        buffer: &mut Vec<u8>,
    ) -> anyhow::Result<()> {
        let file = self.fragment_folder.join(format!(
            "{}-{}.xml",
            file_name_of(path.as_str()),
            self.counter
        ));
        self.counter += 1;

        let output = File::create(&file)
            .with_context(|| format!("Cannot create fragment {}", file.display()))?;
        let mut writer = Writer::new(BufWriter::new(output));
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        writer.write_event(Event::Start(element.borrow()))?;

        let mut depth = 1;
        loop {
            let event = reader.read_event_into(buffer)?;
            let done = match &event {
                Event::Start(_) => {
                    depth += 1;
                    false
                }
                Event::End(_) => {
                    depth -= 1;
                    depth == 0
                }
                Event::Eof => bail!("Unexpected end of document within {}", path),
                _ => false,
            };
            writer.write_event(event)?;
            if done {
                break;
            }
            buffer.clear();
        }
        writer
            .into_inner()
            .flush()
            .with_context(|| format!("Cannot write fragment {}", file.display()))?;

        log::debug!("Buffered {} into {}", path, file.display());
        self.fragments.push(PendingFragment {
            tag_path: path.as_str().to_owned(),
            file,
            processor,
        });

        Ok(())
    }

    /// Returns the fragments written so far in document order.
    pub fn fragments(&self) -> &[PendingFragment] {
        &self.fragments
    }

    /// Consumes the extractor and returns all fragments in document order.
    pub fn into_fragments(self) -> Vec<PendingFragment> {
        self.fragments
    }
}

/// Turns a tag path into something which is safe to be used as file name.
fn file_name_of(path: &str) -> String {
    path.chars()
        .map(|ch| match ch {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '_' | '-' | '[' | ']' => ch,
            _ => '_',
        })
        .collect()
}
