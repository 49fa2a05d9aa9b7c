//! Provides helpers to persist and read back JSON documents.
//!
//! All documents are written into a **.part** file next to the effective one, which is then
//! renamed into place. Therefore a reader either sees the previous or the new document, but
//! never a partially written one. This also permits concurrent writers of the same document, as
//! long as they write the same contents.
use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Writes the given value as JSON into the given file.
///
/// # Example
/// ```
/// # use serde_json::json;
/// let folder = tempfile::tempdir().unwrap();
/// let file = folder.path().join("test.json");
///
/// xsave::files::write_json(&file, &json!({"ships": 42})).unwrap();
/// let value: serde_json::Value = xsave::files::read_json(&file).unwrap();
/// assert_eq!(value["ships"], 42);
/// ```
pub fn write_json<T: Serialize + ?Sized>(file: &Path, value: &T) -> anyhow::Result<()> {
    let tmp_path = part_file_of(file);
    {
        let output = File::create(&tmp_path)
            .with_context(|| format!("Failed to create {}", tmp_path.display()))?;
        let mut writer = BufWriter::new(output);
        serde_json::to_writer(&mut writer, value)
            .with_context(|| format!("Failed to serialize {}", file.display()))?;
        writer.flush().context("Failed to flush data to disk")?;
    }

    std::fs::rename(&tmp_path, file).with_context(|| {
        format!(
            "Failed to rename {} to its effective name {}",
            tmp_path.display(),
            file.display()
        )
    })
}

/// Reads and parses the given JSON file.
pub fn read_json<T: DeserializeOwned>(file: &Path) -> anyhow::Result<T> {
    let input =
        File::open(file).with_context(|| format!("Failed to open {}", file.display()))?;
    serde_json::from_reader(BufReader::new(input))
        .with_context(|| format!("Failed to parse {}", file.display()))
}

/// Determines the temporary file to write into.
///
/// Each call yields a distinct name, so that two writers of the same document don't interfere
/// with each other's temporary file.
fn part_file_of(file: &Path) -> PathBuf {
    static PART_COUNTER: AtomicUsize = AtomicUsize::new(0);

    let mut name = file.file_name().unwrap_or_default().to_os_string();
    name.push(format!(
        ".{}-{}.part",
        std::process::id(),
        PART_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    file.with_file_name(name)
}
