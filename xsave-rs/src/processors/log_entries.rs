//! Reads the entries of the event log.
//!
//! Log entries don't carry an id in a savegame. As the log is only ever appended to, the
//! position of an entry is used instead.
use crate::components::{ComponentData, LogEntry};
use crate::processors::ProcessingContext;
use crate::xml::tree::XmlNode;

pub(crate) fn process(log: &XmlNode, context: &mut ProcessingContext) -> anyhow::Result<()> {
    let mut skipped = 0;
    for (index, entry) in log.children_named("entry").enumerate() {
        let log_entry = parse_entry(index, entry, context);
        let id = log_entry.id.clone();
        if let Err(error) =
            context
                .collections
                .create_component(None, "", &id, ComponentData::LogEntry(log_entry))
        {
            skipped += 1;
            log::warn!("Skipping log entry #{}: {:#}", index, error);
        }
    }

    if skipped > 0 {
        log::warn!("{} log entries have been skipped", skipped);
    }

    Ok(())
}

fn parse_entry(index: usize, entry: &XmlNode, context: &ProcessingContext) -> LogEntry {
    let target = entry.attr("component").and_then(|component_id| {
        context
            .collections
            .find_by_component_id(component_id)
            .map(|component| component.unique_id())
    });

    LogEntry {
        id: format!("log-{}", index),
        time: entry
            .attr("time")
            .and_then(|time| time.parse::<f64>().ok())
            .unwrap_or_default(),
        category: entry.attr_or_empty("category").to_owned(),
        title: entry.attr_or_empty("title").to_owned(),
        text: entry.attr_or_empty("text").to_owned(),
        faction: entry.attr_or_empty("faction").to_owned(),
        money: entry
            .attr("money")
            .and_then(|money| money.parse::<i64>().ok())
            .unwrap_or_default(),
        target,
    }
}
