//! Reads the relations between all factions.
use crate::processors::ProcessingContext;
use crate::xml::tree::XmlNode;
use serde_json::{json, Map, Value};

/// Contains the name of the file which receives the faction relations.
pub const FACTIONS_FILE: &str = "factions.json";

pub(crate) fn process(factions: &XmlNode, context: &mut ProcessingContext) -> anyhow::Result<()> {
    let mut result = Vec::new();
    for faction in factions.children_named("faction") {
        let id = match faction.attr("id") {
            Some(id) if !id.is_empty() => id,
            _ => {
                log::warn!("Skipping a faction without an id...");
                continue;
            }
        };

        let mut relations = Map::new();
        for relation in faction
            .children_named("relations")
            .flat_map(|relations| relations.children_named("relation"))
        {
            if let Some(value) = relation
                .attr("relation")
                .and_then(|value| value.parse::<f64>().ok())
            {
                let _ = relations.insert(relation.attr_or_empty("faction").to_owned(), json!(value));
            }
        }

        result.push(json!({ "id": id, "relations": Value::Object(relations) }));
    }

    log::debug!("Processed {} factions", result.len());
    crate::files::write_json(
        &context.json_folder.join(FACTIONS_FILE),
        &json!({ "factions": result }),
    )
}

#[cfg(test)]
mod tests {
    use crate::components::registry::Collections;
    use crate::processors::{process_fragment, ProcessingContext};
    use crate::xml::actions::ProcessorId;
    use crate::xml::tree::XmlNode;
    use serde_json::Value;

    #[test]
    fn relations_are_collected_per_faction() {
        let folder = tempfile::tempdir().unwrap();
        let mut collections = Collections::new();
        let mut context = ProcessingContext::new(&mut collections, folder.path());

        let fragment = XmlNode::parse_str(
            r#"<factions>
                <faction id="argon"><relations><relation faction="xenon" relation="-1"/><relation faction="teladi" relation="0.25"/></relations></faction>
                <faction><relations/></faction>
                <faction id="xenon"/>
               </factions>"#,
        )
        .unwrap();
        process_fragment(ProcessorId::Factions, &fragment, &mut context).unwrap();

        let factions: Value = crate::files::read_json(&folder.path().join("factions.json")).unwrap();
        let factions = factions["factions"].as_array().unwrap();
        assert_eq!(factions.len(), 2);
        assert_eq!(factions[0]["relations"]["xenon"], -1.0);
        assert_eq!(factions[0]["relations"]["teladi"], 0.25);
        assert_eq!(factions[1]["id"], "xenon");
    }
}
