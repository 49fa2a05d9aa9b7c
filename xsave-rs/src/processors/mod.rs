//! Turns buffered fragments and expanded trees into components or flat JSON documents.
//!
//! Each [ProcessorId] and [HandlerId] of the [ActionTable](crate::xml::actions::ActionTable) is
//! dispatched to a plain function here. Processors only ever see their own fragment, therefore
//! processing the same fragment twice yields the same components. Errors are reported back to the
//! caller which logs them and continues with the next fragment.
use crate::components::registry::Collections;
use crate::components::{ComponentData, ComponentId, ComponentType};
use crate::xml::actions::{HandlerId, ProcessorId};
use crate::xml::extractor::PendingFragment;
use crate::xml::tree::XmlNode;
use std::collections::BTreeMap;
use std::path::Path;

mod factions;
mod galaxy;
mod info;
mod log_entries;
mod player;

/// Contains the component id of the player profile.
pub const PLAYER_ID: &str = "player";

/// Bundles everything a processor may modify.
pub struct ProcessingContext<'a> {
    /// Receives all components being created.
    pub collections: &'a mut Collections,
    /// Receives flat JSON documents like the save info.
    pub json_folder: &'a Path,
}

impl<'a> ProcessingContext<'a> {
    /// Creates a new context.
    pub fn new(collections: &'a mut Collections, json_folder: &'a Path) -> Self {
        ProcessingContext {
            collections,
            json_folder,
        }
    }

    /// Returns the id of the player profile, creating it on first use.
    pub(crate) fn player(&mut self) -> anyhow::Result<ComponentId> {
        let id = ComponentId::new(ComponentType::Player, PLAYER_ID);
        if self.collections.get(&id).is_none() {
            let _ = self.collections.create_component(
                None,
                "",
                PLAYER_ID,
                ComponentData::Player {
                    name: String::new(),
                    money: 0,
                    blueprints: Vec::new(),
                    wares: BTreeMap::new(),
                },
            )?;
        }

        Ok(id)
    }
}

/// Parses and processes the given fragment file.
pub fn process_file(
    fragment: &PendingFragment,
    context: &mut ProcessingContext,
) -> anyhow::Result<()> {
    let tree = XmlNode::parse_file(&fragment.file)?;
    process_fragment(fragment.processor, &tree, context)
}

/// Invokes the processor in charge of the given fragment.
pub fn process_fragment(
    processor: ProcessorId,
    fragment: &XmlNode,
    context: &mut ProcessingContext,
) -> anyhow::Result<()> {
    match processor {
        ProcessorId::Factions => factions::process(fragment, context),
        ProcessorId::Cluster => galaxy::process(fragment, context),
        ProcessorId::Blueprints => player::process_blueprints(fragment, context),
        ProcessorId::Inventory => player::process_inventory(fragment, context),
        ProcessorId::EventLog => log_entries::process(fragment, context),
    }
}

/// Invokes the handler in charge of an expanded tree.
pub fn handle_tree(
    handler: HandlerId,
    tree: XmlNode,
    context: &mut ProcessingContext,
) -> anyhow::Result<()> {
    match handler {
        HandlerId::SaveInfo => info::process(&tree, context),
    }
}

#[cfg(test)]
mod tests {
    use crate::components::registry::Collections;
    use crate::components::{ComponentData, ComponentType};
    use crate::processors::{handle_tree, process_fragment, ProcessingContext};
    use crate::xml::actions::{HandlerId, ProcessorId};
    use crate::xml::tree::XmlNode;
    use serde_json::Value;

    #[test]
    fn player_profile_is_assembled_from_several_sections() {
        let folder = tempfile::tempdir().unwrap();
        let mut collections = Collections::new();
        let mut context = ProcessingContext::new(&mut collections, folder.path());

        let info = XmlNode::parse_str(
            r#"<info>
                <save name="Autosave" date="1700000000"/>
                <game id="X4" version="710" build="540123" time="36000.5"/>
                <player name="Jane" money="1250000"/>
               </info>"#,
        )
        .unwrap();
        handle_tree(HandlerId::SaveInfo, info, &mut context).unwrap();

        let blueprints = XmlNode::parse_str(
            r#"<blueprints><blueprint ware="ship_arg_s_fighter_01_a"/><blueprint ware="module_gen_prod_energycells_01"/></blueprints>"#,
        )
        .unwrap();
        process_fragment(ProcessorId::Blueprints, &blueprints, &mut context).unwrap();

        let inventory = XmlNode::parse_str(
            r#"<inventory><ware ware="spacefuel" amount="12"/><ware ware="medicalsupplies"/></inventory>"#,
        )
        .unwrap();
        process_fragment(ProcessorId::Inventory, &inventory, &mut context).unwrap();

        let info: Value =
            crate::files::read_json(&folder.path().join("savegame-info.json")).unwrap();
        assert_eq!(info["name"], "Autosave");
        assert_eq!(info["gameVersion"], "710");
        assert_eq!(info["playerMoney"], 1_250_000);

        let player = collections
            .resolve("player:player")
            .expect("The player has to be present");
        match player.data() {
            ComponentData::Player {
                name,
                money,
                blueprints,
                wares,
            } => {
                assert_eq!(name, "Jane");
                assert_eq!(*money, 1_250_000);
                assert_eq!(blueprints.len(), 2);
                assert_eq!(wares.get("spacefuel"), Some(&12));
                assert_eq!(wares.get("medicalsupplies"), Some(&1));
            }
            _ => panic!("Expected a player profile"),
        }
        assert_eq!(collections.collection(ComponentType::Player).len(), 1);
    }
}
