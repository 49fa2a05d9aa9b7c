use std::collections::HashMap;
use std::path::Path;

use serde_json::Value;
use xsave::components::registry::Collections;
use xsave::components::ComponentType;
use xsave::extraction::{extract_save, ExtractionSettings, Outcome};
use xsave::eventlog::MISC;
use xsave::query::{QueryRequest, QueryService};
use xsave::saves::{FolderSaveProvider, SaveFile, SaveProvider, SaveStorage};

const SAVEGAME: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<savegame>
  <info>
    <save name="Integration" date="1700000000"/>
    <game version="710" build="541234" time="98765.25"/>
    <player name="Kaela Hane" money="4200000"/>
  </info>
  <universe>
    <factions>
      <faction id="argon"><relations><relation faction="xenon" relation="-1"/></relations></faction>
      <faction id="xenon"><relations><relation faction="argon" relation="-1"/></relations></faction>
    </factions>
    <jobs><job id="job-1"><orders/></job></jobs>
    <component class="galaxy" macro="xu_ep2_universe_macro" connection="galaxy" id="[0x1]">
      <connections>
        <connection connection="cluster_01_connection">
          <component class="cluster" macro="cluster_01_macro" code="CLU-001" id="[0x10]">
            <connections>
              <connection connection="cluster_01_sector001_connection">
                <component class="sector" macro="cluster_01_sector001_macro" owner="argon" code="SEC-001" id="[0x11]">
                  <connections>
                    <connection connection="zone001_connection">
                      <component class="zone" macro="zone001_macro" code="ZON-001" id="[0x12]">
                        <connections>
                          <connection connection="ships">
                            <component class="ship_m" macro="ship_arg_m_frigate_01_a_macro" owner="player" name="Blue Horizon" code="XYZ-001" id="[0x13]">
                              <connections>
                                <connection connection="con_cockpit">
                                  <component class="cockpit" macro="cockpit_macro" id="[0x14]">
                                    <connections>
                                      <connection connection="entities">
                                        <component class="npc" macro="character_argon_female_01_macro" name="Ava Krill" id="[0x15]"/>
                                      </connection>
                                    </connections>
                                  </component>
                                </connection>
                              </connections>
                              <people>
                                <person role="marine" macro="character_split_female_01_macro" name="Dal Busta"/>
                              </people>
                            </component>
                          </connection>
                          <connection connection="stations">
                            <component class="station" macro="station_arg_wharf_macro" owner="argon" name="Argon Wharf" code="STA-001" id="[0x16]">
                              <people>
                                <person role="manager" macro="character_argon_male_01_macro" name="Rob Ball"/>
                              </people>
                            </component>
                          </connection>
                        </connections>
                      </component>
                    </connection>
                  </connections>
                </component>
              </connection>
              <connection connection="region_01_connection">
                <component class="region" macro="region_field_01_macro" id="[0x20]">
                  <connections>
                    <connection connection="link"><connected connection="region_02_connection"/></connection>
                  </connections>
                </component>
              </connection>
              <connection connection="region_02_connection">
                <component class="region" macro="region_field_02_macro" id="[0x21]"/>
              </connection>
            </connections>
          </component>
        </connection>
      </connections>
    </component>
    <blueprints>
      <blueprint ware="ship_arg_m_frigate_01_a"/>
      <blueprint ware="module_arg_dock_m_01"/>
    </blueprints>
    <inventory>
      <ware ware="inv_spacefuel" amount="12"/>
      <ware ware="inv_timepiece"/>
    </inventory>
  </universe>
  <log>
    <entry time="100.5" category="upkeep" title="Trade completed" text="Blue Horizon sold 500 Energy Cells" component="[0x13]" money="25000"/>
    <entry time="200" category="missions" title="Ocean of Fantasy" text="Meet the contact in Argon Prime"/>
    <entry time="300" category="upkeep" title="Under attack" text="Argon Wharf is under attack by Xenon" component="[0x16]"/>
    <entry time="400" category="general" title="Something else" text="Nothing to see here"/>
  </log>
  <messages><message id="m1"/></messages>
  <stats><stat id="kills" value="3"/></stats>
</savegame>
"#;

fn setup(saves: &Path) -> SaveFile {
    std::fs::write(saves.join("Quicksave.xml"), SAVEGAME).unwrap();
    let provider = FolderSaveProvider::new(saves, None);
    provider.find("quicksave").unwrap().unwrap()
}

fn read_collections(storage: &SaveStorage) -> HashMap<ComponentType, Vec<u8>> {
    ComponentType::ALL
        .iter()
        .map(|component_type| {
            let file = storage.json_dir("quicksave").join(format!(
                "collection-{}.json",
                component_type.type_id()
            ));
            (*component_type, std::fs::read(file).unwrap())
        })
        .collect()
}

#[test]
fn extraction_is_idempotent() {
    let saves = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let storage = SaveStorage::new(output.path());
    let save = setup(saves.path());
    let settings = ExtractionSettings::default();

    assert!(matches!(
        extract_save(&storage, &save, &settings).unwrap(),
        Outcome::Extracted(_)
    ));
    let first_run = read_collections(&storage);

    // An unchanged save isn't touched at all...
    assert!(matches!(
        extract_save(&storage, &save, &settings).unwrap(),
        Outcome::Skipped
    ));
    assert_eq!(read_collections(&storage), first_run);

    // ...and forcing a complete re-run yields the very same collections.
    std::fs::remove_file(storage.analysis_file("quicksave")).unwrap();
    assert!(matches!(
        extract_save(&storage, &save, &settings).unwrap(),
        Outcome::Extracted(_)
    ));
    assert_eq!(read_collections(&storage), first_run);
}

#[test]
fn the_component_graph_is_a_forest() {
    let saves = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let storage = SaveStorage::new(output.path());
    let save = setup(saves.path());
    let _ = extract_save(&storage, &save, &ExtractionSettings::default()).unwrap();

    let mut parents = HashMap::new();
    for component_type in ComponentType::ALL {
        for component in Collections::load(&storage.json_dir("quicksave"), component_type).unwrap()
        {
            let _ = parents.insert(
                component["uniqueID"].as_str().unwrap().to_owned(),
                component["parentComponent"].as_str().map(str::to_owned),
            );
        }
    }

    // cluster, sector, zone, 2 regions, ship, pilot, marine, station, manager, player, 4 entries
    assert_eq!(parents.len(), 15);
    for (unique_id, parent) in &parents {
        let mut current = parent.clone();
        let mut steps = 0;
        while let Some(parent_id) = current {
            assert!(
                parents.contains_key(&parent_id),
                "{} refers to the unknown parent {}",
                unique_id,
                parent_id
            );
            steps += 1;
            assert!(steps <= parents.len(), "{} is part of a cycle", unique_id);
            current = parents[&parent_id].clone();
        }
    }

    assert_eq!(
        parents["ship:[0x13]"].as_deref(),
        Some("zone:[0x12]")
    );
    assert_eq!(
        parents["person:[0x15]"].as_deref(),
        Some("ship:[0x13]")
    );
    assert_eq!(parents["cluster:[0x10]"], None);
}

#[test]
fn extracted_data_can_be_queried() {
    let saves = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let storage = SaveStorage::new(output.path());
    let save = setup(saves.path());
    let _ = extract_save(&storage, &save, &ExtractionSettings::default()).unwrap();
    let service = QueryService::new(storage.clone());

    // Ships have been warmed up by the extraction...
    let ships = service
        .query(&QueryRequest::new("quicksave", "ships"))
        .unwrap();
    assert!(ships.cached);
    assert_eq!(ships.pagination.total, 1);
    assert_eq!(ships.data[0]["name"], "Blue Horizon");
    assert_eq!(ships.data[0]["buildFaction"], "arg");
    assert_eq!(ships.data[0]["pilot"], "person:[0x15]");

    // ...sectors are cached on their first use.
    let sectors = service
        .query(&QueryRequest::new("quicksave", "sectors"))
        .unwrap();
    assert!(!sectors.cached);
    assert_eq!(sectors.data[0]["owner"], "argon");
    assert!(
        service
            .query(&QueryRequest::new("quicksave", "sectors"))
            .unwrap()
            .cached
    );

    let people = service
        .query(
            &QueryRequest::new("quicksave", "people")
                .with_pagination(Some("2"), Some("1"))
                .unwrap(),
        )
        .unwrap();
    assert_eq!(people.pagination.total, 3);
    assert_eq!(people.data.len(), 2);
    assert!(!people.pagination.has_more);

    let player = service
        .query(&QueryRequest::new("quicksave", "players"))
        .unwrap();
    assert_eq!(player.data[0]["name"], "Kaela Hane");
    assert_eq!(player.data[0]["wares"]["inv_spacefuel"], 12);
    assert_eq!(player.data[0]["blueprints"].as_array().unwrap().len(), 2);

    assert!(service
        .query(&QueryRequest::new("unknown", "ships"))
        .is_err());
}

#[test]
fn the_event_log_is_categorized_completely() {
    let saves = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let storage = SaveStorage::new(output.path());
    let save = setup(saves.path());
    let _ = extract_save(&storage, &save, &ExtractionSettings::default()).unwrap();
    let service = QueryService::new(storage);

    let categories = service
        .query(&QueryRequest::new("quicksave", "log-categories"))
        .unwrap()
        .data;
    let total: u64 = categories
        .iter()
        .map(|category| category["entries"].as_u64().unwrap())
        .sum();
    assert_eq!(total, 4);
    assert_eq!(categories.last().unwrap()["id"], MISC);

    let entries_of = |id: &str| -> Vec<Value> {
        service
            .query(&QueryRequest::new("quicksave", format!("log.{}", id)))
            .unwrap()
            .data
    };

    let missions = entries_of("missions");
    assert_eq!(missions.len(), 1);
    assert_eq!(missions[0]["title"], "Ocean of Fantasy");

    let emergencies = entries_of("emergency");
    assert_eq!(emergencies[0]["target"], "station:[0x16]");
    assert_eq!(entries_of("trade")[0]["target"], "ship:[0x13]");
    assert_eq!(entries_of(MISC)[0]["title"], "Something else");
}
