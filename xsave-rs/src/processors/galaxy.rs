//! Builds the component graph of a single cluster of the galaxy.
//!
//! The universe is a deeply nested sequence of `<connection>` / `<component>` pairs:
//!
//! ```xml
//! <connection connection="cluster_01_connection">
//!   <component class="cluster" macro="cluster_01_macro" id="[0x10]">
//!     <connections>
//!       <connection connection="cluster_01_sector001_connection">
//!         <component class="sector" owner="argon" id="[0x11]">
//!           ...
//! ```
//!
//! The **class** of a component determines which typed component is created. Some classes (like
//! a cockpit or a docking bay) don't produce a component but their children are attached to the
//! closest typed ancestor. All other classes are skipped along with their subtree, as these
//! are things like weapons or engines which we don't track.
use crate::components::{ComponentData, ComponentId, ComponentType, PersonRole};
use crate::processors::ProcessingContext;
use crate::xml::tree::XmlNode;

/// Describes where within the graph we currently are.
#[derive(Clone, Default)]
struct Scope {
    parent: Option<ComponentId>,
    in_cockpit: bool,
}

/// Describes what to do with a component of a given class.
enum Treatment {
    Create(ComponentData),
    PassThrough { cockpit: bool },
    Skip,
}

pub(crate) fn process(fragment: &XmlNode, context: &mut ProcessingContext) -> anyhow::Result<()> {
    if fragment.name() != "connection" {
        anyhow::bail!(
            "Expected a cluster connection but got <{}>",
            fragment.name()
        );
    }

    let before = context.collections.len();
    walk_connection(fragment, &Scope::default(), context);
    log::debug!(
        "Created {} components for {}",
        context.collections.len() - before,
        fragment.attr_or_empty("connection")
    );

    Ok(())
}

fn walk_connection(connection: &XmlNode, scope: &Scope, context: &mut ProcessingContext) {
    for component in connection.children_named("component") {
        if let Err(error) = walk_component(connection, component, scope, context) {
            log::warn!(
                "Skipping component {} ({}): {:#}",
                component.attr_or_empty("id"),
                component.attr_or_empty("class"),
                error
            );
        }
    }
}

fn walk_component(
    connection: &XmlNode,
    component: &XmlNode,
    scope: &Scope,
    context: &mut ProcessingContext,
) -> anyhow::Result<()> {
    let inner_scope = match treatment_of(component, scope) {
        Treatment::Skip => return Ok(()),
        Treatment::PassThrough { cockpit } => Scope {
            parent: scope.parent.clone(),
            in_cockpit: scope.in_cockpit || cockpit,
        },
        Treatment::Create(data) => {
            let id = context.collections.create_component(
                scope.parent.as_ref(),
                connection.attr_or_empty("connection"),
                component.attr_or_empty("id"),
                data,
            )?;
            on_created(&id, component, scope, context)?;
            Scope {
                parent: Some(id),
                in_cockpit: false,
            }
        }
    };

    for connections in component.children_named("connections") {
        for child in connections.children_named("connection") {
            walk_connection(child, &inner_scope, context);
        }
    }

    Ok(())
}

fn treatment_of(component: &XmlNode, scope: &Scope) -> Treatment {
    let class = component.attr_or_empty("class");
    let macro_name = component.attr_or_empty("macro");
    let code = component.attr_or_empty("code");

    match class {
        "cluster" => Treatment::Create(ComponentData::Cluster {
            macro_name: macro_name.to_owned(),
            code: code.to_owned(),
        }),
        "sector" => Treatment::Create(ComponentData::Sector {
            macro_name: macro_name.to_owned(),
            code: code.to_owned(),
            owner: component.attr_or_empty("owner").to_owned(),
        }),
        "zone" => Treatment::Create(ComponentData::Zone {
            macro_name: macro_name.to_owned(),
            code: code.to_owned(),
        }),
        "region" => Treatment::Create(ComponentData::Region {
            macro_name: macro_name.to_owned(),
            connections: region_connections(component),
        }),
        "celestialbody" => Treatment::Create(ComponentData::CelestialBody {
            macro_name: macro_name.to_owned(),
            code: code.to_owned(),
        }),
        "station" => Treatment::Create(ComponentData::Station {
            macro_name: macro_name.to_owned(),
            code: code.to_owned(),
            name: component.attr_or_empty("name").to_owned(),
            owner: component.attr_or_empty("owner").to_owned(),
            state: component.attr_or_empty("state").to_owned(),
        }),
        "npc" if scope.parent.is_some() => {
            let role = if scope.in_cockpit {
                PersonRole::Captain
            } else {
                PersonRole::parse(
                    component
                        .attr("post")
                        .unwrap_or_else(|| component.attr_or_empty("role")),
                )
            };
            Treatment::Create(ComponentData::person(
                component.attr_or_empty("name"),
                macro_name,
                role,
            ))
        }
        "cockpit" => Treatment::PassThrough { cockpit: true },
        "buildmodule" | "dockingbay" | "dockarea" | "storage" => {
            Treatment::PassThrough { cockpit: false }
        }
        ship if ship.starts_with("ship") => Treatment::Create(ComponentData::ship(
            macro_name,
            code,
            component.attr_or_empty("name"),
            component.attr_or_empty("owner"),
        )),
        _ => Treatment::Skip,
    }
}

/// Collects the connections of a region which lead to other regions.
fn region_connections(region: &XmlNode) -> Vec<String> {
    region
        .children_named("connections")
        .flat_map(|connections| connections.children_named("connection"))
        .flat_map(|connection| connection.children_named("connected"))
        .filter_map(|connected| connected.attr("connection"))
        .filter(|connection| !connection.is_empty())
        .map(str::to_owned)
        .collect()
}

fn on_created(
    id: &ComponentId,
    component: &XmlNode,
    scope: &Scope,
    context: &mut ProcessingContext,
) -> anyhow::Result<()> {
    match id.component_type() {
        ComponentType::Person if scope.in_cockpit => assign_pilot(scope, id, context),
        ComponentType::Ship | ComponentType::Station => {
            read_people(id, component, context);
            Ok(())
        }
        _ => Ok(()),
    }
}

fn assign_pilot(
    scope: &Scope,
    pilot: &ComponentId,
    context: &mut ProcessingContext,
) -> anyhow::Result<()> {
    let ship = match &scope.parent {
        Some(parent) if parent.component_type() == ComponentType::Ship => parent,
        _ => return Ok(()),
    };

    if let Some(ComponentData::Ship {
        pilot: ship_pilot, ..
    }) = context
        .collections
        .get_mut(ship)
        .map(|component| component.data_mut())
    {
        *ship_pilot = Some(pilot.clone());
    }

    Ok(())
}

/// Creates the (mostly anonymous) crew listed in the `<people>` block of a ship or station.
fn read_people(owner: &ComponentId, component: &XmlNode, context: &mut ProcessingContext) {
    for person in component
        .children_named("people")
        .flat_map(|people| people.children_named("person"))
    {
        let person_id = context.collections.next_person_id();
        let data = ComponentData::person(
            person.attr_or_empty("name"),
            person.attr_or_empty("macro"),
            PersonRole::parse(person.attr_or_empty("role")),
        );
        if let Err(error) =
            context
                .collections
                .create_component(Some(owner), "people", &person_id, data)
        {
            log::warn!("Skipping a person of {}: {:#}", owner, error);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::components::registry::Collections;
    use crate::components::{ComponentData, ComponentType, PersonRole};
    use crate::processors::{process_fragment, ProcessingContext};
    use crate::xml::actions::ProcessorId;
    use crate::xml::tree::XmlNode;

    const CLUSTER: &str = r#"
<connection connection="cluster_01_connection">
  <component class="cluster" macro="cluster_01_macro" code="AAA-100" id="[0x10]">
    <connections>
      <connection connection="cluster_01_sector001_connection">
        <component class="sector" macro="cluster_01_sector001_macro" owner="argon" id="[0x11]">
          <connections>
            <connection connection="zone001_connection">
              <component class="zone" macro="zone001_macro" id="[0x12]">
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
                        <connection connection="con_weapon_01">
                          <component class="weapon" macro="weapon_gen_m_laser_01_macro" id="[0x16]"/>
                        </connection>
                      </connections>
                      <people>
                        <person role="service" macro="character_teladi_male_01_macro"/>
                        <person role="marine" macro="character_split_female_01_macro" name="Dal Busta"/>
                      </people>
                    </component>
                  </connection>
                  <connection connection="stations">
                    <component class="station" macro="station_arg_wharf_macro" owner="argon" name="Wharf" id="">
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
    </connections>
  </component>
</connection>"#;

    fn process() -> Collections {
        let folder = tempfile::tempdir().unwrap();
        let mut collections = Collections::new();
        let mut context = ProcessingContext::new(&mut collections, folder.path());
        let fragment = XmlNode::parse_str(CLUSTER).unwrap();
        process_fragment(ProcessorId::Cluster, &fragment, &mut context).unwrap();

        collections
    }

    #[test]
    fn the_graph_is_built_along_the_connections() {
        let collections = process();

        let cluster = collections.resolve("cluster:[0x10]").unwrap();
        assert_eq!(cluster.connection_id(), "cluster_01_connection");
        assert_eq!(cluster.children(ComponentType::Sector).len(), 1);
        assert_eq!(cluster.children(ComponentType::Region).len(), 1);

        let ship = collections.resolve("ship:[0x13]").unwrap();
        assert_eq!(ship.parent().unwrap().to_string(), "zone:[0x12]");
        match ship.data() {
            ComponentData::Ship {
                build_faction,
                size,
                hull,
                pilot,
                ..
            } => {
                assert_eq!(build_faction, "arg");
                assert_eq!(size, "m");
                assert_eq!(hull, "frigate");
                assert_eq!(pilot.as_ref().unwrap().to_string(), "person:[0x15]");
            }
            _ => panic!("Expected a ship"),
        }

        // The pilot is attached to the ship itself, as the cockpit is no component on its own.
        let pilot = collections.resolve("person:[0x15]").unwrap();
        assert_eq!(pilot.parent(), Some(ship.id()));
        assert_eq!(ship.children(ComponentType::Person).len(), 3);
    }

    #[test]
    fn unknown_classes_and_broken_components_are_skipped() {
        let collections = process();

        assert!(collections.find_by_component_id("[0x14]").is_none());
        assert!(collections.find_by_component_id("[0x16]").is_none());

        // The station has no id and is therefore skipped, without affecting its siblings...
        assert!(collections.collection(ComponentType::Station).is_empty());
        assert_eq!(collections.collection(ComponentType::Ship).len(), 1);
    }

    #[test]
    fn crew_members_are_numbered_and_classified() {
        let collections = process();

        let service = collections.resolve("person:person-1").unwrap();
        match service.data() {
            ComponentData::Person {
                role,
                anonymous,
                race,
                ..
            } => {
                assert_eq!(*role, PersonRole::Service);
                assert!(*anonymous);
                assert_eq!(race, "teladi");
            }
            _ => panic!("Expected a person"),
        }

        let marine = collections.resolve("person:person-2").unwrap();
        assert_eq!(marine.to_json()["role"], "marine");
        assert_eq!(marine.to_json()["anonymous"], false);
    }

    #[test]
    fn region_connections_are_kept_as_local_ids() {
        let collections = process();

        let region = collections.resolve("region:[0x20]").unwrap();
        assert_eq!(
            region.to_json()["connections"][0],
            "region_02_connection"
        );
        assert!(collections.region_connections(region.id()).is_empty());
    }
}
