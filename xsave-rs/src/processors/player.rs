//! Fills the player profile with the known blueprints and the owned wares.
use crate::components::ComponentData;
use crate::processors::ProcessingContext;
use crate::xml::tree::XmlNode;

pub(crate) fn process_blueprints(
    fragment: &XmlNode,
    context: &mut ProcessingContext,
) -> anyhow::Result<()> {
    let known: Vec<String> = fragment
        .children_named("blueprint")
        .filter_map(|blueprint| blueprint.attr("ware"))
        .filter(|ware| !ware.is_empty())
        .map(str::to_owned)
        .collect();

    update_player(context, |data| {
        if let ComponentData::Player { blueprints, .. } = data {
            blueprints.extend(known);
        }
    })
}

pub(crate) fn process_inventory(
    fragment: &XmlNode,
    context: &mut ProcessingContext,
) -> anyhow::Result<()> {
    let mut owned = Vec::new();
    for ware in fragment.children_named("ware") {
        let id = ware.attr_or_empty("ware");
        if id.is_empty() {
            continue;
        }
        let amount = match ware.attr("amount") {
            Some(amount) => amount
                .parse::<i64>()
                .map_err(|_| anyhow::anyhow!("Invalid amount '{}' for ware {}", amount, id))?,
            None => 1,
        };
        owned.push((id.to_owned(), amount));
    }

    update_player(context, |data| {
        if let ComponentData::Player { wares, .. } = data {
            for (ware, amount) in owned {
                *wares.entry(ware).or_default() += amount;
            }
        }
    })
}

fn update_player<F>(context: &mut ProcessingContext, update: F) -> anyhow::Result<()>
where
    F: FnOnce(&mut ComponentData),
{
    let id = context.player()?;
    if let Some(player) = context.collections.get_mut(&id) {
        update(player.data_mut());
    }

    Ok(())
}
