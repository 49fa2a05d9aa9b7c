//! Handles the `info` block at the head of a savegame.
use crate::components::ComponentData;
use crate::processors::ProcessingContext;
use crate::xml::tree::XmlNode;
use serde_json::json;

/// Contains the name of the file which receives the save metadata.
pub const SAVE_INFO_FILE: &str = "savegame-info.json";

pub(crate) fn process(info: &XmlNode, context: &mut ProcessingContext) -> anyhow::Result<()> {
    let save = info.child("save");
    let game = info.child("game");
    let player = info.child("player");

    let player_name = player.map(|player| player.attr_or_empty("name")).unwrap_or_default();
    let player_money = player
        .and_then(|player| player.attr("money"))
        .and_then(|money| money.parse::<i64>().ok())
        .unwrap_or_default();

    let document = json!({
        "name": save.map(|save| save.attr_or_empty("name")).unwrap_or_default(),
        "date": save
            .and_then(|save| save.attr("date"))
            .and_then(|date| date.parse::<i64>().ok()),
        "gameVersion": game.map(|game| game.attr_or_empty("version")).unwrap_or_default(),
        "gameBuild": game.map(|game| game.attr_or_empty("build")).unwrap_or_default(),
        "gameTime": game
            .and_then(|game| game.attr("time"))
            .and_then(|time| time.parse::<f64>().ok())
            .unwrap_or_default(),
        "playerName": player_name,
        "playerMoney": player_money,
    });
    crate::files::write_json(&context.json_folder.join(SAVE_INFO_FILE), &document)?;

    let id = context.player()?;
    if let Some(ComponentData::Player { name, money, .. }) = context
        .collections
        .get_mut(&id)
        .map(|component| component.data_mut())
    {
        *name = player_name.to_owned();
        *money = player_money;
    }

    log::debug!("Processed the save info of '{}'", document["name"]);
    Ok(())
}
