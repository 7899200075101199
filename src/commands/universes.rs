use comfy_table::{
    presets,
    Attribute,
    Cell,
    Color,
    ContentArrangement,
    Table,
};
use color_eyre::Result;
use ogame_stats_config::Config;
use ogame_stats_core::{
    http_client,
    DirectoryClient,
};

/// Prints the lobby's universes for `community` (the configured one by default).
pub async fn list_universes(config: &Config, community: Option<&str>) -> Result<()> {
    let community = community.map_or_else(|| config.community(), |c| c.trim().to_lowercase());
    let directory = DirectoryClient::new(config.http.lobby_url.clone(), http_client(&config.http)?);
    let universes = directory.resolve(&community).await?;
    info!(community = %community, count = universes.len(), "Universes listed");

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Server id").add_attribute(Attribute::Bold).fg(Color::Cyan),
            Cell::new("Name").add_attribute(Attribute::Bold),
            Cell::new("Base URL").add_attribute(Attribute::Bold),
        ]);
    for universe in &universes {
        table.add_row(vec![
            Cell::new(&universe.server_id),
            Cell::new(&universe.name),
            Cell::new(universe.base_url.as_str()),
        ]);
    }

    if universes.is_empty() {
        println!("No universe found for community {community:?}.");
    } else {
        println!("{table}");
    }
    Ok(())
}
