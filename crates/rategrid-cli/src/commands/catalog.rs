use std::path::PathBuf;

use clap::Subcommand;
use rategrid_core::{Config, Property, RatePlan, RoomType};
use serde::Deserialize;

use super::{open_store, CliResult};

#[derive(Subcommand)]
pub enum CatalogAction {
    /// Import properties, room types and rate plans from a JSON file
    Import {
        /// JSON file with "properties", "room_types" and "rate_plans" arrays
        file: PathBuf,
    },
}

/// Reference data as exchanged with the property-management system.
#[derive(Debug, Default, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub properties: Vec<Property>,
    #[serde(default)]
    pub room_types: Vec<RoomType>,
    #[serde(default)]
    pub rate_plans: Vec<RatePlan>,
}

pub fn run(action: CatalogAction) -> CliResult {
    match action {
        CatalogAction::Import { file } => {
            let content = std::fs::read_to_string(&file)
                .map_err(|e| format!("cannot read {}: {e}", file.display()))?;
            let catalog: CatalogFile = serde_json::from_str(&content)?;

            let config = Config::load()?;
            let store = open_store(&config)?;
            for property in &catalog.properties {
                store.upsert_property(property)?;
            }
            for room_type in &catalog.room_types {
                store.upsert_room_type(room_type)?;
            }
            for rate_plan in &catalog.rate_plans {
                store.upsert_rate_plan(rate_plan)?;
            }
            println!(
                "imported {} property(ies), {} room type(s), {} rate plan(s)",
                catalog.properties.len(),
                catalog.room_types.len(),
                catalog.rate_plans.len()
            );
        }
    }
    Ok(())
}
