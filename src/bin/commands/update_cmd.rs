use anyhow::Result;
use geolens::{Config, DatabaseKind, GeoManager};
use serde_json::json;

use crate::cli_utils::http_manager;

pub fn cmd_update(config: Config, json_output: bool) -> Result<()> {
    let manager = http_manager(config);
    let result = manager.update_databases();
    print_status(&manager, json_output)?;
    result?;
    Ok(())
}

pub fn print_status(manager: &GeoManager, json_output: bool) -> Result<()> {
    let kinds = manager.config().enabled_kinds();

    if json_output {
        let databases: serde_json::Map<String, serde_json::Value> = kinds
            .iter()
            .map(|kind| {
                let entry = json!({
                    "status": manager.status(*kind),
                    "database_type": manager.metadata(*kind).map(|m| m.database_type),
                    "path": manager.config().database_path(*kind).display().to_string(),
                });
                (kind.to_string(), entry)
            })
            .collect();
        let output = json!({
            "loaded": manager.is_loaded(),
            "generation": manager.generation(),
            "databases": databases,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    for kind in DatabaseKind::ALL {
        if !kinds.contains(&kind) {
            println!("{:<8} disabled", kind);
            continue;
        }
        match manager.metadata(kind) {
            Some(metadata) => println!(
                "{:<8} {:?} ({}, {} nodes)",
                kind,
                manager.status(kind),
                metadata.database_type,
                metadata.node_count
            ),
            None => println!("{:<8} {:?}", kind, manager.status(kind)),
        }
    }
    Ok(())
}
