use super::{json_pretty, EXIT_SUCCESS};
use modhost_core::{resolve, ModHostConfig};
use modhost_schema::{discover_with, PackageId};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct OrderEntry {
    load_order: usize,
    id: PackageId,
    enabled: bool,
    dependencies: Vec<PackageId>,
}

pub fn run(config: &ModHostConfig, json: bool) -> Result<u8, String> {
    let discovery =
        discover_with(&config.mods_root, &config.manifest_file).map_err(|e| e.to_string())?;
    let ordered =
        resolve(discovery.manifests).map_err(|e| format!("resolve error: {e}"))?;

    let entries: Vec<OrderEntry> = ordered
        .into_iter()
        .map(|m| OrderEntry {
            load_order: m.load_order,
            id: m.id,
            enabled: m.enabled,
            dependencies: m.dependencies,
        })
        .collect();

    if json {
        println!("{}", json_pretty(&entries)?);
    } else {
        for e in &entries {
            let suffix = if e.enabled { "" } else { " (disabled)" };
            println!("{:>4}  {}{suffix}", e.load_order, e.id);
        }
    }
    Ok(EXIT_SUCCESS)
}
