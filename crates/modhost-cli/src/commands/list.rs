use super::{dim, json_pretty, EXIT_SUCCESS};
use modhost_core::ModHostConfig;
use modhost_schema::{discover_with, PackageId};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ListedPackage {
    id: PackageId,
    name: String,
    version: String,
    author: String,
    enabled: bool,
    dependencies: Vec<PackageId>,
    conflicts: Vec<PackageId>,
    path: String,
}

#[derive(Debug, Serialize)]
struct Skipped {
    path: String,
    error: String,
}

#[derive(Debug, Serialize)]
struct Listing {
    mods_root: String,
    packages: Vec<ListedPackage>,
    skipped: Vec<Skipped>,
}

pub fn run(config: &ModHostConfig, json: bool) -> Result<u8, String> {
    let discovery =
        discover_with(&config.mods_root, &config.manifest_file).map_err(|e| e.to_string())?;

    let listing = Listing {
        mods_root: config.mods_root.display().to_string(),
        packages: discovery
            .manifests
            .into_iter()
            .map(|m| ListedPackage {
                path: m.root_path.display().to_string(),
                id: m.id,
                name: m.display_name,
                version: m.version,
                author: m.author,
                enabled: m.enabled,
                dependencies: m.dependencies,
                conflicts: m.conflicts,
            })
            .collect(),
        skipped: discovery
            .skipped
            .iter()
            .map(|(path, e)| Skipped {
                path: path.display().to_string(),
                error: e.to_string(),
            })
            .collect(),
    };

    if json {
        println!("{}", json_pretty(&listing)?);
        return Ok(EXIT_SUCCESS);
    }

    if listing.packages.is_empty() {
        println!("no packages found in {}", listing.mods_root);
    } else {
        println!("{:<28} {:<10} {:<8} NAME", "ID", "VERSION", "ENABLED");
        for p in &listing.packages {
            let enabled = if p.enabled { "yes" } else { "no" };
            println!("{:<28} {:<10} {:<8} {}", p.id, p.version, enabled, p.name);
        }
    }
    for s in &listing.skipped {
        println!("{}", dim(&format!("skipped {}: {}", s.path, s.error)));
    }
    Ok(EXIT_SUCCESS)
}
