use super::{
    json_pretty, print_summary, spin_done, spinner, OpenCatalog, EXIT_FAILURE, EXIT_SUCCESS,
};
use modhost_core::{LoadSummary, ModHostConfig, ModManager};
use modhost_registry::AssetStore;
use modhost_schema::PackageId;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct PackageReport {
    id: PackageId,
    version: String,
    assets: Vec<String>,
    failed_files: Vec<String>,
}

#[derive(Debug, Serialize)]
struct CheckReport {
    ok: bool,
    summary: LoadSummary,
    packages: Vec<PackageReport>,
}

pub fn run(config: ModHostConfig, json: bool) -> Result<u8, String> {
    let mut manager = ModManager::new(config, OpenCatalog::default(), AssetStore::new());

    let pb = (!json).then(|| spinner("loading packages..."));
    let summary = manager.load_all().map_err(|e| e.to_string())?;
    if let Some(pb) = &pb {
        spin_done(pb, &format!("{} packages resolved", summary.order.len()));
    }

    let packages: Vec<PackageReport> = manager
        .loaded_ids()
        .iter()
        .filter_map(|id| manager.loaded_package(id))
        .map(|p| PackageReport {
            id: p.manifest.id.clone(),
            version: p.manifest.version.clone(),
            assets: p.asset_keys.iter().map(ToString::to_string).collect(),
            failed_files: p
                .failed_files
                .iter()
                .map(|f| f.display().to_string())
                .collect(),
        })
        .collect();
    let ok = summary.is_clean() && packages.iter().all(|p| p.failed_files.is_empty());

    if json {
        let report = CheckReport {
            ok,
            summary,
            packages,
        };
        println!("{}", json_pretty(&report)?);
    } else {
        print_summary(&manager, &summary);
    }

    Ok(if ok { EXIT_SUCCESS } else { EXIT_FAILURE })
}
