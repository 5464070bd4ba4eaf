use super::{print_summary, OpenCatalog, EXIT_SUCCESS};
use modhost_core::{shutdown_requested, HotReloadTracker, ModEvent, ModHostConfig, ModManager};
use modhost_registry::AssetStore;
use std::thread;
use std::time::Duration;
use tracing::info;

pub fn run(
    config: ModHostConfig,
    interval_ms: u64,
    ticks: Option<u64>,
    json: bool,
) -> Result<u8, String> {
    if !config.hot_reload {
        return Err("hot reload is disabled in the config (hot_reload = false)".to_owned());
    }
    let mut tracker = HotReloadTracker::from_config(&config);
    let mut manager = ModManager::new(config, OpenCatalog::default(), AssetStore::new());

    if !json {
        manager.events_mut().on_any(|event| match event {
            ModEvent::Reloaded(id) => println!("reloaded {id}"),
            ModEvent::LoadError { package, error } => println!("failed {package}: {error}"),
            ModEvent::BatchReloaded(ids) => println!("batch done ({} packages)", ids.len()),
            ModEvent::Loaded(_) | ModEvent::Unloaded(_) => {}
        });
    }

    let summary = manager.load_all().map_err(|e| e.to_string())?;
    if json {
        println!("{}", serde_json::to_string(&summary).map_err(|e| e.to_string())?);
    } else {
        print_summary(&manager, &summary);
        println!("watching {} (Ctrl-C to stop)", manager.config().mods_root.display());
    }

    let interval = Duration::from_millis(interval_ms);
    let mut elapsed = 0u64;
    while !shutdown_requested() && !ticks.is_some_and(|limit| elapsed >= limit) {
        thread::sleep(interval);
        elapsed += 1;
        let report = tracker.tick(&mut manager);
        if json && !report.is_idle() {
            println!("{}", serde_json::to_string(&report).map_err(|e| e.to_string())?);
        }
    }

    let unloaded = manager.unload_all();
    info!("stopped after {elapsed} ticks, unloaded {} packages", unloaded.len());
    if json {
        println!("{}", serde_json::json!({ "stopped": true, "ticks": elapsed }));
    } else {
        println!("stopped");
    }
    Ok(EXIT_SUCCESS)
}
