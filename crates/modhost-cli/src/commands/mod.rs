pub mod check;
pub mod list;
pub mod order;
pub mod watch;

use indicatif::{ProgressBar, ProgressStyle};
use modhost_core::{LoadSummary, ModManager};
use modhost_registry::{TypeCatalog, TypeDescriptor, TypeRegistry};
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_MANIFEST_ERROR: u8 = 2;
pub const EXIT_RESOLVE_ERROR: u8 = 3;

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        pb.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
    }
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn spin_done(pb: &ProgressBar, msg: &str) {
    if let Ok(style) = ProgressStyle::with_template("{msg}") {
        pb.set_style(style);
    }
    pb.finish_with_message(msg.to_owned());
}

pub fn ok_mark() -> String {
    console::Style::new().green().apply_to("✓").to_string()
}

pub fn fail_mark() -> String {
    console::Style::new().red().apply_to("✗").to_string()
}

pub fn dim(text: &str) -> String {
    console::Style::new().dim().apply_to(text).to_string()
}

/// Content type the CLI binds every record to: it has no fields, so all of
/// a record's fields are ignored and only its shape is checked.
#[derive(Debug, Default)]
pub struct Untyped;

/// Type registry that knows every `$type` name. Lets the CLI load packages
/// without the host application's real content types.
pub struct OpenCatalog {
    known: TypeCatalog,
    fallback: TypeDescriptor,
}

impl Default for OpenCatalog {
    fn default() -> Self {
        Self {
            known: TypeCatalog::new(),
            fallback: TypeDescriptor::builder::<Untyped>().build(),
        }
    }
}

impl TypeRegistry for OpenCatalog {
    fn register(&mut self, type_name: &str, descriptor: TypeDescriptor) {
        self.known.register(type_name, descriptor);
    }

    fn resolve_type(&self, type_name: &str) -> Option<&TypeDescriptor> {
        self.known.resolve_type(type_name).or(Some(&self.fallback))
    }
}

pub fn print_summary(manager: &ModManager, summary: &LoadSummary) {
    for id in &summary.loaded {
        let (assets, failed) = manager
            .loaded_package(id)
            .map_or((0, 0), |p| (p.asset_keys.len(), p.failed_files.len()));
        if failed == 0 {
            println!("{} {id} ({assets} assets)", ok_mark());
        } else {
            println!(
                "{} {id} ({assets} assets, {failed} files failed)",
                fail_mark()
            );
            if let Some(package) = manager.loaded_package(id) {
                for file in &package.failed_files {
                    println!("    {}", dim(&file.display().to_string()));
                }
            }
        }
    }
    for failed in &summary.failed {
        println!("{} {}: {}", fail_mark(), failed.id, failed.error);
    }
    for id in &summary.skipped_disabled {
        println!("- {id} {}", dim("(disabled)"));
    }
    for skipped in &summary.discovery_errors {
        println!("{} {}: {}", fail_mark(), skipped.path, skipped.error);
    }
}
