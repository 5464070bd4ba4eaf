//! Cooperative hot reload. Nothing here runs on its own: the host calls
//! [`HotReloadTracker::tick`] when it has a moment (a frame boundary, the
//! window regaining focus, a timer in the CLI's watch loop).

use crate::config::ModHostConfig;
use crate::events::ModEvent;
use crate::manager::ModManager;
use modhost_schema::PackageId;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// What one tick did.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct TickReport {
    /// Newly noticed changes, scheduled for a later tick.
    pub queued: Vec<PackageId>,
    pub reloaded: Vec<PackageId>,
    pub failed: Vec<PackageId>,
}

impl TickReport {
    pub fn is_idle(&self) -> bool {
        self.queued.is_empty() && self.reloaded.is_empty() && self.failed.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct HotReloadTracker {
    delay_ticks: u32,
    /// Package id -> ticks left before its reload runs.
    pending: BTreeMap<PackageId, u32>,
}

impl Default for HotReloadTracker {
    fn default() -> Self {
        Self::new(1)
    }
}

impl HotReloadTracker {
    /// `delay_ticks` is how many further ticks a detected change waits;
    /// `0` reloads in the tick that noticed it.
    pub fn new(delay_ticks: u32) -> Self {
        Self {
            delay_ticks,
            pending: BTreeMap::new(),
        }
    }

    pub fn from_config(config: &ModHostConfig) -> Self {
        Self::new(config.reload_delay_ticks)
    }

    pub fn pending(&self) -> impl Iterator<Item = &PackageId> {
        self.pending.keys()
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.pending.contains_key(id)
    }

    /// Queue newly changed packages, then reload every package whose delay
    /// has run out, as one batch in load order.
    pub fn tick(&mut self, manager: &mut ModManager) -> TickReport {
        let mut report = TickReport::default();

        for id in manager.detect_changed_packages() {
            if !self.pending.contains_key(&id) {
                debug!("change detected in '{id}'; reloading in {} tick(s)", self.delay_ticks);
                self.pending.insert(id.clone(), self.delay_ticks);
                report.queued.push(id);
            }
        }

        let mut due = Vec::new();
        self.pending.retain(|id, remaining| {
            if *remaining == 0 {
                due.push(id.clone());
                false
            } else {
                *remaining -= 1;
                true
            }
        });
        if due.is_empty() {
            return report;
        }

        let order = manager.loaded_ids();
        due.retain(|id| manager.is_loaded(id));
        due.sort_by_key(|id| order.iter().position(|o| o == id));

        for id in due {
            match manager.reload(&id) {
                Ok(()) => report.reloaded.push(id),
                Err(_) => report.failed.push(id),
            }
        }

        if !report.reloaded.is_empty() {
            info!("hot reload batch: {} package(s)", report.reloaded.len());
            manager
                .events_mut()
                .emit(&ModEvent::BatchReloaded(report.reloaded.clone()));
        }
        report
    }
}
