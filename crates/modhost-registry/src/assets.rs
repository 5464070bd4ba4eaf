use crate::value::Content;
use modhost_schema::{AssetKey, PackageId};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

/// Namespaced key → object store every loaded package writes into.
pub trait AssetRegistry {
    /// Last write wins.
    fn register(&mut self, key: AssetKey, value: Box<dyn Content>);

    fn get(&self, key: &str) -> Option<&dyn Content>;

    fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Returns whether the key was present.
    fn unregister(&mut self, key: &str) -> bool;

    /// Remove every key starting with `prefix`; returns how many went.
    fn unregister_by_prefix(&mut self, prefix: &str) -> usize;

    /// Every key, sorted.
    fn all_keys(&self) -> Vec<String>;
}

struct Entry {
    owner: PackageId,
    value: Box<dyn Content>,
}

/// In-memory [`AssetRegistry`] ordered by key, so prefix eviction is a range
/// scan.
#[derive(Default)]
pub struct AssetStore {
    entries: BTreeMap<String, Entry>,
}

impl AssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn owner(&self, key: &str) -> Option<&PackageId> {
        self.entries.get(key).map(|e| &e.owner)
    }

    fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.entries
            .range(prefix.to_owned()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect()
    }
}

impl AssetRegistry for AssetStore {
    fn register(&mut self, key: AssetKey, value: Box<dyn Content>) {
        let rendered = key.to_string();
        let owner = key.package().clone();
        if let Some(previous) = self.entries.get(&rendered) {
            if previous.owner == owner {
                debug!("overwriting asset '{rendered}'");
            } else {
                warn!(
                    "asset key collision on '{rendered}': owned by '{}', overwritten by '{owner}'",
                    previous.owner
                );
            }
        }
        self.entries.insert(rendered, Entry { owner, value });
    }

    fn get(&self, key: &str) -> Option<&dyn Content> {
        self.entries.get(key).map(|e| &*e.value)
    }

    fn unregister(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    fn unregister_by_prefix(&mut self, prefix: &str) -> usize {
        let doomed = self.keys_with_prefix(prefix);
        for key in &doomed {
            self.entries.remove(key);
        }
        if !doomed.is_empty() {
            debug!("evicted {} assets under '{prefix}'", doomed.len());
        }
        doomed.len()
    }

    fn all_keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

impl fmt::Debug for AssetStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(k, e)| (k, &e.value)))
            .finish()
    }
}
