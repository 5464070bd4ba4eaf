use modhost_schema::{Manifest, PackageId};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("circular dependency: {}", format_cycle(.cycle))]
    CircularDependency { cycle: Vec<PackageId> },
    #[error("duplicate package id '{0}'")]
    DuplicateId(PackageId),
}

fn format_cycle(cycle: &[PackageId]) -> String {
    cycle
        .iter()
        .map(PackageId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Visiting,
    Done,
}

struct Walk<'a> {
    manifests: &'a [Manifest],
    index: HashMap<&'a str, usize>,
    marks: Vec<Mark>,
    stack: Vec<usize>,
    order: Vec<usize>,
}

impl Walk<'_> {
    fn visit(&mut self, i: usize) -> Result<(), ResolveError> {
        match self.marks[i] {
            Mark::Done => return Ok(()),
            Mark::Visiting => {
                let start = self.stack.iter().position(|&s| s == i).unwrap_or(0);
                let mut cycle: Vec<PackageId> = self.stack[start..]
                    .iter()
                    .map(|&s| self.manifests[s].id.clone())
                    .collect();
                cycle.push(self.manifests[i].id.clone());
                return Err(ResolveError::CircularDependency { cycle });
            }
            Mark::Unvisited => {}
        }

        self.marks[i] = Mark::Visiting;
        self.stack.push(i);
        let manifests = self.manifests;
        for dep in &manifests[i].dependencies {
            if let Some(&j) = self.index.get(dep.as_str()) {
                self.visit(j)?;
            } else {
                warn!(
                    "package '{}' depends on missing package '{dep}'",
                    manifests[i].id
                );
            }
        }
        self.stack.pop();
        self.marks[i] = Mark::Done;
        self.order.push(i);
        Ok(())
    }
}

/// Order manifests so every dependency precedes its dependents.
///
/// Depth-first, visiting roots in input order, so unrelated packages keep
/// their discovery order. Missing dependencies are logged and ignored; a
/// cycle fails the whole batch. `load_order` is stamped with each manifest's
/// position in the result.
pub fn resolve(manifests: Vec<Manifest>) -> Result<Vec<Manifest>, ResolveError> {
    let order = {
        let mut index = HashMap::with_capacity(manifests.len());
        for (i, m) in manifests.iter().enumerate() {
            if index.insert(m.id.as_str(), i).is_some() {
                return Err(ResolveError::DuplicateId(m.id.clone()));
            }
        }
        let mut walk = Walk {
            manifests: &manifests,
            index,
            marks: vec![Mark::Unvisited; manifests.len()],
            stack: Vec::new(),
            order: Vec::with_capacity(manifests.len()),
        };
        for i in 0..manifests.len() {
            walk.visit(i)?;
        }
        walk.order
    };

    let mut slots: Vec<Option<Manifest>> = manifests.into_iter().map(Some).collect();
    let mut resolved = Vec::with_capacity(slots.len());
    for (rank, i) in order.into_iter().enumerate() {
        if let Some(mut manifest) = slots[i].take() {
            manifest.load_order = rank;
            debug!("load order {rank}: {}", manifest.id);
            resolved.push(manifest);
        }
    }
    Ok(resolved)
}
