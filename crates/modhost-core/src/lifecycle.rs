use crate::CoreError;
use modhost_schema::PackageId;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum PackageState {
    Unloaded,
    Loaded,
}

impl std::fmt::Display for PackageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PackageState::Unloaded => write!(f, "unloaded"),
            PackageState::Loaded => write!(f, "loaded"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleOp {
    Load,
    Unload,
    Reload,
}

/// Check `op` against the package's current state and return the state it
/// leads to.
pub fn validate_transition(
    id: &str,
    from: PackageState,
    op: LifecycleOp,
) -> Result<PackageState, CoreError> {
    match (from, op) {
        (PackageState::Unloaded, LifecycleOp::Load) => Ok(PackageState::Loaded),
        (PackageState::Loaded, LifecycleOp::Unload) => Ok(PackageState::Unloaded),
        (PackageState::Loaded, LifecycleOp::Reload) => Ok(PackageState::Loaded),
        (PackageState::Loaded, LifecycleOp::Load) => {
            Err(CoreError::AlreadyLoaded(PackageId::from(id)))
        }
        (PackageState::Unloaded, LifecycleOp::Unload | LifecycleOp::Reload) => {
            Err(CoreError::NotLoaded(PackageId::from(id)))
        }
    }
}
