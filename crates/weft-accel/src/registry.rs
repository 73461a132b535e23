//! Capability registry built by probing a device's exports
//!
//! The registry is the single source of truth for "does this device implement
//! operation X over element type Y". It is populated exactly once, when the
//! engine takes ownership of a device, and consulted on every dispatch; a
//! missing entry routes the assignment to the host paths instead.

use std::collections::HashMap;

use weft_num::DType;

use crate::device::AccelDevice;
use crate::routine::{RoutineId, RoutineKind};

/// Map from (operation, element type) to the device routine implementing it.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    table: HashMap<(RoutineKind, DType), RoutineId>,
}

impl Registry {
    /// An empty registry (no accelerator support; every dispatch falls back).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build the registry from a device's export list.
    pub fn probe(device: &dyn AccelDevice) -> Self {
        let mut table = HashMap::new();
        for id in device.exports() {
            table.insert((id.kind, id.dtype), id);
        }
        tracing::debug!(
            device = device.name(),
            routines = table.len(),
            "capability_registry_probed"
        );
        Self { table }
    }

    /// Look up the routine for an (operation, element type) pair.
    pub fn lookup(&self, kind: RoutineKind, dtype: DType) -> Option<RoutineId> {
        self.table.get(&(kind, dtype)).copied()
    }

    /// True when the pair has a registered routine.
    pub fn supports(&self, kind: RoutineKind, dtype: DType) -> bool {
        self.table.contains_key(&(kind, dtype))
    }

    /// Number of registered routines.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// True when no routines are registered.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
