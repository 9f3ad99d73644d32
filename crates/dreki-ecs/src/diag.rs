//! Diagnostics snapshot of a [`Controller`].
//!
//! Enabled by the `diagnostics` feature flag. [`Controller::diagnostics`]
//! collects entity-pool, archetype and per-system statistics into a
//! [`ControllerSnapshot`], which serializes to JSON for external tooling.
//!
//! Structural counters cover the changes made between the end of the
//! previous tick and the end of the most recent one. System timings describe
//! the most recent tick.

use serde::Serialize;

use crate::controller::Controller;
use crate::error::{EcsError, EcsResult};

/// Structural changes counted up to the end of a tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StructuralCounters {
    pub created: u64,
    pub destroyed: u64,
    pub migrated: u64,
}

// ── Snapshot types ───────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize)]
pub struct ControllerSnapshot {
    /// Ticks completed when the snapshot was taken.
    pub tick: u64,
    pub entity_pool: EntityPoolSnapshot,
    pub last_tick: StructuralCounters,
    pub components: Vec<String>,
    pub archetypes: Vec<ArchetypeSnapshot>,
    pub systems: Vec<SystemSnapshot>,
    /// System names grouped by stage, in execution order.
    pub stages: Vec<Vec<String>>,
}

#[derive(Clone, Debug, Serialize)]
pub struct EntityPoolSnapshot {
    pub total_slots: usize,
    pub free_count: usize,
    pub alive_count: usize,
    /// Share of slots that are free, in percent.
    pub fragmentation_pct: f32,
}

#[derive(Clone, Debug, Serialize)]
pub struct ArchetypeSnapshot {
    pub id: usize,
    pub entity_count: usize,
    pub component_names: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct SystemSnapshot {
    pub name: String,
    pub view: String,
    pub matching_archetypes: usize,
    pub duration_us: f64,
    pub ranges: usize,
    pub entities: usize,
}

impl ControllerSnapshot {
    pub(crate) fn collect(controller: &Controller) -> Self {
        let registry = controller.registry();
        let table = controller.entity_table();
        let total_slots = table.total_slots();
        let free_count = table.free_count();

        let systems = controller.system_entries();
        let stages = controller
            .schedule()
            .stages()
            .iter()
            .map(|stage| {
                stage
                    .iter()
                    .map(|id| systems[id.index()].name.clone())
                    .collect()
            })
            .collect();

        Self {
            tick: controller.ticks(),
            entity_pool: EntityPoolSnapshot {
                total_slots,
                free_count,
                alive_count: table.alive_count(),
                fragmentation_pct: if total_slots == 0 {
                    0.0
                } else {
                    free_count as f32 / total_slots as f32 * 100.0
                },
            },
            last_tick: controller.last_tick_counters(),
            components: registry.iter().map(|info| info.name().to_string()).collect(),
            archetypes: controller
                .archetypes()
                .iter()
                .map(|a| ArchetypeSnapshot {
                    id: a.id().index(),
                    entity_count: a.len(),
                    component_names: a
                        .signature()
                        .names(registry)
                        .into_iter()
                        .map(String::from)
                        .collect(),
                })
                .collect(),
            systems: systems
                .iter()
                .map(|entry| SystemSnapshot {
                    name: entry.name.clone(),
                    view: entry.view.describe(registry),
                    matching_archetypes: entry.matching.len(),
                    duration_us: entry.timing.duration_us,
                    ranges: entry.timing.ranges,
                    entities: entry.timing.entities,
                })
                .collect(),
            stages,
        }
    }

    pub fn to_json(&self) -> EcsResult<String> {
        serde_json::to_string(self).map_err(EcsError::Snapshot)
    }
}
