//! # Controller — Entities, Archetypes and the Tick Loop
//!
//! The [`Controller`] owns everything for one scene and is the only thing
//! that knows where an entity lives.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ Controller                                               │
//! │                                                          │
//! │  registry:   ComponentRegistry (type → dense index)      │
//! │  entities:   EntityTable (Entity → archetype + row)      │
//! │  archetypes: Vec<Archetype>, indexed by ArchetypeId      │
//! │  by_signature: HashMap<Signature, ArchetypeId>           │
//! │  systems:    Vec<SystemEntry> + conflict-free Schedule   │
//! │  commands:   Commands queued for the next sync point     │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Structural Changes
//!
//! - **create** validates the component set, finds or creates the archetype,
//!   appends the row and records the location.
//! - **destroy** swap-removes the row, then corrects the location of the
//!   entity that was moved into the hole.
//! - **add/remove component** migrates the entity: the destination is
//!   reserved first, every shared component is moved pool to pool, the added
//!   component is pushed (or the removed one taken out), and both the moved
//!   entity and the entity swapped into its old row get new locations. After
//!   the reserve nothing can fail, so an entity is never in two archetypes
//!   or in none.
//!
//! Archetypes are created on first need and never torn down.
//!
//! ## Errors
//!
//! The plain methods panic on contract violations (stale handle, component
//! set that doesn't match, unregistered type). Each has a `try_*` twin that
//! returns the [`EcsError`] instead.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;

use crate::archetype::{Archetype, ArchetypeId, Migration, two_mut};
use crate::bundle::{Bundle, RawComponent};
use crate::commands::{Command, Commands};
use crate::component::Component;
use crate::config::{ControllerConfig, FlushPolicy};
use crate::entity::{Entity, EntityTable, Location};
use crate::error::{EcsError, EcsResult};
use crate::pool::{BoxedComponent, ComponentPool};
use crate::registry::{ComponentIndex, ComponentRegistry};
use crate::schedule::{Schedule, ScheduleNode};
use crate::signature::Signature;
use crate::system::{System, SystemEntry, SystemId};
use crate::view::{ComponentRange, View, ViewSignature};

#[cfg(feature = "diagnostics")]
use crate::diag::StructuralCounters;

/// Owns all entities, archetypes and systems of one scene.
pub struct Controller {
    registry: ComponentRegistry,
    config: ControllerConfig,
    entities: EntityTable,
    archetypes: Vec<Archetype>,
    by_signature: HashMap<Signature, ArchetypeId>,
    systems: Vec<SystemEntry>,
    schedule: Schedule,
    commands: Commands,
    ticks: u64,
    #[cfg(feature = "diagnostics")]
    counters: StructuralCounters,
    #[cfg(feature = "diagnostics")]
    last_tick_counters: StructuralCounters,
}

impl Controller {
    /// Create a controller over a fully bootstrapped registry.
    pub fn new(registry: ComponentRegistry) -> Self {
        Self::with_config(registry, ControllerConfig::default())
    }

    pub fn with_config(registry: ComponentRegistry, config: ControllerConfig) -> Self {
        log::debug!(
            "controller created with {} component types, config {:?}",
            registry.len(),
            config
        );
        Self {
            registry,
            config,
            entities: EntityTable::new(),
            archetypes: Vec::new(),
            by_signature: HashMap::new(),
            systems: Vec::new(),
            schedule: Schedule::default(),
            commands: Commands::new(),
            ticks: 0,
            #[cfg(feature = "diagnostics")]
            counters: StructuralCounters::default(),
            #[cfg(feature = "diagnostics")]
            last_tick_counters: StructuralCounters::default(),
        }
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Registering more types later is fine: existing indices never change.
    pub fn registry_mut(&mut self) -> &mut ComponentRegistry {
        &mut self.registry
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: ControllerConfig) {
        self.config = config;
    }

    /// Number of completed ticks.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    // ── Archetypes ───────────────────────────────────────────────────

    pub fn archetypes(&self) -> &[Archetype] {
        &self.archetypes
    }

    /// # Panics
    ///
    /// Panics if `id` belongs to another controller.
    pub fn archetype(&self, id: ArchetypeId) -> &Archetype {
        &self.archetypes[id.index()]
    }

    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    pub fn find_archetype(&self, signature: &Signature) -> Option<ArchetypeId> {
        self.by_signature.get(signature).copied()
    }

    /// The archetype for `signature`, created if it doesn't exist yet.
    pub fn get_or_create_archetype(&mut self, signature: Signature) -> ArchetypeId {
        if let Some(&id) = self.by_signature.get(&signature) {
            return id;
        }
        let id = ArchetypeId::new(self.archetypes.len());
        log::debug!(
            "created archetype {:?} [{}]",
            id,
            signature.names(&self.registry).join(", ")
        );
        for entry in &mut self.systems {
            if entry.view.matches(&signature) {
                entry.matching.push(id);
            }
        }
        self.archetypes.push(Archetype::new(
            id,
            signature.clone(),
            &self.registry,
            self.config.initial_capacity,
        ));
        self.by_signature.insert(signature, id);
        id
    }

    // ── Entity Lifecycle ─────────────────────────────────────────────

    /// Number of live entities.
    pub fn entity_count(&self) -> usize {
        self.entities.alive_count()
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    /// Where `entity` lives right now. Rows change on any removal from the
    /// same archetype, so don't keep this across structural changes.
    pub fn location(&self, entity: Entity) -> Option<Location> {
        self.entities.location(entity)
    }

    /// Create an entity from a typed bundle.
    ///
    /// # Panics
    ///
    /// Panics if a type is unregistered or appears twice.
    pub fn create_entity<B: Bundle>(&mut self, bundle: B) -> Entity {
        self.try_create_entity(bundle)
            .unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn try_create_entity<B: Bundle>(&mut self, bundle: B) -> EcsResult<Entity> {
        let indices = B::type_ids()
            .into_iter()
            .zip(B::type_names())
            .map(|(type_id, name)| {
                self.registry
                    .try_index_of(type_id)
                    .ok_or(EcsError::UnregisteredComponent(name))
            })
            .collect::<EcsResult<Vec<_>>>()?;
        let signature = self.check_type_set(&indices)?;
        let archetype = self.get_or_create_archetype(signature);

        let entity = self.allocate(archetype);
        let row = self.archetypes[archetype.index()].add_bundle(entity, bundle, &self.registry);
        debug_assert_eq!(self.entities.location(entity).map(|l| l.row), Some(row));
        Ok(entity)
    }

    /// Create an entity from an unordered list of type-erased components,
    /// the way a scene loader does.
    ///
    /// # Panics
    ///
    /// Panics if a type is unregistered or appears twice.
    pub fn create_entity_raw(&mut self, components: Vec<RawComponent>) -> Entity {
        self.try_create_entity_raw(components)
            .unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn try_create_entity_raw(&mut self, components: Vec<RawComponent>) -> EcsResult<Entity> {
        let indices = self.resolve(&components)?;
        let signature = self.check_type_set(&indices)?;
        let archetype = self.get_or_create_archetype(signature);
        Ok(self.insert_raw(archetype, components))
    }

    /// Create an entity with no components.
    pub fn create_empty_entity(&mut self) -> Entity {
        let archetype = self.get_or_create_archetype(Signature::empty());
        self.insert_raw(archetype, Vec::new())
    }

    /// Create an entity in a known archetype. The component list must match
    /// the archetype's signature exactly.
    ///
    /// # Panics
    ///
    /// Panics on a mismatch, see
    /// [`try_create_entity_in`](Self::try_create_entity_in).
    pub fn create_entity_in(
        &mut self,
        archetype: ArchetypeId,
        components: Vec<RawComponent>,
    ) -> Entity {
        self.try_create_entity_in(archetype, components)
            .unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn try_create_entity_in(
        &mut self,
        archetype: ArchetypeId,
        components: Vec<RawComponent>,
    ) -> EcsResult<Entity> {
        let indices = self.resolve(&components)?;
        let signature = self
            .archetypes
            .get(archetype.index())
            .ok_or(EcsError::UnknownArchetype(archetype))?
            .signature();
        if !signature.matches_components_unsorted(&indices) {
            return Err(EcsError::SignatureMismatch {
                expected: signature
                    .iter()
                    .map(|i| self.registry.info(i).type_name())
                    .collect(),
                supplied: components.iter().map(RawComponent::type_name).collect(),
            });
        }
        Ok(self.insert_raw(archetype, components))
    }

    /// Destroy an entity, dropping its components and freeing its id.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn destroy_entity(&mut self, entity: Entity) {
        self.try_destroy_entity(entity)
            .unwrap_or_else(|e| panic!("{e}"));
    }

    pub fn try_destroy_entity(&mut self, entity: Entity) -> EcsResult<()> {
        let location = self
            .entities
            .free(entity)
            .ok_or(EcsError::StaleEntity(entity))?;
        let archetype = &mut self.archetypes[location.archetype.index()];
        if let Some(swapped) = archetype.remove_entity(location.row) {
            self.entities.set_row(swapped, location.row);
        }
        log::trace!("destroyed {entity:?} from {:?}", location.archetype);
        #[cfg(feature = "diagnostics")]
        {
            self.counters.destroyed += 1;
        }
        Ok(())
    }

    fn resolve(&self, components: &[RawComponent]) -> EcsResult<Vec<ComponentIndex>> {
        components
            .iter()
            .map(|raw| {
                self.registry
                    .try_index_of(raw.type_id())
                    .ok_or(EcsError::UnregisteredComponent(raw.type_name()))
            })
            .collect()
    }

    /// Signature of a supplied component list, rejecting duplicates.
    fn check_type_set(&self, indices: &[ComponentIndex]) -> EcsResult<Signature> {
        let signature = Signature::from_indices(indices.iter().copied());
        if signature.matches_components_unsorted(indices) {
            return Ok(signature);
        }
        let mut seen = Signature::empty();
        for &index in indices {
            if seen.has(index) {
                return Err(EcsError::DuplicateComponent(
                    self.registry.info(index).type_name(),
                ));
            }
            seen = seen.with(index);
        }
        unreachable!("a list without duplicates always matches its own signature")
    }

    fn allocate(&mut self, archetype: ArchetypeId) -> Entity {
        let row = self.archetypes[archetype.index()].len();
        let entity = self.entities.allocate(Location { archetype, row });
        log::trace!("created {entity:?} in {archetype:?}");
        #[cfg(feature = "diagnostics")]
        {
            self.counters.created += 1;
        }
        entity
    }

    fn insert_raw(&mut self, archetype: ArchetypeId, components: Vec<RawComponent>) -> Entity {
        let entity = self.allocate(archetype);
        let row =
            self.archetypes[archetype.index()].add_entity(entity, components, &self.registry);
        debug_assert_eq!(self.entities.location(entity).map(|l| l.row), Some(row));
        entity
    }

    fn live_location(&self, entity: Entity) -> EcsResult<Location> {
        self.entities
            .location(entity)
            .ok_or(EcsError::StaleEntity(entity))
    }

    // ── Component Access ─────────────────────────────────────────────

    /// Shared reference to `entity`'s `T`, or `None` if the entity is dead
    /// or doesn't have one.
    pub fn get_component<T: Component>(&self, entity: Entity) -> Option<&T> {
        let location = self.entities.location(entity)?;
        let index = self.registry.try_index_of(TypeId::of::<T>())?;
        let pool = self.archetypes[location.archetype.index()].try_pool(index)?;
        Some(pool.get::<T>(location.row))
    }

    pub fn get_component_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        let location = self.entities.location(entity)?;
        let index = self.registry.try_index_of(TypeId::of::<T>())?;
        let archetype = &mut self.archetypes[location.archetype.index()];
        if !archetype.has_component(index) {
            return None;
        }
        Some(archetype.pool_mut(index).get_mut::<T>(location.row))
    }

    pub fn has_component<T: Component>(&self, entity: Entity) -> bool {
        self.get_component::<T>(entity).is_some()
    }

    // ── Migration ────────────────────────────────────────────────────

    /// Add `value` to `entity`, moving it to the archetype with `T` added.
    /// If the entity already has a `T` it is replaced in place.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale or `T` is unregistered.
    pub fn add_component<T: Component>(&mut self, entity: Entity, value: T) {
        self.try_add_component(entity, value)
            .unwrap_or_else(|e| panic!("{e}"));
    }

    pub fn try_add_component<T: Component>(&mut self, entity: Entity, value: T) -> EcsResult<()> {
        let location = self.live_location(entity)?;
        let index = self.registry.try_index::<T>()?;
        let archetype = &mut self.archetypes[location.archetype.index()];
        if archetype.has_component(index) {
            *archetype.pool_mut(index).get_mut::<T>(location.row) = value;
            return Ok(());
        }
        self.migrate_adding(entity, location, index, |pool| pool.push(value));
        Ok(())
    }

    /// Type-erased [`add_component`](Self::add_component), for loaders and
    /// command buffers.
    pub fn add_component_raw(&mut self, entity: Entity, component: RawComponent) -> EcsResult<()> {
        let location = self.live_location(entity)?;
        let index = self
            .registry
            .try_index_of(component.type_id())
            .ok_or(EcsError::UnregisteredComponent(component.type_name()))?;
        let archetype = &mut self.archetypes[location.archetype.index()];
        if archetype.has_component(index) {
            archetype
                .pool_mut(index)
                .set_boxed(location.row, component.into_value());
            return Ok(());
        }
        self.migrate_adding(entity, location, index, |pool| {
            pool.push_boxed(component.into_value())
        });
        Ok(())
    }

    /// Remove `entity`'s `T` and return it, moving the entity to the
    /// archetype without `T`. Returns `None` if it had no `T`.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale or `T` is unregistered.
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> Option<T> {
        self.try_remove_component(entity)
            .unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn try_remove_component<T: Component>(&mut self, entity: Entity) -> EcsResult<Option<T>> {
        let location = self.live_location(entity)?;
        let index = self.registry.try_index::<T>()?;
        Ok(self
            .migrate_removing(entity, location, index)
            .and_then(|boxed| boxed.downcast::<T>().ok())
            .map(|boxed| *boxed))
    }

    /// Type-erased [`remove_component`](Self::remove_component).
    pub fn remove_component_raw(
        &mut self,
        entity: Entity,
        type_id: TypeId,
    ) -> EcsResult<Option<BoxedComponent>> {
        let location = self.live_location(entity)?;
        let index = self
            .registry
            .try_index_of(type_id)
            .ok_or(EcsError::UnregisteredTypeId(type_id))?;
        Ok(self.migrate_removing(entity, location, index))
    }

    fn migrate_adding(
        &mut self,
        entity: Entity,
        location: Location,
        index: ComponentIndex,
        push: impl FnOnce(&mut dyn ComponentPool),
    ) {
        let signature = self.archetypes[location.archetype.index()]
            .signature()
            .with(index);
        let target = self.get_or_create_archetype(signature);
        let moved = self.migrate(entity, location, target);
        debug_assert!(moved.leftovers.is_empty());
        push(self.archetypes[target.index()].pool_mut(index));
    }

    fn migrate_removing(
        &mut self,
        entity: Entity,
        location: Location,
        index: ComponentIndex,
    ) -> Option<BoxedComponent> {
        let source = &self.archetypes[location.archetype.index()];
        if !source.has_component(index) {
            return None;
        }
        let signature = source.signature().without(index);
        let target = self.get_or_create_archetype(signature);
        let moved = self.migrate(entity, location, target);
        moved.leftovers.into_iter().next().map(|(_, value)| value)
    }

    /// Move `entity` from `from` into `to` and fix both affected locations.
    /// The caller pushes whatever component `to` has that `from` lacks.
    fn migrate(&mut self, entity: Entity, from: Location, to: ArchetypeId) -> Migration {
        let (src, dst) = two_mut(&mut self.archetypes, from.archetype, to);
        dst.reserve(1);
        let moved = src.migrate(from.row, dst);
        if let Some(swapped) = moved.swapped {
            self.entities.set_row(swapped, from.row);
        }
        self.entities.set_location(
            entity,
            Location {
                archetype: to,
                row: moved.row,
            },
        );
        log::trace!(
            "migrated {entity:?} {:?}:{} -> {:?}:{}",
            from.archetype,
            from.row,
            to,
            moved.row
        );
        #[cfg(feature = "diagnostics")]
        {
            self.counters.migrated += 1;
        }
        moved
    }

    // ── Systems ──────────────────────────────────────────────────────

    /// Register a system. It runs every tick until the controller is dropped.
    ///
    /// # Panics
    ///
    /// Panics if the system's view names an unregistered type or the same
    /// type twice.
    pub fn register_system<S: System>(&mut self, system: S) -> SystemId {
        self.try_register_system(system)
            .unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn try_register_system<S: System>(&mut self, system: S) -> EcsResult<SystemId> {
        let view = ViewSignature::try_of::<S::View>(&self.registry)?;
        let id = SystemId::new(self.systems.len());
        let name = system.name();
        let matching = self
            .archetypes
            .iter()
            .filter(|a| view.matches(a.signature()))
            .map(Archetype::id)
            .collect();
        log::debug!(
            "registered system `{name}` as {id:?} over {}",
            view.describe(&self.registry)
        );
        self.systems.push(SystemEntry {
            id,
            name,
            view,
            matching,
            after: Vec::new(),
            system: Box::new(system),
            #[cfg(feature = "diagnostics")]
            timing: Default::default(),
        });
        self.rebuild_schedule()?;
        Ok(id)
    }

    /// Make `system` run after `dependency`. Rejected, and not recorded, if
    /// it would create a cycle.
    pub fn order_after(&mut self, system: SystemId, dependency: SystemId) -> EcsResult<()> {
        for id in [system, dependency] {
            if id.index() >= self.systems.len() {
                return Err(EcsError::UnknownSystem(id));
            }
        }
        let after = &mut self.systems[system.index()].after;
        if after.contains(&dependency) {
            return Ok(());
        }
        after.push(dependency);
        if let Err(e) = self.rebuild_schedule() {
            self.systems[system.index()].after.pop();
            return Err(e);
        }
        Ok(())
    }

    fn rebuild_schedule(&mut self) -> EcsResult<()> {
        let nodes: Vec<ScheduleNode<'_>> = self
            .systems
            .iter()
            .map(|entry| ScheduleNode {
                name: &entry.name,
                view: &entry.view,
                after: &entry.after,
            })
            .collect();
        let schedule = Schedule::build(&nodes)?;
        log::debug!(
            "schedule rebuilt: {} systems in {} stages",
            schedule.len(),
            schedule.stages().len()
        );
        self.schedule = schedule;
        Ok(())
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    pub fn system_name(&self, id: SystemId) -> Option<&str> {
        self.systems.get(id.index()).map(|entry| entry.name.as_str())
    }

    /// Archetypes the system currently processes.
    pub fn matching_archetypes(&self, id: SystemId) -> Option<&[ArchetypeId]> {
        self.systems
            .get(id.index())
            .map(|entry| entry.matching.as_slice())
    }

    // ── Tick ─────────────────────────────────────────────────────────

    /// Run every system once, in schedule order, over every matching
    /// non-empty archetype. Commands are applied according to the
    /// configured [`FlushPolicy`], and anything still queued is applied
    /// before returning.
    pub fn tick(&mut self) {
        let order: Vec<SystemId> = self.schedule.order().collect();
        log::trace!("tick {} over {} systems", self.ticks, order.len());
        for id in order {
            self.run_system(id);
            if self.config.flush == FlushPolicy::AfterEachSystem {
                self.flush();
            }
        }
        self.flush();
        self.ticks += 1;
        #[cfg(feature = "diagnostics")]
        {
            self.last_tick_counters = std::mem::take(&mut self.counters);
        }
    }

    fn run_system(&mut self, id: SystemId) {
        let entry = &mut self.systems[id.index()];
        #[cfg(feature = "diagnostics")]
        let started = std::time::Instant::now();
        #[cfg(feature = "diagnostics")]
        let (mut ranges, mut rows) = (0, 0);

        for &archetype_id in &entry.matching {
            let archetype = &mut self.archetypes[archetype_id.index()];
            for (start, count) in self.config.chunks(archetype.len()) {
                log::trace!(
                    "`{}` over {archetype_id:?} rows {start}..{}",
                    entry.name,
                    start + count
                );
                entry.system.run_range(
                    archetype,
                    &self.registry,
                    start,
                    count,
                    &mut self.commands,
                );
                #[cfg(feature = "diagnostics")]
                {
                    ranges += 1;
                    rows += count;
                }
            }
        }

        #[cfg(feature = "diagnostics")]
        {
            entry.timing.duration_us = started.elapsed().as_secs_f64() * 1_000_000.0;
            entry.timing.ranges = ranges;
            entry.timing.entities = rows;
        }
    }

    /// Commands applied at the next sync point. Usable between ticks too.
    pub fn commands(&mut self) -> &mut Commands {
        &mut self.commands
    }

    /// Apply every queued command now. Commands that fail are logged and
    /// skipped. Returns how many were applied.
    pub fn flush(&mut self) -> usize {
        let queued = self.commands.take();
        let total = queued.len();
        let mut applied = 0;
        for command in queued {
            let result = match command {
                Command::Create(components) => self.try_create_entity_raw(components).map(drop),
                Command::Destroy(entity) => self.try_destroy_entity(entity),
                Command::Add(entity, component) => self.add_component_raw(entity, component),
                Command::Remove {
                    entity,
                    type_id,
                    type_name,
                } => self
                    .remove_component_raw(entity, type_id)
                    .map(|removed| {
                        if removed.is_none() {
                            log::trace!("{entity:?} had no `{type_name}` to remove");
                        }
                    }),
            };
            match result {
                Ok(()) => applied += 1,
                Err(e) => log::warn!("skipped command: {e}"),
            }
        }
        if total > 0 {
            log::trace!("flushed {applied}/{total} commands");
        }
        applied
    }

    // ── Ad-hoc Views ─────────────────────────────────────────────────

    /// Call `f` once per non-empty archetype matching `V`, with a range over
    /// all of its rows.
    ///
    /// # Panics
    ///
    /// Panics if `V` names an unregistered type or the same type twice.
    pub fn for_each_range<V: View>(&mut self, mut f: impl FnMut(ComponentRange<'_, V>)) {
        let view = ViewSignature::of::<V>(&self.registry);
        for archetype in &mut self.archetypes {
            if archetype.is_empty() || !view.matches(archetype.signature()) {
                continue;
            }
            f(ComponentRange::whole(archetype, &self.registry));
        }
    }

    /// Number of entities `V` would visit.
    pub fn count<V: View>(&self) -> usize {
        let view = ViewSignature::of::<V>(&self.registry);
        self.archetypes
            .iter()
            .filter(|a| view.matches(a.signature()))
            .map(Archetype::len)
            .sum()
    }

    // ── Diagnostics ──────────────────────────────────────────────────

    #[cfg(feature = "diagnostics")]
    pub(crate) fn entity_table(&self) -> &EntityTable {
        &self.entities
    }

    #[cfg(feature = "diagnostics")]
    pub(crate) fn system_entries(&self) -> &[SystemEntry] {
        &self.systems
    }

    #[cfg(feature = "diagnostics")]
    pub(crate) fn last_tick_counters(&self) -> StructuralCounters {
        self.last_tick_counters
    }

    /// Snapshot of entity, archetype and system statistics.
    #[cfg(feature = "diagnostics")]
    pub fn diagnostics(&self) -> crate::diag::ControllerSnapshot {
        crate::diag::ControllerSnapshot::collect(self)
    }
}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("entities", &self.entities.alive_count())
            .field("archetypes", &self.archetypes.len())
            .field("systems", &self.systems.len())
            .field("ticks", &self.ticks)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::{Read, With, Without, Write};
    use proptest::prelude::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Position {
        x: f32,
        y: f32,
    }
    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Velocity {
        dx: f32,
        dy: f32,
    }
    #[derive(Debug, Clone, PartialEq)]
    struct Name(String);
    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Health(u32);
    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Frozen;
    struct Unregistered;

    fn controller() -> Controller {
        let mut registry = ComponentRegistry::new();
        registry.register_set::<(Position, Velocity, Name, Health, Frozen)>();
        Controller::new(registry)
    }

    fn pos(x: f32) -> Position {
        Position { x, y: 0.0 }
    }

    fn vel(dx: f32) -> Velocity {
        Velocity { dx, dy: 0.0 }
    }

    fn health(c: &Controller, e: Entity) -> Option<u32> {
        c.get_component::<Health>(e).map(|h| h.0)
    }

    // ── Creation ─────────────────────────────────────────────────────

    #[test]
    fn create_and_get() {
        let mut c = controller();
        let e = c.create_entity((pos(1.0), vel(2.0)));
        assert_eq!(c.entity_count(), 1);
        assert_eq!(c.get_component::<Position>(e), Some(&pos(1.0)));
        assert_eq!(c.get_component::<Velocity>(e), Some(&vel(2.0)));
        assert!(c.get_component::<Health>(e).is_none());
        assert!(c.has_component::<Velocity>(e));
        assert!(!c.has_component::<Unregistered>(e));
    }

    #[test]
    fn raw_and_typed_share_archetype() {
        let mut c = controller();
        let typed = c.create_entity((pos(1.0), Health(3)));
        let raw = c.create_entity_raw(vec![
            RawComponent::new(Health(4)),
            RawComponent::new(pos(2.0)),
        ]);
        assert_eq!(c.archetype_count(), 1);
        let (lt, lr) = (c.location(typed).unwrap(), c.location(raw).unwrap());
        assert_eq!(lt.archetype, lr.archetype);
        assert_eq!((lt.row, lr.row), (0, 1));
        assert_eq!(health(&c, raw), Some(4));
    }

    #[test]
    fn duplicate_components_are_rejected_without_side_effects() {
        let mut c = controller();
        let err = c
            .try_create_entity_raw(vec![
                RawComponent::new(Health(1)),
                RawComponent::new(Health(2)),
            ])
            .unwrap_err();
        assert!(matches!(err, EcsError::DuplicateComponent(name) if name.ends_with("Health")));
        assert!(matches!(
            c.try_create_entity((Health(1), Health(2))),
            Err(EcsError::DuplicateComponent(_))
        ));
        assert_eq!(c.entity_count(), 0);
        assert_eq!(c.archetype_count(), 0);
    }

    #[test]
    fn unregistered_component_is_rejected() {
        let mut c = controller();
        let err = c
            .try_create_entity((Health(1), Unregistered))
            .unwrap_err();
        assert!(matches!(err, EcsError::UnregisteredComponent(_)));
        assert_eq!(c.entity_count(), 0);
    }

    #[test]
    #[should_panic(expected = "appears more than once")]
    fn create_with_duplicates_panics() {
        let mut c = controller();
        c.create_entity_raw(vec![RawComponent::new(Frozen), RawComponent::new(Frozen)]);
    }

    #[test]
    fn create_in_known_archetype() {
        let mut c = controller();
        let sig = Signature::of::<(Position, Health)>(c.registry());
        let id = c.get_or_create_archetype(sig);
        let e = c.create_entity_in(
            id,
            vec![RawComponent::new(Health(8)), RawComponent::new(pos(0.5))],
        );
        assert_eq!(c.location(e).unwrap().archetype, id);

        let err = c
            .try_create_entity_in(id, vec![RawComponent::new(Health(1))])
            .unwrap_err();
        let EcsError::SignatureMismatch { expected, supplied } = err else {
            panic!("expected a signature mismatch, got {err:?}");
        };
        assert_eq!(expected.len(), 2);
        assert_eq!(supplied.len(), 1);
        assert_eq!(c.entity_count(), 1);
    }

    #[test]
    fn create_in_foreign_archetype_fails() {
        let mut other = controller();
        let foreign = other.get_or_create_archetype(Signature::of::<(Health,)>(other.registry()));

        let mut c = controller();
        let err = c
            .try_create_entity_in(foreign, vec![RawComponent::new(Health(1))])
            .unwrap_err();
        assert!(matches!(err, EcsError::UnknownArchetype(id) if id == foreign));
        assert_eq!(c.entity_count(), 0);
    }

    #[test]
    fn empty_entity() {
        let mut c = controller();
        let e = c.create_empty_entity();
        assert!(c.is_alive(e));
        assert!(c.archetype(c.location(e).unwrap().archetype).signature().is_empty());
    }

    // ── Destruction ──────────────────────────────────────────────────

    #[test]
    fn destroy_fixes_swapped_location() {
        let mut c = controller();
        let e0 = c.create_entity((Health(10),));
        let e1 = c.create_entity((Health(20),));
        let e2 = c.create_entity((Health(30),));

        c.destroy_entity(e0);
        assert_eq!(c.entity_count(), 2);
        assert!(!c.is_alive(e0));
        assert_eq!(c.location(e2).unwrap().row, 0);
        assert_eq!(health(&c, e2), Some(30));
        assert_eq!(health(&c, e1), Some(20));
    }

    #[test]
    fn stale_handle_fails() {
        let mut c = controller();
        let old = c.create_entity((Health(1),));
        c.destroy_entity(old);
        let reused = c.create_entity((Health(2),));
        assert_eq!(reused.index(), old.index());
        assert_ne!(reused.generation(), old.generation());

        assert!(health(&c, old).is_none());
        assert!(matches!(
            c.try_destroy_entity(old),
            Err(EcsError::StaleEntity(e)) if e == old
        ));
        assert!(matches!(
            c.try_add_component(old, Frozen),
            Err(EcsError::StaleEntity(_))
        ));
        assert!(c.is_alive(reused));
    }

    #[test]
    #[should_panic(expected = "stale entity handle")]
    fn destroy_twice_panics() {
        let mut c = controller();
        let e = c.create_entity((Health(1),));
        c.destroy_entity(e);
        c.destroy_entity(e);
    }

    // ── Migration ────────────────────────────────────────────────────

    #[test]
    fn add_component_migrates_and_keeps_values() {
        let mut c = controller();
        let a = c.create_entity((pos(1.0), Health(1)));
        let b = c.create_entity((pos(2.0), Health(2)));
        let before = c.location(a).unwrap().archetype;

        c.add_component(a, vel(5.0));
        let after = c.location(a).unwrap();
        assert_ne!(after.archetype, before);
        assert_eq!(c.get_component::<Position>(a), Some(&pos(1.0)));
        assert_eq!(health(&c, a), Some(1));
        assert_eq!(c.get_component::<Velocity>(a), Some(&vel(5.0)));

        // `b` was swapped into `a`'s old row.
        assert_eq!(c.location(b).unwrap(), Location { archetype: before, row: 0 });
        assert_eq!(c.get_component::<Position>(b), Some(&pos(2.0)));
        assert_eq!(c.archetype(before).len(), 1);
    }

    #[test]
    fn add_existing_component_replaces() {
        let mut c = controller();
        let e = c.create_entity((Health(1),));
        c.add_component(e, Health(9));
        assert_eq!(health(&c, e), Some(9));
        assert_eq!(c.archetype_count(), 1);
    }

    #[test]
    fn remove_component_returns_value() {
        let mut c = controller();
        let e = c.create_entity((Name("orc".into()), Health(7)));
        assert_eq!(c.remove_component::<Name>(e), Some(Name("orc".into())));
        assert_eq!(health(&c, e), Some(7));
        assert!(!c.has_component::<Name>(e));
        assert_eq!(c.remove_component::<Name>(e), None);
    }

    #[test]
    fn removing_last_component_keeps_entity() {
        let mut c = controller();
        let e = c.create_entity((Health(1),));
        assert_eq!(c.remove_component::<Health>(e), Some(Health(1)));
        assert!(c.is_alive(e));
        let location = c.location(e).unwrap();
        assert!(c.archetype(location.archetype).signature().is_empty());
    }

    #[test]
    fn add_then_remove_returns_to_same_archetype() {
        let mut c = controller();
        let e = c.create_entity((pos(0.0),));
        let home = c.location(e).unwrap().archetype;
        c.add_component(e, Frozen);
        c.remove_component::<Frozen>(e);
        assert_eq!(c.location(e).unwrap().archetype, home);
        assert_eq!(c.archetype_count(), 2);
    }

    #[test]
    fn raw_add_and_remove() {
        let mut c = controller();
        let e = c.create_entity((Health(1),));
        c.add_component_raw(e, RawComponent::new(Name("raw".into())))
            .unwrap();
        assert_eq!(c.get_component::<Name>(e), Some(&Name("raw".into())));

        c.add_component_raw(e, RawComponent::new(Health(5))).unwrap();
        assert_eq!(health(&c, e), Some(5));

        let removed = c
            .remove_component_raw(e, TypeId::of::<Name>())
            .unwrap()
            .unwrap();
        assert_eq!(removed.downcast_ref::<Name>(), Some(&Name("raw".into())));
        assert!(matches!(
            c.remove_component_raw(e, TypeId::of::<Unregistered>()),
            Err(EcsError::UnregisteredTypeId(_))
        ));
    }

    #[test]
    fn get_component_mut_writes_through() {
        let mut c = controller();
        let e = c.create_entity((Health(1),));
        c.get_component_mut::<Health>(e).unwrap().0 = 42;
        assert_eq!(health(&c, e), Some(42));
        assert!(c.get_component_mut::<Position>(e).is_none());
    }

    // ── Systems and Tick ─────────────────────────────────────────────

    struct Integrate;

    impl System for Integrate {
        type View = (Write<Position>, Read<Velocity>, Without<Frozen>);

        fn process(&mut self, range: ComponentRange<'_, Self::View>, _: &mut Commands) {
            for (p, v, ()) in range {
                p.x += v.dx;
                p.y += v.dy;
            }
        }
    }

    #[test]
    fn tick_runs_matching_archetypes_only() {
        let mut c = controller();
        let moving = c.create_entity((pos(0.0), vel(1.0)));
        let frozen = c.create_entity((pos(0.0), vel(1.0), Frozen));
        let still = c.create_entity((pos(0.0),));
        c.register_system(Integrate);

        c.tick();
        c.tick();

        assert_eq!(c.get_component::<Position>(moving).unwrap().x, 2.0);
        assert_eq!(c.get_component::<Position>(frozen).unwrap().x, 0.0);
        assert_eq!(c.get_component::<Position>(still).unwrap().x, 0.0);
        assert_eq!(c.ticks(), 2);
    }

    #[test]
    fn matching_cache_tracks_new_archetypes() {
        let mut c = controller();
        let id = c.register_system(Integrate);
        assert_eq!(c.matching_archetypes(id), Some(&[][..]));

        let e = c.create_entity((pos(0.0),));
        assert!(c.matching_archetypes(id).unwrap().is_empty());

        c.add_component(e, vel(3.0));
        let arch = c.location(e).unwrap().archetype;
        assert_eq!(c.matching_archetypes(id), Some(&[arch][..]));

        c.tick();
        assert_eq!(c.get_component::<Position>(e).unwrap().x, 3.0);
    }

    #[test]
    fn chunked_ranges_cover_every_entity() {
        let mut registry = ComponentRegistry::new();
        registry.register_set::<(Health, Frozen)>();
        let config = ControllerConfig {
            chunk_size: 2,
            ..Default::default()
        };
        let mut c = Controller::with_config(registry, config);
        for i in 0..5 {
            c.create_entity((Health(i),));
        }
        c.create_entity((Health(100), Frozen));

        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = seen.clone();
        c.register_system(crate::system::system_fn::<Read<Health>, _>(
            "chunks",
            move |range, _| {
                sink.lock().unwrap().push(range.len());
            },
        ));
        c.tick();

        let mut sizes = seen.lock().unwrap().clone();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![1, 1, 2, 2]);
    }

    struct Spawner;

    impl System for Spawner {
        type View = (Read<Health>, Without<Frozen>);

        fn process(&mut self, range: ComponentRange<'_, Self::View>, commands: &mut Commands) {
            for (entity, (hp, ())) in range.with_entities() {
                if hp.0 == 0 {
                    commands.destroy(entity);
                } else {
                    commands.create((Frozen, Health(hp.0)));
                }
            }
        }
    }

    /// Register a system counting frozen entities, ordered after `after`.
    fn count_frozen_after(
        c: &mut Controller,
        after: SystemId,
    ) -> std::sync::Arc<std::sync::atomic::AtomicUsize> {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let seen = std::sync::Arc::new(AtomicUsize::new(0));
        let sink = seen.clone();
        let counter = c.register_system(crate::system::system_fn::<
            (Read<Health>, With<Frozen>),
            _,
        >("count_frozen", move |range, _| {
            sink.fetch_add(range.len(), Ordering::SeqCst);
        }));
        c.order_after(counter, after).unwrap();
        seen
    }

    #[test]
    fn commands_flush_after_each_system() {
        use std::sync::atomic::Ordering;
        let mut c = controller();
        c.create_entity((Health(3),));
        let dead = c.create_entity((Health(0),));
        let spawner = c.register_system(Spawner);
        let seen = count_frozen_after(&mut c, spawner);

        c.tick();
        assert!(!c.is_alive(dead));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(c.count::<With<Frozen>>(), 1);
    }

    #[test]
    fn commands_flush_at_end_of_tick() {
        use std::sync::atomic::Ordering;
        let mut c = controller();
        c.set_config(ControllerConfig {
            flush: FlushPolicy::EndOfTick,
            ..Default::default()
        });
        c.create_entity((Health(3),));
        let spawner = c.register_system(Spawner);
        let seen = count_frozen_after(&mut c, spawner);

        c.tick();
        assert_eq!(seen.load(Ordering::SeqCst), 0);
        assert_eq!(c.count::<With<Frozen>>(), 1);
    }

    #[test]
    fn failing_commands_are_skipped() {
        let mut c = controller();
        let e = c.create_entity((Health(1),));
        c.commands().destroy(e);
        c.commands().destroy(e);
        c.commands().add(e, Frozen);
        c.commands().create((Health(2),));
        assert_eq!(c.flush(), 2);
        assert_eq!(c.entity_count(), 1);
        assert!(c.commands().is_empty());
    }

    #[test]
    fn order_after_rejects_cycles_and_keeps_schedule() {
        let mut c = controller();
        let a = c.register_system(Integrate);
        let b = c.register_system(Spawner);
        c.order_after(a, b).unwrap();
        let before = c.schedule().clone();

        let err = c.order_after(b, a).unwrap_err();
        assert!(matches!(err, EcsError::DependencyCycle(_)));
        assert_eq!(c.schedule(), &before);
        assert_eq!(c.schedule().order().collect::<Vec<_>>(), vec![b, a]);

        assert!(matches!(
            c.order_after(a, SystemId::new(9)),
            Err(EcsError::UnknownSystem(_))
        ));
    }

    #[test]
    fn conflicting_systems_run_in_registration_order() {
        use std::sync::{Arc, Mutex};
        let mut c = controller();
        let e = c.create_entity((pos(0.0),));
        let log: Arc<Mutex<Vec<(&'static str, f32)>>> = Arc::default();

        for (name, write) in [("a", Some(1.0)), ("b", None), ("c", Some(2.0)), ("d", None)] {
            let sink = log.clone();
            match write {
                Some(x) => c.register_system(crate::system::system_fn::<Write<Position>, _>(
                    name,
                    move |range, _| {
                        for p in range {
                            p.x = x;
                            sink.lock().unwrap().push((name, p.x));
                        }
                    },
                )),
                None => c.register_system(crate::system::system_fn::<Read<Position>, _>(
                    name,
                    move |range, _| {
                        for p in range {
                            sink.lock().unwrap().push((name, p.x));
                        }
                    },
                )),
            };
        }
        c.tick();

        assert_eq!(
            *log.lock().unwrap(),
            vec![("a", 1.0), ("b", 1.0), ("c", 2.0), ("d", 2.0)]
        );
        assert_eq!(c.get_component::<Position>(e).unwrap().x, 2.0);
    }

    #[test]
    fn register_system_with_bad_view_fails() {
        let mut c = controller();
        let bad = crate::system::system_fn::<(Read<Health>, Write<Health>), _>("bad", |_, _| {});
        assert!(matches!(
            c.try_register_system(bad),
            Err(EcsError::DuplicateComponent(_))
        ));
        assert_eq!(c.system_count(), 0);
    }

    #[test]
    fn for_each_range_visits_every_match() {
        let mut c = controller();
        c.create_entity((pos(1.0), Health(1)));
        c.create_entity((pos(2.0),));
        c.create_entity((Health(5),));

        let mut total = 0.0;
        let mut ranges = 0;
        c.for_each_range::<Read<Position>>(|range| {
            ranges += 1;
            total += range.map(|p| p.x).sum::<f32>();
        });
        assert_eq!((ranges, total), (2, 3.0));

        c.for_each_range::<(Write<Health>,)>(|range| {
            for (h,) in range {
                h.0 *= 10;
            }
        });
        assert_eq!(c.count::<Read<Health>>(), 2);
    }

    // ── Model-checked structural changes ─────────────────────────────

    #[derive(Debug, Clone)]
    enum Op {
        Create(u32, bool),
        Destroy(prop::sample::Index),
        AddFrozen(prop::sample::Index),
        RemoveFrozen(prop::sample::Index),
        SetHealth(prop::sample::Index, u32),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (any::<u32>(), any::<bool>()).prop_map(|(h, f)| Op::Create(h, f)),
            any::<prop::sample::Index>().prop_map(Op::Destroy),
            any::<prop::sample::Index>().prop_map(Op::AddFrozen),
            any::<prop::sample::Index>().prop_map(Op::RemoveFrozen),
            (any::<prop::sample::Index>(), any::<u32>()).prop_map(|(i, h)| Op::SetHealth(i, h)),
        ]
    }

    proptest! {
        #[test]
        fn structural_changes_match_model(ops in proptest::collection::vec(op(), 1..120)) {
            let mut c = controller();
            let mut model: Vec<(Entity, u32, bool)> = Vec::new();

            for op in ops {
                match op {
                    Op::Create(h, frozen) => {
                        let e = if frozen {
                            c.create_entity((Health(h), Frozen))
                        } else {
                            c.create_entity((Health(h),))
                        };
                        model.push((e, h, frozen));
                    }
                    Op::Destroy(i) if !model.is_empty() => {
                        let (e, _, _) = model.swap_remove(i.index(model.len()));
                        c.destroy_entity(e);
                    }
                    Op::AddFrozen(i) if !model.is_empty() => {
                        let k = i.index(model.len());
                        let slot = &mut model[k];
                        c.add_component(slot.0, Frozen);
                        slot.2 = true;
                    }
                    Op::RemoveFrozen(i) if !model.is_empty() => {
                        let k = i.index(model.len());
                        let slot = &mut model[k];
                        let removed = c.remove_component::<Frozen>(slot.0);
                        prop_assert_eq!(removed.is_some(), slot.2);
                        slot.2 = false;
                    }
                    Op::SetHealth(i, h) if !model.is_empty() => {
                        let k = i.index(model.len());
                        let slot = &mut model[k];
                        c.add_component(slot.0, Health(h));
                        slot.1 = h;
                    }
                    _ => {}
                }

                prop_assert_eq!(c.entity_count(), model.len());
                for &(e, h, frozen) in &model {
                    prop_assert_eq!(health(&c, e), Some(h));
                    prop_assert_eq!(c.has_component::<Frozen>(e), frozen);
                    let location = c.location(e).unwrap();
                    prop_assert_eq!(c.archetype(location.archetype).entity(location.row), e);
                }
                let rows: usize = c.archetypes().iter().map(Archetype::len).sum();
                prop_assert_eq!(rows, model.len());
            }
        }
    }
}
