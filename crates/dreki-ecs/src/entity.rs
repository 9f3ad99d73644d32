//! # Entity — Generational Handles and the Location Table
//!
//! An [`Entity`] is just a number. The [`Controller`](crate::controller::Controller)
//! maps every live entity to a [`Location`]: which archetype holds its
//! components, and at which dense row.
//!
//! ## Generations
//!
//! Entity slots are recycled. Without a guard, a handle kept past
//! destruction would silently address whatever entity reuses the slot:
//!
//! ```text
//! 1. create  → Entity(5v0)
//! 2. destroy 5v0, slot 5 is freed, its generation becomes 1
//! 3. create  → Entity(5v1)   (same slot)
//! 4. look up 5v0 → generation mismatch → stale, rejected
//! ```
//!
//! ## Memory Layout
//!
//! ```text
//! slots:     [ {gen 0, loc A:0}, {gen 1, -}, {gen 0, loc B:3} ]
//! free_list: [1]
//! ```
//!
//! A slot's location is `Some` exactly while the slot is alive.

use std::fmt;

use crate::archetype::ArchetypeId;

/// A lightweight handle to an entity in a
/// [`Controller`](crate::controller::Controller).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entity {
    index: u32,
    generation: u32,
}

impl Entity {
    /// Slot index. Recycled after destruction; useful for diagnostics only.
    pub fn index(self) -> u32 {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }

    #[cfg(test)]
    pub(crate) fn from_index(index: u32) -> Self {
        Self {
            index,
            generation: 0,
        }
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({}v{})", self.index, self.generation)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// Where an entity's components live.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Location {
    pub archetype: ArchetypeId,
    /// Dense row inside the archetype. Changes whenever another entity of
    /// the same archetype is swap-removed into this row.
    pub row: usize,
}

struct Slot {
    generation: u32,
    location: Option<Location>,
}

/// Allocates entity ids and owns the authoritative entity → location map.
pub(crate) struct EntityTable {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
    alive: usize,
}

impl EntityTable {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            alive: 0,
        }
    }

    /// Allocate a handle that lives at `location`. Reuses a freed slot if
    /// one is available.
    pub fn allocate(&mut self, location: Location) -> Entity {
        self.alive += 1;
        if let Some(index) = self.free_list.pop() {
            // Generation was already bumped when the slot was freed.
            let slot = &mut self.slots[index as usize];
            slot.location = Some(location);
            Entity {
                index,
                generation: slot.generation,
            }
        } else {
            let index = u32::try_from(self.slots.len()).expect("entity slots exhausted");
            self.slots.push(Slot {
                generation: 0,
                location: Some(location),
            });
            Entity {
                index,
                generation: 0,
            }
        }
    }

    /// Free a live handle and return where it lived. Stale handles return
    /// `None` and change nothing.
    pub fn free(&mut self, entity: Entity) -> Option<Location> {
        let slot = self.live_slot_mut(entity)?;
        let location = slot.location.take();
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(entity.index);
        self.alive -= 1;
        location
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        self.location(entity).is_some()
    }

    pub fn location(&self, entity: Entity) -> Option<Location> {
        self.slots
            .get(entity.index as usize)
            .filter(|slot| slot.generation == entity.generation)
            .and_then(|slot| slot.location)
    }

    /// Point a live entity at a new location (after migration).
    pub fn set_location(&mut self, entity: Entity, location: Location) {
        let slot = self
            .live_slot_mut(entity)
            .unwrap_or_else(|| panic!("location update for stale entity {entity:?}"));
        slot.location = Some(location);
    }

    /// Fix up the row of an entity that a swap-remove moved.
    pub fn set_row(&mut self, entity: Entity, row: usize) {
        let slot = self
            .live_slot_mut(entity)
            .unwrap_or_else(|| panic!("row update for stale entity {entity:?}"));
        if let Some(location) = slot.location.as_mut() {
            location.row = row;
        }
    }

    fn live_slot_mut(&mut self, entity: Entity) -> Option<&mut Slot> {
        self.slots
            .get_mut(entity.index as usize)
            .filter(|slot| slot.generation == entity.generation && slot.location.is_some())
    }

    pub fn alive_count(&self) -> usize {
        self.alive
    }

    #[cfg(any(feature = "diagnostics", test))]
    pub fn free_count(&self) -> usize {
        self.free_list.len()
    }

    #[cfg(any(feature = "diagnostics", test))]
    pub fn total_slots(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(archetype: usize, row: usize) -> Location {
        Location {
            archetype: ArchetypeId::new(archetype),
            row,
        }
    }

    #[test]
    fn allocate_sequential() {
        let mut table = EntityTable::new();
        let e0 = table.allocate(loc(0, 0));
        let e1 = table.allocate(loc(0, 1));
        assert_eq!((e0.index(), e0.generation()), (0, 0));
        assert_eq!((e1.index(), e1.generation()), (1, 0));
        assert_eq!(table.location(e1), Some(loc(0, 1)));
    }

    #[test]
    fn recycle_bumps_generation() {
        let mut table = EntityTable::new();
        let e0 = table.allocate(loc(0, 0));
        assert_eq!(table.free(e0), Some(loc(0, 0)));
        let reused = table.allocate(loc(1, 0));
        assert_eq!(reused.index(), 0);
        assert_eq!(reused.generation(), 1);
    }

    #[test]
    fn stale_handle_detected() {
        let mut table = EntityTable::new();
        let e0 = table.allocate(loc(0, 0));
        table.free(e0);
        let reused = table.allocate(loc(0, 0));
        assert!(!table.is_alive(e0));
        assert!(table.is_alive(reused));
        assert_eq!(table.location(e0), None);
    }

    #[test]
    fn double_free_returns_none() {
        let mut table = EntityTable::new();
        let e0 = table.allocate(loc(0, 0));
        assert!(table.free(e0).is_some());
        assert!(table.free(e0).is_none());
        assert_eq!(table.alive_count(), 0);
    }

    #[test]
    fn set_row_and_location() {
        let mut table = EntityTable::new();
        let e = table.allocate(loc(2, 5));
        table.set_row(e, 1);
        assert_eq!(table.location(e), Some(loc(2, 1)));
        table.set_location(e, loc(3, 0));
        assert_eq!(table.location(e), Some(loc(3, 0)));
    }

    #[test]
    #[should_panic(expected = "stale entity")]
    fn set_row_on_stale_panics() {
        let mut table = EntityTable::new();
        let e = table.allocate(loc(0, 0));
        table.free(e);
        table.set_row(e, 0);
    }

    #[test]
    fn counts() {
        let mut table = EntityTable::new();
        let e0 = table.allocate(loc(0, 0));
        let _e1 = table.allocate(loc(0, 1));
        assert_eq!(table.alive_count(), 2);
        table.free(e0);
        assert_eq!(table.alive_count(), 1);
        assert_eq!(table.free_count(), 1);
        assert_eq!(table.total_slots(), 2);
    }
}
