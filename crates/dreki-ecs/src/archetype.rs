//! # Archetype — Dense Storage for One Exact Signature
//!
//! All entities that have exactly the same set of component types live in
//! the same archetype. Iterating a view is then a linear scan over the pools
//! of every matching archetype.
//!
//! ## Memory Layout
//!
//! ```text
//! Archetype { signature: [#0 B, #1 C] }
//!
//! pools[0]: Pool<B>  [b0, b1, b2, b3]
//! pools[1]: Pool<C>  [c0, c1, c2, c3]
//! entities:          [e0, e1, e2, e3]
//! ```
//!
//! Pools are stored in signature order, so the pool of a component is found
//! with a binary search over the (short) signature. Every pool and the entity
//! array always have the same length.
//!
//! ## Swap-Remove
//!
//! Removing row `i` moves the *last* row into `i`:
//!
//! ```text
//! remove_entity(1)
//! entities: [e0, e1, e2, e3]  →  [e0, e3, e2]
//! ```
//!
//! Row indices are therefore not stable. [`Archetype::remove_entity`] returns
//! the entity that moved so the owner of the location table can fix it up.

use crate::bundle::{Bundle, RawComponent};
use crate::entity::Entity;
use crate::pool::{BoxedComponent, ComponentPool};
use crate::registry::{ComponentIndex, ComponentRegistry};
use crate::signature::Signature;

/// Index of an archetype inside its [`Controller`](crate::controller::Controller).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArchetypeId(u32);

impl ArchetypeId {
    pub(crate) fn new(index: usize) -> Self {
        Self(u32::try_from(index).expect("more than u32::MAX archetypes"))
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Result of moving one row into another archetype.
pub(crate) struct Migration {
    /// Row of the entity in the destination.
    pub row: usize,
    /// Entity that was swapped into the vacated source row, if any.
    pub swapped: Option<Entity>,
    /// Components the destination has no pool for, taken out of the source.
    pub leftovers: Vec<(ComponentIndex, BoxedComponent)>,
}

/// A table of entities that all share the same component types.
pub struct Archetype {
    id: ArchetypeId,
    signature: Signature,
    pools: Vec<Box<dyn ComponentPool>>,
    entities: Vec<Entity>,
}

impl Archetype {
    /// Create an empty archetype with one pool per type of `signature`,
    /// each with room for `capacity` entities.
    pub fn new(
        id: ArchetypeId,
        signature: Signature,
        registry: &ComponentRegistry,
        capacity: usize,
    ) -> Self {
        let pools = signature
            .iter()
            .map(|index| {
                let mut pool = registry.new_pool(index);
                pool.reserve(capacity);
                pool
            })
            .collect();
        Self {
            id,
            signature,
            pools,
            entities: Vec::with_capacity(capacity),
        }
    }

    pub fn id(&self) -> ArchetypeId {
        self.id
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Number of entities stored.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Entity stored at `row`.
    ///
    /// # Panics
    ///
    /// Panics if `row` is out of bounds.
    pub fn entity(&self, row: usize) -> Entity {
        self.entities[row]
    }

    pub fn has_component(&self, index: ComponentIndex) -> bool {
        self.signature.has(index)
    }

    /// The pool for component `index`.
    ///
    /// # Panics
    ///
    /// Panics if the type is not part of this archetype's signature.
    pub fn pool(&self, index: ComponentIndex) -> &dyn ComponentPool {
        match self.signature.position(index) {
            Some(slot) => &*self.pools[slot],
            None => self.missing_pool(index),
        }
    }

    pub fn try_pool(&self, index: ComponentIndex) -> Option<&dyn ComponentPool> {
        self.signature.position(index).map(|slot| &*self.pools[slot])
    }

    /// The pool for component `index`, mutably.
    ///
    /// # Panics
    ///
    /// Panics if the type is not part of this archetype's signature.
    pub fn pool_mut(&mut self, index: ComponentIndex) -> &mut dyn ComponentPool {
        match self.signature.position(index) {
            Some(slot) => &mut *self.pools[slot],
            None => self.missing_pool(index),
        }
    }

    /// Pools paired with their component index, in signature order.
    pub fn pools(&self) -> impl Iterator<Item = (ComponentIndex, &dyn ComponentPool)> {
        self.signature
            .iter()
            .zip(self.pools.iter().map(|p| &**p as &dyn ComponentPool))
    }

    /// Signature, entities and pools borrowed side by side, so a range can
    /// hold several pools mutably while reading the entity array.
    pub(crate) fn split_for_range(
        &mut self,
    ) -> (&Signature, &[Entity], &mut [Box<dyn ComponentPool>]) {
        (&self.signature, &self.entities, &mut self.pools)
    }

    fn missing_pool(&self, index: ComponentIndex) -> ! {
        panic!(
            "archetype {:?} {:?} has no pool for component {:?}",
            self.id, self.signature, index
        )
    }

    /// Make room for `additional` more entities in every pool.
    pub fn reserve(&mut self, additional: usize) {
        self.entities.reserve(additional);
        for pool in &mut self.pools {
            pool.reserve(additional);
        }
    }

    /// Append an entity from an unordered list of raw components and return
    /// its row.
    ///
    /// The caller must already have checked that the list's type set is
    /// exactly this archetype's signature; it is only re-checked in debug
    /// builds.
    pub fn add_entity(
        &mut self,
        entity: Entity,
        components: Vec<RawComponent>,
        registry: &ComponentRegistry,
    ) -> usize {
        debug_assert_eq!(components.len(), self.signature.len());
        for raw in components {
            let index = registry.index_of(raw.type_id());
            self.pool_mut(index).push_boxed(raw.into_value());
        }
        self.push_entity(entity)
    }

    /// Append an entity from a typed bundle and return its row. Same
    /// contract as [`add_entity`](Self::add_entity).
    pub fn add_bundle<B: Bundle>(
        &mut self,
        entity: Entity,
        bundle: B,
        registry: &ComponentRegistry,
    ) -> usize {
        bundle.push_into(self, registry);
        self.push_entity(entity)
    }

    fn push_entity(&mut self, entity: Entity) -> usize {
        let row = self.entities.len();
        self.entities.push(entity);
        self.debug_check_lengths();
        row
    }

    /// Swap-remove the entity at `row`, dropping its components. Returns the
    /// entity that was moved into `row`, or `None` if `row` was the last one.
    ///
    /// # Panics
    ///
    /// Panics if `row` is out of bounds.
    pub fn remove_entity(&mut self, row: usize) -> Option<Entity> {
        for pool in &mut self.pools {
            pool.swap_remove(row);
        }
        self.swap_remove_entity(row)
    }

    fn swap_remove_entity(&mut self, row: usize) -> Option<Entity> {
        self.entities.swap_remove(row);
        self.debug_check_lengths();
        self.entities.get(row).copied()
    }

    /// Move the entity at `row` into `dst`. Components whose type `dst` also
    /// has are moved pool to pool; the rest come back as leftovers.
    ///
    /// `dst` must have spare capacity for one entity (see
    /// [`reserve`](Self::reserve)) and the caller must push any component
    /// `dst` has but `self` lacks before touching `dst` again.
    pub(crate) fn migrate(&mut self, row: usize, dst: &mut Archetype) -> Migration {
        let entity = self.entities[row];
        let mut leftovers = Vec::new();
        for (slot, index) in self.signature.iter().enumerate() {
            match dst.signature.position(index) {
                Some(dst_slot) => self.pools[slot].swap_remove_into(row, &mut *dst.pools[dst_slot]),
                None => leftovers.push((index, self.pools[slot].take_boxed(row))),
            }
        }
        let swapped = self.swap_remove_entity(row);
        let dst_row = dst.entities.len();
        dst.entities.push(entity);
        Migration {
            row: dst_row,
            swapped,
            leftovers,
        }
    }

    fn debug_check_lengths(&self) {
        debug_assert!(
            self.pools.iter().all(|p| p.len() == self.entities.len()),
            "archetype {:?} pools out of step with its {} entities",
            self.id,
            self.entities.len()
        );
    }
}

/// Borrow two distinct archetypes mutably.
///
/// # Panics
///
/// Panics if `a == b`.
pub(crate) fn two_mut(
    archetypes: &mut [Archetype],
    a: ArchetypeId,
    b: ArchetypeId,
) -> (&mut Archetype, &mut Archetype) {
    let (a, b) = (a.index(), b.index());
    assert_ne!(a, b, "cannot borrow archetype {a} twice");
    if a < b {
        let (left, right) = archetypes.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = archetypes.split_at_mut(a);
        (&mut right[0], &mut left[b])
    }
}
