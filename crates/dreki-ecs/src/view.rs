//! # Views — Declarative Read/Write Shapes and Component Ranges
//!
//! A view says which component types a piece of code touches and how:
//!
//! ```ignore
//! type Movement = (Write<Position>, Read<Velocity>, Without<Frozen>);
//! ```
//!
//! - [`Read<T>`] yields `&T` and requires `T`.
//! - [`Write<T>`] yields `&mut T` and requires `T`.
//! - [`With<T>`] requires `T` but binds nothing (yields `()`).
//! - [`Without<T>`] rejects archetypes that have `T` (yields `()`).
//!
//! Tuples of up to 8 parameters are views themselves, like `QueryParam`
//! tuples elsewhere in this workspace.
//!
//! ## Matching
//!
//! [`ViewSignature`] folds a view into a *required* and an *excluded*
//! [`Signature`]. An archetype qualifies iff its signature contains every
//! required type and none of the excluded ones. The read and write sets are
//! kept too, so the schedule can tell which systems may share a stage.
//!
//! ## Ranges
//!
//! A [`ComponentRange`] binds a view to rows `[start, start + count)` of one
//! archetype and is a plain [`Iterator`]. It mutably borrows the archetype,
//! so it can't outlive a structural change: the borrow checker rejects any
//! create/destroy/migrate while a range is alive.
//!
//! ```text
//! archetype [#0 Pos, #1 Vel, #2 Name]     view (Write<Pos>, Read<Vel>)
//!
//! slots:  [Some(&mut Pos), Some(&mut Vel), Some(&mut Name)]
//!           │ taken by Write<Pos> → IterMut<Pos>[start..end]
//!                          │ taken by Read<Vel> → Iter<Vel>[start..end]
//! ```
//!
//! Each parameter *takes* its pool slot, so two parameters can never alias
//! the same pool.

use std::marker::PhantomData;
use std::ops::Range;

use crate::archetype::Archetype;
use crate::component::Component;
use crate::entity::Entity;
use crate::error::{EcsError, EcsResult};
use crate::pool::ComponentPool;
use crate::registry::{ComponentIndex, ComponentRegistry};
use crate::signature::Signature;

/// Shared access to `T`.
pub struct Read<T>(PhantomData<fn() -> T>);

/// Exclusive access to `T`.
pub struct Write<T>(PhantomData<fn() -> T>);

/// Requires `T` without accessing it.
pub struct With<T>(PhantomData<fn() -> T>);

/// Rejects archetypes that contain `T`.
pub struct Without<T>(PhantomData<fn() -> T>);

/// How one view parameter uses one component type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    Read(ComponentIndex),
    Write(ComponentIndex),
    With(ComponentIndex),
    Without(ComponentIndex),
}

impl Access {
    pub fn component(self) -> ComponentIndex {
        match self {
            Access::Read(i) | Access::Write(i) | Access::With(i) | Access::Without(i) => i,
        }
    }
}

/// Pool slots of one archetype, each taken at most once while building a
/// range.
pub type PoolSlots<'a> = [Option<&'a mut Box<dyn ComponentPool>>];

/// Trait for types that describe a view.
///
/// Implemented for [`Read`], [`Write`], [`With`], [`Without`] and tuples of
/// them.
pub trait View: 'static {
    /// The value yielded per row.
    type Item<'a>;

    /// Per-range cursor state (usually a slice iterator).
    type Fetch<'a>;

    /// Append this parameter's accesses to `out`.
    fn access(registry: &ComponentRegistry, out: &mut Vec<Access>) -> EcsResult<()>;

    /// Bind to `rows` of an archetype whose pools are `slots`, laid out in
    /// `signature` order.
    fn fetch<'a>(
        slots: &mut PoolSlots<'a>,
        signature: &Signature,
        registry: &ComponentRegistry,
        rows: Range<usize>,
    ) -> Self::Fetch<'a>;

    /// Advance the cursor by one row.
    fn item<'a>(fetch: &mut Self::Fetch<'a>) -> Option<Self::Item<'a>>;
}

fn take_slot<'a, T: Component>(
    slots: &mut PoolSlots<'a>,
    signature: &Signature,
    registry: &ComponentRegistry,
) -> &'a mut Box<dyn ComponentPool> {
    let index = registry.index::<T>();
    signature
        .position(index)
        .and_then(|slot| slots[slot].take())
        .unwrap_or_else(|| {
            panic!(
                "view: pool for `{}` missing or already borrowed in archetype {:?}",
                std::any::type_name::<T>(),
                signature
            )
        })
}

impl<T: Component> View for Read<T> {
    type Item<'a> = &'a T;
    type Fetch<'a> = std::slice::Iter<'a, T>;

    fn access(registry: &ComponentRegistry, out: &mut Vec<Access>) -> EcsResult<()> {
        out.push(Access::Read(registry.try_index::<T>()?));
        Ok(())
    }

    fn fetch<'a>(
        slots: &mut PoolSlots<'a>,
        signature: &Signature,
        registry: &ComponentRegistry,
        rows: Range<usize>,
    ) -> Self::Fetch<'a> {
        let pool: &'a Box<dyn ComponentPool> = take_slot::<T>(slots, signature, registry);
        pool.as_slice::<T>()[rows].iter()
    }

    fn item<'a>(fetch: &mut Self::Fetch<'a>) -> Option<Self::Item<'a>> {
        fetch.next()
    }
}

impl<T: Component> View for Write<T> {
    type Item<'a> = &'a mut T;
    type Fetch<'a> = std::slice::IterMut<'a, T>;

    fn access(registry: &ComponentRegistry, out: &mut Vec<Access>) -> EcsResult<()> {
        out.push(Access::Write(registry.try_index::<T>()?));
        Ok(())
    }

    fn fetch<'a>(
        slots: &mut PoolSlots<'a>,
        signature: &Signature,
        registry: &ComponentRegistry,
        rows: Range<usize>,
    ) -> Self::Fetch<'a> {
        let pool = take_slot::<T>(slots, signature, registry);
        pool.as_mut_slice::<T>()[rows].iter_mut()
    }

    fn item<'a>(fetch: &mut Self::Fetch<'a>) -> Option<Self::Item<'a>> {
        fetch.next()
    }
}

macro_rules! impl_filter_view {
    ($Filter:ident) => {
        impl<T: Component> View for $Filter<T> {
            type Item<'a> = ();
            type Fetch<'a> = ();

            fn access(registry: &ComponentRegistry, out: &mut Vec<Access>) -> EcsResult<()> {
                out.push(Access::$Filter(registry.try_index::<T>()?));
                Ok(())
            }

            fn fetch<'a>(
                _slots: &mut PoolSlots<'a>,
                _signature: &Signature,
                _registry: &ComponentRegistry,
                _rows: Range<usize>,
            ) -> Self::Fetch<'a> {
            }

            fn item<'a>(_fetch: &mut Self::Fetch<'a>) -> Option<Self::Item<'a>> {
                Some(())
            }
        }
    };
}

impl_filter_view!(With);
impl_filter_view!(Without);

macro_rules! impl_view_tuple {
    ($($P:ident),+) => {
        impl<$($P: View),+> View for ($($P,)+) {
            type Item<'a> = ($($P::Item<'a>,)+);
            type Fetch<'a> = ($($P::Fetch<'a>,)+);

            fn access(registry: &ComponentRegistry, out: &mut Vec<Access>) -> EcsResult<()> {
                $($P::access(registry, out)?;)+
                Ok(())
            }

            fn fetch<'a>(
                slots: &mut PoolSlots<'a>,
                signature: &Signature,
                registry: &ComponentRegistry,
                rows: Range<usize>,
            ) -> Self::Fetch<'a> {
                ($($P::fetch(slots, signature, registry, rows.clone()),)+)
            }

            #[allow(non_snake_case)]
            fn item<'a>(fetch: &mut Self::Fetch<'a>) -> Option<Self::Item<'a>> {
                let ($($P,)+) = fetch;
                Some(($($P::item($P)?,)+))
            }
        }
    };
}

impl_view_tuple!(A);
impl_view_tuple!(A, B);
impl_view_tuple!(A, B, C);
impl_view_tuple!(A, B, C, D);
impl_view_tuple!(A, B, C, D, E);
impl_view_tuple!(A, B, C, D, E, F);
impl_view_tuple!(A, B, C, D, E, F, G);
impl_view_tuple!(A, B, C, D, E, F, G, H);

/// The aggregate shape of a view, resolved against a registry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewSignature {
    required: Signature,
    excluded: Signature,
    reads: Signature,
    writes: Signature,
}

impl ViewSignature {
    /// Resolve `V`.
    ///
    /// # Panics
    ///
    /// Panics if a type is unregistered or appears twice in the view.
    pub fn of<V: View>(registry: &ComponentRegistry) -> Self {
        Self::try_of::<V>(registry).unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn try_of<V: View>(registry: &ComponentRegistry) -> EcsResult<Self> {
        let mut accesses = Vec::new();
        V::access(registry, &mut accesses)?;

        let mut seen = Signature::empty();
        for access in &accesses {
            let index = access.component();
            if seen.has(index) {
                return Err(EcsError::DuplicateComponent(
                    registry.info(index).type_name(),
                ));
            }
            seen = seen.with(index);
        }

        Ok(Self {
            required: pick(&accesses, |a| match a {
                Access::Read(i) | Access::Write(i) | Access::With(i) => Some(i),
                Access::Without(_) => None,
            }),
            excluded: pick(&accesses, |a| match a {
                Access::Without(i) => Some(i),
                _ => None,
            }),
            reads: pick(&accesses, |a| match a {
                Access::Read(i) => Some(i),
                _ => None,
            }),
            writes: pick(&accesses, |a| match a {
                Access::Write(i) => Some(i),
                _ => None,
            }),
        })
    }

    /// Names of all accessed and filtered types, for diagnostics.
    pub fn describe(&self, registry: &ComponentRegistry) -> String {
        let mut parts = Vec::new();
        for index in self.required.iter() {
            let name = registry.info(index).name();
            if self.writes.has(index) {
                parts.push(format!("&mut {name}"));
            } else if self.reads.has(index) {
                parts.push(format!("&{name}"));
            } else {
                parts.push(format!("With<{name}>"));
            }
        }
        for index in self.excluded.iter() {
            parts.push(format!("Without<{}>", registry.info(index).name()));
        }
        format!("({})", parts.join(", "))
    }

    /// Every type an archetype must have (accessed and `With` types).
    pub fn required(&self) -> &Signature {
        &self.required
    }

    pub fn excluded(&self) -> &Signature {
        &self.excluded
    }

    pub fn reads(&self) -> &Signature {
        &self.reads
    }

    pub fn writes(&self) -> &Signature {
        &self.writes
    }

    /// Whether an archetype with signature `archetype` qualifies.
    pub fn matches(&self, archetype: &Signature) -> bool {
        archetype.contains(&self.required) && archetype.is_disjoint(&self.excluded)
    }

    /// Whether some archetype could match both views.
    pub fn may_overlap(&self, other: &ViewSignature) -> bool {
        self.required.is_disjoint(&other.excluded) && other.required.is_disjoint(&self.excluded)
    }

    /// True if running both views at the same time could race: they can
    /// see the same archetype and one of them writes a type the other reads
    /// or writes.
    pub fn conflicts_with(&self, other: &ViewSignature) -> bool {
        if !self.may_overlap(other) {
            return false;
        }
        !self.writes.is_disjoint(&other.writes)
            || !self.writes.is_disjoint(&other.reads)
            || !other.writes.is_disjoint(&self.reads)
    }
}

fn pick(accesses: &[Access], f: impl Fn(Access) -> Option<ComponentIndex>) -> Signature {
    accesses.iter().copied().filter_map(f).collect()
}

/// A forward-only cursor over rows `[start, start + count)` of one
/// archetype, yielding `V::Item` per row in ascending order.
pub struct ComponentRange<'a, V: View> {
    fetch: V::Fetch<'a>,
    entities: &'a [Entity],
    start: usize,
    yielded: usize,
}

impl<'a, V: View> ComponentRange<'a, V> {
    /// Bind `V` to a slice of `archetype`.
    ///
    /// # Panics
    ///
    /// Panics if the rows are out of bounds or the archetype lacks a type
    /// the view accesses.
    pub fn new(
        archetype: &'a mut Archetype,
        registry: &ComponentRegistry,
        start: usize,
        count: usize,
    ) -> Self {
        let len = archetype.len();
        let end = start
            .checked_add(count)
            .filter(|&end| end <= len)
            .unwrap_or_else(|| {
                panic!("range {start}+{count} out of bounds for archetype of {len} entities")
            });

        let (signature, entities, pools) = archetype.split_for_range();
        let mut slots: Vec<Option<&'a mut Box<dyn ComponentPool>>> =
            pools.iter_mut().map(Some).collect();
        let fetch = V::fetch(&mut slots, signature, registry, start..end);
        Self {
            fetch,
            entities: &entities[start..end],
            start,
            yielded: 0,
        }
    }

    /// Bind `V` to every row of `archetype`.
    pub fn whole(archetype: &'a mut Archetype, registry: &ComponentRegistry) -> Self {
        let len = archetype.len();
        Self::new(archetype, registry, 0, len)
    }

    /// First archetype row covered.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Entities of the rows not yet yielded.
    pub fn entities(&self) -> &'a [Entity] {
        &self.entities[self.yielded..]
    }

    /// Pair every item with its entity.
    pub fn with_entities(self) -> impl Iterator<Item = (Entity, V::Item<'a>)> {
        self.entities().iter().copied().zip(self)
    }
}

impl<'a, V: View> Iterator for ComponentRange<'a, V> {
    type Item = V::Item<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.yielded == self.entities.len() {
            return None;
        }
        self.yielded += 1;
        V::item(&mut self.fetch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.entities.len() - self.yielded;
        (left, Some(left))
    }
}

impl<V: View> ExactSizeIterator for ComponentRange<'_, V> {}
