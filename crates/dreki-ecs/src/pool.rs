//! # Component Pools — Dense Typed Columns
//!
//! Every archetype stores one pool per component type in its signature. A
//! pool is a plain `Vec<T>`: contiguous, cache-friendly, and dropped
//! correctly without any manual layout bookkeeping.
//!
//! The archetype only knows a set of component *indices* at runtime, so the
//! pools sit behind the object-safe [`ComponentPool`] trait. Typed access goes
//! through a checked downcast to [`Pool<T>`]; a mismatch means the ECS itself
//! is broken and panics.
//!
//! ```text
//! Archetype { signature: [#0 Position, #3 Velocity] }
//!
//! pools[0]: Pool<Position>  [p0, p1, p2, p3]
//! pools[1]: Pool<Velocity>  [v0, v1, v2, v3]
//! entities:                 [e0, e1, e2, e3]
//! ```
//!
//! ## Comparison
//!
//! - **hecs / bevy_ecs**: `BlobVec` over raw bytes + `Layout`. Same density,
//!   lots of unsafe.
//! - **here**: `Box<dyn ComponentPool>` wrapping a real `Vec<T>`. One virtual
//!   call per structural operation, zero per element during iteration.

use std::any::{Any, TypeId};

use crate::component::Component;

/// A type-erased component value in flight (scene loading, commands,
/// archetype migration through the raw API).
pub type BoxedComponent = Box<dyn Any + Send + Sync>;

/// Smallest number of slots a pool grows by.
const MIN_GROWTH: usize = 4;

/// Object-safe interface over one [`Pool<T>`].
pub trait ComponentPool: Send + Sync {
    /// Number of stored elements.
    fn len(&self) -> usize;

    /// Allocated slots.
    fn capacity(&self) -> usize;

    /// `TypeId` of the element type.
    fn element_type_id(&self) -> TypeId;

    /// Full type name of the element type.
    fn element_type_name(&self) -> &'static str;

    /// `size_of` the element type.
    fn element_size(&self) -> usize;

    /// Make room for at least `additional` more elements.
    fn reserve(&mut self, additional: usize);

    /// Swap-remove and drop the element at `index`. Returns `true` if the
    /// last element was moved into `index`.
    fn swap_remove(&mut self, index: usize) -> bool;

    /// Swap-remove the element at `index` and push it onto `dst`, which must
    /// be a pool of the same element type.
    fn swap_remove_into(&mut self, index: usize, dst: &mut dyn ComponentPool);

    /// Swap-remove the element at `index` and hand it back boxed.
    fn take_boxed(&mut self, index: usize) -> BoxedComponent;

    /// Push a boxed value, which must hold the element type.
    fn push_boxed(&mut self, value: BoxedComponent);

    /// Overwrite the element at `index` with a boxed value of the element
    /// type, dropping the old one.
    fn set_boxed(&mut self, index: usize, value: BoxedComponent);

    /// Type-erased view of the element at `index`.
    fn get_any(&self, index: usize) -> &dyn Any;

    /// A fresh, empty pool of the same element type.
    fn new_empty(&self) -> Box<dyn ComponentPool>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Dense storage for one component type.
pub struct Pool<T> {
    data: Vec<T>,
}

impl<T: Component> Pool<T> {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    /// Append a value, doubling the allocation when full.
    pub fn push(&mut self, value: T) {
        if self.data.len() == self.data.capacity() {
            let grow = self.data.capacity().max(MIN_GROWTH);
            self.data.reserve_exact(grow);
        }
        self.data.push(value);
    }

    /// Swap-remove the element at `index` and return it.
    pub fn take(&mut self, index: usize) -> T {
        self.data.swap_remove(index)
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }
}

impl<T: Component> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Component> ComponentPool for Pool<T> {
    fn len(&self) -> usize {
        self.data.len()
    }

    fn capacity(&self) -> usize {
        self.data.capacity()
    }

    fn element_type_id(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn element_type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn element_size(&self) -> usize {
        std::mem::size_of::<T>()
    }

    fn reserve(&mut self, additional: usize) {
        let free = self.data.capacity() - self.data.len();
        if free < additional {
            // Keep the doubling schedule even when reserving ahead of a push.
            let grow = (additional - free).max(self.data.capacity()).max(MIN_GROWTH);
            self.data.reserve_exact(grow);
        }
    }

    fn swap_remove(&mut self, index: usize) -> bool {
        let last = self.data.len() - 1;
        self.data.swap_remove(index);
        index != last
    }

    fn swap_remove_into(&mut self, index: usize, dst: &mut dyn ComponentPool) {
        let dst = dst.typed_mut::<T>();
        dst.push(self.data.swap_remove(index));
    }

    fn take_boxed(&mut self, index: usize) -> BoxedComponent {
        Box::new(self.data.swap_remove(index))
    }

    fn push_boxed(&mut self, value: BoxedComponent) {
        self.push(unbox::<T>(value));
    }

    fn set_boxed(&mut self, index: usize, value: BoxedComponent) {
        self.data[index] = unbox::<T>(value);
    }

    fn get_any(&self, index: usize) -> &dyn Any {
        &self.data[index]
    }

    fn new_empty(&self) -> Box<dyn ComponentPool> {
        Box::new(Self::new())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn unbox<T: Component>(value: BoxedComponent) -> T {
    match value.downcast::<T>() {
        Ok(value) => *value,
        Err(_) => panic!(
            "Component type mismatch: expected `{}` in pool",
            std::any::type_name::<T>()
        ),
    }
}

/// Typed accessors. All of them panic if `T` isn't the pool's element type.
impl<'a> dyn ComponentPool + 'a {
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn typed<T: Component>(&self) -> &Pool<T> {
        let name = self.element_type_name();
        self.as_any().downcast_ref::<Pool<T>>().unwrap_or_else(|| {
            panic!(
                "Component type mismatch: pool holds `{}`, requested `{}`",
                name,
                std::any::type_name::<T>()
            )
        })
    }

    pub fn typed_mut<T: Component>(&mut self) -> &mut Pool<T> {
        let name = self.element_type_name();
        self.as_any_mut().downcast_mut::<Pool<T>>().unwrap_or_else(|| {
            panic!(
                "Component type mismatch: pool holds `{}`, requested `{}`",
                name,
                std::any::type_name::<T>()
            )
        })
    }

    /// Get the component at `index`.
    ///
    /// # Panics
    ///
    /// Panics if the index is out of bounds or the type doesn't match.
    pub fn get<T: Component>(&self, index: usize) -> &T {
        &self.typed::<T>().as_slice()[index]
    }

    /// Get the component at `index` mutably.
    ///
    /// # Panics
    ///
    /// Panics if the index is out of bounds or the type doesn't match.
    pub fn get_mut<T: Component>(&mut self, index: usize) -> &mut T {
        &mut self.typed_mut::<T>().as_mut_slice()[index]
    }

    pub fn as_slice<T: Component>(&self) -> &[T] {
        self.typed::<T>().as_slice()
    }

    pub fn as_mut_slice<T: Component>(&mut self) -> &mut [T] {
        self.typed_mut::<T>().as_mut_slice()
    }

    pub fn push<T: Component>(&mut self, value: T) {
        self.typed_mut::<T>().push(value);
    }
}
