//! # Component Registry — Dense Indices for Component Types
//!
//! Signatures and archetypes never talk about `TypeId`s directly. Every
//! component type is first registered, which assigns it the next dense
//! [`ComponentIndex`] and records its size, alignment, reflection name and a
//! factory for its [`Pool`]. Everything downstream (signature ordering, pool
//! lookup, view matching) works in terms of those indices.
//!
//! ## Bootstrap
//!
//! Registration is explicit and happens in one place, in a deterministic
//! order, before the registry is handed to a
//! [`Controller`](crate::controller::Controller):
//!
//! ```ignore
//! let mut registry = ComponentRegistry::new();
//! registry.register::<Position>();
//! registry.register::<Velocity>();
//! registry.register_set::<(Health, Name)>();
//! let controller = Controller::new(registry);
//! ```
//!
//! Indices are only stable for the lifetime of the process. Anything that is
//! persisted or shown to tooling uses the reflection name instead
//! ([`ComponentInfo::name`], [`ComponentRegistry::index_by_name`]).

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;

use crate::bundle::ComponentSet;
use crate::component::{Component, short_type_name};
use crate::error::{EcsError, EcsResult};
use crate::pool::{ComponentPool, Pool};

/// Dense, process-local index of a registered component type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentIndex(u32);

impl ComponentIndex {
    pub(crate) fn new(index: usize) -> Self {
        Self(u32::try_from(index).expect("more than u32::MAX component types"))
    }

    /// The raw index, usable to size lookup tables and bitsets.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ComponentIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Everything the registry needs to know about one component type.
///
/// Built with [`ComponentDescriptor::of`], so the recorded size, type id
/// and pool factory always agree with each other.
#[derive(Clone)]
pub struct ComponentDescriptor {
    type_id: TypeId,
    type_name: &'static str,
    name: String,
    size: usize,
    align: usize,
    new_pool: fn() -> Box<dyn ComponentPool>,
}

impl ComponentDescriptor {
    /// Describe `T`, using its short type name as the reflection name.
    pub fn of<T: Component>() -> Self {
        let type_name = std::any::type_name::<T>();
        Self {
            type_id: TypeId::of::<T>(),
            type_name,
            name: short_type_name(type_name),
            size: std::mem::size_of::<T>(),
            align: std::mem::align_of::<T>(),
            new_pool: new_pool::<T>,
        }
    }

    /// Override the reflection name (e.g. to disambiguate two types that
    /// share a short name).
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn align(&self) -> usize {
        self.align
    }
}

impl fmt::Debug for ComponentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDescriptor")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("align", &self.align)
            .finish()
    }
}

fn new_pool<T: Component>() -> Box<dyn ComponentPool> {
    Box::new(Pool::<T>::new())
}

/// A registry entry: a descriptor plus its assigned index.
#[derive(Debug, Clone)]
pub struct ComponentInfo {
    index: ComponentIndex,
    descriptor: ComponentDescriptor,
}

impl ComponentInfo {
    pub fn index(&self) -> ComponentIndex {
        self.index
    }

    pub fn type_id(&self) -> TypeId {
        self.descriptor.type_id
    }

    /// Full Rust type name, as reported by `std::any::type_name`.
    pub fn type_name(&self) -> &'static str {
        self.descriptor.type_name
    }

    /// Reflection name, unique within the registry.
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn size(&self) -> usize {
        self.descriptor.size
    }

    pub fn align(&self) -> usize {
        self.descriptor.align
    }

    pub(crate) fn new_pool(&self) -> Box<dyn ComponentPool> {
        (self.descriptor.new_pool)()
    }
}

/// Table of every registered component type. Entries are never removed.
#[derive(Default)]
pub struct ComponentRegistry {
    infos: Vec<ComponentInfo>,
    by_type: HashMap<TypeId, ComponentIndex>,
    by_name: HashMap<String, ComponentIndex>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from descriptors, registering them in order.
    pub fn from_descriptors(
        descriptors: impl IntoIterator<Item = ComponentDescriptor>,
    ) -> EcsResult<Self> {
        let mut registry = Self::new();
        for descriptor in descriptors {
            registry.try_register_descriptor(descriptor)?;
        }
        Ok(registry)
    }

    /// Register `T`. Idempotent: registering an already known type returns
    /// its existing index.
    ///
    /// # Panics
    ///
    /// Panics if another type already uses `T`'s reflection name.
    pub fn register<T: Component>(&mut self) -> ComponentIndex {
        self.register_descriptor(ComponentDescriptor::of::<T>())
    }

    /// Register every type of a tuple, in tuple order.
    pub fn register_set<S: ComponentSet>(&mut self) -> Vec<ComponentIndex> {
        S::descriptors()
            .into_iter()
            .map(|d| self.register_descriptor(d))
            .collect()
    }

    /// Register a descriptor.
    ///
    /// # Panics
    ///
    /// Panics on a conflicting registration; see
    /// [`try_register_descriptor`](Self::try_register_descriptor).
    pub fn register_descriptor(&mut self, descriptor: ComponentDescriptor) -> ComponentIndex {
        self.try_register_descriptor(descriptor)
            .unwrap_or_else(|e| panic!("{e}"))
    }

    /// Register a descriptor, reporting conflicts instead of panicking.
    ///
    /// Re-registering the same type under the same name is a no-op. The same
    /// type under a different name, or a different type under a taken name,
    /// is a [`EcsError::RegistrationConflict`].
    pub fn try_register_descriptor(
        &mut self,
        descriptor: ComponentDescriptor,
    ) -> EcsResult<ComponentIndex> {
        if let Some(&index) = self.by_type.get(&descriptor.type_id) {
            if self.infos[index.index()].name() != descriptor.name {
                return Err(EcsError::RegistrationConflict(descriptor.type_name));
            }
            return Ok(index);
        }
        if self.by_name.contains_key(&descriptor.name) {
            return Err(EcsError::RegistrationConflict(descriptor.type_name));
        }

        let index = ComponentIndex::new(self.infos.len());
        log::debug!(
            "registered component `{}` as {:?} ({} bytes)",
            descriptor.name,
            index,
            descriptor.size
        );
        self.by_type.insert(descriptor.type_id, index);
        self.by_name.insert(descriptor.name.clone(), index);
        self.infos.push(ComponentInfo { index, descriptor });
        Ok(index)
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ComponentInfo> {
        self.infos.iter()
    }

    /// Entry for `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` was not issued by this registry.
    pub fn info(&self, index: ComponentIndex) -> &ComponentInfo {
        self.infos
            .get(index.index())
            .unwrap_or_else(|| panic!("component index {index:?} is not registered"))
    }

    /// Byte size of the component type at `index`.
    pub fn size(&self, index: ComponentIndex) -> usize {
        self.info(index).size()
    }

    /// Reflection `TypeId` of the component type at `index`.
    pub fn type_id(&self, index: ComponentIndex) -> TypeId {
        self.info(index).type_id()
    }

    /// Index registered for `type_id`.
    ///
    /// # Panics
    ///
    /// Panics if the type was never registered.
    pub fn index_of(&self, type_id: TypeId) -> ComponentIndex {
        self.try_index_of(type_id)
            .unwrap_or_else(|| panic!("{}", EcsError::UnregisteredTypeId(type_id)))
    }

    pub fn try_index_of(&self, type_id: TypeId) -> Option<ComponentIndex> {
        self.by_type.get(&type_id).copied()
    }

    /// Index registered for `T`.
    ///
    /// # Panics
    ///
    /// Panics if `T` was never registered.
    pub fn index<T: Component>(&self) -> ComponentIndex {
        self.try_index::<T>().unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn try_index<T: Component>(&self) -> EcsResult<ComponentIndex> {
        self.try_index_of(TypeId::of::<T>())
            .ok_or(EcsError::UnregisteredComponent(std::any::type_name::<T>()))
    }

    /// Look a type up by its reflection name.
    pub fn index_by_name(&self, name: &str) -> Option<ComponentIndex> {
        self.by_name.get(name).copied()
    }

    /// A fresh, empty pool for the type at `index`.
    pub(crate) fn new_pool(&self, index: ComponentIndex) -> Box<dyn ComponentPool> {
        self.info(index).new_pool()
    }
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.infos.iter().map(|i| (i.index, i.name())))
            .finish()
    }
}
