//! # Bundles — Groups of Components as Tuples
//!
//! Two traits are implemented for tuples of up to 8 component types:
//!
//! - [`ComponentSet`] talks about the *types* only. It is what
//!   [`Signature::of`](crate::signature::Signature::of) and
//!   [`ComponentRegistry::register_set`](crate::registry::ComponentRegistry::register_set)
//!   consume.
//! - [`Bundle`] carries *values* and knows how to push them into the pools of
//!   an archetype, or how to box them into [`RawComponent`]s when they have
//!   to travel type-erased (deferred commands).
//!
//! A scene loader that only has deserialized values in hand builds a
//! `Vec<RawComponent>` directly instead.

use std::any::TypeId;
use std::fmt;

use crate::archetype::Archetype;
use crate::component::Component;
use crate::pool::BoxedComponent;
use crate::registry::{ComponentDescriptor, ComponentRegistry};

/// A tuple of component types.
pub trait ComponentSet: 'static {
    fn type_ids() -> Vec<TypeId>;
    fn type_names() -> Vec<&'static str>;
    fn descriptors() -> Vec<ComponentDescriptor>;
}

/// A tuple of component values that can become one entity.
pub trait Bundle: ComponentSet {
    /// Push every value onto the matching pool of `archetype`. The caller
    /// guarantees the archetype's signature is exactly this bundle's type set
    /// and pushes the entity id itself.
    fn push_into(self, archetype: &mut Archetype, registry: &ComponentRegistry);

    /// Box every value.
    fn into_raw(self) -> Vec<RawComponent>;
}

/// One type-erased `(type, value)` pair of an unordered component list.
pub struct RawComponent {
    type_id: TypeId,
    type_name: &'static str,
    value: BoxedComponent,
}

impl RawComponent {
    pub fn new<T: Component>(value: T) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            value: Box::new(value),
        }
    }

    /// Wrap an already boxed value, e.g. one produced by a deserializer.
    ///
    /// # Panics
    ///
    /// Panics if `type_id` doesn't describe the boxed value.
    pub fn from_boxed(type_id: TypeId, type_name: &'static str, value: BoxedComponent) -> Self {
        assert_eq!(
            (*value).type_id(),
            type_id,
            "boxed value does not hold a `{type_name}`"
        );
        Self {
            type_id,
            type_name,
            value,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub(crate) fn into_value(self) -> BoxedComponent {
        self.value
    }
}

impl fmt::Debug for RawComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawComponent({})", self.type_name)
    }
}

macro_rules! impl_component_tuple {
    ($($T:ident),+) => {
        impl<$($T: Component),+> ComponentSet for ($($T,)+) {
            fn type_ids() -> Vec<TypeId> {
                vec![$(TypeId::of::<$T>()),+]
            }

            fn type_names() -> Vec<&'static str> {
                vec![$(std::any::type_name::<$T>()),+]
            }

            fn descriptors() -> Vec<ComponentDescriptor> {
                vec![$(ComponentDescriptor::of::<$T>()),+]
            }
        }

        impl<$($T: Component),+> Bundle for ($($T,)+) {
            #[allow(non_snake_case)]
            fn push_into(self, archetype: &mut Archetype, registry: &ComponentRegistry) {
                let ($($T,)+) = self;
                $(archetype.pool_mut(registry.index::<$T>()).push($T);)+
            }

            #[allow(non_snake_case)]
            fn into_raw(self) -> Vec<RawComponent> {
                let ($($T,)+) = self;
                vec![$(RawComponent::new($T)),+]
            }
        }
    };
}

impl_component_tuple!(A);
impl_component_tuple!(A, B);
impl_component_tuple!(A, B, C);
impl_component_tuple!(A, B, C, D);
impl_component_tuple!(A, B, C, D, E);
impl_component_tuple!(A, B, C, D, E, F);
impl_component_tuple!(A, B, C, D, E, F, G);
impl_component_tuple!(A, B, C, D, E, F, G, H);
