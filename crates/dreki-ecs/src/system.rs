//! # System — Per-Tick Work Bound to One View
//!
//! A system declares the [`View`] it processes and receives one
//! [`ComponentRange`] per matching archetype (or per chunk of one, when the
//! controller is configured with a `chunk_size`). Structural changes go
//! through the [`Commands`] buffer passed alongside.
//!
//! ```ignore
//! struct Integrate;
//!
//! impl System for Integrate {
//!     type View = (Write<Position>, Read<Velocity>);
//!
//!     fn process(&mut self, range: ComponentRange<'_, Self::View>, _: &mut Commands) {
//!         for (pos, vel) in range {
//!             pos.0 += vel.0;
//!         }
//!     }
//! }
//! ```
//!
//! Small systems can be closures: see [`system_fn`].

use std::marker::PhantomData;

use crate::archetype::{Archetype, ArchetypeId};
use crate::commands::Commands;
use crate::component::short_type_name;
use crate::registry::ComponentRegistry;
use crate::view::{ComponentRange, View, ViewSignature};

/// Handle to a system registered with a
/// [`Controller`](crate::controller::Controller).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SystemId(u32);

impl SystemId {
    pub(crate) fn new(index: usize) -> Self {
        Self(u32::try_from(index).expect("more than u32::MAX systems"))
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A unit of per-tick computation over one view.
pub trait System: Send + 'static {
    type View: View;

    /// Process one range of one matching archetype.
    fn process(&mut self, range: ComponentRange<'_, Self::View>, commands: &mut Commands);

    /// Name shown in logs and diagnostics.
    fn name(&self) -> String {
        short_type_name(std::any::type_name::<Self>())
    }
}

/// A closure system created by [`system_fn`].
pub struct FnSystem<V, F> {
    name: String,
    f: F,
    _view: PhantomData<fn() -> V>,
}

/// Wrap a closure as a [`System`] over view `V`.
pub fn system_fn<V, F>(name: impl Into<String>, f: F) -> FnSystem<V, F>
where
    V: View,
    F: FnMut(ComponentRange<'_, V>, &mut Commands) + Send + 'static,
{
    FnSystem {
        name: name.into(),
        f,
        _view: PhantomData,
    }
}

impl<V, F> System for FnSystem<V, F>
where
    V: View,
    F: FnMut(ComponentRange<'_, V>, &mut Commands) + Send + 'static,
{
    type View = V;

    fn process(&mut self, range: ComponentRange<'_, V>, commands: &mut Commands) {
        (self.f)(range, commands);
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

/// Object-safe face of a [`System`], so systems with different views can
/// share one `Vec`.
pub(crate) trait ErasedSystem: Send {
    fn run_range(
        &mut self,
        archetype: &mut Archetype,
        registry: &ComponentRegistry,
        start: usize,
        count: usize,
        commands: &mut Commands,
    );
}

impl<S: System> ErasedSystem for S {
    fn run_range(
        &mut self,
        archetype: &mut Archetype,
        registry: &ComponentRegistry,
        start: usize,
        count: usize,
        commands: &mut Commands,
    ) {
        let range = ComponentRange::<S::View>::new(archetype, registry, start, count);
        self.process(range, commands);
    }
}

/// Per-system timing recorded during the last tick.
#[cfg(feature = "diagnostics")]
#[derive(Clone, Debug, Default)]
pub(crate) struct SystemTiming {
    pub duration_us: f64,
    pub ranges: usize,
    pub entities: usize,
}

/// A registered system with everything the controller caches about it.
pub(crate) struct SystemEntry {
    pub id: SystemId,
    pub name: String,
    pub view: ViewSignature,
    /// Archetypes whose signature satisfies `view`, in creation order.
    pub matching: Vec<ArchetypeId>,
    /// Systems that must run before this one.
    pub after: Vec<SystemId>,
    pub system: Box<dyn ErasedSystem>,
    #[cfg(feature = "diagnostics")]
    pub timing: SystemTiming,
}
