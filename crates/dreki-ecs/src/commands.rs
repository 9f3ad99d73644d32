//! # Commands — Deferred Structural Changes
//!
//! While a system iterates a [`ComponentRange`](crate::view::ComponentRange)
//! it mutably borrows an archetype, so it can't create or destroy entities
//! or move them between archetypes. It records those changes in a
//! [`Commands`] buffer instead, and the controller applies them at the next
//! sync point (after the system, or at the end of the tick, depending on
//! [`FlushPolicy`](crate::config::FlushPolicy)).
//!
//! Commands are applied in the order they were recorded. A command that
//! fails (e.g. it targets an entity that an earlier command destroyed) is
//! logged and skipped; the rest still apply.

use std::any::TypeId;

use crate::bundle::{Bundle, RawComponent};
use crate::component::Component;
use crate::entity::Entity;

/// One recorded structural change.
#[derive(Debug)]
pub(crate) enum Command {
    Create(Vec<RawComponent>),
    Destroy(Entity),
    Add(Entity, RawComponent),
    Remove {
        entity: Entity,
        type_id: TypeId,
        type_name: &'static str,
    },
}

/// A queue of structural changes waiting for a sync point.
#[derive(Debug, Default)]
pub struct Commands {
    queue: Vec<Command>,
}

impl Commands {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue creation of an entity from a typed bundle.
    pub fn create<B: Bundle>(&mut self, bundle: B) {
        self.queue.push(Command::Create(bundle.into_raw()));
    }

    /// Queue creation of an entity from an unordered raw component list.
    pub fn create_raw(&mut self, components: Vec<RawComponent>) {
        self.queue.push(Command::Create(components));
    }

    pub fn destroy(&mut self, entity: Entity) {
        self.queue.push(Command::Destroy(entity));
    }

    /// Queue adding (or replacing) a component.
    pub fn add<T: Component>(&mut self, entity: Entity, value: T) {
        self.queue.push(Command::Add(entity, RawComponent::new(value)));
    }

    pub fn add_raw(&mut self, entity: Entity, component: RawComponent) {
        self.queue.push(Command::Add(entity, component));
    }

    /// Queue removal of a component. The removed value is dropped.
    pub fn remove<T: Component>(&mut self, entity: Entity) {
        self.queue.push(Command::Remove {
            entity,
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        });
    }

    /// Number of queued commands.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Drop every queued command.
    pub fn clear(&mut self) {
        self.queue.clear();
    }

    /// Move every queued command to the end of `other`.
    pub fn append(&mut self, other: &mut Commands) {
        other.queue.append(&mut self.queue);
    }

    pub(crate) fn take(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.queue)
    }
}
