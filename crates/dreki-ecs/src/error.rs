//! # Errors — What Can Go Wrong at the Edges
//!
//! Most misuse of the ECS is a programming error: creating an entity with a
//! component list that doesn't match its archetype, touching a pool the
//! archetype doesn't own, or using an entity handle after it was destroyed.
//! The plain API (`create_entity`, `destroy_entity`, `add_component`, ...)
//! panics on these with the message of the matching [`EcsError`].
//!
//! Callers that feed the ECS untrusted data (scene loaders, command buffers,
//! tooling) use the `try_*` variants instead and get the error back.

use std::any::TypeId;

use crate::archetype::ArchetypeId;
use crate::entity::Entity;
use crate::system::SystemId;

/// Alias for `Result<T, EcsError>`.
pub type EcsResult<T> = Result<T, EcsError>;

/// Errors reported by the fallible (`try_*`) ECS operations.
#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    /// The handle refers to an entity that was destroyed (or never existed).
    #[error("stale entity handle {0:?}")]
    StaleEntity(Entity),

    /// A component type was used before being registered.
    #[error("component type `{0}` is not registered")]
    UnregisteredComponent(&'static str),

    /// A type-erased component carried a `TypeId` the registry doesn't know.
    #[error("component type {0:?} is not registered")]
    UnregisteredTypeId(TypeId),

    /// A raw component list did not match the exact type set of its
    /// destination archetype.
    #[error("component list {supplied:?} does not match signature {expected:?}")]
    SignatureMismatch {
        /// Component names of the destination signature.
        expected: Vec<&'static str>,
        /// Component names actually supplied.
        supplied: Vec<&'static str>,
    },

    /// The same component type appeared twice where a set was expected.
    #[error("component type `{0}` appears more than once")]
    DuplicateComponent(&'static str),

    /// A descriptor disagreed with an earlier registration of the same type.
    #[error("conflicting registration for component type `{0}`")]
    RegistrationConflict(&'static str),

    /// System ordering constraints form a cycle.
    #[error("system ordering cycle: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),

    /// A [`SystemId`] that doesn't belong to this controller.
    #[error("unknown system {0:?}")]
    UnknownSystem(SystemId),

    /// An [`ArchetypeId`] that doesn't belong to this controller.
    #[error("unknown archetype {0:?}")]
    UnknownArchetype(ArchetypeId),

    /// A diagnostics snapshot could not be serialized.
    #[error("failed to serialize diagnostics snapshot: {0}")]
    Snapshot(serde_json::Error),

    /// The controller configuration could not be parsed.
    #[error("invalid controller config: {0}")]
    Config(#[from] serde_json::Error),
}
