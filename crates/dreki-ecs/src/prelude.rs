//! Convenience re-exports — `use dreki_ecs::prelude::*` for the common items.

pub use crate::archetype::{Archetype, ArchetypeId};
pub use crate::bundle::{Bundle, ComponentSet, RawComponent};
pub use crate::commands::Commands;
pub use crate::component::Component;
pub use crate::config::{ControllerConfig, FlushPolicy};
pub use crate::controller::Controller;
pub use crate::entity::{Entity, Location};
pub use crate::error::{EcsError, EcsResult};
pub use crate::registry::{ComponentDescriptor, ComponentIndex, ComponentRegistry};
pub use crate::schedule::Schedule;
pub use crate::signature::Signature;
pub use crate::system::{System, SystemId, system_fn};
pub use crate::view::{ComponentRange, Read, View, ViewSignature, With, Without, Write};
#[cfg(feature = "diagnostics")]
pub use crate::diag::ControllerSnapshot;
