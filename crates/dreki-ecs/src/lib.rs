//! # Dreki ECS — Archetype Storage and Scheduled Systems
//!
//! An Entity Component System in the archetype style of
//! [hecs](https://github.com/Ralith/hecs) and
//! [bevy_ecs](https://github.com/bevyengine/bevy): entities with the same set
//! of component types share an [`Archetype`](archetype::Archetype), which
//! stores each type in its own dense, index-aligned column.
//!
//! ```text
//! ComponentRegistry ──► Signature ──► Archetype { pools[], entities[] }
//!                                          ▲
//! Controller ── EntityTable (Entity → archetype + row)
//!     │
//!     └── Systems (View) ── Schedule (conflict-free stages) ── tick()
//! ```
//!
//! Start with `use dreki_ecs::prelude::*`, register component types on a
//! [`ComponentRegistry`](registry::ComponentRegistry), and hand it to a
//! [`Controller`](controller::Controller).
//!
//! ## Module Overview
//!
//! - [`registry`] — Component types and their dense indices
//! - [`signature`] — Sorted component-type sets
//! - [`pool`] — Typed columns behind a type-erased trait
//! - [`archetype`] — Entities sharing one signature
//! - [`entity`] — Generational handles and their locations
//! - [`view`] — Typed access to a range of one archetype
//! - [`system`] / [`schedule`] — Per-tick work and its ordering
//! - [`commands`] — Structural changes deferred to a sync point
//! - [`controller`] — Owns everything and runs the tick

pub mod archetype;
pub mod bundle;
pub mod commands;
pub mod component;
pub mod config;
pub mod controller;
pub mod entity;
pub mod error;
pub mod pool;
pub mod prelude;
pub mod registry;
pub mod schedule;
pub mod signature;
pub mod system;
pub mod view;

#[cfg(feature = "diagnostics")]
pub mod diag;
