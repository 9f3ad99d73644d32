//! # Component — Plain Data Attached to Entities
//!
//! A component is any `'static + Send + Sync` value: a `Position`, a
//! `Velocity`, a `Health`. There is no derive and nothing to implement; the
//! blanket impl below makes every eligible type a [`Component`]. What a type
//! *does* need is a registration in the
//! [`ComponentRegistry`](crate::registry::ComponentRegistry) before any
//! entity carries it.

/// Marker trait for types that can be stored in an archetype.
pub trait Component: Send + Sync + 'static {}

impl<T: Send + Sync + 'static> Component for T {}

/// Strip the module path from a fully-qualified type name, keeping generic
/// arguments readable (`my_game::Health` → `Health`,
/// `alloc::vec::Vec<my_game::Tag>` → `Vec<Tag>`).
pub(crate) fn short_type_name(full: &str) -> String {
    let mut out = String::with_capacity(full.len());
    let mut segment = String::new();
    for ch in full.chars() {
        match ch {
            '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | ';' | '&' => {
                out.push_str(segment.rsplit("::").next().unwrap_or(&segment));
                segment.clear();
                out.push(ch);
            }
            _ => segment.push(ch),
        }
    }
    out.push_str(segment.rsplit("::").next().unwrap_or(&segment));
    out
}
