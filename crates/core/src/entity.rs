//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Used for resources that are mutated in place under a guard (tasks, events,
/// budgets) rather than through command/event batches.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
