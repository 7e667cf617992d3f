//! Status lifecycles and their transition tables.
//!
//! Every status column is a closed enum implementing [`Lifecycle`]. Stores
//! route each status write through [`Lifecycle::transition`], so an entity
//! can only ever move along the edges listed in its `can_transition_to`.

use crate::error::CoreError;
use std::fmt;

/// A status enum with an explicit transition table.
pub trait Lifecycle: Copy + Eq + fmt::Display {
    /// Entity name used in error messages.
    const ENTITY: &'static str;

    /// Whether `self -> next` is an allowed edge.
    fn can_transition_to(self, next: Self) -> bool;

    /// Whether no further transitions are possible.
    fn is_terminal(self) -> bool;

    /// Validate the edge `self -> next`, returning `next` on success.
    fn transition(self, next: Self) -> Result<Self, CoreError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(CoreError::InvalidTransition {
                entity: Self::ENTITY,
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}
