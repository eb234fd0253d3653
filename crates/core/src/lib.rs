//! `clubhouse-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod aggregate;
pub mod entity;
pub mod error;
pub mod id;
pub mod validate;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot, DomainEvent, ExpectedVersion};
pub use entity::Entity;
pub use error::{DomainError, DomainResult, ErrorBody, ErrorKind};
pub use id::{BudgetId, EventId, OrganizationId, TaskId, TeamId, UserId};
pub use value_object::ValueObject;
