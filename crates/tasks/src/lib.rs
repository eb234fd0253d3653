//! Tasks: work items owned by an organization, optionally scoped to a team
//! and/or an event.

pub mod task;

pub use task::{NewTask, Priority, Task, TaskPatch, TaskStatus};
