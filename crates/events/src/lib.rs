//! Organization events (meetups, workshops, competitions) and their schedule
//! rules.

pub mod event;

pub use event::{Event, EventPatch, EventQuery, EventStatus, NewEvent};
