pub mod event;

pub use event::*;

/// Idempotent bootstrap for the `events` table.
pub const EVENTS_DDL: &str = include_str!("events.sql");
