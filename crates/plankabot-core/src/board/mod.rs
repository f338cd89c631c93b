//! Kanban board abstractions (Planka today).

pub mod port;
pub mod types;
