//! Planka REST adapter implementing the core `BoardPort`.

pub mod client;
pub mod decode;

pub use client::PlankaClient;
