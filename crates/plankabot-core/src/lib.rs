//! Core domain + application logic for the Planka Telegram bridge.
//!
//! This crate is framework-agnostic. Telegram, the Planka REST API and the
//! SQLite id store live behind ports (traits) implemented in adapter crates.

pub mod board;
pub mod commands;
pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod ledger;
pub mod logging;
pub mod messaging;
pub mod notify;
pub mod poller;
pub mod short_id;

pub use errors::{Error, Result};
