//! Core library for aui: configuration, login, the assistant event relay and
//! the Assistants API client.

pub mod auth;
pub mod config;
pub mod core;
pub mod providers;
