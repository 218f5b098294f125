//! Infrastructure adapters.

pub mod config;
