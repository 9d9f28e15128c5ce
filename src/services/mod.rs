// src/services/mod.rs

//! Business operations. Each takes the gateway explicitly; none holds state.

pub mod exercises;
pub mod progress;
pub mod query;
pub mod results;
pub mod roles;
