// src/handlers/mod.rs

pub mod exercises;
pub mod progress;
pub mod results;
pub mod roles;
