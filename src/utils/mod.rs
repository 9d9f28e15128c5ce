// src/utils/mod.rs

pub mod identity;
