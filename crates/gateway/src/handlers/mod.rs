//! API handlers module

pub mod evaluations;
pub mod health;
pub mod sessions;
