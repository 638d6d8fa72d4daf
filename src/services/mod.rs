// src/services/mod.rs

pub mod attendance;
pub mod feedback;
pub mod identity;
pub mod ledger;
pub mod progress;
pub mod questions;
pub mod registry;
