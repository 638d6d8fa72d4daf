// src/handlers/mod.rs

pub mod admin;
pub mod attendee;
pub mod auth;
pub mod feedback;
pub mod quiz;
pub mod sessions;
