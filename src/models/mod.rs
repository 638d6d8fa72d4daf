// src/models/mod.rs

pub mod admin;
pub mod attendance;
pub mod attendee;
pub mod progress;
pub mod question;
pub mod response;
pub mod review;
pub mod session;
