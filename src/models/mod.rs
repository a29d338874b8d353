// src/models/mod.rs
pub mod dashboard;
pub mod guest;
pub mod record;
pub mod user;
