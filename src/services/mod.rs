// src/services/mod.rs
pub mod audit_service;
pub mod auth_service;
pub mod filter_service;
pub mod guest_service;
pub mod maintenance_service;
pub mod record_service;
pub mod trend_service;
pub mod user_service;
