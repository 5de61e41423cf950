//! Services Layer
//!
//! Business workflows that span several repository calls.

pub mod auth_service;
