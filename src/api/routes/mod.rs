//! API Routes Module
//!
//! Contains route handlers organized by domain:
//! - health: Health check endpoint
//! - whitelist: Whitelist table endpoints

pub mod health;
pub mod whitelist;
