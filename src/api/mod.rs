//! API Layer Module
//!
//! HTTP server, routes and middleware for the presale admin dashboard.

pub mod middleware;
pub mod routes;
pub mod server;

// Re-exports for convenience
pub use middleware::{ApiError, ValidationResult};
pub use server::{create_router, open_document_store, start_server, AppState, SharedAppState};
