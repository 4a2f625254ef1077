pub mod tenant;

// Re-export middleware functions
pub use tenant::tenant_middleware;
