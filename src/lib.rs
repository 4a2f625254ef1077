pub mod admin;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod hooks;
pub mod middleware;
pub mod plugin;
pub mod routes;
pub mod state;
pub mod supabase;
pub mod tenant;
pub mod tier;

// Re-export commonly used items for convenience
pub use config::ServerConfig;
pub use errors::{AppError, AppResult};
pub use hooks::{HookError, HookHandle, HookRegistry, HookReport};
pub use plugin::{Plugin, PluginError, PluginManager};
pub use state::AppState;
pub use tenant::{TenantContext, TenantId, TenantResolver};
pub use tier::{Tier, TierFeatureTable};
