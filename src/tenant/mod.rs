//! Multi-tenant request resolution.
//!
//! - [`context`]: the per-request [`TenantContext`]
//! - [`host`]: host header and path slug parsing
//! - [`locale`]: `Accept-Language` negotiation
//! - [`lookup`]: the [`TenantLookup`] seam to the tenant directory
//! - [`resolver`]: the [`TenantResolver`] combining the above

pub mod context;
pub mod host;
pub mod locale;
pub mod lookup;
pub mod resolver;

pub use context::{TenantContext, TenantId, TenantSource};
pub use host::{is_passthrough_path, is_valid_slug, path_slug, request_host};
pub use locale::{DEFAULT_LOCALE, SUPPORTED_LOCALES, detect_locale, is_rtl};
pub use lookup::{LookupError, StaticTenantLookup, TenantLookup, TenantRecord};
pub use resolver::{ResolverSettings, TenantError, TenantResolver};
