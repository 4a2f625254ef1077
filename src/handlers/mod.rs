//! HTTP request handlers
//!
//! This module organizes all API handlers into logical groups:
//! - `api` - Health check endpoint
//! - `tenant` - Tenant context, tier features and the admin menu
//! - `plugins` - Plugin listing and per-tenant activation
//! - `slots` - Rendering of plugin component slots

pub mod api;
pub mod plugins;
pub mod slots;
pub mod tenant;
