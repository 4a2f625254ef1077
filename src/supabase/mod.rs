//! Supabase (PostgREST) backend.

pub mod client;

pub use client::{RPC_TENANT_BY_HOST, RPC_TENANT_BY_SLUG, SupabaseClient, TENANT_HEADER, parse_tenant};
