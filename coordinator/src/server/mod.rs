//! HTTP surfaces: the profiling API and the admin endpoints.

pub mod api;
pub mod auth;
pub mod http;
