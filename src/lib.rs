//! Tiergate - Tiered Rate Limiting Service
//!
//! This crate implements per-client fixed-window rate limiting in three named
//! tiers (strict, normal, lenient) on top of a single in-process TTL cache,
//! together with the HTTP request gate and diagnostics that front an RPC API.

pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;
