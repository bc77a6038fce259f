//! Admin API client for ostor-usage
//!
//! This crate implements [`ostor_usage_core::UsageApi`] over the signed
//! `/?ostor-usage` HTTP resource of the object storage admin API.

pub mod client;
pub mod error_body;
pub mod signing;

pub use client::{ClientConfig, OstorClient};
