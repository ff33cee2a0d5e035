//! Shared outbound HTTP infrastructure.

pub mod client;

pub use client::{HttpClient, HttpClientBuilder};
