//! Outbound HTTP plumbing shared by the feed providers

mod client;

pub use client::{HttpClient, HttpClientBuilder};
