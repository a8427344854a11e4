//! Device-management transport

pub mod client;

pub use client::{HttpTransport, ResourceReader};
