//! Supplier portal REST API: client, wire types and query keys.

mod api_types;
mod client;
pub mod queries;
pub mod types;

pub use client::{ClientError, PortalClient};
pub use queries::PortalQueryKey;
