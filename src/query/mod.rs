//! Data synchronization layer.
//!
//! Views subscribe to logical requests by key. The [`QueryClient`] owns the
//! cache: it deduplicates concurrent requests, serves fresh entries without
//! refetching, keeps last-good data when a refresh fails and revalidates
//! watched entries when the terminal regains focus.

mod client;
mod key;
mod options;

pub use client::{EntryState, QueryClient, QuerySnapshot, Subscription};
pub use key::{fingerprint, QueryData, QueryKey};
pub use options::{EvictionPolicy, QueryOptions, RetryPolicy};
