//! FitTrack Client Offline Cache
//!
//! Client-side tier of the three-tier cache (client → edge → origin).
//! Independent of the edge router: same shape of policy, its own rules and
//! its own storage.
//!
//! - Three versioned partitions: app shell, static assets, API responses
//! - Install pre-fetches the app shell; activate drops unknown partitions
//! - Navigation: network-first, falling back to the cached root document
//! - Same-origin static assets: cache-first
//! - A few same-origin API reads: network-first with a JSON offline fallback
//! - Everything else is left to the network

#![warn(missing_docs)]

pub mod config;
pub mod network;
pub mod storage;
pub mod worker;

use thiserror::Error;

pub use config::OfflineConfig;
pub use network::{ClientRequest, ClientResponse, HttpNetwork, Network, RequestMode};
pub use storage::{CacheStorage, Partition};
pub use worker::{FetchOutcome, OfflineCache};

/// Offline cache errors
#[derive(Debug, Error)]
pub enum OfflineError {
    /// No response could be obtained
    #[error("network error: {0}")]
    Network(String),
    /// A response arrived but was not a success
    #[error("bad response for {url}: {status}")]
    BadStatus {
        /// Requested URL
        url: String,
        /// Status received
        status: u16,
    },
    /// A configured path could not be resolved against the origin
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}
