//! FitTrack Edge Router
//!
//! Per-tenant request router deployed in front of a trainer's self-hosted
//! backend:
//! - Static assets: cache-first with a 24h edge copy
//! - `/api/*` and `/public/*`: network-first proxy to the tenant origin,
//!   cache-aside into the tenant's KV namespace for a fixed set of read
//!   endpoints, stale fallback when the origin is unreachable
//! - `/uploads/*`: object store passthrough
//! - Origin rebinds picked up by polling the registry's tenant record
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                           EDGE ROUTER                               │
//! │                                                                     │
//! │  request ──► RouteTable ──┬── Health ───────────► fixed JSON        │
//! │                           ├── Upload ───────────► ObjectStore       │
//! │                           ├── StaticAsset ──────► AssetCache ─┐     │
//! │                           ├── Dynamic ──────────► Origin ─────┤     │
//! │                           │        │ failure                  │     │
//! │                           │        └──► KvStore (stale)       │     │
//! │                           └── Unmatched ────────► 404         │     │
//! │                                                               ▼     │
//! │                                   BackgroundWriter (bounded queue)  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]

pub mod assets;
pub mod classify;
pub mod config;
pub mod message;
pub mod origin;
pub mod router;
pub mod server;
pub mod stats;
pub mod sync;
pub mod writer;

use thiserror::Error;

pub use classify::{cache_key, CacheRules, RouteKind, RouteTable};
pub use config::{EdgeConfig, KvBackend};
pub use message::{EdgeRequest, EdgeResponse};
pub use origin::{HttpOrigin, OriginClient, OriginError, OriginRequest};
pub use router::{EdgeBackends, EdgeRouter};
pub use stats::{EdgeStats, StatsSnapshot};
pub use sync::{OriginSource, RegistryOrigin};
pub use writer::BackgroundWriter;

/// Edge error types
#[derive(Debug, Error)]
pub enum EdgeError {
    /// Listener or transport failure
    #[error("network error: {0}")]
    Network(String),
    /// Invalid or unreadable configuration
    #[error("config error: {0}")]
    Config(String),
}
