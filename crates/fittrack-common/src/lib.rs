//! FitTrack Common
//!
//! Building blocks shared by the edge router, the registration service and
//! the companion client:
//! - Error taxonomy mapped onto HTTP status codes
//! - Key/value cache stores with write-time TTL
//! - Object stores for uploaded media
//! - Cloudflare resource API client
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                         FITTRACK COMMON                           │
//! │                                                                   │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐  ┌──────────┐  │
//! │  │  ApiError   │  │   KvStore   │  │ ObjectStore │  │Cloudflare│  │
//! │  │  taxonomy   │  │ memory / KV │  │ memory / fs │  │  client  │  │
//! │  └─────────────┘  └──────┬──────┘  └─────────────┘  └────┬─────┘  │
//! │                          └───────────────────────────────┘        │
//! └───────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]

pub mod cloudflare;
pub mod error;
pub mod kv;
pub mod objects;
pub mod telemetry;

pub use cloudflare::{Binding, CloudflareClient, CloudflareError};
pub use error::{ApiError, StoreError};
pub use kv::{CloudflareKv, KvStore, MemoryKv};
pub use objects::{DirObjectStore, MemoryObjectStore, ObjectStore, StoredObject};
