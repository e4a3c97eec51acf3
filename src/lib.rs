//! # cfengine
//!
//! User-defined, typed attributes for any record type, stored in a
//! schemaless per-record document and validated against a separate schema
//! catalog. Usable both as a standalone binary and as a library.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! cfengine = { version = "0.0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use cfengine::customfields::CustomFieldManager;
//! use cfengine::jobs;
//! use cfengine::store::{SqliteStore, Store};
//!
//! let store = SqliteStore::new("./data/cfengine.db").unwrap();
//! store.initialize().unwrap();
//! let store: cfengine::store::SharedStore = Arc::new(store);
//!
//! let (queue, worker) = jobs::channel(store.clone(), "custom_fields");
//! tokio::spawn(worker.run());
//! let manager = CustomFieldManager::new(store, Arc::new(queue));
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Includes CLI module. Disable with `default-features = false`.

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod customfields;
pub mod error;
pub mod jobs;
pub mod store;
pub mod types;
