//! # WebViewer Bridge
//!
//! Request/response API on top of a script-driven embedded host whose only
//! outbound primitive is a fire-and-forget "perform script with a string
//! parameter" call, and whose replies arrive later through a global callback.
//!
//! ## Features
//!
//! - **Correlation**: every request gets a random 128-bit id and resolves exactly once
//! - **Batching**: requests issued inside the debounce window share one host call
//! - **Dirty tracking**: records and portal rows track per-field edits
//! - **Minimal commits**: creates send a full snapshot, updates send only edited data
//! - **Typed host boundary**: a closed set of request variants, parsed once at the transport
//!
//! ## Architecture
//!
//! ```text
//! Client ─► Layout ─► Record / RecordQuery
//!    │                    │ commit / fetch
//!    ▼                    ▼
//!  Bridge ── issue ─► PendingTable ─► DebounceScheduler ─► Host::perform_script
//!    ▲                                                          ┆
//!    └──────────── receive / receive_one ◄──────────────────────┘
//! ```
//!
//! ### Example
//!
//! ```ignore
//! use webviewer_bridge::prelude::*;
//!
//! let (host, calls) = ChannelHost::new();
//! let client = Client::new(BridgeConfig::default(), host)?;
//! client.set_key("token");
//!
//! let mut record = client.layout("Contacts").get_record(12).await?;
//! record.set("Name", "Ada")?;
//! record.commit().await?;
//! ```
//!
//! ## Modules
//!
//! - [`bridge`]: correlation, batching and the host transport
//! - [`records`]: dirty-tracked records and the commit diff
//! - [`layout`]: metadata, queries and host response shapes
//! - [`client`]: application entry point
//! - [`config`]: configuration and logging setup
//! - [`core`]: error types and shared macros

/// Error types and shared macros
#[macro_use]
pub mod core;
/// Request correlation, batching and host transport
pub mod bridge;
/// Application entry point
pub mod client;
/// Configuration system
pub mod config;
/// Layout handles, metadata and queries
pub mod layout;
/// Dirty-tracked records and commit payloads
pub mod records;

pub use client::Client;
pub use core::error::{BridgeError, BridgeResult, HostError, RecordError};

/// Commonly used types
pub mod prelude {
    pub use crate::bridge::protocol::SortOrder;
    pub use crate::bridge::{Bridge, ChannelHost, Host, HostCall, PendingHandle};
    pub use crate::client::Client;
    pub use crate::config::BridgeConfig;
    pub use crate::core::error::{BridgeError, BridgeResult, HostError, RecordError};
    pub use crate::layout::{FindOperator, FindRequest, Layout, Query, RecordQuery, ScriptOutcome};
    pub use crate::records::{CommitOptions, FieldValue, Record, Script};
}
