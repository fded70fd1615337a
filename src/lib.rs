//! # docbind
//!
//! The application side of docbind: an HTTP [`Transport`](docbind_core::Transport)
//! for Elasticsearch-compatible engines, TOML configuration, logging setup
//! and the commands behind the `docbind` binary. The collection layer itself
//! lives in [`docbind_core`], re-exported here as [`core`].
//!
//! ```text
//! ┌──────────────┐   ┌────────────────────┐   ┌─────────────┐
//! │ Collection<T>│──▶│ ops (request plans)│──▶│  Transport  │──▶ engine
//! └──────┬───────┘   └────────────────────┘   │ http/memory │
//!        │                                    └─────────────┘
//!   ContextBuilder ── resolve ── provision
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`http`] | `reqwest` transport with single-node and multi-node strategies |
//! | [`config`] | TOML configuration parsing |
//! | [`logging`] | `tracing-subscriber` setup |
//! | [`collections`] | `docbind collections` |
//! | [`provision`] | `docbind provision` / `docbind drop` |
//! | [`get`] | `docbind get` |
//! | [`search`] | `docbind search` |

pub use docbind_core as core;

pub mod collections;
pub mod config;
pub mod get;
pub mod http;
pub mod logging;
pub mod provision;
pub mod search;

pub use http::HttpTransport;
