//! # docbind core
//!
//! Typed document collections over an Elasticsearch-compatible engine:
//! collection binding, partition provisioning, query composition, result
//! projection and the transport seam.
//!
//! This crate contains no HTTP client, filesystem I/O or async runtime.
//! Engines are reached through the [`Transport`] trait; the application
//! crate supplies an HTTP implementation. The `memory` feature adds
//! `InMemoryEngine`, a test double that answers the requests this crate
//! sends.
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`config`] | `ConnectionConfig`, naming and validation |
//! | [`schema`] | per-collection settings and mappings |
//! | [`binding`] | declarations resolved to physical partitions |
//! | [`context`] | `ContextBuilder` and `Context` |
//! | [`collection`] | `Collection<T>` and its blocking view |
//! | [`provision`] | idempotent ensure/drop of partitions |
//! | [`query`] | `Query` tree and `SearchRequest` |
//! | [`result`] | `SearchResult<T>` |
//! | [`engine`] | `Transport`, `EngineRequest`, `EngineResponse` |
//! | `memory` | `InMemoryEngine` test double (feature `memory`) |

pub mod binding;
pub mod collection;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod field;
#[cfg(feature = "memory")]
pub mod memory;
pub mod models;
mod ops;
pub mod provision;
pub mod query;
pub mod result;
pub mod schema;

pub use binding::CollectionBinding;
pub use collection::{BlockingCollection, Collection};
pub use config::{Auth, ConnectionConfig};
pub use context::{Context, ContextBuilder};
pub use engine::{EngineRequest, EngineResponse, Method, RequestBody, Transport};
pub use error::{Error, Result};
pub use field::{Direction, Field, Sort};
#[cfg(feature = "memory")]
pub use memory::InMemoryEngine;
pub use models::{Document, DocumentId, Visibility};
pub use provision::Provisioner;
pub use query::{BoolQuery, Query, SearchRequest};
pub use result::{RawResponse, SearchResult};
pub use schema::{FieldKind, FieldMapping, IndexSchema, IndexSettings, Mappings, SchemaRegistry};
