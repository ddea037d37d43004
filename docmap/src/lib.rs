//! # Docmap - Embedded Document Mapper Core
//!
//! Docmap is the tracking core of a document mapper: it keeps identity, detects
//! changes, and orders commits for documents flowing between an application
//! and a backing store. The store itself is pluggable through the
//! [persister::Persister] trait; docmap never performs I/O of its own.
//!
//! ## Key Features
//!
//! - **Identity Map**: At most one tracked instance per document identity within a session
//! - **Dirty Checking**: Field-level change sets computed against commit-time snapshots
//! - **Commit Ordering**: Topological ordering over required reference edges
//! - **Fail-Fast Commits**: Partial commit reporting without compensating rollbacks
//! - **Lifecycle Events**: Listeners around every persist, update, remove, and commit
//! - **Explicit Mapping**: Per-type field declarations instead of runtime reflection
//! - **Clean API**: PIMPL pattern provides stable, encapsulated interface
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use docmap::{doc, DocumentMapper, EntityMapping};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Configure and open a mapper over a persister
//! let mapper = DocumentMapper::builder()
//!     .mapping(
//!         EntityMapping::builder("Book")
//!             .id_field("id")
//!             .scalar("title")
//!             .reference("author", "Author", true)
//!             .build()?,
//!     )
//!     .open(persister)?;
//!
//! // Track and commit documents through a session
//! let session = mapper.session()?;
//! let uow = session.begin_unit_of_work()?;
//! let book = uow.register_new("Book", doc! { "id" => 1i64, "title" => "Dune" })?;
//!
//! let report = uow.commit()?;
//! assert!(report.failed().is_empty());
//!
//! // Mutations after commit are picked up by dirty checking
//! book.set("title", "Dune Messiah")?;
//! uow.commit()?;
//!
//! mapper.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Design Pattern
//!
//! Docmap uses the **PIMPL (Pointer To IMPLementation)** design pattern to provide:
//!
//! - **Encapsulation**: Implementation details are completely hidden
//! - **API Stability**: Public interface is stable and can evolve independently
//! - **Thread Safety**: All clones share the same underlying state through `Arc`
//!
//! ## Module Organization
//!
//! - [`changeset`] - Change sets and the dirty-checking computer
//! - [`common`] - Common types and the [common::Value] data model
//! - [`document`] - Documents, document refs, and the [doc!] macro
//! - [`errors`] - Error types, commit reports, and result definitions
//! - [`events`] - Lifecycle events, listeners, and the event bus
//! - [`identity_map`] - The per-unit-of-work identity map
//! - [`mapper`] - Core mapper interface
//! - [`mapper_builder`] - Mapper builder for initialization
//! - [`mapper_config`] - Mapper configuration
//! - [`mapping`] - Mapping metadata and the [mapping::MetadataProvider] trait
//! - [`persister`] - The storage boundary trait
//! - [`session`] - Identity-scoped sessions
//! - [`unit_of_work`] - The unit of work and entity lifecycle states

pub mod changeset;
pub mod common;
pub mod document;
pub mod errors;
pub mod events;
pub mod identity_map;
pub mod mapper;
pub mod mapper_builder;
pub mod mapper_config;
pub mod mapping;
pub mod persister;
pub mod session;
pub mod unit_of_work;

pub use common::Value;
pub use document::{Document, DocumentRef};
pub use errors::{DocmapError, DocmapResult, ErrorKind};
pub use mapper::DocumentMapper;
pub use mapping::EntityMapping;
pub use session::Session;
pub use unit_of_work::{EntityState, TrackedEntity, UnitOfWork};
