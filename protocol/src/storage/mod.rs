//! # Storage Module
//!
//! Durable state for line-of-credit vaults. Nothing clever: a handful of
//! sled trees holding versioned, bincode-encoded records.
//!
//! ## Architecture
//!
//! ```text
//! schema.rs: Versioned record envelope and migration hook
//! db.rs    : sled persistence with one tree per record kind
//! ```
//!
//! ## Design Decisions
//!
//! 1. **Versioned layouts, not binary compatibility.** Every record is
//!    written inside an envelope carrying its schema version. Readers
//!    upgrade old layouts explicitly instead of hoping the bytes still
//!    line up.
//!
//! 2. **Bincode on disk.** JSON is for APIs and debugging; bincode is for
//!    storage.

pub mod db;
pub mod schema;

pub use db::{AlocDb, DbError, DbResult};
pub use schema::{decode_record, encode_record, Envelope, SchemaError, VersionedRecord};
