//! Database module: the SQLite mirror.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring the catalog rows
//! - `schema.rs`: SQL DDL for initializing the database (SQLite-first)
//! - `actor.rs`: the actor owning the pool; sync cycles and reads go through it

pub mod actor;
pub mod models;
pub mod schema;

pub use models::{DbAiModel, DbBlockTemplate, DbCategory, DbLanguage, DbWrapper};
pub use schema::SQLITE_INIT;

pub use actor::{DbActorHandle, connect, spawn};
