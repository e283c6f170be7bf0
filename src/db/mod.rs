//! Database module: models and schema for persistent storage.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring DB rows
//! - `patch.rs`: write payloads accepted by the actor
//! - `schema.rs`: SQL DDL for initializing the database (SQLite-first)
//! - `actor.rs`: the actor owning the pool, and its cloneable handle

pub mod actor;
pub mod models;
pub mod patch;
pub mod schema;

pub use models::{DbImage, DbProfile, DbSession};
pub use patch::{CommittedGeneration, GenerationCommit, ProfileCreate, ProfilePatch};
pub use schema::SQLITE_INIT;

pub use actor::{DbActorHandle, spawn};
