//! # Repository Layer
//!
//! Repository implementations that encapsulate SeaORM operations for the sync tables.

pub mod repo_sync;

pub use repo_sync::RepoSyncRepository;
