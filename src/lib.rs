//! # reposync Library
//!
//! Mirrors GitLab repositories into object storage when pushes arrive. The
//! [`orchestrator`] owns the sync protocol; the other modules are its collaborators
//! and the HTTP surface around it.

pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod models;
pub mod orchestrator;
pub mod platform;
pub mod redelivery;
pub mod repositories;
pub mod retry;
pub mod server;
pub mod storage;
pub mod telemetry;
pub mod transfer;
pub use migration;
