//! cadence - task state reconciliation library
//!
//! Keeps a personal task list consistent across a local persisted store and a
//! remote per-user document collection, and derives dashboard statistics from
//! whichever source a view shows.
//!
//! # Module Organization
//!
//! - `models`: local and remote task schemas, the shared display capability
//! - `storage`: opaque blob persistence and the local task snapshot codec
//! - `engine`: the reconciliation engine owning the canonical collection
//! - `service`: runs the engine on a single task behind a cloneable handle
//! - `aggregate`: dashboard statistics and list filters
//! - `remote`: remote document reads and the display-only projection
//! - `sync`: remote task writes for the signed-in user
//! - `config`: configuration loading from `config.toml`
//! - `commands`: command implementations used by the CLI
//! - `error`: error types, diagnostics and result aliases

pub mod aggregate;
pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod remote;
pub mod service;
pub mod storage;
pub mod sync;

pub use error::{Diagnostic, Error, Result};
