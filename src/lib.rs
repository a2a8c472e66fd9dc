//! fplsync - Fantasy Premier League data synchronizer
//!
//! Fetches reference and per-player data from the public FPL API, reshapes
//! each record into a typed row and reconciles it into SQLite so that only
//! rows whose tracked columns changed are rewritten.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`model`] - Entity kinds, rows and table layouts
//! - [`materialize`] - Record to row conversion
//! - [`source`] - FPL API client and in-memory source
//! - [`storage`] - SQLite database layer and run ledger
//! - [`sync`] - Fingerprinting, upserts and the pipeline
//! - [`config`] - Configuration management
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod materialize;
pub mod model;
pub mod source;
pub mod storage;
pub mod sync;

pub use error::{Error, Result};
