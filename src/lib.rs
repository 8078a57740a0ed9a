//! `project_import` - Project-scoped backup migration pipeline
//!
//! Extracts a single project from a full-system XML backup and recreates
//! it, with everything it owns, inside a live target system. The backup is
//! never loaded whole: every pass streams it (or a partitioned slice of
//! it) through the same record parser.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`manager`] - Pass orchestration and the run state machine
//! - [`config`] - Run options (in code or from YAML)
//! - [`xml`] - Streaming backup parser and handler dispatch
//! - [`parser`] - Record decoding into external entity beans
//! - [`model`] - External entity types as the backup describes them
//! - [`scope`] - Project scope and system-wide backup facts
//! - [`partition`] - Full backup filtered into per-family documents
//! - [`mapper`] - Old-id to new-id mappers, with automatic reconciliation
//! - [`mapping`] - Handlers that populate the mappers from the backup
//! - [`validation`] - Satisfiability checks before anything is written
//! - [`persist`] - Record transformation and concurrent target writes
//! - [`storage`] - The [`storage::ImportTarget`] seam and `SQLite` backend
//! - [`progress`] - Interval-scaled progress reporting
//! - [`error`] - Error types and handling
//! - [`logging`] - Tracing subscriber setup

pub mod config;
pub mod error;
pub mod logging;
pub mod manager;
pub mod mapper;
pub mod mapping;
pub mod model;
pub mod parser;
pub mod partition;
pub mod persist;
pub mod progress;
pub mod scope;
pub mod storage;
pub mod validation;
pub mod xml;

pub use config::ProjectImportOptions;
pub use error::{ImportError, Result};
pub use manager::{ImportReport, ImportState, ProjectImportManager};
