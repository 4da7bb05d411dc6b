//! Cellstore - offline cell tower geolocation.
//!
//! This crate resolves a cell tower identity (country code, operator code,
//! cell id, area code) to the tower's known position, using a read-only,
//! block-compressed store file.
//!
//! # Features
//!
//! - **Compact store format**: fixed 4KB blocks with per-block bounds and
//!   prefix-elided fields
//! - **Range search**: binary search over block metadata for full keys and
//!   key prefixes
//! - **Fallback cascade**: exact lookup, 16-bit cell id retry, then wider
//!   queries when the operator or country is unknown
//! - **Caching**: positive and negative result caches
//! - **Thread-safe**: a store and its engine can be shared across threads
//!
//! # Quick Start
//!
//! ```ignore
//! use cellstore::QueryEngine;
//! use std::path::Path;
//!
//! let engine = QueryEngine::open(Path::new("towers.bcs"))?;
//!
//! // Exact identity
//! let records = engine.query(Some(262), Some(1), 200, 100)?;
//!
//! // Cell and area only
//! let records = engine.query_cell(200, 100)?;
//! ```
//!
//! # Building Stores
//!
//! ```ignore
//! use cellstore::converter::{build_store, CsvParser};
//!
//! let records = CsvParser::parse(std::fs::File::open("towers.csv")?)?;
//! std::fs::write("towers.bcs", build_store(&records)?)?;
//! ```

mod error;

pub mod binary;
pub mod cell;
pub mod converter;
pub mod query;

// Re-export core types
pub use error::{Error, Result};
pub use cell::{CellIdentity, CellQuery, CellRecord};

// Re-export store types
pub use binary::{BlockStoreReader, BlockStoreWriter, FieldType, FieldValue, Schema};

// Re-export query engine
pub use query::{CacheStats, Config, QueryEngine, QueryEngineConfig};
