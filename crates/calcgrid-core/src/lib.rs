//! # calcgrid-core
//!
//! Core data structures for the calcgrid calculation engine.
//!
//! This crate provides the fundamental types used throughout calcgrid:
//! - [`IndexedStore`] - Storage addressable by stable id and by volatile index
//! - [`CellAddress`], [`RefUnit`] and [`CellKey`] - Cell addressing
//! - [`Value`] - The value held by a cell
//! - [`Error`] - The error kinds shared by every crate
//!
//! ## Example
//!
//! ```rust
//! use calcgrid_core::IndexedStore;
//!
//! let mut rows: IndexedStore<String> = IndexedStore::new();
//! *rows.ensure_by_index(2).unwrap() = "third".to_string();
//! let id = rows.id_of(2).unwrap();
//!
//! // Inserting in front shifts the position but keeps the id
//! rows.insert(0, 1).unwrap();
//! assert_eq!(rows.index_of(id), Some(3));
//! ```

pub mod address;
pub mod error;
pub mod store;
pub mod value;

// Re-exports for convenience
pub use address::{CellAddress, CellKey, RefKind, RefUnit};
pub use error::{Error, Result};
pub use store::{Id, IndexedStore};
pub use value::Value;

/// Maximum number of rows in a sheet (Excel limit)
pub const MAX_ROWS: usize = 1_048_576;

/// Maximum number of columns in a sheet (Excel limit)
pub const MAX_COLS: usize = 16_384;

/// Default maximum number of sheets in a workbook
pub const MAX_SHEETS: usize = 1_024;
