//! # calcgrid
//!
//! A reactive calculation engine.
//!
//! A [`Workbook`] holds sheets of rows of cells. Every sheet, row and cell
//! can be addressed by a stable id or by its current position, so inserting
//! and deleting sheets, rows and columns never breaks a formula. Writing a
//! cell recalculates exactly the cells that read it, directly or through
//! other cells, and each of them once.
//!
//! ## Features
//!
//! - Cells addressed by id or by position ([`CellAddress`], [`RefUnit`])
//! - Formulas reading other cells through `value(positional(row, col))`
//! - Incremental recalculation with circular reference detection
//! - Structural insert and delete of sheets, rows and columns
//! - JSON persistence and password protection
//!
//! ## Example
//!
//! ```rust
//! use calcgrid::prelude::*;
//!
//! let mut workbook = Workbook::new();
//! let a = CellAddress::by_index(1, 1, Some(0));
//! let b = CellAddress::by_index(2, 2, Some(0));
//! let c = CellAddress::by_index(3, 3, Some(0));
//!
//! workbook.set_input(&a, "16").unwrap();
//! workbook.set_input(&b, "=value(positional(1, 1)) + 5").unwrap();
//! workbook.set_input(&c, "=value(positional(2, 2)) + 6").unwrap();
//! assert_eq!(workbook.get_value(&c).unwrap(), Value::Number(27.0));
//!
//! let stats = workbook.set_input(&a, "3").unwrap();
//! assert_eq!(stats.cells_recomputed, 2);
//! assert_eq!(workbook.get_value(&c).unwrap(), Value::Number(14.0));
//!
//! // A cell reading itself, even indirectly, is rejected
//! let err = workbook.set_input(&a, "=value(positional(3, 3)) + 1").unwrap_err();
//! assert!(err.is_circular_reference());
//! assert_eq!(workbook.get_value(&a).unwrap(), Value::Number(3.0));
//! ```

pub mod calculation;
mod dependency;
mod persist;
pub mod prelude;
mod protection;
mod resolver;
mod rewrite;
mod structure;
pub mod workbook;

// Re-export calculation and storage types
pub use calculation::RecalcStats;
pub use workbook::{Cell, Row, Sheet, Workbook, WorkbookOptions};

// Re-export core types
pub use calcgrid_core::{
    CellAddress,
    CellKey,
    // Error types
    Error,
    Id,
    IndexedStore,
    RefKind,
    RefUnit,
    Result,
    Value,

    // Constants
    MAX_COLS,
    MAX_ROWS,
    MAX_SHEETS,
};

// Re-export formula types
pub use calcgrid_formula::{
    compile, EvalContext, Formula, FormulaError, FormulaResult, NoCells, RefForm,
};
