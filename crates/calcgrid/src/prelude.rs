//! Prelude module - common imports for calcgrid users
//!
//! ```rust
//! use calcgrid::prelude::*;
//! ```

pub use crate::{
    // Addressing
    CellAddress,
    CellKey,
    RefUnit,

    // Error types
    Error,
    Result,

    // Calculation types
    RecalcStats,
    Value,

    // Main types
    Workbook,
    WorkbookOptions,
};
