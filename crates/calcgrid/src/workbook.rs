//! Workbook, sheet, row and cell storage
//!
//! A [`Workbook`] owns the whole Sheet → Row → Cell hierarchy as three
//! nested [`IndexedStore`] levels, together with the session state of the
//! calculation engine (the calc stack and the run counter). Cells never
//! point at each other; dependency edges are sets of [`CellKey`] values
//! resolved through the stores.

use std::collections::BTreeSet;
use std::sync::Arc;

use calcgrid_core::{CellKey, IndexedStore, Value, MAX_COLS, MAX_ROWS, MAX_SHEETS};
use calcgrid_formula::Formula;
use serde::{Deserialize, Serialize};

/// Limits applied to a workbook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkbookOptions {
    /// Maximum number of sheet positions
    pub max_sheets: usize,
    /// Maximum number of row positions per sheet
    pub max_rows: usize,
    /// Maximum number of column positions per row
    pub max_cols: usize,
    /// Maximum combined expression depth of the formulas being evaluated at
    /// once before a recalculation is aborted
    ///
    /// A formula reading another cell is evaluated inside the reader's
    /// evaluation, so chains of references nest. Each formula charges the
    /// height of its expression tree while it is on the calc stack.
    pub max_calc_depth: usize,
}

impl Default for WorkbookOptions {
    fn default() -> Self {
        Self {
            max_sheets: MAX_SHEETS,
            max_rows: MAX_ROWS,
            max_cols: MAX_COLS,
            max_calc_depth: 256,
        }
    }
}

/// A sheet: rows by id and by position
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Sheet {
    pub(crate) rows: IndexedStore<Row>,
}

impl Sheet {
    /// The rows of this sheet
    pub fn rows(&self) -> &IndexedStore<Row> {
        &self.rows
    }
}

/// A row: cells (columns) by id and by position
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Row {
    pub(crate) cells: IndexedStore<Cell>,
}

impl Row {
    /// The cells of this row
    pub fn cells(&self) -> &IndexedStore<Cell> {
        &self.cells
    }
}

/// A single cell
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Cell {
    /// Input text in internal (id-form) reference syntax
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) input: Option<String>,

    /// Compiled formula, rebuilt from `input` on load
    #[serde(skip)]
    pub(crate) formula: Option<Arc<Formula>>,

    #[serde(default)]
    pub(crate) value: Value,

    /// Cells this cell's formula reads
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub(crate) providers: BTreeSet<CellKey>,

    /// Cells whose formulas read this cell
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub(crate) consumers: BTreeSet<CellKey>,

    #[serde(skip)]
    pub(crate) is_under_calc: bool,

    #[serde(skip)]
    pub(crate) last_calc_run: u64,
}

impl Cell {
    /// Stored input, with references in id form
    pub fn input(&self) -> Option<&str> {
        self.input.as_deref()
    }

    /// Current value
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Check if the cell holds a formula
    pub fn has_formula(&self) -> bool {
        self.formula.is_some()
    }

    /// Cells this cell reads
    pub fn providers(&self) -> &BTreeSet<CellKey> {
        &self.providers
    }

    /// Cells that read this cell
    pub fn consumers(&self) -> &BTreeSet<CellKey> {
        &self.consumers
    }

    /// Check if the cell is on the calc stack
    pub fn is_under_calc(&self) -> bool {
        self.is_under_calc
    }

    /// Run id of the last recalculation that brought this cell up to date
    pub fn last_calc_run(&self) -> u64 {
        self.last_calc_run
    }
}

/// Per-instance calculation state, never persisted
#[derive(Debug, Default)]
pub(crate) struct CalcSession {
    /// Cells currently being evaluated, innermost last
    pub(crate) calc_stack: Vec<CellKey>,
    /// Summed expression depth of the formulas on the calc stack
    pub(crate) nesting: usize,
    /// Id of the latest top-level recalculation
    pub(crate) current_run: u64,
    /// Formula evaluations performed in the current run
    pub(crate) recomputed: usize,
    /// Dependency edges created since the journal was opened, as
    /// `(provider, consumer)`
    pub(crate) journal: Option<Vec<(CellKey, CellKey)>>,
}

/// A reactive workbook
///
/// # Example
///
/// ```rust
/// use calcgrid::prelude::*;
///
/// let mut workbook = Workbook::new();
/// let a = CellAddress::by_index(1, 1, Some(0));
/// let b = CellAddress::by_index(2, 2, Some(0));
///
/// workbook.set_input(&a, "16").unwrap();
/// workbook.set_input(&b, "=value(positional(1, 1)) + 5").unwrap();
/// assert_eq!(workbook.get_value(&b).unwrap(), Value::Number(21.0));
///
/// workbook.set_input(&a, "3").unwrap();
/// assert_eq!(workbook.get_value(&b).unwrap(), Value::Number(8.0));
/// ```
#[derive(Debug, Serialize, Deserialize)]
pub struct Workbook {
    #[serde(default)]
    pub(crate) options: WorkbookOptions,

    /// SHA-256 digest of the protection password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) protection: Option<String>,

    pub(crate) sheets: IndexedStore<Sheet>,

    #[serde(skip)]
    pub(crate) session: CalcSession,
}

impl Workbook {
    /// Create an empty workbook with default options
    pub fn new() -> Self {
        Self::with_options(WorkbookOptions::default())
    }

    /// Create an empty workbook with custom options
    pub fn with_options(options: WorkbookOptions) -> Self {
        Self {
            sheets: IndexedStore::with_limit(options.max_sheets),
            options,
            protection: None,
            session: CalcSession::default(),
        }
    }

    /// The options this workbook was created with
    pub fn options(&self) -> &WorkbookOptions {
        &self.options
    }

    /// The sheets of this workbook
    pub fn sheets(&self) -> &IndexedStore<Sheet> {
        &self.sheets
    }

    /// One past the highest occupied sheet position
    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    /// Depth of the calc stack (zero outside a recalculation)
    pub fn calc_depth(&self) -> usize {
        self.session.calc_stack.len()
    }

    /// Id of the latest top-level recalculation
    pub fn current_run_id(&self) -> u64 {
        self.session.current_run
    }

    /// Re-apply the position limits of `options` to every store
    pub(crate) fn apply_limits(&mut self) -> calcgrid_core::Result<()> {
        let WorkbookOptions {
            max_sheets,
            max_rows,
            max_cols,
            ..
        } = self.options;

        self.sheets.set_limit(max_sheets)?;
        for sheet in self.sheets.values_mut() {
            sheet.rows.set_limit(max_rows)?;
            for row in sheet.rows.values_mut() {
                row.cells.set_limit(max_cols)?;
            }
        }
        Ok(())
    }
}

impl Default for Workbook {
    fn default() -> Self {
        Self::new()
    }
}
