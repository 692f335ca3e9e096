//! Workbook calculation engine
//!
//! Recalculation is pull based. Writing a cell starts a new calc run; the
//! written cell is recomputed, then every cell reachable through consumer
//! edges is brought up to date. A formula reading another cell records a
//! dependency edge and forces that cell current first, so evaluation order
//! follows the data and each cell is evaluated at most once per run.
//!
//! # Example
//!
//! ```rust
//! use calcgrid::prelude::*;
//!
//! let mut workbook = Workbook::new();
//! let a = CellAddress::by_index(0, 0, Some(0));
//! let b = CellAddress::by_index(0, 1, Some(0));
//!
//! workbook.set_input(&a, "10").unwrap();
//! workbook.set_input(&b, "=value(positional(0, 0)) * 2").unwrap();
//!
//! let stats = workbook.set_input(&a, "21").unwrap();
//! assert_eq!(stats.cells_recomputed, 1);
//! assert_eq!(workbook.get_value(&b).unwrap(), Value::Number(42.0));
//! ```

use std::collections::{BTreeSet, VecDeque};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use ahash::AHashSet;
use calcgrid_core::{CellAddress, CellKey, Error, Result, Value};
use calcgrid_formula::{compile, EvalContext, Formula, FormulaError, NoCells};

use crate::workbook::Workbook;

/// Statistics from one top-level recalculation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecalcStats {
    /// Id of the calc run
    pub run_id: u64,
    /// Number of formula evaluations performed
    pub cells_recomputed: usize,
    /// Number of consumer cells reached from the written cell
    pub consumers_visited: usize,
}

/// State of a cell before `set_input` reset it
struct CellSnapshot {
    input: Option<String>,
    formula: Option<Arc<Formula>>,
    value: Value,
    providers: BTreeSet<CellKey>,
}

/// A cell on the calc stack
///
/// Entering pushes the cell, marks it under calculation and charges its
/// formula depth to the session; dropping undoes all three, on every exit
/// path.
struct CalcFrame<'a> {
    workbook: &'a mut Workbook,
    key: CellKey,
    depth: usize,
}

impl<'a> CalcFrame<'a> {
    fn enter(workbook: &'a mut Workbook, key: CellKey, depth: usize) -> Self {
        workbook.session.calc_stack.push(key);
        workbook.session.nesting += depth;
        if let Some(cell) = workbook.cell_by_key_mut(key) {
            cell.is_under_calc = true;
        }
        Self {
            workbook,
            key,
            depth,
        }
    }
}

impl Drop for CalcFrame<'_> {
    fn drop(&mut self) {
        let popped = self.workbook.session.calc_stack.pop();
        debug_assert_eq!(popped, Some(self.key));
        self.workbook.session.nesting -= self.depth;
        if let Some(cell) = self.workbook.cell_by_key_mut(self.key) {
            cell.is_under_calc = false;
        }
    }
}

impl Deref for CalcFrame<'_> {
    type Target = Workbook;

    fn deref(&self) -> &Workbook {
        self.workbook
    }
}

impl DerefMut for CalcFrame<'_> {
    fn deref_mut(&mut self) -> &mut Workbook {
        self.workbook
    }
}

impl EvalContext for Workbook {
    fn cell_value(&mut self, address: &CellAddress) -> Result<Value> {
        self.get_value(address)
    }
}

impl Workbook {
    /// Set the input of a cell and recalculate everything that depends on it
    ///
    /// Input starting with `=` is a formula. Anything else is evaluated as a
    /// literal expression (`42`, `'text'`, `[1, 2]`, `{a: 1}`,
    /// `date(2016, 3, 1)`) and kept as plain text when that fails. Empty
    /// input clears the cell. Positional references are stored in id form,
    /// so the formula keeps pointing at the same cells when rows, columns or
    /// sheets are inserted or deleted.
    ///
    /// On a circular reference the cell keeps its previous input and value
    /// and no dependency edge is changed. On any other failure of the cell
    /// itself it is left empty. Failures while updating consumers are
    /// returned after the cell itself was updated.
    pub fn set_input(&mut self, address: &CellAddress, text: &str) -> Result<RecalcStats> {
        self.ensure_unprotected("set input")?;
        if !self.session.calc_stack.is_empty() {
            return Err(Error::InvalidOperation(
                "cannot set input while recalculating".into(),
            ));
        }

        let key = self.resolve(address)?;
        let snapshot = self.reset(key)?;
        let run_id = self.begin_run();
        log::debug!("calc run {run_id}: input at {key}");

        self.session.journal = Some(Vec::new());
        let result = self
            .parse_input(key, text)
            .and_then(|()| self.ensure_current(key));
        let journal = self.session.journal.take().unwrap_or_default();

        if let Err(err) = result {
            if err.is_circular_reference() {
                log::warn!("calc run {run_id}: rejected input at {key}: {err}");
                self.restore(key, snapshot, &journal);
            } else {
                log::warn!("calc run {run_id}: input at {key} failed: {err}");
                self.clear_cell(key);
            }
            return Err(err);
        }

        self.propagate(key, run_id)
    }

    /// Read the value of a cell
    ///
    /// While a formula is being evaluated this also records that the
    /// formula's cell reads `address` and brings the read cell up to date
    /// first. A cell that was never written is empty.
    pub fn get_value(&mut self, address: &CellAddress) -> Result<Value> {
        let key = self.resolve(address)?;

        if let Some(&reader) = self.session.calc_stack.last() {
            self.add_dependency(key, reader);
            self.ensure_current(key)?;
        }

        Ok(self
            .cell_by_key(key)
            .map(|cell| cell.value.clone())
            .unwrap_or_default())
    }

    /// Start a new calc run
    fn begin_run(&mut self) -> u64 {
        self.session.current_run += 1;
        self.session.recomputed = 0;
        self.session.current_run
    }

    /// Clear a cell for new input, keeping its consumers
    fn reset(&mut self, key: CellKey) -> Result<CellSnapshot> {
        let providers = self.clear_providers(key);
        let cell = self.existing_cell_mut(key)?;
        Ok(CellSnapshot {
            input: cell.input.take(),
            formula: cell.formula.take(),
            value: std::mem::take(&mut cell.value),
            providers,
        })
    }

    /// Undo a rejected run: drop its new edges and restore the written cell
    fn restore(&mut self, key: CellKey, snapshot: CellSnapshot, journal: &[(CellKey, CellKey)]) {
        for &(provider, consumer) in journal.iter().rev() {
            self.remove_dependency(provider, consumer);
        }
        self.clear_providers(key);

        if let Some(cell) = self.cell_by_key_mut(key) {
            cell.input = snapshot.input;
            cell.formula = snapshot.formula;
            cell.value = snapshot.value;
        }
        for provider in snapshot.providers {
            self.add_dependency(provider, key);
        }
    }

    /// Leave a failed cell empty
    fn clear_cell(&mut self, key: CellKey) {
        self.clear_providers(key);
        if let Some(cell) = self.cell_by_key_mut(key) {
            cell.input = None;
            cell.formula = None;
            cell.value = Value::Empty;
        }
    }

    /// Classify and store new input for a freshly reset cell
    fn parse_input(&mut self, key: CellKey, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }

        let internal = self.to_internal(text, key)?;

        let cell = self.existing_cell_mut(key)?;
        if let Some(body) = internal.strip_prefix('=') {
            let formula = compile(body).map_err(|e| Error::InvalidFormula {
                input: text.to_string(),
                message: e.to_string(),
            })?;
            cell.formula = Some(Arc::new(formula));
        } else {
            cell.value = literal_value(&internal).unwrap_or_else(|| Value::string(text));
        }
        cell.input = Some(internal);

        Ok(())
    }

    /// Make sure a cell's value is current for the active run
    pub(crate) fn ensure_current(&mut self, key: CellKey) -> Result<()> {
        let run = self.session.current_run;
        let cell = self.existing_cell_mut(key)?;

        if cell.last_calc_run == run {
            return Ok(());
        }

        if cell.is_under_calc {
            let input = cell.input.clone().unwrap_or_default();
            let err = Error::CircularReference {
                address: key.to_string(),
                input: self.external_input(key, &input),
            };
            log::warn!("{err}");
            return Err(err);
        }

        let Some(formula) = cell.formula.clone() else {
            cell.last_calc_run = run;
            return Ok(());
        };

        let depth = formula.depth();
        if self.session.nesting + depth > self.options.max_calc_depth {
            return Err(Error::InvalidOperation(format!(
                "calculation nested deeper than {} levels at {}",
                self.options.max_calc_depth, key
            )));
        }

        let result = {
            let mut frame = CalcFrame::enter(self, key, depth);
            formula.evaluate(&mut *frame)
        };
        let value = result.map_err(|e| self.formula_error(key, e))?;

        log::trace!("calc run {run}: {key} = {value}");
        let cell = self.existing_cell_mut(key)?;
        cell.value = value;
        cell.last_calc_run = run;
        self.session.recomputed += 1;

        Ok(())
    }

    /// Bring every consumer of `root` up to date, breadth first
    fn propagate(&mut self, root: CellKey, run_id: u64) -> Result<RecalcStats> {
        let mut visited = AHashSet::new();
        visited.insert(root);

        let mut queue: VecDeque<CellKey> = self.direct_consumers(root).into();
        let mut consumers_visited = 0;

        while let Some(key) = queue.pop_front() {
            if !visited.insert(key) {
                continue;
            }
            consumers_visited += 1;

            if let Err(err) = self.ensure_current(key) {
                log::warn!("calc run {run_id}: updating {key} failed: {err}");
                return Err(err);
            }

            queue.extend(
                self.direct_consumers(key)
                    .into_iter()
                    .filter(|consumer| !visited.contains(consumer)),
            );
        }

        let stats = RecalcStats {
            run_id,
            cells_recomputed: self.session.recomputed,
            consumers_visited,
        };
        log::debug!(
            "calc run {run_id}: {} cells recomputed, {} consumers visited",
            stats.cells_recomputed,
            stats.consumers_visited
        );
        Ok(stats)
    }

    fn direct_consumers(&self, key: CellKey) -> Vec<CellKey> {
        self.cell_by_key(key)
            .map(|cell| cell.consumers.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Convert an evaluator failure into a workbook error
    ///
    /// Errors raised by the workbook itself while the formula ran pass
    /// through unchanged; everything else becomes `InvalidFormula`.
    fn formula_error(&self, key: CellKey, err: FormulaError) -> Error {
        match err {
            FormulaError::Host(err) => err,
            other => {
                let input = self
                    .cell_by_key(key)
                    .and_then(|cell| cell.input.clone())
                    .unwrap_or_default();
                let err = Error::InvalidFormula {
                    input: self.external_input(key, &input),
                    message: other.to_string(),
                };
                log::warn!("{key}: {err}");
                err
            }
        }
    }
}

/// Value of non-formula input, if it is a literal expression
fn literal_value(text: &str) -> Option<Value> {
    // Brace-delimited input is an object literal
    let source = if text.starts_with('{') && text.ends_with('}') {
        format!("({})", text)
    } else {
        text.to_string()
    };

    match compile(&source).and_then(|formula| formula.evaluate(&mut NoCells)) {
        // Built-in names typed on their own are text
        Ok(Value::Function(_)) | Err(_) => None,
        Ok(value) => Some(value),
    }
}
