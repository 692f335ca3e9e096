//! Reference rewriting bound to the workbook's stores
//!
//! User input names cells by position (`positional(row, col[, sheet])`);
//! stored input names them by id (`id(row, col[, sheet])`). Input is
//! converted to id form on write and back to positional form on read, so a
//! stored formula keeps its meaning whatever is inserted or deleted around
//! the cells it reads.

use calcgrid_core::{CellAddress, CellKey, Id, RefUnit, Result};
use calcgrid_formula::{format_reference, rewrite_references, RefForm};

use crate::workbook::Workbook;

impl Workbook {
    /// Rewrite positional references in `text` to id form
    ///
    /// A reference without a sheet means the sheet of `context`, and stays
    /// without one. Referenced cells are created when missing so they have
    /// ids. `id(..)` and `pinned(..)` calls are kept verbatim.
    pub(crate) fn to_internal(&mut self, text: &str, context: CellKey) -> Result<String> {
        rewrite_references(text, |call| {
            if call.form != RefForm::Positional {
                return Ok(None);
            }

            let (row, col, sheet) = call.coordinates()?;
            let sheet_ref = match sheet {
                Some(sheet) => RefUnit::index(sheet),
                None => RefUnit::id(context.sheet as i64),
            };
            let key = self.resolve(&CellAddress::by_index(row, col, None).with_sheet(sheet_ref))?;

            Ok(Some(format_reference(
                RefForm::Id,
                key.row as i64,
                key.col as i64,
                sheet.map(|_| key.sheet as i64),
            )))
        })
    }

    /// Rewrite id references in `text` to positional form
    ///
    /// The sheet is left out when it is the sheet of `context`. References
    /// to cells that no longer exist are kept in id form.
    pub(crate) fn to_external(&self, text: &str, context: CellKey) -> Result<String> {
        rewrite_references(text, |call| {
            if call.form != RefForm::Id {
                return Ok(None);
            }

            let (row, col, sheet) = call.coordinates()?;
            let (Ok(row), Ok(col)) = (Id::try_from(row), Id::try_from(col)) else {
                return Ok(None);
            };
            let sheet_id = match sheet.map(Id::try_from) {
                Some(Ok(sheet)) => sheet,
                Some(Err(_)) => return Ok(None),
                None => context.sheet,
            };

            let Some((sheet_index, row_index, col_index)) =
                self.positions(CellKey::new(sheet_id, row, col))
            else {
                return Ok(None);
            };

            let sheet = (sheet_id != context.sheet).then_some(sheet_index as i64);
            Ok(Some(format_reference(
                RefForm::Positional,
                row_index as i64,
                col_index as i64,
                sheet,
            )))
        })
    }

    /// External form of a cell's stored input, for diagnostics
    pub(crate) fn external_input(&self, key: CellKey, input: &str) -> String {
        self.to_external(input, key)
            .unwrap_or_else(|_| input.to_string())
    }

    /// Input of the cell at `address`, with references in positional form
    ///
    /// # Example
    ///
    /// ```rust
    /// use calcgrid::prelude::*;
    ///
    /// let mut workbook = Workbook::new();
    /// let cell = CellAddress::by_index(3, 0, Some(0));
    /// workbook.set_input(&cell, "=value(positional(0, 0)) + 1").unwrap();
    ///
    /// // Two rows inserted above the referenced cell
    /// workbook.insert_rows(0, 0, 2).unwrap();
    /// let moved = CellAddress::by_index(5, 0, Some(0));
    /// assert_eq!(
    ///     workbook.get_input(&moved).unwrap().as_deref(),
    ///     Some("=value(positional(2, 0)) + 1")
    /// );
    /// ```
    pub fn get_input(&self, address: &CellAddress) -> Result<Option<String>> {
        let Some(key) = self.lookup(address)? else {
            return Ok(None);
        };
        let Some(input) = self.cell_by_key(key).and_then(|cell| cell.input.as_deref()) else {
            return Ok(None);
        };
        Ok(Some(self.to_external(input, key)?))
    }
}
