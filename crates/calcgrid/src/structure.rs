//! Structural editing: inserting and deleting sheets, rows and columns
//!
//! Positions shift but ids never change, so formulas (stored in id form)
//! keep reading the same cells. Deleting destroys the cells in the range and
//! removes their dependency edges from the cells that survive. Structural
//! edits do not recalculate anything; a formula still reading a destroyed
//! cell fails the next time it is recomputed.

use calcgrid_core::{CellKey, Error, Id, Result};

use crate::workbook::{Row, Sheet, Workbook};

impl Workbook {
    /// Insert `count` empty sheets at position `index`
    pub fn insert_sheets(&mut self, index: usize, count: usize) -> Result<()> {
        self.ensure_unprotected("insert sheets")?;
        self.sheets.insert(index, count)?;
        log::debug!("inserted {count} sheets at {index}");
        Ok(())
    }

    /// Delete the `count` sheets starting at position `index`
    pub fn delete_sheets(&mut self, index: usize, count: usize) -> Result<()> {
        self.ensure_unprotected("delete sheets")?;
        let removed = self.sheets.delete(index, count)?;
        for (sheet_id, sheet) in &removed {
            self.detach_sheet(*sheet_id, sheet);
        }
        log::debug!("deleted {count} sheets at {index}");
        Ok(())
    }

    /// Insert `count` empty rows at position `index` of a sheet
    pub fn insert_rows(&mut self, sheet: usize, index: usize, count: usize) -> Result<()> {
        self.ensure_unprotected("insert rows")?;
        self.sheet_mut(sheet)?.rows.insert(index, count)?;
        log::debug!("inserted {count} rows at {index} in sheet {sheet}");
        Ok(())
    }

    /// Delete the `count` rows starting at position `index` of a sheet
    pub fn delete_rows(&mut self, sheet: usize, index: usize, count: usize) -> Result<()> {
        self.ensure_unprotected("delete rows")?;
        let sheet_id = self.sheet_id(sheet)?;
        let removed = self.sheet_mut(sheet)?.rows.delete(index, count)?;
        for (row_id, row) in &removed {
            self.detach_row(sheet_id, *row_id, row);
        }
        log::debug!("deleted {count} rows at {index} in sheet {sheet}");
        Ok(())
    }

    /// Insert `count` empty columns at position `index` of every row of a sheet
    pub fn insert_columns(&mut self, sheet: usize, index: usize, count: usize) -> Result<()> {
        self.ensure_unprotected("insert columns")?;
        if count == 0 {
            return Err(Error::InvalidArgument("insert count must be positive".into()));
        }

        let max_cols = self.options.max_cols;
        let target = self.sheet_mut(sheet)?;
        let width = column_count(target);
        if index > width {
            return Err(Error::IndexOutOfRange(format!(
                "insert column {} beyond end {}",
                index, width
            )));
        }
        if index < width && width.saturating_add(count) > max_cols {
            return Err(Error::IndexOutOfRange(format!(
                "inserting {} columns would move cells beyond limit {}",
                count, max_cols
            )));
        }

        for row in target.rows.values_mut() {
            if index < row.cells.len() {
                row.cells.insert(index, count)?;
            }
        }
        log::debug!("inserted {count} columns at {index} in sheet {sheet}");
        Ok(())
    }

    /// Delete the `count` columns starting at position `index` of every row of a sheet
    pub fn delete_columns(&mut self, sheet: usize, index: usize, count: usize) -> Result<()> {
        self.ensure_unprotected("delete columns")?;
        if count == 0 {
            return Err(Error::InvalidArgument("delete count must be positive".into()));
        }

        let sheet_id = self.sheet_id(sheet)?;
        let target = self.sheet_mut(sheet)?;
        let width = column_count(target);
        let end = index.checked_add(count).filter(|&end| end <= width);
        if end.is_none() {
            return Err(Error::IndexOutOfRange(format!(
                "delete columns {}..{} beyond end {}",
                index,
                index.saturating_add(count),
                width
            )));
        }

        let mut destroyed = Vec::new();
        let row_ids: Vec<Id> = target.rows.iter().map(|(_, row_id, _)| row_id).collect();
        for row_id in row_ids {
            let Some(row) = target.rows.get_by_id_mut(row_id) else {
                continue;
            };
            let len = row.cells.len();
            if index >= len {
                continue;
            }
            for (col_id, cell) in row.cells.delete(index, count.min(len - index))? {
                destroyed.push((CellKey::new(sheet_id, row_id, col_id), cell));
            }
        }

        for (key, cell) in &destroyed {
            self.detach_destroyed(*key, cell);
        }
        log::debug!("deleted {count} columns at {index} in sheet {sheet}");
        Ok(())
    }

    fn sheet_id(&self, sheet: usize) -> Result<Id> {
        self.sheets
            .id_of(sheet)
            .ok_or_else(|| Error::IndexOutOfRange(format!("no sheet at position {}", sheet)))
    }

    fn sheet_mut(&mut self, sheet: usize) -> Result<&mut Sheet> {
        self.sheets
            .get_by_index_mut(sheet)
            .ok_or_else(|| Error::IndexOutOfRange(format!("no sheet at position {}", sheet)))
    }

    fn detach_sheet(&mut self, sheet_id: Id, sheet: &Sheet) {
        for (_, row_id, row) in sheet.rows.iter() {
            self.detach_row(sheet_id, row_id, row);
        }
    }

    fn detach_row(&mut self, sheet_id: Id, row_id: Id, row: &Row) {
        for (_, col_id, cell) in row.cells.iter() {
            self.detach_destroyed(CellKey::new(sheet_id, row_id, col_id), cell);
        }
    }
}

/// One past the highest occupied column position in any row
fn column_count(sheet: &Sheet) -> usize {
    sheet
        .rows
        .iter()
        .map(|(_, _, row)| row.cells.len())
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use calcgrid_core::{CellAddress, Value};
    use pretty_assertions::assert_eq;

    fn at(row: i64, col: i64) -> CellAddress {
        CellAddress::by_index(row, col, Some(0))
    }

    #[test]
    fn test_insert_rows_keeps_references() {
        let mut workbook = Workbook::new();
        workbook.set_input(&at(0, 0), "7").unwrap();
        workbook
            .set_input(&at(1, 0), "=value(positional(0, 0)) * 3")
            .unwrap();
        let key = workbook.cell_key(&at(1, 0)).unwrap();

        workbook.insert_rows(0, 0, 3).unwrap();

        assert_eq!(workbook.cell_key(&at(4, 0)).unwrap(), key);
        assert_eq!(
            workbook.get_input(&at(4, 0)).unwrap().as_deref(),
            Some("=value(positional(3, 0)) * 3")
        );

        workbook.set_input(&at(3, 0), "2").unwrap();
        assert_eq!(workbook.get_value(&at(4, 0)).unwrap(), Value::Number(6.0));
    }

    #[test]
    fn test_insert_columns_shifts_every_row() {
        let mut workbook = Workbook::new();
        workbook.set_input(&at(0, 1), "1").unwrap();
        workbook.set_input(&at(2, 3), "2").unwrap();
        workbook.set_input(&at(3, 0), "3").unwrap();

        workbook.insert_columns(0, 1, 2).unwrap();

        assert_eq!(workbook.get_value(&at(0, 3)).unwrap(), Value::Number(1.0));
        assert_eq!(workbook.get_value(&at(2, 5)).unwrap(), Value::Number(2.0));
        assert_eq!(workbook.get_value(&at(3, 0)).unwrap(), Value::Number(3.0));
    }

    #[test]
    fn test_delete_rows_removes_edges() {
        let mut workbook = Workbook::new();
        workbook.set_input(&at(0, 0), "1").unwrap();
        workbook
            .set_input(&at(1, 0), "=value(positional(0, 0)) + 1")
            .unwrap();
        workbook
            .set_input(&at(2, 0), "=value(positional(1, 0)) + 1")
            .unwrap();

        workbook.delete_rows(0, 1, 1).unwrap();

        assert!(workbook.consumers(&at(0, 0)).unwrap().is_empty());
        assert!(workbook.providers(&at(1, 0)).unwrap().is_empty());
        workbook.check_dependencies().unwrap();

        // The surviving formula still names the destroyed cell
        assert_eq!(
            workbook.get_input(&at(1, 0)).unwrap().as_deref(),
            Some("=value(id(1, 0)) + 1")
        );
    }

    #[test]
    fn test_dangling_reference_fails_on_recompute() {
        let mut workbook = Workbook::new();
        workbook.set_input(&at(0, 0), "1").unwrap();
        workbook
            .set_input(&at(0, 1), "=value(positional(0, 0)) + 1")
            .unwrap();
        workbook.set_input(&at(1, 1), "5").unwrap();
        workbook
            .set_input(&at(1, 0), "=value(positional(1, 1)) + value(positional(0, 1))")
            .unwrap();

        workbook.delete_columns(0, 0, 1).unwrap();
        assert_eq!(
            workbook.get_value(&at(1, 0)).unwrap(),
            Value::Number(5.0)
        );

        // The formula now at (0, 0) reads a destroyed cell
        let err = workbook
            .set_input(&at(0, 1), "=value(positional(0, 0)) * 2")
            .unwrap_err();
        assert!(matches!(err, Error::IndexOutOfRange(_)));
    }

    #[test]
    fn test_delete_sheet() {
        let mut workbook = Workbook::new();
        workbook
            .set_input(&CellAddress::by_index(0, 0, Some(1)), "4")
            .unwrap();
        workbook
            .set_input(&at(0, 0), "=value(positional(0, 0, 1)) + 1")
            .unwrap();
        assert_eq!(workbook.get_value(&at(0, 0)).unwrap(), Value::Number(5.0));

        workbook.delete_sheets(1, 1).unwrap();
        assert_eq!(workbook.sheet_count(), 1);
        assert!(workbook.providers(&at(0, 0)).unwrap().is_empty());
        workbook.check_dependencies().unwrap();
    }

    #[test]
    fn test_range_errors() {
        let mut workbook = Workbook::new();
        workbook.set_input(&at(2, 2), "1").unwrap();

        assert!(matches!(
            workbook.insert_rows(0, 4, 1),
            Err(Error::IndexOutOfRange(_))
        ));
        assert!(matches!(
            workbook.delete_rows(0, 2, 2),
            Err(Error::IndexOutOfRange(_))
        ));
        assert!(matches!(
            workbook.delete_columns(0, 3, 1),
            Err(Error::IndexOutOfRange(_))
        ));
        assert!(matches!(
            workbook.insert_columns(0, 0, 0),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            workbook.insert_rows(5, 0, 1),
            Err(Error::IndexOutOfRange(_))
        ));
    }
}
