//! Address resolution
//!
//! Turns a [`CellAddress`], whose coordinates may each be by id or by
//! position and whose sheet may be missing, into the [`CellKey`] of a
//! concrete cell. Resolution by position creates missing sheets, rows and
//! cells on the way; resolution by id never creates anything.

use calcgrid_core::{
    CellAddress, CellKey, Error, Id, IndexedStore, RefKind, RefUnit, Result,
};

use crate::workbook::{Cell, Workbook};

/// Find or create the element a coordinate names
fn ensure_slot<T: Default>(store: &mut IndexedStore<T>, unit: RefUnit) -> Result<(Id, &mut T)> {
    let id = match unit.kind {
        RefKind::ById => unit.as_id()?,
        RefKind::ByIndex => {
            let index = unit.as_position()?;
            store.ensure_by_index(index)?;
            store.id_of(index).ok_or_else(|| {
                Error::IndexOutOfRange(format!("position {} could not be created", index))
            })?
        }
    };
    Ok((id, store.ensure_by_id(id)?))
}

/// Find the element a coordinate names without creating it
fn find_slot<T>(store: &IndexedStore<T>, unit: RefUnit) -> Result<Option<(Id, &T)>> {
    let id = match unit.kind {
        RefKind::ById => unit.as_id()?,
        RefKind::ByIndex => match store.id_of(unit.as_position()?) {
            Some(id) => id,
            None => return Ok(None),
        },
    };
    Ok(store.get_by_id(id).map(|value| (id, value)))
}

impl Workbook {
    /// Sheet coordinate of `address`, borrowing the sheet of the cell under
    /// evaluation when the address has none
    pub(crate) fn sheet_unit(&self, address: &CellAddress) -> Result<RefUnit> {
        if let Some(sheet) = address.sheet_ref {
            return Ok(sheet);
        }
        match self.session.calc_stack.last() {
            Some(context) => Ok(RefUnit::id(context.sheet as i64)),
            None => Err(Error::InvalidArgument(format!(
                "address {} has no sheet and no cell is being calculated",
                address
            ))),
        }
    }

    /// Resolve `address` to a cell, creating it if it is addressed by position
    pub(crate) fn resolve(&mut self, address: &CellAddress) -> Result<CellKey> {
        let sheet_unit = self.sheet_unit(address)?;
        let max_rows = self.options.max_rows;
        let max_cols = self.options.max_cols;

        let (sheet_id, sheet) = ensure_slot(&mut self.sheets, sheet_unit)?;
        sheet.rows.set_limit(max_rows)?;

        let (row_id, row) = ensure_slot(&mut sheet.rows, address.row_ref)?;
        row.cells.set_limit(max_cols)?;

        let (col_id, _) = ensure_slot(&mut row.cells, address.col_ref)?;

        Ok(CellKey::new(sheet_id, row_id, col_id))
    }

    /// Resolve `address` to an existing cell without creating anything
    pub(crate) fn lookup(&self, address: &CellAddress) -> Result<Option<CellKey>> {
        let sheet_unit = self.sheet_unit(address)?;

        let Some((sheet_id, sheet)) = find_slot(&self.sheets, sheet_unit)? else {
            return Ok(None);
        };
        let Some((row_id, row)) = find_slot(&sheet.rows, address.row_ref)? else {
            return Ok(None);
        };
        let Some((col_id, _)) = find_slot(&row.cells, address.col_ref)? else {
            return Ok(None);
        };

        Ok(Some(CellKey::new(sheet_id, row_id, col_id)))
    }

    /// Convert every coordinate of `address` to id form
    ///
    /// Missing sheets, rows and cells addressed by position are created, so
    /// the returned address stays valid whatever is later inserted or
    /// deleted around the cell.
    pub fn to_stable_address(&mut self, address: &CellAddress) -> Result<CellAddress> {
        Ok(self.resolve(address)?.to_address())
    }

    /// Stable key of the existing cell at `address`
    pub fn cell_key(&self, address: &CellAddress) -> Result<Option<CellKey>> {
        self.lookup(address)
    }

    /// The existing cell at `address`
    pub fn cell(&self, address: &CellAddress) -> Result<Option<&Cell>> {
        Ok(self.lookup(address)?.and_then(|key| self.cell_by_key(key)))
    }

    pub(crate) fn cell_by_key(&self, key: CellKey) -> Option<&Cell> {
        self.sheets
            .get_by_id(key.sheet)?
            .rows
            .get_by_id(key.row)?
            .cells
            .get_by_id(key.col)
    }

    pub(crate) fn cell_by_key_mut(&mut self, key: CellKey) -> Option<&mut Cell> {
        self.sheets
            .get_by_id_mut(key.sheet)?
            .rows
            .get_by_id_mut(key.row)?
            .cells
            .get_by_id_mut(key.col)
    }

    /// Like [`cell_by_key_mut`](Self::cell_by_key_mut), failing for a cell
    /// that no longer exists
    pub(crate) fn existing_cell_mut(&mut self, key: CellKey) -> Result<&mut Cell> {
        self.cell_by_key_mut(key)
            .ok_or_else(|| Error::IndexOutOfRange(format!("cell {} no longer exists", key)))
    }

    /// Current `(sheet, row, column)` positions of a cell
    pub(crate) fn positions(&self, key: CellKey) -> Option<(usize, usize, usize)> {
        let sheet_index = self.sheets.index_of(key.sheet)?;
        let sheet = self.sheets.get_by_id(key.sheet)?;
        let row_index = sheet.rows.index_of(key.row)?;
        let row = sheet.rows.get_by_id(key.row)?;
        let col_index = row.cells.index_of(key.col)?;
        Some((sheet_index, row_index, col_index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workbook::WorkbookOptions;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_resolve_creates_by_position() {
        let mut workbook = Workbook::new();
        let key = workbook
            .resolve(&CellAddress::by_index(500, 3, Some(0)))
            .unwrap();

        assert_eq!(workbook.positions(key), Some((0, 500, 3)));
        assert_eq!(workbook.sheet_count(), 1);
        assert!(workbook.cell_by_key(key).is_some());
    }

    #[test]
    fn test_resolve_is_stable() {
        let mut workbook = Workbook::new();
        let address = CellAddress::by_index(2, 2, Some(0));
        let first = workbook.resolve(&address).unwrap();
        let second = workbook.resolve(&address).unwrap();
        assert_eq!(first, second);

        let by_id = workbook.resolve(&first.to_address()).unwrap();
        assert_eq!(by_id, first);
    }

    #[test]
    fn test_resolve_unknown_id() {
        let mut workbook = Workbook::new();
        let err = workbook
            .resolve(&CellAddress::by_id(0, 0, Some(0)))
            .unwrap_err();
        assert!(matches!(err, Error::IndexOutOfRange(_)));
    }

    #[test]
    fn test_missing_sheet_without_context() {
        let mut workbook = Workbook::new();
        let err = workbook
            .resolve(&CellAddress::by_index(0, 0, None))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_missing_sheet_borrows_context() {
        let mut workbook = Workbook::new();
        let context = workbook
            .resolve(&CellAddress::by_index(0, 0, Some(3)))
            .unwrap();

        workbook.session.calc_stack.push(context);
        let key = workbook
            .resolve(&CellAddress::by_index(1, 1, None))
            .unwrap();
        workbook.session.calc_stack.pop();

        assert_eq!(key.sheet, context.sheet);
        assert_eq!(workbook.positions(key), Some((3, 1, 1)));
    }

    #[test]
    fn test_lookup_does_not_create() {
        let workbook = Workbook::new();
        assert_eq!(
            workbook
                .lookup(&CellAddress::by_index(4, 4, Some(0)))
                .unwrap(),
            None
        );
        assert_eq!(workbook.sheet_count(), 0);
    }

    #[test]
    fn test_limits() {
        let mut workbook = Workbook::with_options(WorkbookOptions {
            max_rows: 10,
            max_cols: 5,
            ..Default::default()
        });
        assert!(workbook
            .resolve(&CellAddress::by_index(9, 4, Some(0)))
            .is_ok());
        assert!(matches!(
            workbook.resolve(&CellAddress::by_index(10, 0, Some(0))),
            Err(Error::IndexOutOfRange(_))
        ));
        assert!(matches!(
            workbook.resolve(&CellAddress::by_index(0, 5, Some(0))),
            Err(Error::IndexOutOfRange(_))
        ));
        assert!(matches!(
            workbook.resolve(&CellAddress::by_index(-1, 0, Some(0))),
            Err(Error::IndexOutOfRange(_))
        ));
    }

    #[test]
    fn test_to_stable_address() {
        let mut workbook = Workbook::new();
        let stable = workbook
            .to_stable_address(&CellAddress::by_index(1, 2, Some(0)))
            .unwrap();
        assert!(stable.is_stable());
        assert_eq!(
            workbook.cell_key(&stable).unwrap(),
            workbook.cell_key(&CellAddress::by_index(1, 2, Some(0))).unwrap()
        );
    }
}
