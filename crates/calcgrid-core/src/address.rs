//! Cell address types
//!
//! A cell is located by three coordinates (sheet, row, column). Each
//! coordinate is a [`RefUnit`] that names either a stable id or a volatile
//! position. A [`CellKey`] is the fully id-qualified form used as the
//! permanent identity of a cell in the dependency graph.

use std::fmt;

use crate::error::{Error, Result};
use crate::store::Id;

/// How a coordinate is expressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RefKind {
    /// Stable id, unaffected by insertion and deletion
    ById,
    /// Zero-based position
    ByIndex,
}

/// A single coordinate along one axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RefUnit {
    pub kind: RefKind,
    pub value: i64,
}

impl RefUnit {
    /// Coordinate by stable id
    pub fn id(value: i64) -> Self {
        Self {
            kind: RefKind::ById,
            value,
        }
    }

    /// Coordinate by zero-based position
    pub fn index(value: i64) -> Self {
        Self {
            kind: RefKind::ByIndex,
            value,
        }
    }

    /// Check if this coordinate is a stable id
    pub fn is_id(&self) -> bool {
        self.kind == RefKind::ById
    }

    /// The value as a store position
    ///
    /// Negative values can never name a slot.
    pub fn as_position(&self) -> Result<usize> {
        usize::try_from(self.value).map_err(|_| {
            Error::IndexOutOfRange(format!("negative coordinate {}", self.value))
        })
    }

    /// The value as a store id
    pub fn as_id(&self) -> Result<Id> {
        Id::try_from(self.value)
            .map_err(|_| Error::IndexOutOfRange(format!("negative id {}", self.value)))
    }
}

impl fmt::Display for RefUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            RefKind::ById => write!(f, "#{}", self.value),
            RefKind::ByIndex => write!(f, "{}", self.value),
        }
    }
}

/// Location of a cell, possibly relative to the cell under evaluation
///
/// A missing `sheet_ref` means "the sheet of the cell currently being
/// calculated".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellAddress {
    pub row_ref: RefUnit,
    pub col_ref: RefUnit,
    pub sheet_ref: Option<RefUnit>,
}

impl CellAddress {
    /// Create an address from its coordinates
    pub fn new(row_ref: RefUnit, col_ref: RefUnit, sheet_ref: Option<RefUnit>) -> Self {
        Self {
            row_ref,
            col_ref,
            sheet_ref,
        }
    }

    /// Address every coordinate by position
    ///
    /// # Examples
    /// ```
    /// use calcgrid_core::{CellAddress, RefKind};
    ///
    /// let addr = CellAddress::by_index(1, 2, Some(0));
    /// assert_eq!(addr.row_ref.kind, RefKind::ByIndex);
    /// assert_eq!(addr.col_ref.value, 2);
    /// ```
    pub fn by_index(row: i64, col: i64, sheet: Option<i64>) -> Self {
        Self::new(
            RefUnit::index(row),
            RefUnit::index(col),
            sheet.map(RefUnit::index),
        )
    }

    /// Address every coordinate by stable id
    pub fn by_id(row: i64, col: i64, sheet: Option<i64>) -> Self {
        Self::new(RefUnit::id(row), RefUnit::id(col), sheet.map(RefUnit::id))
    }

    /// Same address with an explicit sheet coordinate
    pub fn with_sheet(mut self, sheet_ref: RefUnit) -> Self {
        self.sheet_ref = Some(sheet_ref);
        self
    }

    /// Check if every coordinate, including the sheet, is a stable id
    pub fn is_stable(&self) -> bool {
        self.row_ref.is_id()
            && self.col_ref.is_id()
            && self.sheet_ref.map_or(false, |s| s.is_id())
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sheet_ref {
            Some(sheet) => write!(f, "({}, {}, {})", self.row_ref, self.col_ref, sheet),
            None => write!(f, "({}, {})", self.row_ref, self.col_ref),
        }
    }
}

/// Fully id-qualified cell identity (sheet id, row id, column id)
///
/// This is the key of every dependency edge. It never changes while the
/// cell exists, whatever rows, columns or sheets are inserted or deleted
/// around it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellKey {
    pub sheet: Id,
    pub row: Id,
    pub col: Id,
}

impl CellKey {
    /// Create a new cell key
    pub fn new(sheet: Id, row: Id, col: Id) -> Self {
        Self { sheet, row, col }
    }

    /// The key as an all-id [`CellAddress`]
    pub fn to_address(&self) -> CellAddress {
        CellAddress::by_id(self.row as i64, self.col as i64, Some(self.sheet as i64))
    }
}

impl From<CellKey> for CellAddress {
    fn from(key: CellKey) -> Self {
        key.to_address()
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "id({}, {}, {})", self.row, self.col, self.sheet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        let addr = CellAddress::by_id(3, 4, None);
        assert_eq!(addr.row_ref, RefUnit::id(3));
        assert_eq!(addr.col_ref, RefUnit::id(4));
        assert!(addr.sheet_ref.is_none());
        assert!(!addr.is_stable());

        let addr = addr.with_sheet(RefUnit::id(0));
        assert!(addr.is_stable());

        let mixed = CellAddress::new(RefUnit::index(1), RefUnit::id(2), Some(RefUnit::id(0)));
        assert!(!mixed.is_stable());
    }

    #[test]
    fn test_negative_coordinates() {
        assert!(matches!(
            RefUnit::index(-1).as_position(),
            Err(Error::IndexOutOfRange(_))
        ));
        assert!(matches!(
            RefUnit::id(-5).as_id(),
            Err(Error::IndexOutOfRange(_))
        ));
        assert_eq!(RefUnit::index(7).as_position().unwrap(), 7);
    }

    #[test]
    fn test_display() {
        assert_eq!(CellAddress::by_index(1, 2, None).to_string(), "(1, 2)");
        assert_eq!(
            CellAddress::new(RefUnit::id(1), RefUnit::index(2), Some(RefUnit::id(0))).to_string(),
            "(#1, 2, #0)"
        );
        assert_eq!(CellKey::new(0, 5, 6).to_string(), "id(5, 6, 0)");
    }

    #[test]
    fn test_key_to_address() {
        let key = CellKey::new(2, 7, 9);
        assert_eq!(CellAddress::from(key), CellAddress::by_id(7, 9, Some(2)));
    }
}
