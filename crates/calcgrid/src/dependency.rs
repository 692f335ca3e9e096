//! Dependency edges between cells
//!
//! Every edge is stored twice: the consumer lists the provider in its
//! `providers` set and the provider lists the consumer in its `consumers`
//! set. All mutation goes through the functions here so the two sides never
//! disagree. Edge lists are materialized before either side is modified.

use std::collections::BTreeSet;

use calcgrid_core::{CellAddress, CellKey, Error, Result};

use crate::workbook::{Cell, Workbook};

impl Workbook {
    /// Record that `consumer` reads `provider`
    ///
    /// New edges are appended to the session journal when one is open.
    pub(crate) fn add_dependency(&mut self, provider: CellKey, consumer: CellKey) {
        let added = match self.cell_by_key_mut(consumer) {
            Some(cell) => cell.providers.insert(provider),
            None => return,
        };
        if let Some(cell) = self.cell_by_key_mut(provider) {
            cell.consumers.insert(consumer);
        }

        if added {
            log::trace!("dependency {provider} -> {consumer}");
            if let Some(journal) = self.session.journal.as_mut() {
                journal.push((provider, consumer));
            }
        }
    }

    /// Remove one edge from both sides
    pub(crate) fn remove_dependency(&mut self, provider: CellKey, consumer: CellKey) {
        if let Some(cell) = self.cell_by_key_mut(consumer) {
            cell.providers.remove(&provider);
        }
        if let Some(cell) = self.cell_by_key_mut(provider) {
            cell.consumers.remove(&consumer);
        }
    }

    /// Detach `key` from all of its providers, returning them
    ///
    /// The cell's consumers are kept: cells reading it are unaffected by
    /// its redefinition.
    pub(crate) fn clear_providers(&mut self, key: CellKey) -> BTreeSet<CellKey> {
        let providers = match self.cell_by_key_mut(key) {
            Some(cell) => std::mem::take(&mut cell.providers),
            None => return BTreeSet::new(),
        };
        for provider in &providers {
            if let Some(cell) = self.cell_by_key_mut(*provider) {
                cell.consumers.remove(&key);
            }
        }
        providers
    }

    /// Remove every edge of a destroyed cell from the surviving side
    pub(crate) fn detach_destroyed(&mut self, key: CellKey, destroyed: &Cell) {
        for provider in &destroyed.providers {
            if let Some(cell) = self.cell_by_key_mut(*provider) {
                cell.consumers.remove(&key);
            }
        }
        for consumer in &destroyed.consumers {
            if let Some(cell) = self.cell_by_key_mut(*consumer) {
                cell.providers.remove(&key);
            }
        }
    }

    /// Cells read by the cell at `address`
    pub fn providers(&self, address: &CellAddress) -> Result<Vec<CellKey>> {
        Ok(self
            .cell(address)?
            .map(|cell| cell.providers.iter().copied().collect())
            .unwrap_or_default())
    }

    /// Cells reading the cell at `address`
    pub fn consumers(&self, address: &CellAddress) -> Result<Vec<CellKey>> {
        Ok(self
            .cell(address)?
            .map(|cell| cell.consumers.iter().copied().collect())
            .unwrap_or_default())
    }

    /// Every cell key in the workbook, in position order
    pub(crate) fn cell_keys(&self) -> Vec<CellKey> {
        let mut keys = Vec::new();
        for (_, sheet_id, sheet) in self.sheets.iter() {
            for (_, row_id, row) in sheet.rows.iter() {
                for (_, col_id, _) in row.cells.iter() {
                    keys.push(CellKey::new(sheet_id, row_id, col_id));
                }
            }
        }
        keys
    }

    /// Verify that every edge is mirrored and joins two existing cells
    pub fn check_dependencies(&self) -> Result<()> {
        for key in self.cell_keys() {
            let Some(cell) = self.cell_by_key(key) else {
                continue;
            };
            for provider in &cell.providers {
                let mirrored = self
                    .cell_by_key(*provider)
                    .map_or(false, |p| p.consumers.contains(&key));
                if !mirrored {
                    return Err(Error::InvalidArgument(format!(
                        "{} reads {} but the edge is not mirrored",
                        key, provider
                    )));
                }
            }
            for consumer in &cell.consumers {
                let mirrored = self
                    .cell_by_key(*consumer)
                    .map_or(false, |c| c.providers.contains(&key));
                if !mirrored {
                    return Err(Error::InvalidArgument(format!(
                        "{} is read by {} but the edge is not mirrored",
                        key, consumer
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn keys(workbook: &mut Workbook, n: i64) -> Vec<CellKey> {
        (0..n)
            .map(|i| {
                workbook
                    .resolve(&CellAddress::by_index(i, i, Some(0)))
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn test_edges_are_mirrored() {
        let mut workbook = Workbook::new();
        let k = keys(&mut workbook, 2);

        workbook.add_dependency(k[0], k[1]);
        assert!(workbook.cell_by_key(k[1]).unwrap().providers.contains(&k[0]));
        assert!(workbook.cell_by_key(k[0]).unwrap().consumers.contains(&k[1]));
        workbook.check_dependencies().unwrap();

        workbook.remove_dependency(k[0], k[1]);
        assert!(workbook.cell_by_key(k[1]).unwrap().providers.is_empty());
        assert!(workbook.cell_by_key(k[0]).unwrap().consumers.is_empty());
    }

    #[test]
    fn test_journal_records_new_edges_only() {
        let mut workbook = Workbook::new();
        let k = keys(&mut workbook, 3);

        workbook.add_dependency(k[0], k[2]);
        workbook.session.journal = Some(Vec::new());
        workbook.add_dependency(k[0], k[2]);
        workbook.add_dependency(k[1], k[2]);
        let journal = workbook.session.journal.take().unwrap();

        assert_eq!(journal, vec![(k[1], k[2])]);
    }

    #[test]
    fn test_clear_providers_keeps_consumers() {
        let mut workbook = Workbook::new();
        let k = keys(&mut workbook, 3);

        // k0 -> k1 -> k2
        workbook.add_dependency(k[0], k[1]);
        workbook.add_dependency(k[1], k[2]);

        let cleared = workbook.clear_providers(k[1]);
        assert_eq!(cleared.into_iter().collect::<Vec<_>>(), vec![k[0]]);
        assert!(workbook.cell_by_key(k[0]).unwrap().consumers.is_empty());
        assert!(workbook.cell_by_key(k[1]).unwrap().consumers.contains(&k[2]));
        workbook.check_dependencies().unwrap();
    }

    #[test]
    fn test_check_detects_one_sided_edge() {
        let mut workbook = Workbook::new();
        let k = keys(&mut workbook, 2);

        workbook
            .cell_by_key_mut(k[1])
            .unwrap()
            .providers
            .insert(k[0]);
        assert!(workbook.check_dependencies().is_err());
    }
}
