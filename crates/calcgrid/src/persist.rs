//! JSON persistence
//!
//! The encoding holds the options, the protection digest, every store with
//! its ids, positions and next-id counter, and for each cell its id-form
//! input, value and dependency edges. Compiled formulas and calculation
//! bookkeeping are not written; formulas are recompiled from their input on
//! load and values are taken from the file as they are.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;

use calcgrid_core::{Error, Result};
use calcgrid_formula::compile;

use crate::workbook::Workbook;

impl Workbook {
    /// Serialize the workbook to a JSON string
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::other(format!("failed to serialize workbook: {e}")))
    }

    /// Deserialize a workbook from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let workbook: Workbook = serde_json::from_str(json)
            .map_err(|e| Error::other(format!("failed to parse workbook: {e}")))?;
        workbook.restored()
    }

    /// Write the workbook as JSON to a writer
    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer_pretty(writer, self)
            .map_err(|e| Error::other(format!("failed to write workbook: {e}")))
    }

    /// Read a workbook from JSON produced by [`write_to`](Self::write_to)
    pub fn read_from<R: Read>(reader: R) -> Result<Self> {
        let workbook: Workbook = serde_json::from_reader(reader)
            .map_err(|e| Error::other(format!("failed to read workbook: {e}")))?;
        workbook.restored()
    }

    /// Save the workbook to a file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)
            .map_err(|e| Error::other(format!("failed to create {}: {e}", path.display())))?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)?;
        writer
            .flush()
            .map_err(|e| Error::other(format!("failed to write {}: {e}", path.display())))?;
        log::debug!("saved workbook to {}", path.display());
        Ok(())
    }

    /// Open a workbook saved with [`save`](Self::save)
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| Error::other(format!("failed to open {}: {e}", path.display())))?;
        let workbook = Self::read_from(BufReader::new(file))?;
        log::debug!("opened workbook from {}", path.display());
        Ok(workbook)
    }

    /// Rebuild what is not persisted and validate the loaded graph
    fn restored(mut self) -> Result<Self> {
        self.apply_limits()?;

        for key in self.cell_keys() {
            let Some(cell) = self.cell_by_key(key) else {
                continue;
            };
            let Some(body) = cell.input.as_deref().and_then(|input| input.strip_prefix('=')) else {
                continue;
            };
            let formula = compile(body).map_err(|e| Error::InvalidFormula {
                input: format!("={body}"),
                message: e.to_string(),
            })?;
            self.existing_cell_mut(key)?.formula = Some(Arc::new(formula));
        }

        self.check_dependencies()?;
        Ok(self)
    }
}
