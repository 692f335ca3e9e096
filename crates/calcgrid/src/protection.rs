//! Workbook protection
//!
//! A protected workbook refuses every edit (new input and structural
//! changes) until it is unprotected with the same password. Reading values
//! and input stays allowed. Only a SHA-256 digest of the password is kept.

use calcgrid_core::{Error, Result};
use sha2::{Digest, Sha256};

use crate::workbook::Workbook;

fn password_digest(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl Workbook {
    /// Protect the workbook with a password
    pub fn protect(&mut self, password: &str) -> Result<()> {
        if self.protection.is_some() {
            return Err(Error::InvalidOperation(
                "workbook is already protected".into(),
            ));
        }
        self.protection = Some(password_digest(password));
        log::debug!("workbook protected");
        Ok(())
    }

    /// Remove protection, given the password it was protected with
    pub fn unprotect(&mut self, password: &str) -> Result<()> {
        let Some(digest) = self.protection.as_deref() else {
            return Err(Error::InvalidOperation("workbook is not protected".into()));
        };
        if digest != password_digest(password) {
            return Err(Error::InvalidArgument("incorrect password".into()));
        }
        self.protection = None;
        log::debug!("workbook unprotected");
        Ok(())
    }

    /// Check if the workbook is protected
    pub fn is_protected(&self) -> bool {
        self.protection.is_some()
    }

    pub(crate) fn ensure_unprotected(&self, operation: &str) -> Result<()> {
        if self.is_protected() {
            return Err(Error::InvalidOperation(format!(
                "cannot {} on a protected workbook",
                operation
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calcgrid_core::{CellAddress, Value};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_digest_is_hex_sha256() {
        assert_eq!(
            password_digest(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_protect_blocks_edits() {
        let mut workbook = Workbook::new();
        let cell = CellAddress::by_index(0, 0, Some(0));
        workbook.set_input(&cell, "1").unwrap();

        workbook.protect("secret").unwrap();
        assert!(workbook.is_protected());
        assert!(matches!(
            workbook.set_input(&cell, "2"),
            Err(Error::InvalidOperation(_))
        ));
        assert!(matches!(
            workbook.insert_rows(0, 0, 1),
            Err(Error::InvalidOperation(_))
        ));
        assert!(matches!(
            workbook.delete_sheets(0, 1),
            Err(Error::InvalidOperation(_))
        ));

        // Reads are still allowed
        assert_eq!(workbook.get_value(&cell).unwrap(), Value::Number(1.0));
        assert_eq!(workbook.get_input(&cell).unwrap().as_deref(), Some("1"));
    }

    #[test]
    fn test_unprotect() {
        let mut workbook = Workbook::new();
        assert!(matches!(
            workbook.unprotect("secret"),
            Err(Error::InvalidOperation(_))
        ));

        workbook.protect("secret").unwrap();
        assert!(matches!(
            workbook.protect("other"),
            Err(Error::InvalidOperation(_))
        ));
        assert!(matches!(
            workbook.unprotect("wrong"),
            Err(Error::InvalidArgument(_))
        ));
        assert!(workbook.is_protected());

        workbook.unprotect("secret").unwrap();
        assert!(!workbook.is_protected());
        workbook
            .set_input(&CellAddress::by_index(0, 0, Some(0)), "2")
            .unwrap();
    }
}
