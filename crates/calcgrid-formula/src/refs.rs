//! Reference-call scanning and rewriting
//!
//! Formula text may embed reference calls of the form
//! `NAME(row, col[, sheet])` where `NAME` is one of `positional`, `id` or
//! `pinned`. [`rewrite_references`] finds every such call in a single
//! left-to-right pass and lets a callback replace it, leaving all other text
//! untouched. Arguments are plain text here; nested calls are not supported.
//! Calls spelled inside a quoted string literal are part of the string and
//! are never reported.

use std::fmt;

use calcgrid_core::{Error, Result};
use lazy_regex::regex;
use regex::Captures;

/// Which reference syntax a call uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefForm {
    /// `positional(r, c[, s])`: zero-based positions, user facing
    Positional,
    /// `id(r, c[, s])`: stable ids, storage facing
    Id,
    /// `pinned(r, c[, s])`: positions explicitly anchored by the user
    Pinned,
}

impl RefForm {
    /// The call name of this form
    pub fn name(&self) -> &'static str {
        match self {
            RefForm::Positional => "positional",
            RefForm::Id => "id",
            RefForm::Pinned => "pinned",
        }
    }

    /// Parse a call name (case-sensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "positional" => Some(RefForm::Positional),
            "id" => Some(RefForm::Id),
            "pinned" => Some(RefForm::Pinned),
            _ => None,
        }
    }

    /// Check if coordinates of this form are stable ids
    pub fn is_by_id(&self) -> bool {
        matches!(self, RefForm::Id)
    }
}

impl fmt::Display for RefForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One reference call found in formula text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceCall<'a> {
    pub form: RefForm,
    /// Row argument, trimmed
    pub row: &'a str,
    /// Column argument, trimmed
    pub col: &'a str,
    /// Sheet argument, trimmed, if present
    pub sheet: Option<&'a str>,
}

impl<'a> ReferenceCall<'a> {
    /// Parse an argument as an integer coordinate
    pub fn parse_arg(arg: &str) -> Result<i64> {
        let trimmed = arg.trim();
        trimmed.parse::<i64>().map_err(|_| {
            Error::InvalidArgument(format!(
                "reference argument '{}' is not an integer",
                trimmed
            ))
        })
    }

    /// Parsed `(row, col, sheet)` coordinates
    pub fn coordinates(&self) -> Result<(i64, i64, Option<i64>)> {
        let row = Self::parse_arg(self.row)?;
        let col = Self::parse_arg(self.col)?;
        let sheet = self.sheet.map(Self::parse_arg).transpose()?;
        Ok((row, col, sheet))
    }
}

/// Format a reference call, e.g. `id(1, 2)` or `positional(0, 3, 1)`
pub fn format_reference(form: RefForm, row: i64, col: i64, sheet: Option<i64>) -> String {
    match sheet {
        Some(sheet) => format!("{}({}, {}, {})", form.name(), row, col, sheet),
        None => format!("{}({}, {})", form.name(), row, col),
    }
}

/// Rewrite every reference call in `text`
///
/// The callback returns `Some(replacement)` to substitute a call or `None`
/// to keep it verbatim. The first callback error aborts the rewrite.
///
/// # Example
/// ```rust
/// use calcgrid_formula::refs::{format_reference, rewrite_references, RefForm};
///
/// let out = rewrite_references("value(positional(1, 2)) + 1", |call| {
///     let (row, col, sheet) = call.coordinates()?;
///     Ok(Some(format_reference(RefForm::Id, row + 10, col + 10, sheet)))
/// })
/// .unwrap();
/// assert_eq!(out, "value(id(11, 12)) + 1");
/// ```
pub fn rewrite_references<F>(text: &str, mut rewrite: F) -> Result<String>
where
    F: FnMut(&ReferenceCall<'_>) -> Result<Option<String>>,
{
    // String literals are matched first so their contents are skipped whole
    let pattern = regex!(
        r#"(?s)'(?:[^'\\]|\\.)*'|"(?:[^"\\]|\\.)*"|\b(?P<form>positional|id|pinned)\s*\(\s*(?P<row>[^,()]*?)\s*,\s*(?P<col>[^,()]*?)\s*(?:,\s*(?P<sheet>[^,()]*?)\s*)?\)"#
    );

    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for caps in pattern.captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let Some(call) = call_from_captures(&caps) else {
            continue;
        };

        out.push_str(&text[last..whole.start()]);
        match rewrite(&call)? {
            Some(replacement) => out.push_str(&replacement),
            None => out.push_str(whole.as_str()),
        }
        last = whole.end();
    }

    out.push_str(&text[last..]);
    Ok(out)
}

/// Collect every reference call in `text`, in order
pub fn find_references(text: &str) -> Result<Vec<(RefForm, i64, i64, Option<i64>)>> {
    let mut found = Vec::new();
    rewrite_references(text, |call| {
        let (row, col, sheet) = call.coordinates()?;
        found.push((call.form, row, col, sheet));
        Ok(None)
    })?;
    Ok(found)
}

fn call_from_captures<'a>(caps: &Captures<'a>) -> Option<ReferenceCall<'a>> {
    let form = RefForm::from_name(caps.name("form")?.as_str())?;
    Some(ReferenceCall {
        form,
        row: caps.name("row")?.as_str().trim(),
        col: caps.name("col")?.as_str().trim(),
        sheet: caps.name("sheet").map(|m| m.as_str().trim()),
    })
}
