//! Building free-text geocoder queries from spreadsheet columns.

use anyhow::{bail, Result};

use crate::models::Table;

/// Which columns make up an address, and how they are joined.
///
/// Columns are header names or zero-based positions written as `#N`.
#[derive(Debug, Clone)]
pub struct AddressTemplate {
    /// The first column is the primary field: a row without it has no address
    pub columns: Vec<String>,
    /// Columns that must exist even if they are not part of the address
    pub required: Vec<String>,
    /// Appended last, e.g. the country
    pub suffix: Option<String>,
    pub separator: String,
}

/// Template resolved against a table's header
#[derive(Debug, Clone)]
pub struct ResolvedTemplate<'a> {
    columns: Vec<usize>,
    template: &'a AddressTemplate,
}

impl AddressTemplate {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            required: Vec::new(),
            suffix: None,
            separator: ", ".to_string(),
        }
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    /// Check the header and resolve column positions.
    ///
    /// Fails listing every missing column at once.
    pub fn resolve<'a>(&'a self, table: &Table) -> Result<ResolvedTemplate<'a>> {
        if self.columns.is_empty() {
            bail!("No address columns configured");
        }

        let mut missing = Vec::new();
        for name in &self.required {
            if table.resolve_column(name).is_none() && !missing.contains(&name.as_str()) {
                missing.push(name.as_str());
            }
        }

        let mut columns = Vec::with_capacity(self.columns.len());
        for name in &self.columns {
            match table.resolve_column(name) {
                Some(col) => columns.push(col),
                None => {
                    if !missing.contains(&name.as_str()) {
                        missing.push(name.as_str());
                    }
                }
            }
        }

        if !missing.is_empty() {
            bail!(
                "The following columns were not found in the input: {}",
                missing.join(", ")
            );
        }

        Ok(ResolvedTemplate {
            columns,
            template: self,
        })
    }
}

impl ResolvedTemplate<'_> {
    /// Address for a data row, `None` when the primary field is blank
    pub fn build(&self, table: &Table, row: usize) -> Option<String> {
        let (&primary, rest) = self.columns.split_first()?;
        if table.cell(row, primary).is_blank() {
            return None;
        }

        let mut parts: Vec<String> = std::iter::once(primary)
            .chain(rest.iter().copied())
            .map(|col| table.cell(row, col))
            .filter(|cell| !cell.is_blank())
            .map(|cell| cell.display().trim().to_string())
            .collect();

        if let Some(suffix) = self.template.suffix.as_deref() {
            let suffix = suffix.trim();
            if !suffix.is_empty() {
                parts.push(suffix.to_string());
            }
        }

        Some(parts.join(&self.template.separator))
    }
}
