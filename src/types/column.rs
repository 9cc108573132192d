//! Column and ColumnInfo types for result metadata.

use super::oid::{self, Oid};

/// A column in a result set, as reported by the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Native type OID.
    pub oid: Oid,
}

impl Column {
    pub fn new(name: impl Into<String>, oid: Oid) -> Self {
        Self {
            name: name.into(),
            oid,
        }
    }

    /// SQL type name, or `oid:<n>` for types outside the built-in table.
    pub fn type_name(&self) -> String {
        oid::type_name(self.oid).unwrap_or_else(|| format!("oid:{}", self.oid))
    }
}

/// Column metadata for a result set, cached once per reader.
#[derive(Debug, Clone, Default)]
pub struct ColumnInfo {
    /// Column definitions.
    pub columns: Vec<Column>,
}

impl ColumnInfo {
    /// Create new column info from columns.
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    /// Get column names.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Get the number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Check if there are no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Get column by index.
    pub fn get(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// Find column index by name (case-insensitive, first match wins).
    pub fn find_by_name(&self, name: &str) -> Option<usize> {
        let name = name.to_lowercase();
        self.columns
            .iter()
            .position(|c| c.name.to_lowercase() == name)
    }
}
