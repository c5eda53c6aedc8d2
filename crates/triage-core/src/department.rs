//! Static department table
//!
//! Sequence-classification models usually emit `LABEL_<n>` (or a bare index)
//! rather than a business name. The table maps those indices to departments.
//! Labels that are not index-shaped pass through unchanged.

use serde::{Deserialize, Serialize};

/// Department used for indices outside the table
pub const DEFAULT_DEPARTMENT: &str = "General";

const DEFAULT_DEPARTMENTS: &[&str] = &[
    "Catering",
    "Cleanliness",
    "Coach",
    "Electrical",
    "General",
    "Maintenance",
    "Medical",
    "Security",
    "Ticketing",
    "Water",
];

/// Index-to-department mapping, constant for the life of the process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DepartmentTable {
    names: Vec<String>,
}

impl DepartmentTable {
    /// Create a table from department names in index order
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Department name at `index`, or the default department
    pub fn name(&self, index: usize) -> &str {
        self.names
            .get(index)
            .map(String::as_str)
            .unwrap_or(DEFAULT_DEPARTMENT)
    }

    /// Resolve a raw model label into a department name
    pub fn resolve(&self, label: &str) -> String {
        let label = label.trim();
        match label_index(label) {
            Some(index) => self.name(index).to_string(),
            None => label.to_string(),
        }
    }

    /// Number of departments in the table
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for DepartmentTable {
    fn default() -> Self {
        Self::new(DEFAULT_DEPARTMENTS.iter().copied())
    }
}

/// Parse `"6"` or `"LABEL_6"` (any case) into an index
fn label_index(label: &str) -> Option<usize> {
    if let Ok(index) = label.parse::<usize>() {
        return Some(index);
    }

    let prefix = label.get(..6)?;
    if prefix.eq_ignore_ascii_case("label_") {
        label[6..].parse::<usize>().ok()
    } else {
        None
    }
}
