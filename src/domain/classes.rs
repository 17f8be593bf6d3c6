// ============================================================
// Layer 3 — Class Index
// ============================================================
// Maps class names (one sub-directory per identity) to the
// integer labels the loss function expects.
//
// Labels are assigned by sorting names, so the same folder
// tree always yields the same labelling across runs.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassIndex {
    names: Vec<String>,
}

impl ClassIndex {
    /// Build an index from unsorted, possibly duplicated names.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: Vec<String> = names.into_iter().map(Into::into).collect();
        names.sort();
        names.dedup();
        Self { names }
    }

    pub fn label_of(&self, name: &str) -> Option<usize> {
        self.names.binary_search_by(|n| n.as_str().cmp(name)).ok()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
