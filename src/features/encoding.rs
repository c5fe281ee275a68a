use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Explicit category label -> integer code mapping.
///
/// Codes are positions in the sorted list of distinct labels seen at fit
/// time. The mapping is stored in the model artifact so a later batch is
/// encoded with the training codes instead of codes re-derived from
/// whatever labels that batch happens to contain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryEncoder {
    categories: Vec<String>,
}

impl CategoryEncoder {
    pub fn fit<'a, I>(labels: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let distinct: BTreeSet<&str> = labels.into_iter().collect();
        Self {
            categories: distinct.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn code(&self, label: &str) -> Option<usize> {
        self.categories
            .binary_search_by(|c| c.as_str().cmp(label))
            .ok()
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}
