//! Value objects used by the account aggregate.

use serde::{Deserialize, Serialize};

/// A person's given and family name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PersonName {
    pub first: String,
    pub last: String,
}

impl PersonName {
    pub fn new(first: impl Into<String>, last: impl Into<String>) -> Self {
        Self {
            first: first.into(),
            last: last.into(),
        }
    }

    /// Returns "first last", skipping whichever part is empty.
    pub fn full_name(&self) -> String {
        match (self.first.is_empty(), self.last.is_empty()) {
            (false, false) => format!("{} {}", self.first, self.last),
            (false, true) => self.first.clone(),
            (true, false) => self.last.clone(),
            (true, true) => String::new(),
        }
    }
}
