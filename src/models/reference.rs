use serde::{Deserialize, Serialize};

/// Records with a stable backend identity (`_id`)
pub trait Identified {
    fn id(&self) -> &str;
}

/// A relation that the backend sends either as a bare id or as the populated record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reference<T> {
    Id(String),
    Expanded(T),
}

impl<T: Identified> Reference<T> {
    pub fn id(&self) -> &str {
        match self {
            Reference::Id(id) => id,
            Reference::Expanded(record) => record.id(),
        }
    }

    /// Collapse to the bare id form, which is what write requests expect
    pub fn to_id(&self) -> Reference<T> {
        Reference::Id(self.id().to_string())
    }
}

impl<T> Reference<T> {
    pub fn expanded(&self) -> Option<&T> {
        match self {
            Reference::Expanded(record) => Some(record),
            Reference::Id(_) => None,
        }
    }

    /// Display text from the populated record, or "Unknown" for a bare id
    pub fn label<'a>(&'a self, name: impl Fn(&'a T) -> &'a str) -> &'a str {
        self.expanded()
            .map(name)
            .filter(|s| !s.is_empty())
            .unwrap_or("Unknown")
    }
}

impl<T> From<String> for Reference<T> {
    fn from(id: String) -> Self {
        Reference::Id(id)
    }
}
