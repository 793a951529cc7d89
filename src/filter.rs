//! Adapter scoping for triggers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Restricts a trigger to events thrown inside one adapter.
///
/// Matching is done on the adapter name only. The optional sub-object list
/// names finer-grained sources and is kept for serialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AdapterFilter {
    adapter: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    sub_objects: Vec<String>,
}

impl AdapterFilter {
    /// A filter passing every source of `adapter`.
    #[must_use]
    pub fn new(adapter: impl Into<String>) -> Self {
        Self {
            adapter: adapter.into(),
            sub_objects: Vec::new(),
        }
    }

    /// Adds a sub-object (source name) to the filter.
    ///
    /// Duplicates are ignored; registration order is kept.
    #[must_use]
    pub fn with_sub_object(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.sub_objects.contains(&name) {
            self.sub_objects.push(name);
        }
        self
    }

    /// Adapter this filter lets through.
    #[must_use]
    pub fn adapter(&self) -> &str {
        &self.adapter
    }

    /// Source names inside the adapter, in registration order.
    #[must_use]
    pub fn sub_objects(&self) -> &[String] {
        &self.sub_objects
    }

    /// True when the filter names individual sources.
    #[must_use]
    pub fn is_filtering_to_lower_level_objects(&self) -> bool {
        !self.sub_objects.is_empty()
    }
}

/// How a trigger restricts the sources it listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceFiltering {
    /// Events from any adapter.
    None,
    /// Events from the listed adapters.
    Adapter,
    /// Events from listed sources inside the listed adapters.
    Source,
}

impl SourceFiltering {
    /// Derives the filtering level from a set of adapter filters.
    pub fn derive<'a>(filters: impl IntoIterator<Item = &'a AdapterFilter>) -> Self {
        let mut level = Self::None;
        for filter in filters {
            if filter.is_filtering_to_lower_level_objects() {
                return Self::Source;
            }
            level = Self::Adapter;
        }
        level
    }

    /// Returns the canonical upper-case label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Adapter => "ADAPTER",
            Self::Source => "SOURCE",
        }
    }
}

impl fmt::Display for SourceFiltering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
