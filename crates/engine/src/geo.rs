//! Location facts injected into the `[LOCAL CONTEXT]` prompt section.
//!
//! A small static table keyed by exact location name. Lookups never fail:
//! unknown locations get a generic advisory.

use std::collections::BTreeMap;

/// Advisory used for locations missing from the table.
pub const DEFAULT_ADVISORY: &str = "Standard environmental guidelines.";

const BUILTIN_FACTS: [(&str, &str); 3] = [
    (
        "Erode",
        "High textile dye concentration in local water sources (Cauvery basin).",
    ),
    (
        "Tuticorin",
        "High salinity and heavy coral reef protection zones.",
    ),
    (
        "Chennai",
        "High groundwater salinity and seasonal flooding risks.",
    ),
];

/// Location → environmental alert table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoFacts {
    facts: BTreeMap<String, String>,
}

impl GeoFacts {
    /// The built-in table.
    pub fn builtin() -> Self {
        Self {
            facts: BUILTIN_FACTS
                .iter()
                .map(|(loc, fact)| (loc.to_string(), fact.to_string()))
                .collect(),
        }
    }

    /// A table with no entries; every lookup returns the default advisory.
    pub fn empty() -> Self {
        Self {
            facts: BTreeMap::new(),
        }
    }

    /// Add or replace the fact for a location.
    pub fn with_fact(mut self, location: impl Into<String>, fact: impl Into<String>) -> Self {
        self.facts.insert(location.into(), fact.into());
        self
    }

    /// Merge entries over the current table; later entries win.
    pub fn extend<I, K, V>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.facts
            .extend(entries.into_iter().map(|(k, v)| (k.into(), v.into())));
    }

    /// The alert for `location`, or [`DEFAULT_ADVISORY`].
    pub fn lookup(&self, location: &str) -> &str {
        self.facts
            .get(location)
            .map(String::as_str)
            .unwrap_or(DEFAULT_ADVISORY)
    }

    /// Known locations, sorted.
    pub fn locations(&self) -> impl Iterator<Item = &str> {
        self.facts.keys().map(String::as_str)
    }
}

impl Default for GeoFacts {
    fn default() -> Self {
        Self::builtin()
    }
}
