use indexmap::IndexMap;
use std::collections::HashMap;

use crate::models::CatalogProcedure;
use crate::parser::shapes::strip_punctuation;

/// Length of the code prefix shared by "similar" procedures.
pub const PREFIX_LEN: usize = 6;

/// Immutable snapshot of the active SIGTAP version.
///
/// Entries are keyed by their digits-only code and keep load order, so prefix
/// enumeration is deterministic.
#[derive(Debug, Clone, Default)]
pub struct ReferenceCatalog {
    version: Option<String>,
    entries: IndexMap<String, CatalogProcedure>,
    /// prefix -> positions in `entries`, in load order
    by_prefix: HashMap<String, Vec<usize>>,
}

impl ReferenceCatalog {
    /// Build the snapshot. A code seen twice keeps its first row.
    pub fn new(version: Option<String>, procedures: Vec<CatalogProcedure>) -> Self {
        let mut entries: IndexMap<String, CatalogProcedure> = IndexMap::with_capacity(procedures.len());
        let mut duplicates = 0usize;

        for procedure in procedures {
            let key = strip_punctuation(&procedure.code);
            if key.is_empty() || entries.contains_key(&key) {
                duplicates += 1;
                continue;
            }
            entries.insert(key, procedure);
        }

        let mut by_prefix: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, key) in entries.keys().enumerate() {
            if let Some(prefix) = key.get(..PREFIX_LEN) {
                by_prefix.entry(prefix.to_string()).or_default().push(idx);
            }
        }

        tracing::info!(
            "Catalog {} loaded: {} procedures, {} duplicate or empty codes skipped",
            version.as_deref().unwrap_or("<sem versão>"),
            entries.len(),
            duplicates
        );

        Self {
            version,
            entries,
            by_prefix,
        }
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, code: &str) -> Option<&CatalogProcedure> {
        self.entries.get(&strip_punctuation(code))
    }

    /// Entries sharing the 6-digit prefix of `code`, excluding `code` itself,
    /// in load order.
    pub fn with_prefix<'a>(&'a self, code: &str) -> impl Iterator<Item = &'a CatalogProcedure> + 'a {
        let key = strip_punctuation(code);
        let positions = key
            .get(..PREFIX_LEN)
            .and_then(|prefix| self.by_prefix.get(prefix))
            .map(Vec::as_slice)
            .unwrap_or_default();

        positions.iter().filter_map(move |&idx| {
            let (entry_key, procedure) = self.entries.get_index(idx)?;
            (*entry_key != key).then_some(procedure)
        })
    }
}
