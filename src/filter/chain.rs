//! Ordered composition of file filters.

use std::sync::Arc;
use tracing::debug;

use super::{FileFilter, HiddenFileFilter, PatternFilter, PersistentAcceptOnceFilter};
use crate::error::Result;
use crate::metadata::MetadataStore;
use crate::scanner::{FileCandidate, IdentifierKind};

/// Filters applied in a fixed order with AND logic.
///
/// Evaluation stops at the first rejection, so filters with side effects
/// only see candidates every earlier filter accepted. The chain cannot be
/// changed once built.
pub struct FilterChain {
    filters: Vec<Box<dyn FileFilter>>,
}

impl FilterChain {
    pub fn new(filters: Vec<Box<dyn FileFilter>>) -> Self {
        Self { filters }
    }

    /// Build the standard chain: hidden files, then the optional name
    /// pattern, then persistent accept-once tracking
    ///
    /// # Arguments
    /// * `pattern` - Glob on file names; `None` or blank accepts all names
    /// * `store` - Metadata store backing the accept-once filter
    /// * `key_prefix` - Prefix of the seen-file keys
    /// * `identifier` - How files are identified in the store
    /// * `reaccept_modified` - Emit seen files again once modified
    pub fn standard(
        pattern: Option<&str>,
        store: Arc<dyn MetadataStore>,
        key_prefix: &str,
        identifier: IdentifierKind,
        reaccept_modified: bool,
    ) -> Result<Self> {
        let mut filters: Vec<Box<dyn FileFilter>> = vec![Box::new(HiddenFileFilter::new())];

        if let Some(pattern) = pattern.map(str::trim).filter(|p| !p.is_empty()) {
            filters.push(Box::new(PatternFilter::new(pattern)?));
        }

        filters.push(Box::new(
            PersistentAcceptOnceFilter::new(store, key_prefix)
                .with_identifier(identifier)
                .with_reaccept_modified(reaccept_modified),
        ));

        Ok(Self::new(filters))
    }

    /// Get the number of filters in the chain.
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Get descriptions of all filters.
    pub fn filter_descriptions(&self) -> Vec<String> {
        self.filters.iter().map(|f| f.description()).collect()
    }
}

impl FileFilter for FilterChain {
    fn accept(&self, candidate: &FileCandidate) -> Result<bool> {
        for filter in &self.filters {
            if !filter.accept(candidate)? {
                debug!(
                    "{} rejected by {}",
                    candidate.path.display(),
                    filter.description()
                );
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Roll back every filter, reporting the first failure
    fn rollback(&self, candidate: &FileCandidate) -> Result<()> {
        let mut first_error = None;
        for filter in &self.filters {
            if let Err(e) = filter.rollback(candidate) {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn description(&self) -> String {
        if self.filters.is_empty() {
            "chain(empty)".to_string()
        } else {
            format!("chain({})", self.filter_descriptions().join(" AND "))
        }
    }
}

// Implement Debug manually since Box<dyn FileFilter> doesn't implement Debug
impl std::fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterChain")
            .field("filters", &self.filter_descriptions())
            .finish()
    }
}
