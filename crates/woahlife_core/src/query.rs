//! Read side over the search index.

use crate::constants::{DEFAULT_SEARCH_LIMIT, MAX_SEARCH_LIMIT};
use crate::db::SearchIndex;
use crate::error::AppError;
use crate::models::SearchDocument;
use std::sync::Arc;

/// Clamp a caller-supplied result limit to the served range.
pub fn normalized_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_SEARCH_LIMIT).clamp(1, MAX_SEARCH_LIMIT)
}

/// Point lookups and ranked search against the index.
#[derive(Clone)]
pub struct QueryPath {
    index: Arc<dyn SearchIndex>,
}

impl QueryPath {
    pub fn new(index: Arc<dyn SearchIndex>) -> Self {
        Self { index }
    }

    /// Document for `id`; `Ok(None)` when nothing is indexed under it.
    ///
    /// # Errors
    /// Only backend faults are errors.
    pub fn get_by_id(&self, id: &str) -> Result<Option<SearchDocument>, AppError> {
        self.index.get(id.trim())
    }

    /// Most relevant documents first. A blank query matches nothing.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchDocument>, AppError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        self.index.search(query, limit.min(MAX_SEARCH_LIMIT))
    }
}
