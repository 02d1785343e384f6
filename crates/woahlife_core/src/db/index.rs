//! Local search index backed by redb.
//!
//! Stores each [`SearchDocument`] in its JSON wire form and answers free-text
//! queries with a scan-and-rank pass, like a managed index would.

use super::SearchIndex;
use crate::{db::tables::*, error::AppError, models::SearchDocument};
use redb::{ReadableDatabase, ReadableTable};
use std::cmp::Ordering;
use std::sync::Arc;

/// Extra weight for a term that matches the rendered day name.
const PRETTY_DATE_MATCH_WEIGHT: usize = 5;

/// Accessor for the search document table.
#[derive(Clone)]
pub struct IndexDb {
    db: Arc<redb::Database>,
    max_document_bytes: usize,
}

impl IndexDb {
    /// Initialize the index table if it does not exist yet.
    ///
    /// # Arguments
    /// - `db`: Shared redb handle.
    /// - `max_document_bytes`: Largest serialized document the index accepts.
    ///
    /// # Errors
    /// Returns an error when redb transaction/table initialization fails.
    pub fn new(db: Arc<redb::Database>, max_document_bytes: usize) -> Result<Self, AppError> {
        let write_txn = db.begin_write()?;
        write_txn.open_table(SEARCH_DOCUMENTS)?;
        write_txn.commit()?;
        Ok(Self {
            db,
            max_document_bytes,
        })
    }

    /// Largest serialized document this index accepts.
    pub fn max_document_bytes(&self) -> usize {
        self.max_document_bytes
    }
}

impl SearchIndex for IndexDb {
    fn save(&self, document: &SearchDocument) -> Result<(), AppError> {
        let encoded = document.encode()?;
        if encoded.len() > self.max_document_bytes {
            return Err(AppError::RecordTooLarge {
                object_id: document.object_id.clone(),
                size: encoded.len(),
                limit: self.max_document_bytes,
            });
        }
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(SEARCH_DOCUMENTS)?;
            table.insert(document.object_id.as_str(), encoded.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn delete(&self, object_id: &str) -> Result<(), AppError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(SEARCH_DOCUMENTS)?;
            let _ = table.remove(object_id)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn get(&self, object_id: &str) -> Result<Option<SearchDocument>, AppError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SEARCH_DOCUMENTS)?;
        match table.get(object_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchDocument>, AppError> {
        let terms = query_terms(query);
        if terms.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SEARCH_DOCUMENTS)?;
        let mut ranked: Vec<(usize, SearchDocument)> = Vec::new();
        for item in table.iter()? {
            let (_, value) = item?;
            let document: SearchDocument = serde_json::from_slice(value.value())?;
            if let Some(score) = score_document(&document, &terms) {
                push_ranked_top_k(&mut ranked, (score, document), limit);
            }
        }

        ranked.sort_by(rank_order);
        Ok(ranked.into_iter().map(|(_, document)| document).collect())
    }
}

fn query_terms(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(str::to_lowercase)
        .collect()
}

/// Score a document against all `terms`; `None` unless every term matches.
fn score_document(document: &SearchDocument, terms: &[String]) -> Option<usize> {
    let pretty = document.pretty_date.to_lowercase();
    let entries: Vec<String> = document.entries.iter().map(|e| e.to_lowercase()).collect();

    let mut total = 0;
    for term in terms {
        let mut score: usize = entries
            .iter()
            .map(|entry| entry.matches(term.as_str()).count())
            .sum();
        if pretty.contains(term.as_str()) || document.object_id == *term {
            score += PRETTY_DATE_MATCH_WEIGHT;
        }
        if score == 0 {
            return None;
        }
        total += score;
    }
    Some(total)
}

/// Higher score first, then newer day first.
fn rank_order(a: &(usize, SearchDocument), b: &(usize, SearchDocument)) -> Ordering {
    b.0.cmp(&a.0).then_with(|| b.1.date.cmp(&a.1.date))
}

fn push_ranked_top_k(
    ranked: &mut Vec<(usize, SearchDocument)>,
    candidate: (usize, SearchDocument),
    limit: usize,
) {
    ranked.push(candidate);
    if ranked.len() > limit {
        ranked.sort_by(rank_order);
        ranked.truncate(limit);
    }
}
