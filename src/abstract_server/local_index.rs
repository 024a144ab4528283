use async_trait::async_trait;
use serde_json::from_str;
use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex},
};

use super::server_interface::{
    AbstractServer, ErrorDetails, ErrorLayer, Phrase, Result, SearchResults, ServerError,
};

/// IO errors amount to a 404 for our purposes which means a sticky problem.
impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> ServerError {
        ServerError::StickyProblem(ErrorDetails {
            layer: ErrorLayer::ServerLayer,
            message: err.to_string(),
        })
    }
}

/// Canned search results keyed by the exact query string.  Used for offline
/// runs of `wordgraph-tool` and throughout the tests.
///
/// The fixture file is a JSON object mapping each query to the phrase list the
/// backend would have returned for it, in ranking order:
///
/// ```json
/// { "waiting ? response": [ { "words": [...], "frequency": 120 } ] }
/// ```
#[derive(Clone, Debug)]
pub struct LocalIndex {
    phrases_by_query: Arc<BTreeMap<String, Vec<Phrase>>>,
    // Shared between clonified handles so a test can see every search a build
    // issued, no matter which phrase task issued it.
    search_counts: Arc<Mutex<HashMap<String, usize>>>,
}

impl LocalIndex {
    pub fn new(phrases_by_query: BTreeMap<String, Vec<Phrase>>) -> Self {
        LocalIndex {
            phrases_by_query: Arc::new(phrases_by_query),
            search_counts: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn from_json_str(raw_str: &str) -> Result<Self> {
        let phrases_by_query: BTreeMap<String, Vec<Phrase>> = from_str(raw_str)?;
        Ok(LocalIndex::new(phrases_by_query))
    }

    /// How many times `query` has been searched through this index or any of
    /// its clones.
    pub fn search_count(&self, query: &str) -> usize {
        match self.search_counts.lock() {
            Ok(counts) => counts.get(query).copied().unwrap_or(0),
            Err(_) => 0,
        }
    }
}

#[async_trait]
impl AbstractServer for LocalIndex {
    fn clonify(&self) -> Box<dyn AbstractServer + Send + Sync> {
        Box::new(self.clone())
    }

    async fn search(&self, query: &str, corpus: &str, topk: usize) -> Result<SearchResults> {
        if let Ok(mut counts) = self.search_counts.lock() {
            *counts.entry(query.to_string()).or_insert(0) += 1;
        }

        // A query we have no fixture for is a search miss, not an error.
        let phrases = match self.phrases_by_query.get(query) {
            Some(phrases) => phrases
                .iter()
                .filter(|p| p.corpus.is_empty() || p.corpus == corpus)
                .take(topk)
                .cloned()
                .collect(),
            None => vec![],
        };

        Ok(SearchResults { phrases })
    }
}

pub fn make_local_server(fixture_path: &str) -> Result<Box<dyn AbstractServer + Send + Sync>> {
    let raw_str = std::fs::read_to_string(fixture_path)?;
    Ok(Box::new(LocalIndex::from_json_str(&raw_str)?))
}
