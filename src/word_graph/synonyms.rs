use async_trait::async_trait;
use itertools::Itertools;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use tokio::sync::OnceCell;

use crate::abstract_server::AbstractServer;

/// How many synonym candidates we ask the backend for per slot title.
pub const SYNONYM_TOPK: usize = 100;

/// A synonym candidate, as words.
pub type Candidate = Vec<String>;

/// Source of synonym candidates for a slot title, in backend ranking order.
///
/// Lookups can't fail from the resolver's point of view; an implementation
/// that hits an error reports it and answers with no candidates.
#[async_trait]
pub trait SynonymLookup {
    async fn candidates(&self, title: &str) -> Arc<Vec<Candidate>>;
}

type CandidateCell = Arc<OnceCell<Arc<Vec<Candidate>>>>;

/// Per-build memo of synonym sub-queries.  Each distinct title is searched at
/// most once; concurrent phrase tasks asking for the same title all wait on
/// the one in-flight search.
pub struct SynonymCache {
    server: Box<dyn AbstractServer + Send + Sync>,
    corpus: String,
    cells: Mutex<HashMap<String, CandidateCell>>,
}

impl SynonymCache {
    pub fn new(server: Box<dyn AbstractServer + Send + Sync>, corpus: &str) -> Self {
        SynonymCache {
            server,
            corpus: corpus.to_string(),
            cells: Mutex::new(HashMap::new()),
        }
    }

    fn cell_for(&self, title: &str) -> CandidateCell {
        let mut cells = match self.cells.lock() {
            Ok(cells) => cells,
            // Nothing we do while holding the lock can leave the map half
            // updated, so a poisoned lock is still a usable map.
            Err(poisoned) => poisoned.into_inner(),
        };
        cells
            .entry(title.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }

    async fn fetch(&self, title: &str) -> Arc<Vec<Candidate>> {
        match self.server.search(title, &self.corpus, SYNONYM_TOPK).await {
            Ok(results) => {
                let candidates: Vec<Candidate> = results
                    .phrases
                    .iter()
                    .map(|p| p.words.iter().map(|w| w.text.clone()).collect::<Candidate>())
                    .filter(|c| !c.is_empty())
                    .unique()
                    .collect();
                trace!(title, candidate_count = candidates.len());
                Arc::new(candidates)
            }
            Err(err) => {
                warn!(title, err = ?err, "synonym lookup failed");
                Arc::new(vec![])
            }
        }
    }
}

#[async_trait]
impl SynonymLookup for SynonymCache {
    async fn candidates(&self, title: &str) -> Arc<Vec<Candidate>> {
        let cell = self.cell_for(title);
        cell.get_or_init(|| self.fetch(title)).await.clone()
    }
}

/// How a run of synonym words was divided up between consecutive synonym
/// slots.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Grouping {
    /// One joined text per slot, in slot order.  May be shorter than the
    /// number of slots when there were fewer words than slots.
    Found(Vec<String>),
    NotFound,
}

impl Grouping {
    pub fn groups(&self) -> &[String] {
        match self {
            Grouping::Found(groups) => groups,
            Grouping::NotFound => &[],
        }
    }
}

/// One level of the backtracking search: the candidates for one slot that fit
/// at `cursor`, and which of them to try next.
struct Frame {
    cursor: usize,
    fits: Vec<usize>,
    next: usize,
}

/// Lengths of the candidates for `title` that spell out `words[cursor..]`
/// from the start and leave at least one word for each of the
/// `remaining_slots - 1` slots after this one.
async fn fitting_lengths(
    lookup: &(dyn SynonymLookup + Send + Sync),
    title: &str,
    words: &[String],
    cursor: usize,
    remaining_slots: usize,
) -> Vec<usize> {
    let remaining_words = words.len() - cursor;
    let max_len = 1 + remaining_words - remaining_slots;
    lookup
        .candidates(title)
        .await
        .iter()
        .filter(|c| !c.is_empty() && c.len() <= max_len && words[cursor..].starts_with(c))
        .map(|c| c.len())
        .collect()
}

fn join_words(words: &[String]) -> String {
    words.join(" ")
}

/// Divide `words` (a run of synonym-tagged phrase words) between the synonym
/// slots named by `titles`.
///
/// Each slot gets a contiguous group that is one of the synonyms the backend
/// returns for that slot's title, except the last slot which takes whatever is
/// left.  Candidates are tried in the backend's ranking order and the first
/// complete division wins; nobody checks whether a later one would have been
/// better.
pub async fn resolve_synonym_run(
    lookup: &(dyn SynonymLookup + Send + Sync),
    titles: &[String],
    words: &[String],
) -> Grouping {
    let slot_count = titles.len();
    if slot_count == 0 || words.is_empty() {
        return Grouping::NotFound;
    }
    if words.len() <= slot_count {
        return Grouping::Found(words.to_vec());
    }
    if slot_count == 1 {
        return Grouping::Found(vec![join_words(words)]);
    }

    // `chosen[i]` is the length of the group currently tried for slot `i`;
    // `stack[i]` is the frame that produced it.
    let mut chosen: Vec<usize> = vec![];
    let mut stack = vec![Frame {
        cursor: 0,
        fits: fitting_lengths(lookup, &titles[0], words, 0, slot_count).await,
        next: 0,
    }];

    while !stack.is_empty() {
        let depth = stack.len() - 1;
        let frame = &mut stack[depth];
        // Unwind whatever the previous visit of this frame chose.
        chosen.truncate(depth);

        if frame.next >= frame.fits.len() {
            stack.pop();
            continue;
        }
        let len = frame.fits[frame.next];
        frame.next += 1;
        let cursor = frame.cursor + len;
        chosen.push(len);

        let remaining_slots = slot_count - depth - 1;
        let remaining_words = words.len() - cursor;
        if remaining_slots == 1 || remaining_words <= remaining_slots {
            let mut groups = vec![];
            let mut start = 0;
            for len in &chosen {
                groups.push(join_words(&words[start..start + len]));
                start += len;
            }
            if remaining_slots == 1 {
                groups.push(join_words(&words[start..]));
            } else {
                groups.extend(words[start..].iter().cloned());
            }
            return Grouping::Found(groups);
        }

        let fits = fitting_lengths(
            lookup,
            &titles[depth + 1],
            words,
            cursor,
            remaining_slots,
        )
        .await;
        stack.push(Frame {
            cursor,
            fits,
            next: 0,
        });
    }

    Grouping::NotFound
}
