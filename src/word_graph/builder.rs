use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex,
};

use tracing::Instrument;

use crate::{
    abstract_server::{AbstractServer, Result},
    query::{segment_query, Slot},
};

use super::{
    aggregate::aggregate_columns,
    align::align_phrase,
    interface::{AlignedWrite, BuildOutcome, BuildRequest, Column, Phrase, WordGraph},
    split::split_columns,
    synonyms::SynonymCache,
    trim::trim_edges,
};

/// A phrase queued for alignment along with the slots it aligns against.
struct AlignJob {
    phrase: Phrase,
    selected: bool,
    slots: Arc<Vec<Slot>>,
}

/// Work out which phrases get aligned against which slots, in processing
/// order: the regular phrases first, then whatever pinned phrases weren't
/// already among them.
fn plan_jobs(request: &BuildRequest, slots: &Arc<Vec<Slot>>) -> Vec<AlignJob> {
    let is_pinned = |phrase: &Phrase| {
        let text = phrase.text();
        request.pinned.iter().any(|p| p.text() == text)
    };

    let mut jobs: Vec<AlignJob> = request
        .phrases
        .iter()
        .map(|phrase| AlignJob {
            phrase: phrase.clone(),
            selected: is_pinned(phrase),
            slots: slots.clone(),
        })
        .collect();

    for pinned in &request.pinned {
        let text = pinned.text();
        if request.phrases.iter().any(|p| p.text() == text) {
            continue;
        }
        // Pinned phrases carry the query they came from.
        let own_slots = if pinned.query.is_empty() || pinned.query == request.query {
            slots.clone()
        } else {
            Arc::new(segment_query(&pinned.query))
        };
        jobs.push(AlignJob {
            phrase: pinned.clone(),
            selected: true,
            slots: own_slots,
        });
    }

    jobs
}

/// The column array, sized for the longest slot list any job aligns against.
/// Columns past the end of the active query are named after the slots of the
/// first job that reaches that far.
fn make_columns(slots: &[Slot], jobs: &[AlignJob]) -> Vec<Column> {
    let mut columns: Vec<Column> = slots.iter().map(|s| Column::new(&s.title)).collect();
    for job in jobs {
        for slot in job.slots.iter().skip(columns.len()) {
            columns.push(Column::new(&slot.title));
        }
    }
    columns
}

/// Runs builds and keeps the most recent one that was allowed to finish.
///
/// Every call to `build` takes a fresh id.  Builds may overlap; whichever
/// finishes while still holding the newest id commits, and the rest report
/// themselves superseded.
pub struct GraphBuilder {
    server: Box<dyn AbstractServer + Send + Sync>,
    latest_build: AtomicU64,
    committed: Mutex<Option<WordGraph>>,
}

impl GraphBuilder {
    pub fn new(server: Box<dyn AbstractServer + Send + Sync>) -> Self {
        GraphBuilder {
            server,
            latest_build: AtomicU64::new(0),
            committed: Mutex::new(None),
        }
    }

    /// The id the most recently started build was given.
    pub fn latest_build(&self) -> u64 {
        self.latest_build.load(Ordering::SeqCst)
    }

    fn is_latest(&self, build_id: u64) -> bool {
        self.latest_build() == build_id
    }

    /// The last graph a build committed, if any.
    pub fn committed(&self) -> Option<WordGraph> {
        match self.committed.lock() {
            Ok(committed) => committed.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub async fn build(&self, request: BuildRequest) -> Result<BuildOutcome> {
        let build_id = self.latest_build.fetch_add(1, Ordering::SeqCst) + 1;
        let span = trace_span!("build", build_id, query = %request.query);
        self.run_build(build_id, request).instrument(span).await
    }

    async fn run_build(&self, build_id: u64, request: BuildRequest) -> Result<BuildOutcome> {
        let slots = Arc::new(segment_query(&request.query));
        trace!(slot_count = slots.len(), phrase_count = request.phrases.len(), pinned_count = request.pinned.len());

        let jobs = plan_jobs(&request, &slots);
        let columns = make_columns(&slots, &jobs);

        let cache = Arc::new(SynonymCache::new(self.server.clonify(), &request.corpus));

        // ## kick off one alignment per phrase
        let mut align_tasks = vec![];
        for job in jobs {
            let span = trace_span!("align_phrase", phrase = %job.phrase.text()).or_current();
            let cache = cache.clone();
            align_tasks.push(tokio::spawn(
                async move {
                    align_phrase(&job.phrase, job.selected, &job.slots, cache.as_ref()).await
                }
                .instrument(span),
            ));
        }

        // ## join them in input order
        let mut phrase_writes: Vec<Vec<AlignedWrite>> = vec![];
        for handle in align_tasks {
            phrase_writes.push(handle.await?);
        }

        if !self.is_latest(build_id) {
            trace!(build_id, latest = self.latest_build(), "superseded after alignment");
            return Ok(BuildOutcome::Superseded {
                build_id,
                latest: self.latest_build(),
            });
        }

        let (mut columns, phrase_writes) = match request.settings.split {
            Some(alignment) => {
                let names: Vec<String> = columns.into_iter().map(|c| c.name).collect();
                let (names, writes) = split_columns(&names, phrase_writes, alignment);
                (names.iter().map(|n| Column::new(n)).collect::<Vec<_>>(), writes)
            }
            None => (columns, phrase_writes),
        };

        for write in phrase_writes.into_iter().flatten() {
            if let Some(column) = columns.get_mut(write.column) {
                column.elements.push(write.element);
            }
        }

        let columns = trim_edges(aggregate_columns(columns, &request.settings));

        let graph = WordGraph {
            build_id,
            query: request.query,
            columns,
            settings: request.settings,
        };

        let mut committed = match self.committed.lock() {
            Ok(committed) => committed,
            Err(poisoned) => poisoned.into_inner(),
        };
        // Checked again under the lock so a newer build that already committed
        // can't be overwritten by an older one.
        if !self.is_latest(build_id) {
            return Ok(BuildOutcome::Superseded {
                build_id,
                latest: self.latest_build(),
            });
        }
        *committed = Some(graph.clone());
        trace!(build_id, "committed");
        Ok(BuildOutcome::Committed(graph))
    }
}
