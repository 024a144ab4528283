use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub type Result<T> = std::result::Result<T, ServerError>;

// JSON parse errors are sticky data problems.
impl From<serde_json::Error> for ServerError {
    fn from(err: serde_json::Error) -> ServerError {
        ServerError::StickyProblem(ErrorDetails {
            layer: ErrorLayer::DataLayer,
            message: err.to_string(),
        })
    }
}

/// A phrase task that panicked or was cancelled by the runtime.  This is never
/// something the user did, so we blame ourselves.
impl From<tokio::task::JoinError> for ServerError {
    fn from(err: tokio::task::JoinError) -> ServerError {
        ServerError::StickyProblem(ErrorDetails {
            layer: ErrorLayer::RuntimeInvariantViolation,
            message: err.to_string(),
        })
    }
}

/// Express whether the error seems to be happening in the server or the data.
#[derive(Debug, Eq, PartialEq)]
pub enum ErrorLayer {
    /// The request itself has structural issues like a malformed URL or a
    /// config file that doesn't parse.  This should not be used for cases
    /// where the user's query results in a search miss; an empty phrase list
    /// is a perfectly good answer that produces an empty graph.
    BadInput,
    /// The error seems to involve server logic, so it may or may not be an issue
    /// with the underlying data.
    ServerLayer,
    /// The error seems to be related to the corpus data in question rather
    /// than the server, like a response that isn't the JSON we expected.
    DataLayer,
    /// Something we believed could not happen did happen.
    RuntimeInvariantViolation,
}

/// ServerError payload to provide details about what went wrong for
/// investigation purposes.
#[derive(Debug)]
pub struct ErrorDetails {
    /// Attempt to distinguish failures due to server bugs from failures due to
    /// bad input.  For example a 500 response from a server would be a
    /// `ServerLayer` problem, but if a 404 was instead returned, that would be
    /// a `DataLayer` problem.
    pub layer: ErrorLayer,
    /// Stringified version of the lower level error.
    pub message: String,
}

/// Does a retry makes sense or not?
///
/// Retries are never attempted below this layer.  The graph builder treats a
/// failed synonym lookup as "no candidates" regardless of the variant, but the
/// distinction is preserved for callers fetching the primary phrase list.
#[derive(Debug)]
pub enum ServerError {
    /// An error that will persist for this corpus.  For example a 404.
    StickyProblem(ErrorDetails),
    /// An error that might go away if retried later.  For example a 504 "Gateway
    /// timeout".
    TransientProblem(ErrorDetails),
}

/// What a search word was matched against in the query.  The backend tags
/// every word of every phrase so that we can tell which query operator
/// produced it.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WordTag {
    /// A literal query word.
    Word,
    /// Filled in for a `?`.
    WordForQmark,
    /// Filled in for a `*` or `...`.
    WordForStar,
    /// One of the synonyms of a `#word`.
    WordInDictset,
    /// Part of a `{ ... }` group.
    WordInOrderset,
    /// Part of a `[ ... ]` group.
    WordInOptionset,
}

impl Default for WordTag {
    fn default() -> Self {
        WordTag::Word
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct PhraseWord {
    pub text: String,
    #[serde(default)]
    pub tag: WordTag,
}

/// One matched phrase as returned by the search backend.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Phrase {
    pub words: Vec<PhraseWord>,
    pub frequency: u64,
    /// The query that produced this phrase.
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub corpus: String,
}

impl Phrase {
    /// The phrase's words joined with single spaces.
    pub fn text(&self) -> String {
        self.words
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<&str>>()
            .join(" ")
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct SearchResults {
    #[serde(default)]
    pub phrases: Vec<Phrase>,
}

/// Unified exposure for talking to a phrase-search backend, either a remote
/// server over HTTP(S) or a local JSON fixture file.
///
/// The graph builder talks to the backend in exactly one way: the synonym
/// resolver issues a sub-query for a `#word` column title and looks at the
/// returned phrases.  The phrase list that drives a build is fetched by the
/// caller (see `wordgraph-tool`) and handed to the builder, so it also goes
/// through this trait but not through the builder.
///
/// ## Runtime Assumptions
///
/// We assume that we are operating in a tokio runtime.  Each phrase of a build
/// is aligned on its own spawned task, which is why `clonify` exists: every
/// task that may issue a lookup needs its own owned handle.
#[async_trait]
pub trait AbstractServer {
    /// Produce an owned handle on the same backend.  Implementations share any
    /// underlying connection pools and bookkeeping with the original.
    fn clonify(&self) -> Box<dyn AbstractServer + Send + Sync>;

    /// Run `query` against `corpus`, returning at most `topk` phrases in the
    /// backend's ranking order.
    async fn search(&self, query: &str, corpus: &str, topk: usize) -> Result<SearchResults>;
}
