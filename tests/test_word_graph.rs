use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Notify;
use wordgraph::{
    abstract_server::{
        AbstractServer, ErrorDetails, ErrorLayer, LocalIndex, Phrase, PhraseWord, Result,
        SearchResults, ServerError, WordTag,
    },
    word_graph::{BuildOutcome, BuildRequest, GraphBuilder, GraphSettings, WordGraph, BLANK},
};

/// Phrase lists the search backend would return, keyed by query.  Word tags
/// follow the backend's conventions: `?` matches are `WORD_FOR_QMARK`, `...`
/// matches are `WORD_FOR_STAR`, `#word` matches are `WORD_IN_DICTSET`.
const FIXTURE: &str = r##"{
    "waiting ? response": [
        { "words": [
            { "text": "waiting" },
            { "text": "for", "tag": "WORD_FOR_QMARK" },
            { "text": "a", "tag": "WORD_FOR_QMARK" },
            { "text": "response" }
          ], "frequency": 120 },
        { "words": [
            { "text": "waiting" },
            { "text": "on", "tag": "WORD_FOR_QMARK" },
            { "text": "response" }
          ], "frequency": 80 }
    ],
    "waiting ? response soon": [
        { "words": [
            { "text": "waiting" },
            { "text": "on", "tag": "WORD_FOR_QMARK" },
            { "text": "a", "tag": "WORD_FOR_QMARK" },
            { "text": "response" },
            { "text": "soon" }
          ], "frequency": 10 }
    ],
    "a ... b": [
        { "words": [{ "text": "a" }, { "text": "b" }], "frequency": 7 }
    ],
    "the #big #house": [
        { "words": [
            { "text": "the" },
            { "text": "very", "tag": "WORD_IN_DICTSET" },
            { "text": "large", "tag": "WORD_IN_DICTSET" },
            { "text": "home", "tag": "WORD_IN_DICTSET" }
          ], "frequency": 3 },
        { "words": [
            { "text": "the" },
            { "text": "very", "tag": "WORD_IN_DICTSET" },
            { "text": "large", "tag": "WORD_IN_DICTSET" },
            { "text": "house", "tag": "WORD_IN_DICTSET" }
          ], "frequency": 2 }
    ],
    "#big": [
        { "words": [{ "text": "large", "tag": "WORD_IN_DICTSET" }], "frequency": 90 },
        { "words": [
            { "text": "very", "tag": "WORD_IN_DICTSET" },
            { "text": "large", "tag": "WORD_IN_DICTSET" }
          ], "frequency": 40 }
    ]
}"##;

fn fixture_index() -> LocalIndex {
    LocalIndex::from_json_str(FIXTURE).unwrap()
}

async fn request_for(index: &LocalIndex, query: &str) -> BuildRequest {
    let results = index.search(query, "web-en", 100).await.unwrap();
    BuildRequest {
        query: query.to_string(),
        corpus: "web-en".to_string(),
        phrases: results.phrases,
        ..BuildRequest::default()
    }
}

fn committed(outcome: BuildOutcome) -> WordGraph {
    match outcome {
        BuildOutcome::Committed(graph) => graph,
        other => panic!("expected a committed graph, got {:?}", other),
    }
}

fn texts(graph: &WordGraph, column: usize) -> Vec<&str> {
    graph.columns[column]
        .elements
        .iter()
        .map(|e| e.text.as_str())
        .collect()
}

#[tokio::test]
async fn test_wildcard_column_merges_predecessors() {
    let index = fixture_index();
    let builder = GraphBuilder::new(index.clonify());
    let request = request_for(&index, "waiting ? response").await;

    let graph = committed(builder.build(request).await.unwrap());
    insta::assert_json_snapshot!("waiting_response", &graph.columns);
}

#[tokio::test]
async fn test_empty_wildcard_between_words_keeps_blank() {
    let index = fixture_index();
    let builder = GraphBuilder::new(index.clonify());
    let request = request_for(&index, "a ... b").await;

    let graph = committed(builder.build(request).await.unwrap());
    assert_eq!(texts(&graph, 1), vec![BLANK]);
    insta::assert_json_snapshot!("empty_wildcard", &graph.columns);
}

#[tokio::test]
async fn test_pinned_phrase_widens_the_graph() {
    let index = fixture_index();
    let builder = GraphBuilder::new(index.clonify());
    let mut request = request_for(&index, "waiting ? response").await;
    request.pinned = index
        .search("waiting ? response soon", "web-en", 100)
        .await
        .unwrap()
        .phrases
        .into_iter()
        .map(|mut p| {
            p.query = "waiting ? response soon".to_string();
            p
        })
        .collect();

    let graph = committed(builder.build(request).await.unwrap());
    insta::assert_json_snapshot!("pinned_phrase", &graph.columns);
}

#[tokio::test]
async fn test_synonym_lookups_are_shared_across_phrases() {
    let index = fixture_index();
    let builder = GraphBuilder::new(index.clonify());
    let request = request_for(&index, "the #big #house").await;

    let graph = committed(builder.build(request).await.unwrap());
    assert_eq!(texts(&graph, 0), vec!["the"]);
    assert_eq!(texts(&graph, 1), vec!["very large"]);
    assert_eq!(texts(&graph, 2), vec!["home", "house"]);
    assert_eq!(graph.columns[1].elements[0].frequency, 5);

    // Both phrases needed "#big" resolved; the last slot never needs a lookup.
    assert_eq!(index.search_count("#big"), 1);
    assert_eq!(index.search_count("#house"), 0);
}

#[tokio::test]
async fn test_split_columns_from_build() {
    let index = fixture_index();
    let builder = GraphBuilder::new(index.clonify());
    let mut request = request_for(&index, "waiting ? response").await;
    request.settings = GraphSettings {
        split: Some(wordgraph::word_graph::SplitAlignment::Leading),
        ..GraphSettings::default()
    };

    let graph = committed(builder.build(request).await.unwrap());
    let names: Vec<&str> = graph.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["waiting", "?", "?", "response"]);
    assert_eq!(texts(&graph, 1), vec!["for", "on"]);
    assert_eq!(texts(&graph, 2), vec!["a", BLANK]);
    assert_eq!(
        graph.columns[3].elements[0].previous,
        Some(vec!["a".to_string(), BLANK.to_string()])
    );
}

#[tokio::test]
async fn test_empty_inputs() {
    let index = fixture_index();
    let builder = GraphBuilder::new(index.clonify());

    let graph = committed(builder.build(BuildRequest::default()).await.unwrap());
    assert!(graph.columns.is_empty());

    let graph = committed(
        builder
            .build(BuildRequest {
                query: "nothing matches this".to_string(),
                ..BuildRequest::default()
            })
            .await
            .unwrap(),
    );
    let names: Vec<&str> = graph.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["nothing", "matches", "this"]);
    assert!(graph.columns.iter().all(|c| c.elements.is_empty()));
}

/// Answers like the wrapped index, except that searches for `#slow` wait
/// until the test lets them through.
#[derive(Clone)]
struct GatedServer {
    index: LocalIndex,
    gate: Arc<Notify>,
}

#[async_trait]
impl AbstractServer for GatedServer {
    fn clonify(&self) -> Box<dyn AbstractServer + Send + Sync> {
        Box::new(self.clone())
    }

    async fn search(&self, query: &str, corpus: &str, topk: usize) -> Result<SearchResults> {
        if query == "#slow" {
            self.gate.notified().await;
        }
        self.index.search(query, corpus, topk).await
    }
}

#[tokio::test]
async fn test_superseded_build_does_not_commit() {
    let index = fixture_index();
    let gate = Arc::new(Notify::new());
    let builder = Arc::new(GraphBuilder::new(Box::new(GatedServer {
        index: index.clone(),
        gate: gate.clone(),
    })));

    // Three synonym words over two synonym slots: resolving them means looking
    // up "#slow", which blocks.
    let slow_request = BuildRequest {
        query: "#slow #gate".to_string(),
        phrases: index
            .search("the #big #house", "", 100)
            .await
            .unwrap()
            .phrases
            .into_iter()
            .map(|mut p| {
                p.words.remove(0);
                p
            })
            .collect(),
        ..BuildRequest::default()
    };
    let slow_builder = builder.clone();
    let slow = tokio::spawn(async move { slow_builder.build(slow_request).await });

    // Wait until the slow build has its id before starting the fast one.
    while builder.latest_build() == 0 {
        tokio::task::yield_now().await;
    }

    let fast_request = request_for(&index, "waiting ? response").await;
    let fast = committed(builder.build(fast_request).await.unwrap());
    assert_eq!(fast.build_id, 2);

    gate.notify_one();
    match slow.await.unwrap().unwrap() {
        BuildOutcome::Superseded { build_id, latest } => {
            assert_eq!(build_id, 1);
            assert_eq!(latest, 2);
        }
        other => panic!("expected the slow build to be superseded, got {:?}", other),
    }

    let kept = builder.committed().unwrap();
    assert_eq!(kept.build_id, 2);
    assert_eq!(kept.query, "waiting ? response");
}

/// A backend that is down: every search fails.
#[derive(Clone)]
struct UnavailableServer;

#[async_trait]
impl AbstractServer for UnavailableServer {
    fn clonify(&self) -> Box<dyn AbstractServer + Send + Sync> {
        Box::new(self.clone())
    }

    async fn search(&self, _query: &str, _corpus: &str, _topk: usize) -> Result<SearchResults> {
        Err(ServerError::TransientProblem(ErrorDetails {
            layer: ErrorLayer::ServerLayer,
            message: "Server status of 503 Service Unavailable".to_string(),
        }))
    }
}

#[tokio::test]
async fn test_failed_synonym_lookup_still_commits() {
    let builder = GraphBuilder::new(Box::new(UnavailableServer));
    let phrase = Phrase {
        words: ["very", "large", "home"]
            .iter()
            .map(|w| PhraseWord {
                text: w.to_string(),
                tag: WordTag::WordInDictset,
            })
            .collect(),
        frequency: 3,
        query: "#x #y".to_string(),
        corpus: String::new(),
    };

    let graph = committed(
        builder
            .build(BuildRequest {
                query: "#x #y".to_string(),
                phrases: vec![phrase],
                ..BuildRequest::default()
            })
            .await
            .unwrap(),
    );
    let names: Vec<&str> = graph.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["#x", "#y"]);
    assert!(graph.columns.iter().all(|c| c.elements.is_empty()));
}
