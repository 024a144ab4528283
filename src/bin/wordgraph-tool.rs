use std::process::exit;

use clap::{Parser, ValueEnum};
use serde_json::{json, to_string, to_string_pretty, Value};
use tracing::{trace, trace_span, warn, Instrument};
use wordgraph::{
    abstract_server::{
        make_server, AbstractServer, ErrorDetails, ErrorLayer, Phrase, Result, ServerError,
    },
    config::{self, ToolConfig},
    logging::{init_logging, LoggedSpan},
    word_graph::{BuildOutcome, BuildRequest, GraphBuilder, GraphSettings, SplitAlignment},
};

#[derive(Clone, Copy, Debug, PartialEq, ValueEnum)]
enum OutputFormat {
    /// Pretty-printed JSON.
    Pretty,
    /// Un-pretty-printed JSON.
    Concise,
}

/// Build the word graph for a phrase query and print it as JSON.
#[derive(Debug, Parser)]
#[command(name = "wordgraph-tool", version, about)]
struct WordGraphCli {
    /// The query, e.g. "waiting ? response" or "the #big house".
    #[arg(value_parser)]
    query: String,

    /// URL of the search server, or the path to a JSON fixture file mapping
    /// queries to phrase lists.
    #[arg(long, env = "WORDGRAPH_SERVER")]
    server: Option<String>,

    /// Corpus to search.
    #[arg(long, env = "WORDGRAPH_CORPUS")]
    corpus: Option<String>,

    /// How many phrases to fetch for the query.
    #[arg(long)]
    topk: Option<usize>,

    /// TOML config file; flags given here override it.
    #[arg(long)]
    config: Option<String>,

    #[arg(long)]
    max_rows: Option<usize>,

    #[arg(long)]
    min_ratio: Option<f64>,

    #[arg(long)]
    max_ratio: Option<f64>,

    /// Exponent applied to both frequency ratios.
    #[arg(long)]
    curve: Option<f64>,

    /// Split multi-word columns into one column per word.
    #[arg(long, value_enum)]
    split: Option<SplitAlignment>,

    /// A phrase to keep in the graph, as "<query>|<phrase text>".  May be
    /// repeated.
    #[arg(long = "pin")]
    pins: Vec<String>,

    #[arg(long, short, value_enum, ignore_case = true, default_value = "concise")]
    output_format: OutputFormat,

    /// Include the captured trace of the build in the output.
    #[arg(long)]
    explain: bool,
}

fn bad_input(message: String) -> ServerError {
    ServerError::StickyProblem(ErrorDetails {
        layer: ErrorLayer::BadInput,
        message,
    })
}

/// Layer the command line over the config file.
fn effective_settings(cli: &WordGraphCli, config: &ToolConfig) -> GraphSettings {
    let mut settings = config.graph.clone();
    if let Some(max_rows) = cli.max_rows {
        settings.max_rows = max_rows;
    }
    if let Some(min_ratio) = cli.min_ratio {
        settings.min_frequency_ratio = min_ratio;
    }
    if let Some(max_ratio) = cli.max_ratio {
        settings.max_frequency_ratio = max_ratio;
    }
    if let Some(curve) = cli.curve {
        settings.frequency_curve_exponent = curve;
    }
    if cli.split.is_some() {
        settings.split = cli.split;
    }
    settings
}

/// Find each pinned phrase by searching its query for the exact text.  Pins
/// that don't turn up are skipped.
async fn resolve_pins(
    server: &(dyn AbstractServer + Send + Sync),
    pins: &[String],
    corpus: &str,
    topk: usize,
) -> Result<Vec<Phrase>> {
    let mut pinned = vec![];
    for pin in pins {
        let (query, text) = match pin.split_once('|') {
            Some((query, text)) => (query.trim(), text.trim()),
            None => return Err(bad_input(format!("pin {:?} is not \"<query>|<phrase>\"", pin))),
        };
        let results = server.search(query, corpus, topk).await?;
        match results.phrases.into_iter().find(|p| p.text() == text) {
            Some(mut phrase) => {
                if phrase.query.is_empty() {
                    phrase.query = query.to_string();
                }
                pinned.push(phrase);
            }
            None => {
                warn!(query, text, "pinned phrase not found; skipping");
            }
        }
    }
    Ok(pinned)
}

async fn run(cli: WordGraphCli) -> Result<Value> {
    let config = config::load(cli.config.as_deref())?;
    let server_name = match cli.server.clone().or_else(|| config.server.clone()) {
        Some(server) => server,
        None => return Err(bad_input("no --server given and none configured".to_string())),
    };
    let corpus = cli.corpus.clone().unwrap_or_else(|| config.corpus.clone());
    let topk = cli.topk.unwrap_or(config.topk);
    let settings = effective_settings(&cli, &config);

    let server = make_server(&server_name)?;
    let results = server.search(&cli.query, &corpus, topk).await?;
    let pinned = resolve_pins(server.as_ref(), &cli.pins, &corpus, topk).await?;
    trace!(phrase_count = results.phrases.len(), pinned_count = pinned.len());

    let builder = GraphBuilder::new(server);
    let outcome = builder
        .build(BuildRequest {
            query: cli.query.clone(),
            corpus,
            phrases: results.phrases,
            pinned,
            settings,
        })
        .await?;

    match outcome {
        BuildOutcome::Committed(graph) => Ok(serde_json::to_value(graph)?),
        BuildOutcome::Superseded { build_id, latest } => Err(ServerError::StickyProblem(
            ErrorDetails {
                layer: ErrorLayer::RuntimeInvariantViolation,
                message: format!("build {} superseded by {} with nothing else running", build_id, latest),
            },
        )),
    }
}

#[tokio::main]
async fn main() {
    let cli = WordGraphCli::parse();
    init_logging();

    let output_format = cli.output_format;
    let result = if cli.explain {
        let logged_span = LoggedSpan::new_logged_span("wordgraph-tool");
        let span = trace_span!("wordgraph_tool", query = %cli.query);
        let result = run(cli).instrument(span).await;
        match (result, logged_span.retrieve_serde_json().await) {
            (Ok(graph), Ok(explain)) => Ok(json!({ "graph": graph, "explain": explain })),
            (Err(err), _) | (_, Err(err)) => Err(err),
        }
    } else {
        run(cli).await
    };

    match result {
        Ok(value) => {
            let printed = match output_format {
                OutputFormat::Pretty => to_string_pretty(&value),
                OutputFormat::Concise => to_string(&value),
            };
            match printed {
                Ok(text) => println!("{}", text),
                Err(err) => {
                    eprintln!("Unable to print the graph: {}", err);
                    exit(1);
                }
            }
        }
        Err(err) => {
            eprintln!("Word graph error!");
            eprintln!("{:?}", err);
            exit(1);
        }
    }
}
