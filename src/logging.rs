use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use serde_json::{json, Map, Value};
use tokio::{
    sync::oneshot::{self, Receiver, Sender},
    task::JoinHandle,
};
use tracing::{info, info_span, span::EnteredSpan};
use tracing_forest::{processor::from_fn, traits::*, tree::Tree, worker_task};
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter, Layer, Registry};
use uuid::Uuid;

use crate::abstract_server::{ErrorDetails, ErrorLayer, Result, ServerError};

#[allow(dead_code)]
struct LogGlobal {
    handle: JoinHandle<()>,
}

lazy_static! {
    static ref SPAN_MAP: Mutex<HashMap<Uuid, Sender<Tree>>> = Mutex::new(HashMap::new());
    static ref LOG_GLOBAL: Mutex<Option<LogGlobal>> = Mutex::new(None);
}

/// Both maps are only ever inserted into or removed from whole, so a panic
/// elsewhere can't leave them inconsistent.
fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Captures the tree of everything logged under it, including inside spawned
/// tasks as long as they were `.instrument()`ed with a span nested under this
/// one.  `wordgraph-tool --explain` uses this to print what a build did.
///
/// `init_logging()` must have been called first so that tracing-forest is the
/// installed subscriber.
pub struct LoggedSpan {
    span: EnteredSpan,
    rx: Receiver<Tree>,
}

pub fn render_forest_to_value(tree: &Tree) -> Value {
    match tree {
        Tree::Span(span) => {
            json!({
                "name": span.name(),
                "nodes": span.nodes().iter().map(render_forest_to_value).collect::<Vec<Value>>(),
            })
        }
        Tree::Event(event) => {
            let mut obj = Map::new();
            if let Some(msg) = event.message() {
                obj.insert("message".to_string(), json!(msg));
            }
            for field in event.fields() {
                obj.insert(field.key().to_string(), json!(field.value()));
            }
            json!(obj)
        }
    }
}

impl LoggedSpan {
    pub fn new_logged_span(name: &str) -> LoggedSpan {
        let id = Uuid::new_v4();

        let span = info_span!(parent: None, "logged_span", name, uuid = %id).entered();
        info!("logged_span_start");
        let (tx, rx) = oneshot::channel();

        lock_or_recover(&SPAN_MAP).insert(id, tx);

        LoggedSpan { span, rx }
    }

    pub async fn retrieve(self) -> Result<Tree> {
        info!("logged_span_end");
        drop(self.span);
        self.rx.await.map_err(|err| {
            ServerError::StickyProblem(ErrorDetails {
                layer: ErrorLayer::RuntimeInvariantViolation,
                message: format!("logged span tree never arrived: {}", err),
            })
        })
    }

    pub async fn retrieve_serde_json(self) -> Result<Value> {
        let tree = self.retrieve().await?;
        Ok(render_forest_to_value(&tree))
    }
}

/// Initialize logging.  The `LoggedSpan` mechanism always sees everything at
/// `wordgraph=trace`; setting `RUST_LOG` to a non-empty value additionally
/// turns on compact fmt logging filtered by it.
///
/// Must be called from inside a tokio runtime.  Calling it again is a no-op.
pub fn init_logging() {
    if lock_or_recover(&LOG_GLOBAL).is_some() {
        return;
    }

    let mut layers = Vec::new();
    // An empty RUST_LOG means "no logging", not "default filter".
    if let Ok(rustlog) = std::env::var("RUST_LOG") {
        if !rustlog.is_empty() {
            if let Ok(env_filter) = EnvFilter::try_from_default_env() {
                let layer = tracing_subscriber::fmt::layer()
                    .with_span_events(FmtSpan::ENTER | FmtSpan::EXIT)
                    .compact()
                    .with_ansi(false)
                    .without_time()
                    .with_writer(std::io::stderr)
                    .with_filter(env_filter)
                    .boxed();
                layers.push(layer);
            }
        }
    }

    let handle = tokio::spawn(
        worker_task()
            .set_global(true)
            .map_receiver(|_| {
                // Route each finished tree that some `LoggedSpan` is waiting
                // for back to it by uuid; drop the rest.
                from_fn(|tree| {
                    if let Tree::Span(span) = &tree {
                        let id = span.uuid();
                        if let Some(tx) = lock_or_recover(&SPAN_MAP).remove(&id) {
                            // The receiver may have given up; that's fine.
                            let _ = tx.send(tree);
                        }
                    }
                    Ok(())
                })
            })
            .build_with(|layer| {
                layers.push(layer.boxed());
                Registry::default()
                    .with(layers)
                    .with(EnvFilter::new("wordgraph=trace"))
            })
            .on(async {
                if let Err(err) = tokio::signal::ctrl_c().await {
                    eprintln!("Unable to listen for Ctrl-C: {}", err);
                }
            }),
    );

    *lock_or_recover(&LOG_GLOBAL) = Some(LogGlobal { handle });
}
