use std::fs::read_to_string;

use serde::Deserialize;

use crate::abstract_server::{ErrorDetails, ErrorLayer, Result, ServerError};
use crate::word_graph::GraphSettings;

impl From<toml::de::Error> for ServerError {
    fn from(err: toml::de::Error) -> ServerError {
        ServerError::StickyProblem(ErrorDetails {
            layer: ErrorLayer::BadInput,
            message: err.to_string(),
        })
    }
}

/// Settings for `wordgraph-tool`, from an optional TOML file like:
///
/// ```toml
/// server = "https://phrases.example.org/"
/// corpus = "web-en"
/// topk = 200
///
/// [graph]
/// max-rows = 10
/// frequency-curve-exponent = 2.0
/// split = "leading"
/// ```
///
/// Anything left out keeps its default, and command-line flags win over
/// whatever the file says.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct ToolConfig {
    /// Base URL of a search server, or the path to a local fixture file.
    pub server: Option<String>,
    pub corpus: String,
    /// How many phrases to ask the backend for.
    pub topk: usize,
    pub graph: GraphSettings,
}

impl Default for ToolConfig {
    fn default() -> Self {
        ToolConfig {
            server: None,
            corpus: "web-en".to_string(),
            topk: 100,
            graph: GraphSettings::default(),
        }
    }
}

pub fn parse(config_str: &str) -> Result<ToolConfig> {
    Ok(toml::from_str(config_str)?)
}

/// Load the config at `config_path`, or the defaults when there isn't one.
pub fn load(config_path: Option<&str>) -> Result<ToolConfig> {
    match config_path {
        Some(path) => {
            let config_str = read_to_string(path)?;
            let config = parse(&config_str)?;
            trace!(path, ?config, "loaded config");
            Ok(config)
        }
        None => Ok(ToolConfig::default()),
    }
}
