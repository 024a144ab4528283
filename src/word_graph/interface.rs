use clap::ValueEnum;
use serde::{Deserialize, Serialize};

pub use crate::abstract_server::{Phrase, PhraseWord, WordTag};

/// Text of the placeholder element standing in for a wildcard that matched
/// zero words (and for padding in split columns).  Keeping it as a real
/// element lets the renderer draw an unbroken arrow through the empty slot.
pub const BLANK: &str = " ";

pub fn is_blank(text: &str) -> bool {
    text == BLANK
}

/// A reference from a graph node back to a phrase that passes through it.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct GraphPhraseRef {
    pub text: String,
    pub frequency: u64,
    /// Pinned by the user; survives query changes.
    pub selected: bool,
}

impl GraphPhraseRef {
    fn key(&self) -> (&str, u64) {
        (self.text.as_str(), self.frequency)
    }

    /// Phrases are identified by their text and frequency.
    pub fn same_phrase(&self, other: &GraphPhraseRef) -> bool {
        self.key() == other.key()
    }
}

/// One node of the graph.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Element {
    pub text: String,
    pub frequency: u64,
    /// Distinct texts of the elements this one follows in the column to its
    /// left.  `None` in the first column.
    pub previous: Option<Vec<String>>,
    pub phrases: Vec<GraphPhraseRef>,
}

impl Element {
    pub fn is_blank(&self) -> bool {
        is_blank(&self.text)
    }

    pub fn follows(&self, text: &str) -> bool {
        match &self.previous {
            Some(previous) => previous.iter().any(|p| p == text),
            None => false,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub elements: Vec<Element>,
}

impl Column {
    pub fn new(name: &str) -> Self {
        Column {
            name: name.to_string(),
            elements: vec![],
        }
    }

    pub fn contains(&self, text: &str) -> bool {
        self.elements.iter().any(|e| e.text == text)
    }
}

/// One element destined for one column, produced while aligning a single
/// phrase.  Alignment never touches the column array directly; all writes are
/// merged afterwards in phrase order.
#[derive(Clone, Debug, PartialEq)]
pub struct AlignedWrite {
    pub column: usize,
    pub element: Element,
}

/// Which end of a split column shorter entries line up with.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SplitAlignment {
    /// Words start at the first sub-column; padding goes at the back.
    Leading,
    /// Words end at the last sub-column; padding goes at the front.
    Trailing,
}

/// Everything other than the query and phrases that a build depends on.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct GraphSettings {
    /// Row cap per column.
    pub max_rows: usize,
    /// Lower end of the frequency window, as a ratio of a column's largest
    /// element frequency before the curve is applied.
    pub min_frequency_ratio: f64,
    pub max_frequency_ratio: f64,
    /// Exponent of the power curve applied to both ratios.
    pub frequency_curve_exponent: f64,
    /// Split multi-word columns into one column per word.
    pub split: Option<SplitAlignment>,
}

impl Default for GraphSettings {
    fn default() -> Self {
        GraphSettings {
            max_rows: 20,
            min_frequency_ratio: 0.0,
            max_frequency_ratio: 1.0,
            frequency_curve_exponent: 3.0,
            split: None,
        }
    }
}

impl GraphSettings {
    /// The inclusive `[min, max]` frequency window for a column whose largest
    /// raw element has `column_max` frequency.
    pub fn frequency_window(&self, column_max: u64) -> (f64, f64) {
        let curve = |ratio: f64| ratio.max(0.0).min(1.0).powf(self.frequency_curve_exponent);
        let column_max = column_max as f64;
        (
            column_max * curve(self.min_frequency_ratio),
            column_max * curve(self.max_frequency_ratio),
        )
    }
}

#[derive(Clone, Debug, Default)]
pub struct BuildRequest {
    pub query: String,
    pub corpus: String,
    /// The backend's ranked answer for `query`.
    pub phrases: Vec<Phrase>,
    /// Phrases the user kept from earlier queries; each is aligned against its
    /// own `query`.
    pub pinned: Vec<Phrase>,
    pub settings: GraphSettings,
}

/// The finished graph handed to the renderer, along with the settings that
/// produced it.
#[derive(Clone, Debug, Serialize)]
pub struct WordGraph {
    pub build_id: u64,
    pub query: String,
    pub columns: Vec<Column>,
    pub settings: GraphSettings,
}

#[derive(Debug)]
pub enum BuildOutcome {
    Committed(WordGraph),
    /// A newer build was started while this one was running; its result was
    /// dropped on the floor.
    Superseded { build_id: u64, latest: u64 },
}
