pub mod aggregate;
pub mod align;
pub mod builder;
pub mod interface;
pub mod split;
pub mod synonyms;
pub mod trim;

pub use builder::GraphBuilder;
pub use interface::{
    BuildOutcome, BuildRequest, Column, Element, GraphPhraseRef, GraphSettings, SplitAlignment,
    WordGraph, BLANK,
};
pub use synonyms::{Grouping, SynonymCache, SynonymLookup};
