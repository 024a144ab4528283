use regex::Regex;
use serde::Serialize;

use crate::abstract_server::WordTag;

/*
  Queries are cut into slots, one per column of the eventual word graph:

  1. Bracketed groups (`[ ... ]` and `{ ... }`) are lifted out first.  The
     backend matches them as one unit whose word count is the number of tokens
     inside, so they become a single `Fixed(n)` slot and are not tokenized any
     further.  Brackets that don't close are left in the text and end up as
     ordinary words below; the backend is the authority on whether the query
     is actually valid, we just want to draw something.
  2. Everything else is split on whitespace and each token is classified:
     - `?` is a single-word wildcard, `*` and `...` are multi-word wildcards.
       Both are `Wildcard` slots whose width depends on the phrase.
     - `#word` is a synonym slot.
     - Anything else is a plain word, `Fixed(1)`.
  3. Runs of adjacent multi-word wildcards collapse into the first one, since
     `a ... ... b` can't match anything `a ... b` doesn't and would otherwise
     give us a column that is always empty.
*/

/// Prefix marking a synonym token.
pub const SYNONYM_PREFIX: char = '#';

lazy_static! {
    static ref BRACKET_SPAN: Regex = Regex::new(r"\[[^\[\]{}]*\]|\{[^\[\]{}]*\}").unwrap();
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum SlotKind {
    /// Exactly this many words.
    Fixed(usize),
    /// A run of zero or more words tagged for the wildcard.  `multi_word`
    /// distinguishes `*`/`...` from `?` which the backend tags differently.
    Wildcard { multi_word: bool },
    /// A single synonym-expanded word, although a run of consecutive synonym
    /// slots may regroup a longer run of synonym words between them.
    Synonym,
}

impl SlotKind {
    /// The numeric encoding the word graph UI has always used: `n` for fixed
    /// slots, `0` for wildcards and `-1` for synonyms.
    pub fn expected_length(&self) -> i64 {
        match self {
            SlotKind::Fixed(n) => *n as i64,
            SlotKind::Wildcard { .. } => 0,
            SlotKind::Synonym => -1,
        }
    }

    /// The tag the backend puts on words it matched against this wildcard.
    pub fn wildcard_tag(&self) -> Option<WordTag> {
        match self {
            SlotKind::Wildcard { multi_word: false } => Some(WordTag::WordForQmark),
            SlotKind::Wildcard { multi_word: true } => Some(WordTag::WordForStar),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Slot {
    pub title: String,
    pub kind: SlotKind,
}

impl Slot {
    fn from_token(token: &str) -> Slot {
        let kind = match token {
            "?" => SlotKind::Wildcard { multi_word: false },
            "*" | "..." => SlotKind::Wildcard { multi_word: true },
            _ if token.len() > 1 && token.starts_with(SYNONYM_PREFIX) => SlotKind::Synonym,
            _ => SlotKind::Fixed(1),
        };
        Slot {
            title: token.to_string(),
            kind,
        }
    }

    fn is_multi_word_wildcard(&self) -> bool {
        self.kind == SlotKind::Wildcard { multi_word: true }
    }
}

/// Count the words inside a bracketed span, ignoring any bracket punctuation
/// that sits apart from them.
fn bracket_span_length(span: &str) -> usize {
    let inner = &span[1..span.len() - 1];
    inner
        .split_whitespace()
        .filter(|tok| !tok.chars().all(|c| matches!(c, '[' | ']' | '{' | '}')))
        .count()
}

fn push_slot(slots: &mut Vec<Slot>, slot: Slot) {
    if slot.is_multi_word_wildcard() {
        if let Some(last) = slots.last() {
            if last.is_multi_word_wildcard() {
                return;
            }
        }
    }
    slots.push(slot);
}

fn push_tokens(slots: &mut Vec<Slot>, text: &str) {
    for token in text.split_whitespace() {
        push_slot(slots, Slot::from_token(token));
    }
}

/// Parse a raw query into its ordered slots.  Never fails; an empty query
/// yields no slots.
pub fn segment_query(query: &str) -> Vec<Slot> {
    let mut slots = vec![];
    let mut consumed = 0;

    for span in BRACKET_SPAN.find_iter(query) {
        push_tokens(&mut slots, &query[consumed..span.start()]);
        consumed = span.end();

        let length = bracket_span_length(span.as_str());
        // An empty group can't match a word; leave it to the backend to
        // complain about.
        if length == 0 {
            continue;
        }
        push_slot(
            &mut slots,
            Slot {
                title: span.as_str().trim().to_string(),
                kind: SlotKind::Fixed(length),
            },
        );
    }
    push_tokens(&mut slots, &query[consumed..]);

    trace!(query, slot_count = slots.len());
    slots
}

/// Re-serialize slots into a query string.
pub fn join_slots(slots: &[Slot]) -> String {
    slots
        .iter()
        .map(|s| s.title.as_str())
        .collect::<Vec<&str>>()
        .join(" ")
}
