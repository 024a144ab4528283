use crate::query::{Slot, SlotKind};

use super::{
    interface::{AlignedWrite, Element, GraphPhraseRef, Phrase, WordTag, BLANK},
    synonyms::{resolve_synonym_run, SynonymLookup},
};

/// Accumulates one phrase's writes, remembering what the phrase last wrote
/// and where so that each new element can point back at it.
struct PhraseWriter {
    phrase_ref: GraphPhraseRef,
    last_write: Option<(usize, String)>,
    writes: Vec<AlignedWrite>,
}

impl PhraseWriter {
    fn new(phrase_ref: GraphPhraseRef) -> Self {
        PhraseWriter {
            phrase_ref,
            last_write: None,
            writes: vec![],
        }
    }

    /// An element only follows what the phrase wrote into the column directly
    /// to its left; after skipped columns it follows nothing.
    fn write(&mut self, column: usize, text: String) {
        let previous = if column == 0 {
            None
        } else {
            Some(
                self.last_write
                    .iter()
                    .filter(|(last_column, _)| last_column + 1 == column)
                    .map(|(_, last_text)| last_text.clone())
                    .collect(),
            )
        };
        self.last_write = Some((column, text.clone()));
        self.writes.push(AlignedWrite {
            column,
            element: Element {
                text,
                frequency: self.phrase_ref.frequency,
                previous,
                phrases: vec![self.phrase_ref.clone()],
            },
        });
    }
}

fn run_length(phrase: &Phrase, cursor: usize, tag: WordTag) -> usize {
    phrase.words[cursor..]
        .iter()
        .take_while(|w| w.tag == tag)
        .count()
}

fn word_texts(phrase: &Phrase, start: usize, len: usize) -> Vec<String> {
    phrase.words[start..start + len]
        .iter()
        .map(|w| w.text.clone())
        .collect()
}

/// Walk `slots` and the phrase's words in lock-step and work out which words
/// land in which column.
///
/// Slot `i` writes into column `i`.  A phrase that runs out of words simply
/// stops contributing, and words left over once the slots are exhausted are
/// ignored.
pub async fn align_phrase(
    phrase: &Phrase,
    selected: bool,
    slots: &[Slot],
    lookup: &(dyn SynonymLookup + Send + Sync),
) -> Vec<AlignedWrite> {
    let mut writer = PhraseWriter::new(GraphPhraseRef {
        text: phrase.text(),
        frequency: phrase.frequency,
        selected,
    });

    let mut cursor = 0;
    let mut slot_ix = 0;
    while slot_ix < slots.len() {
        let slot = &slots[slot_ix];
        match slot.kind {
            SlotKind::Fixed(n) => {
                if cursor + n > phrase.words.len() {
                    break;
                }
                writer.write(slot_ix, word_texts(phrase, cursor, n).join(" "));
                cursor += n;
                slot_ix += 1;
            }
            SlotKind::Wildcard { .. } => {
                let tag = match slot.kind.wildcard_tag() {
                    Some(tag) => tag,
                    None => break,
                };
                let len = run_length(phrase, cursor, tag);
                if len == 0 {
                    writer.write(slot_ix, BLANK.to_string());
                } else {
                    writer.write(slot_ix, word_texts(phrase, cursor, len).join(" "));
                }
                cursor += len;
                slot_ix += 1;
            }
            SlotKind::Synonym => {
                let run_slots = slots[slot_ix..]
                    .iter()
                    .take_while(|s| s.kind == SlotKind::Synonym)
                    .count();
                let titles: Vec<String> = slots[slot_ix..slot_ix + run_slots]
                    .iter()
                    .map(|s| s.title.clone())
                    .collect();
                let len = run_length(phrase, cursor, WordTag::WordInDictset);
                let words = word_texts(phrase, cursor, len);

                let grouping = resolve_synonym_run(lookup, &titles, &words).await;
                trace!(phrase = %writer.phrase_ref.text, ?titles, ?grouping);
                for (i, group) in grouping.groups().iter().enumerate() {
                    writer.write(slot_ix + i, group.clone());
                }

                cursor += len;
                slot_ix += run_slots;
            }
        }
    }

    writer.writes
}
