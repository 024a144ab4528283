use super::interface::{AlignedWrite, Element, SplitAlignment, BLANK};

/// Spread `text` over `width` single-word cells, padding with blanks on the
/// side given by `alignment`.  A blank element has no words and so becomes
/// all padding.
fn pad_words(text: &str, width: usize, alignment: SplitAlignment) -> Vec<String> {
    let words: Vec<String> = text.split_whitespace().map(|w| w.to_string()).collect();
    let padding = vec![BLANK.to_string(); width.saturating_sub(words.len())];
    match alignment {
        SplitAlignment::Leading => words.into_iter().chain(padding).collect(),
        SplitAlignment::Trailing => padding.into_iter().chain(words).collect(),
    }
}

/// Re-express every multi-word column as one sub-column per word.
///
/// Works on the per-phrase writes rather than the merged columns so that each
/// phrase's predecessor chain can be rebuilt: the first sub-word of an element
/// follows whatever the phrase last wrote (which, if the previous column was
/// split too, is that element's last sub-word), and every later sub-word
/// follows the sub-word before it.
///
/// Returns the new column names and the rewritten writes.
pub fn split_columns(
    column_names: &[String],
    phrase_writes: Vec<Vec<AlignedWrite>>,
    alignment: SplitAlignment,
) -> (Vec<String>, Vec<Vec<AlignedWrite>>) {
    let mut widths = vec![1; column_names.len()];
    for write in phrase_writes.iter().flatten() {
        let word_count = write.element.text.split_whitespace().count();
        if let Some(width) = widths.get_mut(write.column) {
            *width = (*width).max(word_count);
        }
    }

    let mut offsets = Vec::with_capacity(widths.len());
    let mut names = vec![];
    for (name, width) in column_names.iter().zip(&widths) {
        offsets.push(names.len());
        names.extend(std::iter::repeat(name.clone()).take(*width));
    }
    trace!(?widths, split_column_count = names.len());

    let split_writes = phrase_writes
        .into_iter()
        .map(|writes| {
            let mut last_write: Option<(usize, String)> = None;
            let mut split = vec![];
            for write in writes {
                let width = widths.get(write.column).copied().unwrap_or(1);
                let first = offsets.get(write.column).copied().unwrap_or(0);
                for (i, word) in pad_words(&write.element.text, width, alignment)
                    .into_iter()
                    .enumerate()
                {
                    let column = first + i;
                    let previous = if column == 0 {
                        None
                    } else {
                        Some(
                            last_write
                                .iter()
                                .filter(|(last_column, _)| last_column + 1 == column)
                                .map(|(_, last_text)| last_text.clone())
                                .collect(),
                        )
                    };
                    last_write = Some((column, word.clone()));
                    split.push(AlignedWrite {
                        column,
                        element: Element {
                            text: word,
                            frequency: write.element.frequency,
                            previous,
                            phrases: write.element.phrases.clone(),
                        },
                    });
                }
            }
            split
        })
        .collect();

    (names, split_writes)
}
