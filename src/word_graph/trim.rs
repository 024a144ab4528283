use std::collections::HashSet;

use super::interface::{is_blank, Column, BLANK};

/// Drop every `previous` entry that doesn't name an element in the column
/// immediately to the left.
fn drop_dangling_previous(columns: &mut [Column]) {
    for ix in 1..columns.len() {
        let (left, right) = columns.split_at_mut(ix);
        let left_texts: HashSet<&str> = left[ix - 1]
            .elements
            .iter()
            .map(|e| e.text.as_str())
            .collect();
        for element in right[0].elements.iter_mut() {
            if let Some(previous) = element.previous.as_mut() {
                previous.retain(|p| left_texts.contains(p.as_str()));
            }
        }
    }
}

/// Whether the blank element at `columns[ix].elements[el]` only exists to
/// continue a chain that is already being cut off at the edge of the graph.
fn blank_is_dangling(columns: &[Column], prunable: &[bool], ix: usize, el: usize) -> bool {
    // Nothing to its right depends on a blank.
    let right_free = ix + 1 < columns.len()
        && prunable[ix + 1]
        && !columns[ix + 1]
            .elements
            .iter()
            .filter(|e| !e.is_blank())
            .any(|e| e.follows(BLANK));

    // It doesn't follow anything real on its left.
    let left_free = ix > 0
        && prunable[ix - 1]
        && !columns[ix].elements[el]
            .previous
            .iter()
            .flatten()
            .any(|p| !is_blank(p));

    right_free || left_free
}

/// Remove the blank placeholders that only lead off the edge of the graph.
///
/// The first and last columns start out prunable.  A column becomes prunable
/// when one of its blanks either has a prunable column to its right in which
/// no real element follows a blank, or has a prunable column to its left and
/// follows nothing real itself.  Once no more columns can be marked, the
/// blanks are removed from every prunable column, and links into the removed
/// blanks (or to anything else that is no longer in the column to the left)
/// are dropped.
///
/// Running this on its own output changes nothing.
pub fn trim_edges(mut columns: Vec<Column>) -> Vec<Column> {
    let count = columns.len();
    if count == 0 {
        return columns;
    }

    drop_dangling_previous(&mut columns);

    let mut prunable = vec![false; count];
    prunable[0] = true;
    prunable[count - 1] = true;

    // Each pass either marks a column or ends the loop.
    loop {
        let mut marked = false;
        for ix in 0..count {
            if prunable[ix] {
                continue;
            }
            let has_dangling_blank = (0..columns[ix].elements.len())
                .filter(|&el| columns[ix].elements[el].is_blank())
                .any(|el| blank_is_dangling(&columns, &prunable, ix, el));
            if has_dangling_blank {
                prunable[ix] = true;
                marked = true;
            }
        }
        if !marked {
            break;
        }
    }
    trace!(?prunable);

    for (column, &prune) in columns.iter_mut().zip(prunable.iter()) {
        if prune {
            column.elements.retain(|e| !e.is_blank());
        }
    }

    drop_dangling_previous(&mut columns);
    columns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::word_graph::interface::{Element, GraphPhraseRef};

    fn element(text: &str, previous: Option<&[&str]>) -> Element {
        Element {
            text: text.to_string(),
            frequency: 1,
            previous: previous.map(|p| p.iter().map(|t| t.to_string()).collect()),
            phrases: vec![GraphPhraseRef {
                text: "phrase".to_string(),
                frequency: 1,
                selected: false,
            }],
        }
    }

    fn column(elements: Vec<Element>) -> Column {
        Column {
            name: "c".to_string(),
            elements,
        }
    }

    fn texts(columns: &[Column]) -> Vec<Vec<&str>> {
        columns
            .iter()
            .map(|c| c.elements.iter().map(|e| e.text.as_str()).collect())
            .collect()
    }

    #[test]
    fn test_blank_between_real_words_survives() {
        let columns = vec![
            column(vec![element("a", None)]),
            column(vec![element(BLANK, Some(&["a"]))]),
            column(vec![element("b", Some(&[BLANK]))]),
        ];
        let trimmed = trim_edges(columns.clone());
        assert_eq!(trimmed, columns);
    }

    #[test]
    fn test_leading_and_trailing_blanks_go() {
        // "... a ..." where both wildcards matched nothing.
        let columns = vec![
            column(vec![element(BLANK, None)]),
            column(vec![element("a", Some(&[BLANK]))]),
            column(vec![element(BLANK, Some(&["a"]))]),
        ];
        let trimmed = trim_edges(columns);
        assert_eq!(texts(&trimmed), vec![vec![], vec!["a"], vec![]]);
        assert_eq!(trimmed[1].elements[0].previous, Some(vec![]));
    }

    #[test]
    fn test_marking_walks_inwards() {
        // "... ... a" can't happen after collapsing, but "? ... a" can: two
        // blank columns at the front, the second only reachable through the
        // first.
        let columns = vec![
            column(vec![element(BLANK, None)]),
            column(vec![element(BLANK, Some(&[BLANK]))]),
            column(vec![element("a", Some(&[BLANK]))]),
            column(vec![element("b", Some(&["a"]))]),
        ];
        let trimmed = trim_edges(columns);
        assert_eq!(texts(&trimmed), vec![vec![], vec![], vec!["a"], vec!["b"]]);
    }

    #[test]
    fn test_blank_with_real_predecessor_and_successor_stays() {
        let columns = vec![
            column(vec![element("x", None), element(BLANK, None)]),
            column(vec![
                element(BLANK, Some(&["x"])),
                element("y", Some(&[BLANK])),
            ]),
            column(vec![element("z", Some(&[BLANK]))]),
        ];
        let trimmed = trim_edges(columns);
        // The leading blank goes; the middle one still links "x" to "z".
        assert_eq!(texts(&trimmed), vec![vec!["x"], vec![BLANK, "y"], vec!["z"]]);
        assert_eq!(trimmed[1].elements[1].previous, Some(vec![]));
    }

    #[test]
    fn test_dangling_previous_is_dropped() {
        let columns = vec![
            column(vec![element("a", None)]),
            column(vec![element("b", Some(&["a", "gone"]))]),
        ];
        let trimmed = trim_edges(columns);
        assert_eq!(trimmed[1].elements[0].previous, Some(vec!["a".to_string()]));
    }

    #[test]
    fn test_trimming_is_a_fixed_point() {
        let inputs = vec![
            vec![
                column(vec![element(BLANK, None), element("p", None)]),
                column(vec![element(BLANK, Some(&[BLANK])), element("q", Some(&["p"]))]),
                column(vec![element("r", Some(&[BLANK, "q"]))]),
                column(vec![element(BLANK, Some(&["r"]))]),
            ],
            vec![
                column(vec![element("a", None)]),
                column(vec![element(BLANK, Some(&["a"]))]),
                column(vec![element("b", Some(&[BLANK]))]),
            ],
            vec![],
        ];
        for columns in inputs {
            let once = trim_edges(columns);
            let twice = trim_edges(once.clone());
            assert_eq!(once, twice);
        }
    }
}
