use std::collections::{HashMap, HashSet};

use super::interface::{Column, Element, GraphPhraseRef, GraphSettings};

/// Drop the elements whose frequency falls outside the column's window.
fn filter_by_frequency(elements: Vec<Element>, settings: &GraphSettings) -> Vec<Element> {
    let column_max = elements.iter().map(|e| e.frequency).max().unwrap_or(0);
    let (min, max) = settings.frequency_window(column_max);
    elements
        .into_iter()
        .filter(|e| {
            let frequency = e.frequency as f64;
            min <= frequency && frequency <= max
        })
        .collect()
}

fn union_previous(into: &mut Option<Vec<String>>, from: Option<Vec<String>>) {
    match (into.as_mut(), from) {
        (Some(existing), Some(more)) => {
            for text in more {
                if !existing.contains(&text) {
                    existing.push(text);
                }
            }
        }
        (None, Some(more)) => *into = Some(more),
        (_, None) => {}
    }
}

/// Merge elements sharing a text, keeping first-encounter order.
fn merge_by_text(elements: Vec<Element>) -> Vec<Element> {
    let mut merged: Vec<Element> = vec![];
    let mut index_by_text: HashMap<String, usize> = HashMap::new();
    for element in elements {
        match index_by_text.get(&element.text) {
            Some(&ix) => {
                let existing = &mut merged[ix];
                existing.frequency += element.frequency;
                union_previous(&mut existing.previous, element.previous);
                existing.phrases.extend(element.phrases);
            }
            None => {
                index_by_text.insert(element.text.clone(), merged.len());
                merged.push(element);
            }
        }
    }
    merged
}

/// Collapse, sort and cap one column.  Returns the phrase refs of everything
/// that fell below the row cap.
fn aggregate_column(column: &mut Column, settings: &GraphSettings) -> Vec<GraphPhraseRef> {
    let elements = std::mem::take(&mut column.elements);
    let mut merged = merge_by_text(filter_by_frequency(elements, settings));
    // `sort_by` is stable so ties keep encounter order.
    merged.sort_by(|a, b| b.frequency.cmp(&a.frequency));

    let cut = if merged.len() > settings.max_rows {
        merged.split_off(settings.max_rows)
    } else {
        vec![]
    };
    column.elements = merged;

    cut.into_iter().flat_map(|e| e.phrases).collect()
}

/// Merge duplicate words in every column, sort them by frequency, apply the
/// frequency window and the row cap, and then remove every phrase that lost
/// its place in some column from all the other columns too.
///
/// An element whose phrases all disappear goes with them; the frequency of an
/// element that survives is whatever its remaining phrases add up to.
pub fn aggregate_columns(mut columns: Vec<Column>, settings: &GraphSettings) -> Vec<Column> {
    let mut removed: HashSet<(String, u64)> = HashSet::new();
    for column in columns.iter_mut() {
        for phrase_ref in aggregate_column(column, settings) {
            removed.insert((phrase_ref.text, phrase_ref.frequency));
        }
    }
    trace!(removed_phrase_count = removed.len());

    if removed.is_empty() {
        return columns;
    }

    for column in columns.iter_mut() {
        for element in column.elements.iter_mut() {
            element
                .phrases
                .retain(|p| !removed.contains(&(p.text.clone(), p.frequency)));
            element.frequency = element.phrases.iter().map(|p| p.frequency).sum();
        }
        column.elements.retain(|e| !e.phrases.is_empty());
        column
            .elements
            .sort_by(|a, b| b.frequency.cmp(&a.frequency));
    }

    columns
}
