use crate::models::{ClassifiedEntry, ComparisonResult, Summary};
use rustc_hash::FxHashMap;
use std::time::Instant;
use tracing::{debug, info};

/// Partitions two classified lists by normalized key.
///
/// Duplicate keys within a file collapse to the last entry seen. A key present in both
/// files is reported once in `matched`, represented by the first file's entry. `matched`
/// and `only_in_second` follow the second file's order; `only_in_first` follows the
/// first file's.
pub fn compare(first: Vec<ClassifiedEntry>, second: Vec<ClassifiedEntry>) -> ComparisonResult {
    let start = Instant::now();
    info!(
        first = first.len(),
        second = second.len(),
        "Comparing email lists"
    );

    let mut summary = Summary {
        total_emails_first_file: first.len(),
        total_emails_second_file: second.len(),
        ..Summary::default()
    };

    // key -> index of its last occurrence in `first`
    let mut first_map: FxHashMap<&str, usize> =
        FxHashMap::with_capacity_and_hasher(first.len(), Default::default());
    for (i, entry) in first.iter().enumerate() {
        if entry.is_valid {
            summary.valid_emails_first_file += 1;
        }
        if entry.is_disposable {
            summary.disposable_emails_count += 1;
        }
        first_map.insert(entry.normalized_key.as_str(), i);
    }

    let estimated_matches = first.len().min(second.len()) / 2;
    let mut matched_idx: Vec<usize> = Vec::with_capacity(estimated_matches);
    let mut only_in_second: Vec<ClassifiedEntry> = Vec::with_capacity(second.len() / 4);

    // key -> slot in `only_in_second`, or None once matched
    let mut second_map: FxHashMap<String, Option<usize>> =
        FxHashMap::with_capacity_and_hasher(second.len(), Default::default());

    for entry in second {
        if entry.is_valid {
            summary.valid_emails_second_file += 1;
        }
        if entry.is_disposable {
            summary.disposable_emails_count += 1;
        }

        if let Some(&slot) = second_map.get(entry.normalized_key.as_str()) {
            // last write wins for the second file's own representative
            if let Some(slot) = slot {
                only_in_second[slot] = entry;
            }
            continue;
        }

        match first_map.get(entry.normalized_key.as_str()) {
            Some(&i) => {
                matched_idx.push(i);
                second_map.insert(entry.normalized_key, None);
            }
            None => {
                second_map.insert(entry.normalized_key.clone(), Some(only_in_second.len()));
                only_in_second.push(entry);
            }
        }
    }

    let only_in_first_idx: Vec<usize> = first
        .iter()
        .enumerate()
        .filter(|(i, entry)| {
            let key = entry.normalized_key.as_str();
            first_map.get(key) == Some(i) && !second_map.contains_key(key)
        })
        .map(|(i, _)| i)
        .collect();
    drop(first_map);

    let mut slots: Vec<Option<ClassifiedEntry>> = first.into_iter().map(Some).collect();
    let mut take = |i: usize| slots[i].take();
    let matched: Vec<ClassifiedEntry> = matched_idx.into_iter().filter_map(&mut take).collect();
    let only_in_first: Vec<ClassifiedEntry> =
        only_in_first_idx.into_iter().filter_map(&mut take).collect();

    summary.matching_count = matched.len();
    summary.missing_in_first_count = only_in_second.len();
    summary.missing_in_second_count = only_in_first.len();

    debug!(
        duration_secs = start.elapsed().as_secs_f64(),
        "Comparison pass finished"
    );
    info!(
        matching = summary.matching_count,
        missing_in_first = summary.missing_in_first_count,
        missing_in_second = summary.missing_in_second_count,
        "Comparison complete"
    );

    ComparisonResult {
        matched,
        only_in_first,
        only_in_second,
        summary,
    }
}
