//! Material subset ranges.
//!
//! A subset is a comma separated list of material indices and inclusive
//! ranges, e.g. `"0,3-5,8-"`. An open range runs to the last material.
//! Indices are zero based and clamped to the material count.

use std::collections::BTreeSet;

/// Parses `source` over `material_count` materials.
///
/// The result never contains an index outside `0..material_count`.
#[must_use]
pub fn parse_subset(source: &str, material_count: usize) -> BTreeSet<usize> {
    let mut indices = BTreeSet::new();
    if source.trim().is_empty() || material_count == 0 {
        return indices;
    }
    for token in source.split(',') {
        parse_token(token, material_count, &mut indices);
    }
    indices
}

/// Whether `material_index` is selected. An empty subset selects every
/// material.
#[must_use]
pub fn subset_matches(source: &str, material_count: usize, material_index: usize) -> bool {
    let indices = parse_subset(source, material_count);
    indices.is_empty() || indices.contains(&material_index)
}

fn parse_int(text: &str) -> i64 {
    let text = text.trim();
    let end = text
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
        .map_or(text.len(), |(i, _)| i);
    text[..end].parse().unwrap_or(0)
}

fn parse_token(token: &str, material_count: usize, output: &mut BTreeSet<usize>) {
    let last = material_count as i64 - 1;
    if let Some((left, right)) = token.split_once('-') {
        let mut start = parse_int(left);
        let mut end = parse_int(right);
        if start < material_count as i64 && right.trim().is_empty() {
            end = last;
        }
        start = start.clamp(0, last);
        end = end.clamp(0, last);
        if end > 0 && start > end {
            std::mem::swap(&mut start, &mut end);
        }
        output.extend((start..=end).map(|index| index as usize));
    } else if !token.trim().is_empty() {
        let index = parse_int(token);
        if (0..=last).contains(&index) {
            output.insert(index as usize);
        }
    }
}
