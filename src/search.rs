//! Query matching and ranking
//!
//! Pure and in-memory: a query is matched against record names only, with
//! no filesystem access. Matching is case-insensitive; the query is used as
//! given, including surrounding whitespace.

use std::cmp::Ordering;

use crate::index::Index;
use crate::record::AppRecord;

/// Weight of how tightly the matched characters sit together
const TIGHTNESS_WEIGHT: u32 = 1000;

/// Weight of matched characters that start a word
const BOUNDARY_WEIGHT: u32 = 1200;

/// Match tier, best first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MatchKind {
    /// The whole name, ignoring case
    Exact,
    /// The start of the name
    Prefix,
    /// The query's characters appear in the name in order
    Subsequence,
}

#[derive(Debug, Clone, Copy)]
pub struct Match<'a> {
    pub record: &'a AppRecord,
    pub kind: MatchKind,
    /// Higher is better; only compared within a tier
    pub score: u32,
}

/// Rank every record in `index` against `query`.
///
/// An empty query returns all records in scan order.
pub fn search<'a>(query: &str, index: &'a Index) -> Vec<Match<'a>> {
    if query.is_empty() {
        return index
            .records()
            .iter()
            .map(|record| Match {
                record,
                kind: MatchKind::Prefix,
                score: 0,
            })
            .collect();
    }

    let query = lowercase_chars(query);
    let mut matches: Vec<Match<'a>> = index
        .records()
        .iter()
        .filter_map(|record| {
            let (kind, score) = match_name(&query, &record.name)?;
            Some(Match {
                record,
                kind,
                score,
            })
        })
        .collect();

    matches.sort_by(compare_matches);
    matches
}

/// Tier, score descending, shorter name, name, then id
fn compare_matches(a: &Match, b: &Match) -> Ordering {
    a.kind
        .cmp(&b.kind)
        .then_with(|| b.score.cmp(&a.score))
        .then_with(|| a.record.name.chars().count().cmp(&b.record.name.chars().count()))
        .then_with(|| a.record.name.cmp(&b.record.name))
        .then_with(|| a.record.id.cmp(&b.record.id))
}

/// Per-character lowercase, keeping one char per input char so positions line up
fn lowercase_chars(s: &str) -> Vec<char> {
    s.chars()
        .map(|c| c.to_lowercase().next().unwrap_or(c))
        .collect()
}

/// Match a lowercased query against a name
pub fn match_name(query: &[char], name: &str) -> Option<(MatchKind, u32)> {
    let original: Vec<char> = name.chars().collect();
    let lower = lowercase_chars(name);

    let score = subsequence_score(query, &original, &lower)?;
    let kind = if lower == query {
        MatchKind::Exact
    } else if lower.starts_with(query) {
        MatchKind::Prefix
    } else {
        MatchKind::Subsequence
    };

    Some((kind, score))
}

/// Whether `original[i]` starts a word
fn is_boundary(original: &[char], i: usize) -> bool {
    if i == 0 {
        return true;
    }
    let prev = original[i - 1];
    let cur = original[i];
    !prev.is_alphanumeric() || (prev.is_lowercase() && cur.is_uppercase())
}

fn alignment_score(positions: &[usize], original: &[char]) -> u32 {
    let (Some(&first), Some(&last)) = (positions.first(), positions.last()) else {
        return 0;
    };
    let m = positions.len() as u32;
    let span = (last - first + 1) as u32;
    let hits = positions.iter().filter(|&&i| is_boundary(original, i)).count() as u32;

    TIGHTNESS_WEIGHT * m / span + BOUNDARY_WEIGHT * hits / m
}

/// Best score over the candidate alignments, `None` if `query` is not a subsequence
fn subsequence_score(query: &[char], original: &[char], lower: &[char]) -> Option<u32> {
    let first = *query.first()?;
    let mut best: Option<u32> = None;
    let mut positions = Vec::with_capacity(query.len());

    // Tightest window for each possible start
    for start in (0..lower.len()).filter(|&i| lower[i] == first) {
        positions.clear();
        positions.push(start);
        let mut cursor = start + 1;
        for &qc in &query[1..] {
            match (cursor..lower.len()).find(|&i| lower[i] == qc) {
                Some(i) => {
                    positions.push(i);
                    cursor = i + 1;
                }
                None => break,
            }
        }
        if positions.len() < query.len() {
            // Later starts cannot succeed either
            break;
        }
        let score = alignment_score(&positions, original);
        best = Some(best.map_or(score, |b| b.max(score)));
    }

    if let Some(score) = word_initials(query, original, lower)
        .map(|positions| alignment_score(&positions, original))
    {
        best = Some(best.map_or(score, |b| b.max(score)));
    }

    best
}

/// Alignment that takes the next word start whenever one matches
fn word_initials(query: &[char], original: &[char], lower: &[char]) -> Option<Vec<usize>> {
    let mut positions = Vec::with_capacity(query.len());
    let mut cursor = 0;

    for &qc in query {
        let next = (cursor..lower.len())
            .find(|&i| lower[i] == qc && is_boundary(original, i))
            .or_else(|| (cursor..lower.len()).find(|&i| lower[i] == qc))?;
        positions.push(next);
        cursor = next + 1;
    }

    Some(positions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{AppId, IconSlot, LaunchTarget};

    fn index(names: &[&str]) -> Index {
        let records = names
            .iter()
            .enumerate()
            .map(|(i, name)| AppRecord {
                id: AppId::Steam(i as u32 + 1),
                name: name.to_string(),
                install_dir: None,
                icon: IconSlot::default(),
                launch: LaunchTarget::SteamApp { app_id: i as u32 + 1 },
            })
            .collect();
        Index::from_records(records, Vec::new())
    }

    fn names<'a>(matches: &[Match<'a>]) -> Vec<&'a str> {
        matches.iter().map(|m| m.record.name.as_str()).collect()
    }

    #[test]
    fn test_exact_before_prefix() {
        let index = index(&["Portal 2", "Portal"]);
        let matches = search("portal", &index);
        assert_eq!(names(&matches), vec!["Portal", "Portal 2"]);
        assert_eq!(matches[0].kind, MatchKind::Exact);
        assert_eq!(matches[1].kind, MatchKind::Prefix);
    }

    #[test]
    fn test_empty_query_keeps_scan_order() {
        let index = index(&["Zeta", "Alpha", "Mid"]);
        assert_eq!(names(&search("", &index)), vec!["Zeta", "Alpha", "Mid"]);
    }

    #[test]
    fn test_non_matching_excluded() {
        let index = index(&["Portal", "Half-Life"]);
        assert!(search("xyz", &index).is_empty());
        assert_eq!(names(&search("hl", &index)), vec!["Half-Life"]);
    }

    #[test]
    fn test_query_is_not_trimmed() {
        let index = index(&["Portal", "Portal 2"]);
        assert_eq!(names(&search("portal ", &index)), vec!["Portal 2"]);
    }

    #[test]
    fn test_word_starts_beat_scattered_letters() {
        let index = index(&["Shell Shock", "Half-Life"]);
        let matches = search("hl", &index);
        assert_eq!(names(&matches), vec!["Half-Life", "Shell Shock"]);
        assert!(matches[0].score > matches[1].score);
    }

    #[test]
    fn test_camel_case_boundaries() {
        let original: Vec<char> = "RimWorld".chars().collect();
        assert!(is_boundary(&original, 0));
        assert!(is_boundary(&original, 3));
        assert!(!is_boundary(&original, 4));

        let index = index(&["Rainbow World", "RimWorld"]);
        assert_eq!(names(&search("rw", &index))[0], "RimWorld");
    }

    #[test]
    fn test_tighter_match_wins() {
        let index = index(&["Doom Eternal", "Dead or Alive Mode"]);
        assert_eq!(names(&search("doom", &index)), vec!["Doom Eternal"]);
        let matches = search("dm", &index);
        assert_eq!(matches.len(), 2);
    }

    #[test]
    fn test_ties_break_on_length_then_name() {
        let index = index(&["Portal B", "Portal A", "Portal Extra"]);
        assert_eq!(
            names(&search("portal", &index)),
            vec!["Portal A", "Portal B", "Portal Extra"]
        );
    }

    #[test]
    fn test_case_insensitive_unicode() {
        let index = index(&["Ōkami HD"]);
        let matches = search("ōkami", &index);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].kind, MatchKind::Prefix);
    }
}
