//! Operator selection grammar for interactive deletion.
//!
//! Input is a space-separated mix of 1-based indices (`3`) and inclusive
//! ranges (`2-4`), or the literal `all`. An empty answer selects nothing.
//! Bad tokens are dropped individually and reported.

use std::collections::BTreeSet;

/// Outcome of parsing a selection answer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// Selected 1-based indices, deduplicated and ascending.
    pub indices: BTreeSet<usize>,
    /// One message per ignored token.
    pub warnings: Vec<String>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Zero-based positions, ascending.
    pub fn positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.indices.iter().map(|i| i - 1)
    }
}

fn parse_index(token: &str, count: usize) -> Result<usize, String> {
    let index: usize = token
        .parse()
        .map_err(|_| format!("'{}' is not a number", token))?;
    if index == 0 || index > count {
        return Err(format!("{} is out of range 1-{}", index, count));
    }
    Ok(index)
}

fn parse_token(token: &str, count: usize) -> Result<Vec<usize>, String> {
    match token.split_once('-') {
        Some((start, end)) => {
            let start = parse_index(start, count)?;
            let end = parse_index(end, count)?;
            if start > end {
                return Err(format!("range {}-{} is reversed", start, end));
            }
            Ok((start..=end).collect())
        }
        None => parse_index(token, count).map(|i| vec![i]),
    }
}

/// Parses `input` against a list of `count` devices.
pub fn parse_selection(input: &str, count: usize) -> Selection {
    let mut selection = Selection::default();
    let input = input.trim();

    if input.eq_ignore_ascii_case("all") {
        selection.indices = (1..=count).collect();
        return selection;
    }

    for token in input.split_whitespace() {
        match parse_token(token, count) {
            Ok(indices) => selection.indices.extend(indices),
            Err(reason) => selection
                .warnings
                .push(format!("Ignoring selection '{}': {}", token, reason)),
        }
    }

    selection
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn set(items: &[usize]) -> BTreeSet<usize> {
        items.iter().copied().collect()
    }

    #[test]
    fn test_single_indices() {
        let selection = parse_selection("1 3 5", 5);
        assert_eq!(selection.indices, set(&[1, 3, 5]));
        assert!(selection.warnings.is_empty());
    }

    #[test]
    fn test_range() {
        assert_eq!(parse_selection("1-3", 5).indices, set(&[1, 2, 3]));
    }

    #[test]
    fn test_all() {
        assert_eq!(parse_selection("all", 5).indices, set(&[1, 2, 3, 4, 5]));
        assert_eq!(parse_selection(" ALL ", 2).indices, set(&[1, 2]));
    }

    #[test]
    fn test_empty_selects_nothing() {
        let selection = parse_selection("", 5);
        assert!(selection.is_empty());
        assert!(selection.warnings.is_empty());
        assert!(parse_selection("   ", 5).is_empty());
    }

    #[test]
    fn test_out_of_range_is_ignored_with_warning() {
        let selection = parse_selection("7", 5);
        assert!(selection.is_empty());
        assert_eq!(selection.warnings.len(), 1);
        assert!(selection.warnings[0].contains("out of range"));
    }

    #[test]
    fn test_overlap_is_deduplicated_and_sorted() {
        let selection = parse_selection("4 2-4 1 2 2", 5);
        assert_eq!(selection.indices.iter().copied().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        assert_eq!(selection.positions().collect::<Vec<_>>(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_malformed_tokens_are_individually_ignored() {
        let selection = parse_selection("x 2 0 3-1 4- -1 5", 5);
        assert_eq!(selection.indices, set(&[2, 5]));
        assert_eq!(selection.warnings.len(), 5);
    }

    #[test]
    fn test_all_with_no_devices() {
        assert!(parse_selection("all", 0).is_empty());
    }
}
