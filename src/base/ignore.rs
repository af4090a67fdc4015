//! Ignore lists and ticket exclusions.

use std::{fmt, path::Path};

use anyhow::{Context, anyhow};
use regex::RegexSet;
use serde::Deserialize;

use super::types::Res;

/// A compiled list of regular expressions; a message is ignored when any of them
/// matches anywhere in the checked text.
#[derive(Clone)]
pub struct IgnoreList {
    patterns: RegexSet,
}

impl Default for IgnoreList {
    fn default() -> Self {
        Self { patterns: RegexSet::empty() }
    }
}

impl fmt::Debug for IgnoreList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.patterns.patterns()).finish()
    }
}

impl IgnoreList {
    /// Compile a list of patterns.
    pub fn from_patterns<I, S>(patterns: I) -> Res<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = RegexSet::new(patterns)?;
        Ok(Self { patterns })
    }

    /// Parse pattern file contents: one pattern per line, blank lines and lines
    /// starting with `#` are skipped.
    pub fn parse(contents: &str) -> Res<Self> {
        let lines = contents.lines().map(str::trim).filter(|line| !line.is_empty() && !line.starts_with('#'));
        Self::from_patterns(lines)
    }

    /// Load a pattern file from disk.
    pub fn load(path: &Path) -> Res<Self> {
        let contents = std::fs::read_to_string(path).with_context(|| format!("Failed to read ignore list `{}`.", path.display()))?;
        Self::parse(&contents).with_context(|| format!("Invalid pattern in ignore list `{}`.", path.display()))
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.patterns.is_match(text)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Ticket numbers that never get a reply.
///
/// Written as a comma separated list of numbers and inclusive ranges, e.g. `0-10,42`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct TicketExclusions {
    ranges: Vec<(u64, u64)>,
}

impl TicketExclusions {
    pub fn parse(list: &str) -> Res<Self> {
        let mut ranges = Vec::new();

        for item in list.split(',').map(str::trim).filter(|item| !item.is_empty()) {
            let range = match item.split_once('-') {
                Some((start, end)) => {
                    let start = parse_ticket(start)?;
                    let end = parse_ticket(end)?;

                    if start > end {
                        return Err(anyhow!("Invalid ticket exclusion range `{item}`."));
                    }

                    (start, end)
                }
                None => {
                    let id = parse_ticket(item)?;
                    (id, id)
                }
            };

            ranges.push(range);
        }

        Ok(Self { ranges })
    }

    /// Whether the (decimal) ticket reference is excluded.
    pub fn contains(&self, reference: &str) -> bool {
        let Ok(id) = reference.parse::<u64>() else {
            return false;
        };

        self.ranges.iter().any(|(start, end)| (*start..=*end).contains(&id))
    }

    /// How many ticket numbers are excluded.
    pub fn count(&self) -> u64 {
        self.ranges.iter().fold(0u64, |total, (start, end)| total.saturating_add((end - start).saturating_add(1)))
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

impl TryFrom<String> for TicketExclusions {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Res<Self> {
        Self::parse(&value)
    }
}

fn parse_ticket(value: &str) -> Res<u64> {
    value.trim().parse().with_context(|| format!("Invalid ticket number `{value}`."))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_parse_skips_blank_and_comment_lines() {
        let list = IgnoreList::parse("# bots\n\n^bot\n   \nspam$\n").unwrap();

        assert_eq!(list.len(), 2);
        assert!(list.is_match("botty"));
        assert!(list.is_match("more spam"));
        assert!(!list.is_match("alice"));
    }

    #[test]
    fn test_match_is_unanchored() {
        let list = IgnoreList::from_patterns(["Serv"]).unwrap();

        assert!(list.is_match("NickServ"));
        assert!(list.is_match("ChanServ_"));
        assert!(!list.is_match("observer"));
        assert!(!list.is_match("nickserv"));
    }

    #[test]
    fn test_empty_list_matches_nothing() {
        let list = IgnoreList::default();

        assert!(list.is_empty());
        assert!(!list.is_match(""));
        assert!(!list.is_match("anything"));
    }

    #[test]
    fn test_invalid_pattern_is_an_error() {
        assert!(IgnoreList::parse("valid\n(unclosed\n").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# nick ignores").unwrap();
        writeln!(file, "^dpaste").unwrap();

        let list = IgnoreList::load(file.path()).unwrap();

        assert_eq!(list.len(), 1);
        assert!(list.is_match("dpaste_bot"));
    }

    #[test]
    fn test_load_missing_file_is_an_error() {
        assert!(IgnoreList::load(Path::new("/nonexistent/ignore-list")).is_err());
    }

    #[test]
    fn test_exclusions_ranges_and_singles() {
        let exclusions = TicketExclusions::parse("0-10, 42").unwrap();

        assert!(exclusions.contains("0"));
        assert!(exclusions.contains("10"));
        assert!(exclusions.contains("007"));
        assert!(exclusions.contains("42"));
        assert!(!exclusions.contains("11"));
        assert!(!exclusions.contains("3000"));
        assert!(!exclusions.contains("99999999999999999999999"));
        assert_eq!(exclusions.count(), 12);
    }

    #[test]
    fn test_exclusions_empty_by_default() {
        assert!(TicketExclusions::parse("").unwrap().is_empty());
        assert!(!TicketExclusions::default().contains("0"));
    }

    #[test]
    fn test_exclusions_reject_garbage() {
        assert!(TicketExclusions::parse("ten").is_err());
        assert!(TicketExclusions::parse("10-0").is_err());
        assert!(TicketExclusions::parse("1-").is_err());
    }
}
