//! Bibliography record extraction
//!
//!     Records are BibTeX-like:
//!
//!         @article{smith01,
//!           author = {Smith, J. and Lee, K.},
//!           title = "A {GALEX} survey",
//!           journal = \apj,
//!           year = 2001
//!         }
//!
//!     A record is found by its header token, the word starting with `@`. The key is looked
//!     for at one of two fixed offsets in that token, the ones of `@article{KEY` and
//!     `@book{KEY` (`@misc{KEY` shares the second). By default the key only has to be a prefix
//!     of what follows; [`KeyMatch::Exact`] also requires the key to end there. The record's
//!     lines run until the brace depth returns to zero. Field lines are matched by name,
//!     case-insensitively; a value that does not end on its own line continues on the following
//!     lines until the next field.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Offsets of the key inside a header token: after `@article{` and after `@book{`
const KEY_OFFSETS: [usize; 2] = [9, 6];

/// How a requested key is compared with the key of a header token
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyMatch {
    /// The header key starts with the requested key
    #[default]
    Prefix,
    /// The header key is the requested key
    Exact,
}

/// Fields extracted from records
pub const FIELDS: &[&str] = &[
    "author",
    "title",
    "journal",
    "booktitle",
    "volume",
    "number",
    "year",
    "url",
    "pages",
    "editor",
    "edition",
    "publisher",
    "note",
];

static FIELD_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([A-Za-z][A-Za-z_-]*)\s*=(.*)$").expect("field pattern is valid")
});

/// A located record: its entry type and raw field values in record order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub entry_type: String,
    pub fields: Vec<(String, String)>,
}

impl RawRecord {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Find the record for `key` in a bibliography text
pub fn find_record(text: &str, key: &str, mode: KeyMatch) -> Option<RawRecord> {
    let mut lines = text.lines();
    while let Some(line) = lines.next() {
        let Some(entry_type) = line
            .split_whitespace()
            .find_map(|token| header_entry_type(token, key, mode))
        else {
            continue;
        };
        let mut body = Vec::new();
        let mut depth = brace_balance(line);
        for line in lines.by_ref() {
            if depth <= 0 {
                break;
            }
            depth += brace_balance(line);
            body.push(line);
        }
        return Some(RawRecord {
            entry_type,
            fields: extract_fields(&body),
        });
    }
    None
}

/// Entry type of a header token that introduces `key`
fn header_entry_type(token: &str, key: &str, mode: KeyMatch) -> Option<String> {
    let (entry_type, _) = token.strip_prefix('@')?.split_once('{')?;
    let matched = KEY_OFFSETS.iter().any(|&offset| {
        token
            .get(offset..)
            .and_then(|rest| rest.strip_prefix(key))
            .map_or(false, |tail| match mode {
                KeyMatch::Prefix => true,
                KeyMatch::Exact => tail.is_empty() || tail.starts_with(','),
            })
    });
    matched.then(|| entry_type.to_ascii_lowercase())
}

fn brace_balance(line: &str) -> i32 {
    line.chars().fold(0, |depth, c| match c {
        '{' => depth + 1,
        '}' => depth - 1,
        _ => depth,
    })
}

fn extract_fields(lines: &[&str]) -> Vec<(String, String)> {
    let mut fields: Vec<(String, String)> = Vec::new();
    let mut current: Option<(String, String)> = None;

    for line in lines {
        if let Some(captures) = FIELD_LINE.captures(line) {
            if let Some(done) = current.take() {
                fields.push(done);
            }
            let name = captures[1].to_ascii_lowercase();
            if FIELDS.contains(&name.as_str()) {
                current = Some((name, captures[2].to_string()));
            }
        } else if let Some((_, value)) = current.as_mut() {
            value.push(' ');
            value.push_str(line);
        }
    }
    if let Some(done) = current {
        fields.push(done);
    }

    fields
        .into_iter()
        .map(|(name, value)| (name, clean_value(&value)))
        .filter(|(_, value)| !value.is_empty())
        .collect()
}

/// Trim delimiters off a raw value, drop grouping braces and collapse whitespace
pub fn clean_value(raw: &str) -> String {
    let is_delimiter = |c: char| c.is_whitespace() || matches!(c, '{' | '}' | '"');
    let value = raw.trim_start_matches(is_delimiter);
    let value = value.trim_end_matches(|c: char| is_delimiter(c) || c == ',');
    value
        .replace(['{', '}'], "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const BIB: &str = r#"
@article{smith01,
  Author = {Smith, John A. and Lee, K.},
  title = "A {GALEX} survey
           of nearby galaxies",
  journal = \apj,
  year = 2001,
  pages = {1--10}
}

@book{jones99,
  AUTHOR = {Jones, P.},
  title = {Stars},
  publisher = {CUP},
  year = {1999}}

@misc{smith01b,
  author = {Somebody Else},
  year = 2003
}
"#;

    #[test]
    fn test_finds_standard_header() {
        let record = find_record(BIB, "smith01", KeyMatch::Prefix).unwrap();
        assert_eq!(record.entry_type, "article");
        assert_eq!(record.get("author"), Some("Smith, John A. and Lee, K."));
        assert_eq!(record.get("year"), Some("2001"));
        assert_eq!(record.get("journal"), Some("\\apj"));
        assert_eq!(record.get("pages"), Some("1--10"));
    }

    #[test]
    fn test_multiline_value_is_joined() {
        let record = find_record(BIB, "smith01", KeyMatch::Prefix).unwrap();
        assert_eq!(
            record.get("title"),
            Some("A GALEX survey of nearby galaxies")
        );
    }

    #[test]
    fn test_finds_short_header_and_closing_on_last_field() {
        let record = find_record(BIB, "jones99", KeyMatch::Prefix).unwrap();
        assert_eq!(record.entry_type, "book");
        assert_eq!(record.get("author"), Some("Jones, P."));
        assert_eq!(record.get("publisher"), Some("CUP"));
        assert_eq!(record.get("year"), Some("1999"));
    }

    #[test]
    fn test_prefix_key_matches_first_record() {
        let record = find_record(BIB, "smith", KeyMatch::Prefix).unwrap();
        assert_eq!(record.entry_type, "article");
        let record = find_record(BIB, "smith01b", KeyMatch::Prefix).unwrap();
        assert_eq!(record.get("year"), Some("2003"));
        assert!(find_record(BIB, "nobody", KeyMatch::Prefix).is_none());
    }

    #[test]
    fn test_exact_key_match() {
        assert!(find_record(BIB, "smith", KeyMatch::Exact).is_none());
        let record = find_record(BIB, "smith01b", KeyMatch::Exact).unwrap();
        assert_eq!(record.entry_type, "misc");
        let record = find_record(BIB, "smith01", KeyMatch::Exact).unwrap();
        assert_eq!(record.entry_type, "article");
    }

    #[test]
    fn test_key_only_at_header_offsets() {
        let text = "@inproceedings{conf1,\n  year = 2005\n}\n@book{ spaced,\n  year = 2006\n}\n";
        assert!(find_record(text, "conf1", KeyMatch::Prefix).is_none());
        assert!(find_record(text, "spaced", KeyMatch::Prefix).is_none());
    }

    #[test]
    fn test_clean_value() {
        assert_eq!(clean_value(r#" {Title}},"#), "Title");
        assert_eq!(clean_value(r#" "quoted","#), "quoted");
        assert_eq!(clean_value(" 12,"), "12");
    }
}
