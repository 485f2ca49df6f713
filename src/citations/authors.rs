//! Author list normalization
//!
//!     Raw author strings are BibTeX name lists joined by ` and `. Each name is reduced to
//!     initials plus last name:
//!
//!         Smith, J A          ->  J. A. Smith
//!         Smith, John         ->  Smith
//!         Bernard, J-B        ->  J-B. Bernard
//!         J A Smith           ->  J. A. Smith
//!         John A. Smith       ->  John A. Smith
//!         Collaboration       ->  Collaboration
//!
//!     After a comma only initials are kept: single letters (`J`, `J.`) and hyphenated letter
//!     pairs (`J-B`). Given names written out in full are dropped. Without a comma the last
//!     word is the last name and every word before it is kept, single letters gaining a `.`.
//!
//!     A trailing `others` marks a truncated list and renders as `et al.`.

/// One normalized author
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    /// Given-name part such as `J. A.`; empty when nothing qualifies
    pub initials: String,
    pub last: String,
}

impl Author {
    pub fn parse(name: &str) -> Self {
        match name.split_once(',') {
            Some((last, given)) => Author {
                initials: given
                    .split_whitespace()
                    .filter_map(initial)
                    .collect::<Vec<_>>()
                    .join(" "),
                last: last.trim().to_string(),
            },
            None => {
                let mut pieces: Vec<&str> = name.split_whitespace().collect();
                let last = pieces.pop().unwrap_or_default().to_string();
                let given: Vec<String> = pieces
                    .into_iter()
                    .map(|piece| initial(piece).unwrap_or_else(|| piece.to_string()))
                    .collect();
                Author {
                    initials: given.join(" "),
                    last,
                }
            }
        }
    }

    pub fn display(&self) -> String {
        if self.initials.is_empty() {
            self.last.clone()
        } else {
            format!("{} {}", self.initials, self.last)
        }
    }
}

/// `J` / `J.` -> `J.`, `J-B` -> `J-B.`; anything longer is not an initial
fn initial(piece: &str) -> Option<String> {
    let piece = piece.strip_suffix('.').unwrap_or(piece);
    let chars: Vec<char> = piece.chars().collect();
    match chars.as_slice() {
        [letter] if letter.is_alphabetic() => Some(format!("{letter}.")),
        [first, '-', second] if first.is_alphabetic() && second.is_alphabetic() => {
            Some(format!("{piece}."))
        }
        _ => None,
    }
}

/// A normalized author list
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuthorList {
    pub authors: Vec<Author>,
    /// The raw list ended in `and others`
    pub truncated: bool,
}

impl AuthorList {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        let mut list = AuthorList::default();
        for name in raw.split(" and ") {
            let name = name.trim();
            if name.eq_ignore_ascii_case("others") {
                list.truncated = true;
            } else if !name.is_empty() {
                list.authors.push(Author::parse(name));
            }
        }
        list
    }

    /// `J. Smith, K. Lee and M. Wu`
    pub fn formatted(&self) -> String {
        let names: Vec<String> = self.authors.iter().map(Author::display).collect();
        let mut text = join_names(&names);
        if self.truncated {
            text.push_str(" et al.");
        }
        text
    }

    /// The name part of a short label: `Smith`, `Smith and Lee` or `Smith et al.`
    pub fn short(&self) -> Option<String> {
        let first = self.authors.first()?;
        Some(match (self.authors.len(), self.truncated) {
            (1, false) => first.last.clone(),
            (2, false) => format!("{} and {}", first.last, self.authors[1].last),
            _ => format!("{} et al.", first.last),
        })
    }

    pub fn first_last_name(&self) -> Option<&str> {
        self.authors.first().map(|a| a.last.as_str())
    }
}

fn join_names(names: &[String]) -> String {
    match names {
        [] => String::new(),
        [only] => only.clone(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest(
        raw,
        expected,
        case("Smith, J A", "J. A. Smith"),
        case("Smith, J. A.", "J. A. Smith"),
        case("Smith, John", "Smith"),
        case("Smith, John A.", "A. Smith"),
        case("Bernard, J-B", "J-B. Bernard"),
        case("Bernard, Jean-Baptiste", "Bernard"),
        case("J A Smith", "J. A. Smith"),
        case("John A. Smith", "John A. Smith"),
        case("Jean-Baptiste Bernard", "Jean-Baptiste Bernard"),
        case("Collaboration", "Collaboration"),
        case("van der Berg, A", "A. van der Berg")
    )]
    fn test_author_normalization(raw: &str, expected: &str) {
        assert_eq!(Author::parse(raw).display(), expected);
    }

    #[test]
    fn test_formatted_list() {
        let list = AuthorList::parse("Smith, J and Lee, K and\n  Wu, M");
        assert_eq!(list.formatted(), "J. Smith, K. Lee and M. Wu");
        let pair = AuthorList::parse("Smith, J. and Lee, K.");
        assert_eq!(pair.formatted(), "J. Smith and K. Lee");
    }

    #[rstest(
        raw,
        expected,
        case("Smith, J.", "Smith"),
        case("Smith, J. and Lee, K.", "Smith and Lee"),
        case("Smith, J. and Lee, K. and Wu, M.", "Smith et al."),
        case("Smith, J. and others", "Smith et al.")
    )]
    fn test_short_names(raw: &str, expected: &str) {
        assert_eq!(AuthorList::parse(raw).short().as_deref(), Some(expected));
    }

    #[test]
    fn test_truncated_list_formatting() {
        let list = AuthorList::parse("Smith, J. and others");
        assert_eq!(list.formatted(), "J. Smith et al.");
    }

    #[test]
    fn test_empty_author_list() {
        let list = AuthorList::parse("");
        assert_eq!(list.short(), None);
        assert_eq!(list.formatted(), "");
    }
}
