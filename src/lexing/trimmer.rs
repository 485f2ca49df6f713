//! Command trimmer
//!
//!     Tokens are whitespace-delimited, but commands may sit inside a token: `word*b*`,
//!     `(see*ref*`, `$x^2$,`. Before any dispatch decision a token is split into three parts:
//!
//!         leading   text before the first marker that starts a command or formula
//!         core      the paragraph mark, a command, a formula, or plain text
//!         trailing  everything after the core, to be handled after the core
//!
//!     The leading part never contains a command, so callers emit it verbatim. The trailing
//!     part may contain further commands (`*b*world*/b*!`), so the dispatcher feeds it back
//!     through the reader as a glued token.

use super::command::CommandToken;

const COMMAND_MARKER: char = '*';
const FORMULA_MARKER: char = '$';

/// The central lexeme of a token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Core<'a> {
    /// A bare `*`
    ParagraphMark,
    Command(CommandToken),
    /// `$...$`; when `closed` is false the formula continues past the end of the token
    Formula {
        body: &'a str,
        closed: bool,
    },
    Text(&'a str),
}

/// A token split into leading fragment, core and trailing fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Split<'a> {
    pub leading: &'a str,
    pub core: Core<'a>,
    /// Source text of the core, so that `leading + core_text + trailing` is the token
    pub core_text: &'a str,
    pub trailing: &'a str,
}

impl<'a> Split<'a> {
    fn whole(token: &'a str, core: Core<'a>) -> Self {
        Split {
            leading: "",
            core,
            core_text: token,
            trailing: "",
        }
    }

    /// The command of the core, if any
    pub fn command(&self) -> Option<CommandToken> {
        match self.core {
            Core::Command(command) => Some(command),
            _ => None,
        }
    }

    /// The closing marker matching an opening command, spelled as written (`*/style*`)
    pub fn closer(&self) -> Option<String> {
        match self.core {
            Core::Command(command) if !command.closing => {
                let name = &self.core_text[1..self.core_text.len() - 1];
                Some(format!("*/{name}*"))
            }
            _ => None,
        }
    }
}

/// Split a token around its first command or formula marker
pub fn split(token: &str) -> Split<'_> {
    if token == "*" {
        return Split::whole(token, Core::ParagraphMark);
    }

    for (start, marker) in token.char_indices() {
        let rest = &token[start..];
        let parsed = match marker {
            FORMULA_MARKER => Some(formula(rest)),
            COMMAND_MARKER => command(rest),
            _ => None,
        };
        if let Some((core, length)) = parsed {
            return Split {
                leading: &token[..start],
                core,
                core_text: &rest[..length],
                trailing: &rest[length..],
            };
        }
    }

    Split::whole(token, Core::Text(token))
}

/// Parse `$...$` at the start of `rest`, returning the core and its byte length
fn formula(rest: &str) -> (Core<'_>, usize) {
    let body = &rest[1..];
    match body.find(FORMULA_MARKER) {
        Some(end) => (
            Core::Formula {
                body: &body[..end],
                closed: true,
            },
            end + 2,
        ),
        None => (
            Core::Formula {
                body,
                closed: false,
            },
            rest.len(),
        ),
    }
}

/// Parse `*name*` or `*/name*` at the start of `rest`
fn command(rest: &str) -> Option<(Core<'_>, usize)> {
    let inner = &rest[1..];
    let end = inner.find(COMMAND_MARKER)?;
    let parsed = CommandToken::parse(&inner[..end])?;
    Some((Core::Command(parsed), end + 2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexing::command::{Command, CommandToken};
    use proptest::prelude::*;

    #[test]
    fn test_bare_star_is_paragraph_mark() {
        assert_eq!(split("*").core, Core::ParagraphMark);
    }

    #[test]
    fn test_plain_word() {
        let parts = split("hello,");
        assert_eq!(parts.core, Core::Text("hello,"));
        assert_eq!(parts.leading, "");
        assert_eq!(parts.trailing, "");
    }

    #[test]
    fn test_leading_and_trailing_fragments() {
        let parts = split("(see*ref*");
        assert_eq!(parts.leading, "(see");
        assert_eq!(parts.core, Core::Command(CommandToken::open(Command::Ref)));
        assert_eq!(parts.trailing, "");

        let parts = split("word*b*");
        assert_eq!(parts.leading, "word");
        assert_eq!(parts.core, Core::Command(CommandToken::open(Command::Bold)));
    }

    #[test]
    fn test_glued_inline_command() {
        let parts = split("*b*world*/b*!");
        assert_eq!(parts.leading, "");
        assert_eq!(parts.core, Core::Command(CommandToken::open(Command::Bold)));
        assert_eq!(parts.trailing, "world*/b*!");

        let parts = split(parts.trailing);
        assert_eq!(parts.leading, "world");
        assert_eq!(parts.core, Core::Command(CommandToken::close(Command::Bold)));
        assert_eq!(parts.trailing, "!");
    }

    #[test]
    fn test_unknown_marker_is_text() {
        assert_eq!(split("2*3*4").core, Core::Text("2*3*4"));
        assert_eq!(split("a*b").core, Core::Text("a*b"));
        assert_eq!(split("**").core, Core::Text("**"));
    }

    #[test]
    fn test_closer_keeps_alias_spelling() {
        assert_eq!(split("*style*").closer().as_deref(), Some("*/style*"));
        assert_eq!(
            split("*codeexample-small*x").closer().as_deref(),
            Some("*/codeexample-small*")
        );
        assert_eq!(split("*/b*").closer(), None);
        assert_eq!(split("plain").closer(), None);
    }

    #[test]
    fn test_closed_formula() {
        let parts = split("$x^2$,");
        assert_eq!(
            parts.core,
            Core::Formula {
                body: "x^2",
                closed: true
            }
        );
        assert_eq!(parts.trailing, ",");
    }

    #[test]
    fn test_open_formula() {
        let parts = split("($a");
        assert_eq!(parts.leading, "(");
        assert_eq!(
            parts.core,
            Core::Formula {
                body: "a",
                closed: false
            }
        );
    }

    #[test]
    fn test_formula_before_command() {
        let parts = split("$a$*/i*");
        assert_eq!(
            parts.core,
            Core::Formula {
                body: "a",
                closed: true
            }
        );
        assert_eq!(parts.trailing, "*/i*");
    }

    proptest! {
        #[test]
        fn prop_split_reassembles_token(token in "[a-z*$/.,()]{1,16}") {
            let parts = split(&token);
            let joined = format!("{}{}{}", parts.leading, parts.core_text, parts.trailing);
            prop_assert_eq!(joined, token);
        }

        #[test]
        fn prop_leading_has_no_command(token in "[a-z*/]{1,16}") {
            let parts = split(&token);
            let leading = split(parts.leading);
            let is_command = matches!(leading.core, Core::Command(_) | Core::Formula { .. });
            prop_assert!(!is_command);
        }
    }
}
