//! Lexing
//!
//!     The format has no grammar beyond whitespace-delimited tokens and `*`-delimited command
//!     markers, so lexing is three small pieces:
//!
//!         1. [reader]: the token stream, with raw reads, peeking and glued fragments.
//!         2. [trimmer]: splits a token into leading fragment, core and trailing fragment.
//!         3. [command]: the table of marker names the trimmer recognizes.
//!
//!     Every pass and the render dispatcher go through these; none of them slices tokens by
//!     hand.

pub mod command;
pub mod reader;
pub mod trimmer;

pub use command::{CodeKind, Command, CommandToken, MetaField, TableAlign};
pub use reader::{ReaderPosition, Token, TokenReader};
pub use trimmer::{split, Core, Split};

/// Read a single-token argument (`*label* fig1`), splitting off anything glued after it
///
/// `fig1*/figure*` yields `fig1` and leaves `*/figure*` as the next (glued) token. Returns
/// `None` at end of input or when the next token is itself a command.
pub fn read_argument(reader: &mut TokenReader<'_>) -> Option<String> {
    let position = reader.save();
    let token = reader.next_token()?;
    let parts = split(&token.text);
    if !parts.leading.is_empty() {
        let rest = &token.text[parts.leading.len()..];
        reader.unread_glued(rest);
        return Some(parts.leading.to_string());
    }
    match parts.core {
        Core::Text(text) => Some(text.to_string()),
        _ => {
            reader.restore(position);
            None
        }
    }
}

/// Consume the closing marker of `command` if it is the next token
///
/// Returns the offending token text (or `end of input`) when something else follows; that
/// token is left unread.
pub fn expect_closing(reader: &mut TokenReader<'_>, command: Command) -> Result<(), String> {
    let position = reader.save();
    let Some(token) = reader.next_token() else {
        return Err("end of input".to_string());
    };
    let parts = split(&token.text);
    match parts.core {
        Core::Command(found) if parts.leading.is_empty() && found == CommandToken::close(command) => {
            reader.unread_glued(parts.trailing);
            Ok(())
        }
        _ => {
            reader.restore(position);
            Err(token.text)
        }
    }
}
