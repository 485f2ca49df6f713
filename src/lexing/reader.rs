//! Token reader
//!
//!     Pulls whitespace-delimited tokens out of a source string. The word/space split is done
//!     by a logos lexer; everything on top of it (raw reads, glued fragments, peeking) works on
//!     the lexer's remainder and position.
//!
//!     Three things go beyond plain tokenizing:
//!
//!         - Glued fragments. When a token carries more than one lexeme (`*b*world*/b*!`),
//!           callers push the unprocessed tail back with [`TokenReader::unread_glued`]. It is
//!           returned by the next call to [`TokenReader::next`] flagged as glued, meaning no
//!           whitespace separated it from what came before.
//!         - Raw reads. Code blocks, passthrough blocks, metadata fields and formulas are read
//!           character-wise up to a literal terminator rather than token by token.
//!         - Save/restore. [`TokenReader::save`] snapshots the read position so a token can be
//!           looked at and handed back, which is how the one-token peek works.

use super::trimmer::{split, Core};
use logos::{Lexer, Logos};

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+")]
enum RawToken {
    #[regex(r"[^ \t\r\n\f]+")]
    Word,
}

/// A span of non-whitespace characters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    /// True when the token was split off a larger token, so no whitespace precedes it
    pub glued: bool,
}

impl Token {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            glued: false,
        }
    }

    pub fn glued(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            glued: true,
        }
    }
}

/// Snapshot of a reader position, see [`TokenReader::save`]
#[derive(Clone)]
pub struct ReaderPosition<'src> {
    lexer: Lexer<'src, RawToken>,
    pending: Vec<String>,
}

/// Whitespace-delimited token stream over one source text
pub struct TokenReader<'src> {
    lexer: Lexer<'src, RawToken>,
    /// Glued fragments waiting to be read; the last element is returned first
    pending: Vec<String>,
}

impl<'src> TokenReader<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            lexer: RawToken::lexer(source),
            pending: Vec::new(),
        }
    }

    /// Read the next token, glued fragments first
    pub fn next_token(&mut self) -> Option<Token> {
        if let Some(fragment) = self.pending.pop() {
            return Some(Token::glued(fragment));
        }
        loop {
            match self.lexer.next()? {
                Ok(RawToken::Word) => return Some(Token::new(self.lexer.slice())),
                Err(()) => continue,
            }
        }
    }

    /// Push back a fragment that belongs directly after the token just read
    pub fn unread_glued(&mut self, fragment: impl Into<String>) {
        let fragment = fragment.into();
        if !fragment.is_empty() {
            self.pending.push(fragment);
        }
    }

    pub fn save(&self) -> ReaderPosition<'src> {
        ReaderPosition {
            lexer: self.lexer.clone(),
            pending: self.pending.clone(),
        }
    }

    pub fn restore(&mut self, position: ReaderPosition<'src>) {
        self.lexer = position.lexer;
        self.pending = position.pending;
    }

    /// Look at the next token without consuming it
    pub fn peek(&mut self) -> Option<Token> {
        let position = self.save();
        let token = self.next_token();
        self.restore(position);
        token
    }

    /// Whether the next token starts with a closing command marker such as `*/b*`
    pub fn peek_is_closing_command(&mut self) -> bool {
        match self.peek() {
            Some(token) => {
                let parts = split(&token.text);
                parts.leading.is_empty()
                    && matches!(parts.core, Core::Command(command) if command.closing)
            }
            None => false,
        }
    }

    /// Read raw text up to a literal terminator, collapsing whitespace runs to one space
    ///
    /// The terminator is consumed. Returns `None` when the terminator never appears, in
    /// which case the rest of the input has been consumed.
    pub fn read_raw_until(&mut self, terminator: &str) -> Option<String> {
        self.read_exact_until(terminator)
            .map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
    }

    /// Read text up to a literal terminator, preserving it exactly
    ///
    /// A blank first line (the rest of the line holding the opening marker) is dropped, as
    /// is trailing whitespace.
    pub fn read_verbatim_until(&mut self, terminator: &str) -> Option<String> {
        self.read_exact_until(terminator).map(|text| {
            let body = match text.find('\n') {
                Some(newline) if text[..newline].trim().is_empty() => &text[newline + 1..],
                _ => text.strip_prefix(' ').unwrap_or(&text),
            };
            body.trim_end().to_string()
        })
    }

    /// Character-level read up to (and consuming) `terminator`
    pub fn read_until_char(&mut self, terminator: char) -> Option<String> {
        let mut buffer = [0u8; 4];
        self.read_exact_until(terminator.encode_utf8(&mut buffer))
    }

    /// Read the characters between the read position and the next whitespace
    pub fn read_token_remainder(&mut self) -> String {
        let mut text = self.take_pending();
        let remainder = self.lexer.remainder();
        let end = remainder
            .find(|c: char| c.is_whitespace())
            .unwrap_or(remainder.len());
        text.push_str(&remainder[..end]);
        self.lexer.bump(end);
        text
    }

    fn read_exact_until(&mut self, terminator: &str) -> Option<String> {
        let pending = self.take_pending();
        let remainder = self.lexer.remainder();
        let combined = format!("{pending}{remainder}");

        let Some(index) = combined.find(terminator) else {
            self.lexer.bump(remainder.len());
            return None;
        };

        let end = index + terminator.len();
        if end <= pending.len() {
            self.unread_glued(&pending[end..]);
        } else {
            self.lexer.bump(end - pending.len());
            // Text directly after the terminator belongs to the same word
            let trailing = self.read_token_remainder();
            self.unread_glued(trailing);
        }
        Some(combined[..index].to_string())
    }

    fn take_pending(&mut self) -> String {
        let mut text = String::new();
        while let Some(fragment) = self.pending.pop() {
            text.push_str(&fragment);
        }
        text
    }
}

impl Iterator for TokenReader<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        self.next_token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(source: &str) -> Vec<String> {
        TokenReader::new(source).map(|t| t.text).collect()
    }

    #[test]
    fn test_splits_on_whitespace() {
        assert_eq!(
            texts("  *section*\n\tHello   world\r\n"),
            vec!["*section*", "Hello", "world"]
        );
    }

    #[test]
    fn test_empty_input() {
        assert!(texts("").is_empty());
        assert!(texts(" \n\t ").is_empty());
    }

    #[test]
    fn test_glued_fragment_is_returned_first() {
        let mut reader = TokenReader::new("a b");
        assert_eq!(reader.next_token(), Some(Token::new("a")));
        reader.unread_glued("!");
        assert_eq!(reader.next_token(), Some(Token::glued("!")));
        assert_eq!(reader.next_token(), Some(Token::new("b")));
        assert_eq!(reader.next_token(), None);
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut reader = TokenReader::new("one */b* two");
        reader.next_token();
        assert!(reader.peek_is_closing_command());
        assert_eq!(reader.peek(), Some(Token::new("*/b*")));
        assert_eq!(reader.next_token(), Some(Token::new("*/b*")));
        assert!(!reader.peek_is_closing_command());
    }

    #[test]
    fn test_save_and_restore() {
        let mut reader = TokenReader::new("a b c");
        reader.next_token();
        let position = reader.save();
        reader.next_token();
        reader.next_token();
        reader.restore(position);
        assert_eq!(reader.next_token(), Some(Token::new("b")));
    }

    #[test]
    fn test_read_raw_until_collapses_whitespace() {
        let mut reader = TokenReader::new("*title*  A  long\n   title */title* next");
        reader.next_token();
        assert_eq!(
            reader.read_raw_until("*/title*"),
            Some("A long title".to_string())
        );
        assert_eq!(reader.next_token(), Some(Token::new("next")));
    }

    #[test]
    fn test_read_raw_until_uses_pending_fragment() {
        let mut reader = TokenReader::new("*title*My title*/title*, rest");
        reader.next_token();
        reader.unread_glued("My");
        assert_eq!(
            reader.read_raw_until("*/title*"),
            Some("My title".to_string())
        );
        assert_eq!(reader.next_token(), Some(Token::glued(",")));
        assert_eq!(reader.next_token(), Some(Token::new("rest")));
    }

    #[test]
    fn test_read_raw_until_terminator_inside_pending() {
        let mut reader = TokenReader::new("x");
        reader.unread_glued("Foo*/title*!");
        assert_eq!(reader.read_raw_until("*/title*"), Some("Foo".to_string()));
        assert_eq!(reader.next_token(), Some(Token::glued("!")));
        assert_eq!(reader.next_token(), Some(Token::new("x")));
    }

    #[test]
    fn test_read_raw_until_missing_terminator() {
        let mut reader = TokenReader::new("a b c");
        assert_eq!(reader.read_raw_until("*/x*"), None);
        assert_eq!(reader.next_token(), None);
    }

    #[test]
    fn test_read_verbatim_keeps_layout() {
        let source = "*code*\n  if a * b {\n      go();\n  }\n*/code*";
        let mut reader = TokenReader::new(source);
        reader.next_token();
        assert_eq!(
            reader.read_verbatim_until("*/code*"),
            Some("  if a * b {\n      go();\n  }".to_string())
        );
    }

    #[test]
    fn test_read_until_char_then_trailing() {
        let mut reader = TokenReader::new("$a + b$. next");
        reader.next_token();
        assert_eq!(reader.read_until_char('$'), Some(" + b".to_string()));
        assert_eq!(reader.next_token(), Some(Token::glued(".")));
        assert_eq!(reader.next_token(), Some(Token::new("next")));
    }
}
