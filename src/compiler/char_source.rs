//! The character-level input boundary of the tokenizer.

use std::fmt::{self, Display, Formatter};
use std::iter::Peekable;
use std::str::Chars;

/// A line and column in the source, both counted from 1.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SourcePos {
    pub line: u32,
    pub column: u32,
}

impl SourcePos {
    pub fn new(line: u32, column: u32) -> Self {
        SourcePos { line, column }
    }
}

impl Display for SourcePos {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Anything the tokenizer can pull characters from.
pub trait CharSource {
    fn has_next(&mut self) -> bool;
    fn peek(&mut self) -> Option<char>;
    fn next(&mut self) -> Option<char>;
    /// The position of the character `peek` would return.
    fn current_position(&self) -> SourcePos;
}

/// A `CharSource` over an in-memory string.
#[derive(Debug)]
pub struct CharStream<'a> {
    iter: Peekable<Chars<'a>>,
    pos: SourcePos,
}

impl<'a> CharStream<'a> {
    pub fn new(source: &'a str) -> Self {
        CharStream {
            iter: source.chars().peekable(),
            pos: SourcePos::new(1, 1),
        }
    }
}

impl CharSource for CharStream<'_> {
    fn has_next(&mut self) -> bool {
        self.iter.peek().is_some()
    }

    fn peek(&mut self) -> Option<char> {
        self.iter.peek().copied()
    }

    fn next(&mut self) -> Option<char> {
        let c = self.iter.next()?;
        if c == '\n' {
            self.pos.line += 1;
            self.pos.column = 1;
        } else {
            self.pos.column += 1;
        }
        Some(c)
    }

    fn current_position(&self) -> SourcePos {
        self.pos
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positions() {
        let mut stream = CharStream::new("ab\nc");
        assert_eq!(stream.current_position(), SourcePos::new(1, 1));
        stream.next();
        stream.next();
        assert_eq!(stream.current_position(), SourcePos::new(1, 3));
        assert_eq!(stream.next(), Some('\n'));
        assert_eq!(stream.current_position(), SourcePos::new(2, 1));
        assert_eq!(stream.peek(), Some('c'));
        assert!(stream.has_next());
        stream.next();
        assert!(!stream.has_next());
        assert_eq!(stream.next(), None);
    }
}
