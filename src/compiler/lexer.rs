//! This module contains the scanner and the lookahead buffer the parser reads from.

use crate::Error;
use crate::ErrorKind;
use crate::Result;

use super::token::{keyword_match, operator_match};
use super::CharSource;
use super::SourcePos;
use super::Token;
use super::TokenKind;
use super::TokenValue;

/// A `Tokenizer` is a wrapper around a `Lexer`. It provides a one-token
/// lookahead buffer and several helper methods.
#[derive(Debug)]
pub struct Tokenizer<S> {
    lexer: Lexer<S>,
    lookahead: Option<Token>,
}

/// A `Lexer` handles the raw conversion of characters to tokens.
#[derive(Debug)]
pub struct Lexer<S> {
    source: S,
}

impl<S: CharSource> Tokenizer<S> {
    pub fn new(source: S) -> Self {
        Tokenizer {
            lexer: Lexer::new(source),
            lookahead: None,
        }
    }

    /// Returns `true` unless the next token is the end of input.
    pub fn has_next(&mut self) -> Result<bool> {
        Ok(self.peek()?.kind != TokenKind::EndOfFile)
    }

    /// Return the next Token.
    pub fn next(&mut self) -> Result<Token> {
        match self.lookahead.take() {
            Some(token) => Ok(token),
            None => self.lexer.next_token(),
        }
    }

    pub fn peek(&mut self) -> Result<&Token> {
        let token = match self.lookahead.take() {
            Some(token) => token,
            None => self.lexer.next_token()?,
        };
        Ok(self.lookahead.insert(token))
    }

    /// Return the kind of the next token without popping it.
    pub fn peek_kind(&mut self) -> Result<TokenKind> {
        Ok(self.peek()?.kind)
    }

    pub fn check_kind(&mut self, expected: TokenKind) -> Result<bool> {
        Ok(self.peek_kind()? == expected)
    }

    /// Checks the next token's kind. If it matches `expected`, it is popped off
    /// and returned as `Some`. Else, we return `None`.
    pub fn try_pop(&mut self, expected: TokenKind) -> Result<Option<Token>> {
        if self.check_kind(expected)? {
            self.next().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Pulls a token off the input and checks it against `one_of`.
    pub fn expect(&mut self, one_of: &[TokenKind]) -> Result<Token> {
        let token = self.next()?;
        if one_of.contains(&token.kind) {
            Ok(token)
        } else {
            let kind = ErrorKind::Syntax(format!("unexpected token {}", token));
            Err(Error::new(kind, token.pos))
        }
    }
}

impl<S: CharSource> Lexer<S> {
    pub fn new(source: S) -> Self {
        Lexer { source }
    }

    pub fn next_token(&mut self) -> Result<Token> {
        loop {
            self.consume_whitespace();
            let pos = self.source.current_position();
            let first_char = match self.source.peek() {
                Some(c) => c,
                None => return Ok(Token::new(TokenKind::EndOfFile, pos)),
            };
            let token = match first_char {
                _ if first_char.is_ascii_digit() => self.lex_number(pos)?,
                '\'' => self.lex_char(pos)?,
                '"' => self.lex_string(pos)?,
                _ if first_char.is_alphabetic() => self.lex_word(pos),
                _ => match self.lex_operator(pos) {
                    Some(token) => token,
                    // A comment was skipped.
                    None => continue,
                },
            };
            return Ok(token);
        }
    }

    /// Consume any whitespace characters
    fn consume_whitespace(&mut self) {
        while let Some(c) = self.source.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.source.next();
        }
    }

    /// Move a character forward, only if the current character matches
    /// `expected`.
    fn try_next(&mut self, expected: char) -> bool {
        match self.source.peek() {
            Some(c) if c == expected => {
                self.source.next();
                true
            }
            _ => false,
        }
    }

    fn error(&self, message: impl Into<String>, pos: SourcePos) -> Error {
        Error::new(ErrorKind::Lex(message.into()), pos)
    }

    /// Reads `digits ('.' digits ([eE] [+-]? digits)?)?`.
    fn lex_number(&mut self, pos: SourcePos) -> Result<Token> {
        let mut text = String::new();
        self.lex_digits(&mut text);

        if !self.try_next('.') {
            return match text.parse::<u64>() {
                Ok(n) => Ok(Token::with_value(TokenKind::LiteralInt, pos, TokenValue::Int(n))),
                Err(_) => Err(self.error(format!("integer literal {} is too large", text), pos)),
            };
        }

        text.push('.');
        if self.lex_digits(&mut text) == 0 {
            return Err(self.error(format!("malformed number {}", text), pos));
        }
        if let Some(e) = self.source.peek().filter(|&c| c == 'e' || c == 'E') {
            self.source.next();
            text.push(e);
            if let Some(sign) = self.source.peek().filter(|&c| c == '+' || c == '-') {
                self.source.next();
                text.push(sign);
            }
            if self.lex_digits(&mut text) == 0 {
                return Err(self.error(format!("malformed exponent in {}", text), pos));
            }
        }

        match text.parse::<f64>() {
            Ok(x) if x.is_finite() => {
                Ok(Token::with_value(TokenKind::LiteralFloat, pos, TokenValue::Float(x)))
            }
            Ok(_) => Err(self.error(format!("float literal {} is out of range", text), pos)),
            Err(_) => Err(self.error(format!("malformed number {}", text), pos)),
        }
    }

    /// Read in an unbroken sequence of digits, returning how many were read.
    fn lex_digits(&mut self, text: &mut String) -> usize {
        let mut count = 0;
        while let Some(c) = self.source.peek() {
            if !c.is_ascii_digit() {
                break;
            }
            self.source.next();
            text.push(c);
            count += 1;
        }
        count
    }

    /// Tokenize a double-quoted string literal.
    fn lex_string(&mut self, pos: SourcePos) -> Result<Token> {
        self.source.next(); // opening quote
        let mut text = String::new();
        loop {
            match self.source.next() {
                None => return Err(self.error("unclosed string", pos)),
                Some('"') => break,
                Some('\\') => match self.source.next() {
                    None => return Err(self.error("unclosed string", pos)),
                    Some(c) => match unescape(c) {
                        Some(escaped) => text.push(escaped),
                        None => {
                            text.push('\\');
                            text.push(c);
                        }
                    },
                },
                Some(c) => text.push(c),
            }
        }
        Ok(Token::with_value(
            TokenKind::LiteralString,
            pos,
            TokenValue::Str(text),
        ))
    }

    /// Tokenize a character literal. It becomes an integer literal holding the
    /// character's code point.
    fn lex_char(&mut self, pos: SourcePos) -> Result<Token> {
        self.source.next(); // opening quote
        let value = match self.source.next() {
            Some('\\') => self.source.next().and_then(unescape),
            Some('\'') | Some('\n') | Some('\r') | None => None,
            Some(c) => Some(c),
        };
        match value {
            Some(c) if self.try_next('\'') => Ok(Token::with_value(
                TokenKind::LiteralInt,
                pos,
                TokenValue::Int(c as u64),
            )),
            _ => Err(self.error("invalid character literal", pos)),
        }
    }

    fn lex_word(&mut self, pos: SourcePos) -> Token {
        let mut word = String::new();
        while let Some(c) = self.source.peek() {
            if c.is_alphanumeric() || c == '_' {
                word.push(c);
                self.source.next();
            } else {
                break;
            }
        }

        match keyword_match(&word) {
            Some(kind) => Token::new(kind, pos),
            None => Token::with_value(TokenKind::Identifier, pos, TokenValue::Ident(word)),
        }
    }

    /// Reads an operator, preferring two-character operators. Returns `None`
    /// after skipping a `//` comment.
    fn lex_operator(&mut self, pos: SourcePos) -> Option<Token> {
        let first_char = self.source.next()?;
        if first_char == '/' && self.try_next('/') {
            while let Some(c) = self.source.next() {
                if c == '\n' {
                    break;
                }
            }
            return None;
        }

        if let Some(second_char) = self.source.peek() {
            let pair: String = [first_char, second_char].iter().collect();
            if let Some(kind) = operator_match(&pair) {
                self.source.next();
                return Some(Token::new(kind, pos));
            }
        }

        let kind =
            operator_match(first_char.encode_utf8(&mut [0; 4])).unwrap_or(TokenKind::Unknown);
        Some(Token::new(kind, pos))
    }
}

/// Translates the character after a backslash.
fn unescape(c: char) -> Option<char> {
    match c {
        '\\' => Some('\\'),
        '"' => Some('"'),
        '\'' => Some('\''),
        'n' => Some('\n'),
        't' => Some('\t'),
        'r' => Some('\r'),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::CharStream;

    use TokenKind::*;

    fn lex_all(input: &str) -> Result<Vec<Token>> {
        let mut lexer = Lexer::new(CharStream::new(input));
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token()?;
            if token.kind == EndOfFile {
                return Ok(tokens);
            }
            tokens.push(token);
        }
    }

    fn check(input: &str, kinds: &[TokenKind]) {
        let actual: Vec<TokenKind> = lex_all(input).unwrap().iter().map(|t| t.kind).collect();
        assert_eq!(kinds, actual.as_slice());
    }

    fn single_value(input: &str) -> TokenValue {
        let tokens = lex_all(input).unwrap();
        assert_eq!(tokens.len(), 1);
        tokens[0].value.clone().unwrap()
    }

    fn lex_error(input: &str) -> bool {
        matches!(
            lex_all(input),
            Err(Error {
                kind: ErrorKind::Lex(_),
                ..
            })
        )
    }

    #[test]
    fn test_lexer01() {
        check("50", &[LiteralInt]);
        assert_eq!(single_value("50"), TokenValue::Int(50));
    }

    #[test]
    fn test_lexer02() {
        check(
            "let x: int = 4;",
            &[Let, Identifier, Colon, Identifier, Assign, LiteralInt, Semicolon],
        );
    }

    #[test]
    fn test_lexer03() {
        check("x1_y", &[Identifier]);
        assert_eq!(single_value("x1_y"), TokenValue::Ident("x1_y".into()));
    }

    #[test]
    fn test_lexer04() {
        check("a<=b==c!=d>=e->f", &[
            Identifier, Le, Identifier, Eq, Identifier, Neq, Identifier, Ge, Identifier, Arrow,
            Identifier,
        ]);
    }

    #[test]
    fn test_lexer05() {
        check("1-2", &[LiteralInt, Minus, LiteralInt]);
        check(
            "fn main() -> void {}",
            &[Fn, Identifier, LParen, RParen, Arrow, Identifier, LBrace, RBrace],
        );
    }

    #[test]
    fn test_floats() {
        assert_eq!(single_value("3.25"), TokenValue::Float(3.25));
        assert_eq!(single_value("1.5e2"), TokenValue::Float(150.0));
        assert_eq!(single_value("2.0E-1"), TokenValue::Float(0.2));
        assert!(lex_error("1."));
        assert!(lex_error("1.0e"));
        assert!(lex_error("99999999999999999999999"));
        assert!(lex_error("1.0e400"));
    }

    #[test]
    fn test_printed_literals_lex_back() {
        let pos = SourcePos::new(1, 1);
        let big = Token::with_value(LiteralFloat, pos, TokenValue::Float(1e20));
        assert_eq!(big.to_string(), "1.0e20");
        assert_eq!(single_value(&big.to_string()), TokenValue::Float(1e20));

        let text = "say \"hi\"\n\\";
        let s = Token::with_value(LiteralString, pos, TokenValue::Str(text.into()));
        assert_eq!(single_value(&s.to_string()), TokenValue::Str(text.into()));
    }

    #[test]
    fn test_strings() {
        assert_eq!(single_value(r#""hi""#), TokenValue::Str("hi".into()));
        assert_eq!(
            single_value(r#""a\n\t\"\\\q""#),
            TokenValue::Str("a\n\t\"\\\\q".into())
        );
        assert!(lex_error("\"abc"));
        assert!(lex_error("\"abc\\"));
    }

    #[test]
    fn test_chars() {
        assert_eq!(single_value("'a'"), TokenValue::Int(97));
        assert_eq!(single_value(r"'\n'"), TokenValue::Int(10));
        assert_eq!(single_value(r"'\''"), TokenValue::Int(39));
        assert!(lex_error("''"));
        assert!(lex_error("'ab'"));
        assert!(lex_error(r"'\q'"));
        assert!(lex_error("'a"));
    }

    #[test]
    fn test_comments() {
        check("// nothing\n1 // one\n// two", &[LiteralInt]);
        check("4 / 2", &[LiteralInt, Div, LiteralInt]);
    }

    #[test]
    fn test_unknown() {
        check("a ! b", &[Identifier, Unknown, Identifier]);
        check("#", &[Unknown]);
    }

    #[test]
    fn test_positions() {
        let tokens = lex_all("let\n  x").unwrap();
        assert_eq!(tokens[0].pos, SourcePos::new(1, 1));
        assert_eq!(tokens[1].pos, SourcePos::new(2, 3));
    }

    #[test]
    fn test_tokenizer_lookahead() {
        let mut tokens = Tokenizer::new(CharStream::new("a + 1"));
        assert!(tokens.has_next().unwrap());
        assert_eq!(tokens.peek_kind().unwrap(), Identifier);
        assert_eq!(tokens.peek_kind().unwrap(), Identifier);
        assert_eq!(tokens.next().unwrap().ident(), Some("a"));
        assert!(tokens.try_pop(Minus).unwrap().is_none());
        assert!(tokens.try_pop(Plus).unwrap().is_some());
        let err = tokens.expect(&[Identifier]).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Syntax(_)));
        assert!(!tokens.has_next().unwrap());
    }

    #[test]
    fn test_expect_accepts_any_listed_kind() {
        let mut tokens = Tokenizer::new(CharStream::new("const"));
        let token = tokens.expect(&[Let, Const]).unwrap();
        assert_eq!(token.kind, Const);
    }
}
