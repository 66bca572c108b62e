use std::fmt::{self, Display, Formatter};

use super::SourcePos;

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: SourcePos,
    pub value: Option<TokenValue>,
}

/// The payload of a literal or identifier token.
#[derive(Clone, Debug, PartialEq)]
pub enum TokenValue {
    Int(u64),
    Float(f64),
    Str(String),
    Ident(String),
}

#[rustfmt::skip]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    // Keywords
    Fn, Let, Const, As, While, If, Else, Return, Break, Continue,
    // Arithmetic
    Plus, Minus, Mul, Div, Assign,
    // Comparisons
    Eq, Neq, Lt, Gt, Le, Ge,
    // L/R stuff
    LParen, RParen, LBrace, RBrace,
    // Other symbols
    Arrow, Comma, Colon, Semicolon,
    // Others
    Identifier,
    LiteralInt,
    LiteralFloat,
    LiteralString,

    EndOfFile,
    Unknown,
}

impl Token {
    pub fn new(kind: TokenKind, pos: SourcePos) -> Self {
        Token {
            kind,
            pos,
            value: None,
        }
    }

    pub fn with_value(kind: TokenKind, pos: SourcePos, value: TokenValue) -> Self {
        Token {
            kind,
            pos,
            value: Some(value),
        }
    }

    /// The text of an identifier token.
    pub fn ident(&self) -> Option<&str> {
        match &self.value {
            Some(TokenValue::Ident(name)) => Some(name),
            _ => None,
        }
    }
}

impl TokenKind {
    /// Binding strength of a binary operator; `None` for every other kind.
    pub fn priority(self) -> Option<u8> {
        use TokenKind::*;
        match self {
            Assign => Some(1),
            Eq | Neq | Lt | Gt | Le | Ge => Some(2),
            Plus | Minus => Some(3),
            Mul | Div => Some(4),
            _ => None,
        }
    }

    pub fn is_right_assoc(self) -> bool {
        self == TokenKind::Assign
    }

    pub fn is_literal(self) -> bool {
        use TokenKind::*;
        matches!(self, LiteralInt | LiteralFloat | LiteralString)
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(TokenValue::Int(i)) => write!(f, "{}", i),
            Some(TokenValue::Float(x)) => write!(f, "{}", float_literal(*x)),
            Some(TokenValue::Str(s)) => write!(f, "\"{}\"", escape(s)),
            Some(TokenValue::Ident(name)) => write!(f, "`{}`", name),
            None => write!(f, "{:?}", self.kind),
        }
    }
}

/// Spells a float the way the lexer reads it back: a fraction is always
/// present, and precedes any exponent.
fn float_literal(x: f64) -> String {
    let text = format!("{:?}", x);
    match text.split_once('e') {
        Some((mantissa, exp)) if !mantissa.contains('.') => format!("{}.0e{}", mantissa, exp),
        _ => text,
    }
}

/// The inverse of the escapes the lexer understands inside string literals.
fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}

pub(super) fn keyword_match(s: &str) -> Option<TokenKind> {
    use TokenKind::*;
    let kind = match s {
        "fn" => Fn,
        "let" => Let,
        "const" => Const,
        "as" => As,
        "while" => While,
        "if" => If,
        "else" => Else,
        "return" => Return,
        "break" => Break,
        "continue" => Continue,
        _ => return None,
    };
    Some(kind)
}

pub(super) fn operator_match(s: &str) -> Option<TokenKind> {
    use TokenKind::*;
    let kind = match s {
        "+" => Plus,
        "-" => Minus,
        "*" => Mul,
        "/" => Div,
        "=" => Assign,
        "==" => Eq,
        "!=" => Neq,
        "<" => Lt,
        ">" => Gt,
        "<=" => Le,
        ">=" => Ge,
        "(" => LParen,
        ")" => RParen,
        "{" => LBrace,
        "}" => RBrace,
        "->" => Arrow,
        "," => Comma,
        ":" => Colon,
        ";" => Semicolon,
        _ => return None,
    };
    Some(kind)
}
