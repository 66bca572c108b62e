use crate::compiler::SourcePos;

/// An error raised while compiling a C0 program. Every error is fatal.
#[derive(Debug, PartialEq, thiserror::Error)]
#[error("{kind}{}", at(.pos))]
pub struct Error {
    pub kind: ErrorKind,
    /// Where in the source the error was detected, if it came from the source.
    pub pos: Option<SourcePos>,
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum ErrorKind {
    /// A malformed literal or an unterminated string or character.
    #[error("lexical error: {0}")]
    Lex(String),
    /// A token appeared where it is not allowed.
    #[error("syntax error: {0}")]
    Syntax(String),
    /// An operator or statement was applied to values of the wrong type.
    #[error("type error: {0}")]
    Type(String),
    /// A name was declared twice in the same scope.
    #[error("duplicate definition of `{0}`")]
    DuplicateDefinition(String),
    /// A name could not be found in any active scope.
    #[error("undefined symbol `{0}`")]
    UndefinedSymbol(String),
    /// Scopes, functions or loops were opened and closed out of order.
    #[error("structural error: {0}")]
    Structural(String),
    /// The program could not be linked.
    #[error("link error: {0}")]
    FatalLink(String),
    /// The compiler reached a state that the parser should have ruled out.
    #[error("internal error: {0}")]
    Internal(String),
    /// The output sink failed.
    #[error("io error: {0}")]
    Io(String),
}

impl Error {
    pub fn new(kind: ErrorKind, pos: SourcePos) -> Self {
        Self {
            kind,
            pos: Some(pos),
        }
    }

    /// An error that is not tied to a source location, such as a link failure.
    pub fn unpositioned(kind: ErrorKind) -> Self {
        Self { kind, pos: None }
    }

    /// Attaches `pos` unless the error already has a position.
    pub(crate) fn or_at(mut self, pos: SourcePos) -> Self {
        self.pos.get_or_insert(pos);
        self
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self::unpositioned(kind)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::unpositioned(ErrorKind::Io(e.to_string()))
    }
}

fn at(pos: &Option<SourcePos>) -> String {
    match pos {
        Some(pos) => format!(" at {}", pos),
        None => String::new(),
    }
}
