use crate::tree::NodeId;
use thiserror::Error;

pub type ParseResult<T> = Result<T, ParseError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Unexpected token at {pos}: expected {expected}, found {found}")]
    UnexpectedToken {
        pos: usize,
        expected: String,
        found: String,
    },

    #[error("Unexpected end of file at {pos}")]
    UnexpectedEof { pos: usize },

    #[error("Invalid syntax at {pos}: {message}")]
    InvalidSyntax { pos: usize, message: String },

    #[error("Mismatched end tag at {pos}: expected </{expected}>, found </{found}>")]
    MismatchedTag {
        pos: usize,
        expected: String,
        found: String,
    },

    #[error("Element <{name}> opened at {pos} is never closed")]
    UnclosedElement { pos: usize, name: String },

    #[error("Lexer error at {pos}")]
    LexerError { pos: usize },
}

impl ParseError {
    pub fn unexpected_token(pos: usize, expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::UnexpectedToken {
            pos,
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub fn unexpected_eof(pos: usize) -> Self {
        Self::UnexpectedEof { pos }
    }

    pub fn invalid_syntax(pos: usize, message: impl Into<String>) -> Self {
        Self::InvalidSyntax {
            pos,
            message: message.into(),
        }
    }

    pub fn lexer_error(pos: usize) -> Self {
        Self::LexerError { pos }
    }

    /// Byte offset the error points at
    pub fn pos(&self) -> usize {
        match self {
            ParseError::UnexpectedToken { pos, .. }
            | ParseError::UnexpectedEof { pos }
            | ParseError::InvalidSyntax { pos, .. }
            | ParseError::MismatchedTag { pos, .. }
            | ParseError::UnclosedElement { pos, .. }
            | ParseError::LexerError { pos } => *pos,
        }
    }

    /// Lexer failures abort parsing; everything else is a structural
    /// problem the parser recovers from.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ParseError::LexerError { .. })
    }
}

/// Errors raised by tree mutations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TreeError {
    #[error("Invalid node {node}: {reason}")]
    InvalidNode { node: NodeId, reason: String },

    #[error("Malformed fragment: {0}")]
    MalformedFragment(String),
}

impl TreeError {
    pub fn invalid(node: NodeId, reason: impl Into<String>) -> Self {
        Self::InvalidNode {
            node,
            reason: reason.into(),
        }
    }
}

/// Pretty-print a parse error with source context using ariadne
#[cfg(feature = "pretty-errors")]
pub fn format_error(source: &str, filename: &str, error: &ParseError) -> String {
    use ariadne::{Color, Label, Report, ReportKind, Source};

    let start = error.pos().min(source.len());
    let end = (start + 1).min(source.len()).max(start);
    let label = match error {
        ParseError::UnexpectedToken { expected, .. } => format!("expected {}", expected),
        ParseError::MismatchedTag { expected, .. } => format!("expected </{}>", expected),
        ParseError::UnclosedElement { name, .. } => format!("<{}> opened here", name),
        ParseError::InvalidSyntax { message, .. } => message.clone(),
        ParseError::UnexpectedEof { .. } => "input ends here".to_string(),
        ParseError::LexerError { .. } => "unrecognised character".to_string(),
    };

    let report = Report::build(ReportKind::Error, filename, start)
        .with_message(error.to_string())
        .with_label(
            Label::new((filename, start..end))
                .with_color(Color::Red)
                .with_message(label),
        )
        .finish();

    let mut output = Vec::new();
    if report
        .write((filename, Source::from(source)), &mut output)
        .is_err()
    {
        return error.to_string();
    }

    String::from_utf8(output).unwrap_or_else(|_| error.to_string())
}
