#![allow(unused_assignments)]

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::formula::Span;

/// Category of a [`ParseError`], independent of its source context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyntaxErrorKind {
    UnbalancedParentheses,
    UnknownOperator,
    ArityMismatch,
    UnexpectedToken,
    UnexpectedEnd,
    InvalidToken,
    NestingTooDeep,
}

#[derive(Debug, Error, Diagnostic)]
pub enum ParseError {
    #[error("Unbalanced parentheses")]
    #[diagnostic(
        code(truthmaker::parse::unbalanced),
        help("every `(` needs a matching `)`")
    )]
    UnbalancedParentheses {
        #[label("unmatched")]
        span: SourceSpan,
        #[source_code]
        src: NamedSource<String>,
    },

    #[error("Unknown operator `{symbol}`")]
    #[diagnostic(code(truthmaker::parse::unknown_operator))]
    UnknownOperator {
        symbol: String,
        #[label("not registered by the active theory")]
        span: SourceSpan,
        #[source_code]
        src: NamedSource<String>,
    },

    #[error("Operator `{symbol}` takes {arity} argument(s) but {usage}")]
    #[diagnostic(
        code(truthmaker::parse::arity),
        help("binary operators sit between operands inside parentheses; unary and nullary operators are never parenthesised")
    )]
    ArityMismatch {
        symbol: String,
        arity: usize,
        usage: String,
        #[label("wrong arity")]
        span: SourceSpan,
        #[source_code]
        src: NamedSource<String>,
    },

    #[error("Unexpected token: expected {expected}, found {found}")]
    #[diagnostic(code(truthmaker::parse::unexpected))]
    UnexpectedToken {
        expected: String,
        found: String,
        #[label("unexpected token")]
        span: SourceSpan,
        #[source_code]
        src: NamedSource<String>,
    },

    #[error("Unexpected end of input: expected {expected}")]
    #[diagnostic(code(truthmaker::parse::eof))]
    UnexpectedEnd {
        expected: String,
        #[label("input ends here")]
        span: SourceSpan,
        #[source_code]
        src: NamedSource<String>,
    },

    #[error("Invalid token: {message}")]
    #[diagnostic(code(truthmaker::parse::token))]
    InvalidToken {
        message: String,
        #[label("here")]
        span: SourceSpan,
        #[source_code]
        src: NamedSource<String>,
    },

    #[error("Sentence nests deeper than {limit} levels")]
    #[diagnostic(
        code(truthmaker::parse::depth),
        help("split the argument into shorter sentences")
    )]
    NestingTooDeep {
        limit: usize,
        #[label("limit reached here")]
        span: SourceSpan,
        #[source_code]
        src: NamedSource<String>,
    },
}

/// Source text and name attached to every error raised while parsing one
/// sentence.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SourceRef<'a> {
    pub source: &'a str,
    pub filename: &'a str,
}

impl<'a> SourceRef<'a> {
    pub fn new(source: &'a str, filename: &'a str) -> Self {
        Self { source, filename }
    }

    fn named(&self) -> NamedSource<String> {
        NamedSource::new(self.filename, self.source.to_owned())
    }

    pub fn unbalanced(&self, span: Span) -> ParseError {
        ParseError::UnbalancedParentheses {
            span: span.into(),
            src: self.named(),
        }
    }

    pub fn unknown_operator(&self, symbol: &str, span: Span) -> ParseError {
        ParseError::UnknownOperator {
            symbol: symbol.to_string(),
            span: span.into(),
            src: self.named(),
        }
    }

    pub fn arity(&self, symbol: &str, arity: usize, usage: impl Into<String>, span: Span) -> ParseError {
        ParseError::ArityMismatch {
            symbol: symbol.to_string(),
            arity,
            usage: usage.into(),
            span: span.into(),
            src: self.named(),
        }
    }

    pub fn unexpected(&self, expected: impl Into<String>, found: &str, span: Span) -> ParseError {
        ParseError::UnexpectedToken {
            expected: expected.into(),
            found: format!("`{found}`"),
            span: span.into(),
            src: self.named(),
        }
    }

    pub fn end(&self, expected: impl Into<String>) -> ParseError {
        let at = self.source.len();
        ParseError::UnexpectedEnd {
            expected: expected.into(),
            span: Span::new(at, at).into(),
            src: self.named(),
        }
    }

    pub fn invalid(&self, message: impl Into<String>, span: Span) -> ParseError {
        ParseError::InvalidToken {
            message: message.into(),
            span: span.into(),
            src: self.named(),
        }
    }

    pub fn too_deep(&self, limit: usize, span: Span) -> ParseError {
        ParseError::NestingTooDeep {
            limit,
            span: span.into(),
            src: self.named(),
        }
    }
}

impl ParseError {
    pub fn kind(&self) -> SyntaxErrorKind {
        match self {
            ParseError::UnbalancedParentheses { .. } => SyntaxErrorKind::UnbalancedParentheses,
            ParseError::UnknownOperator { .. } => SyntaxErrorKind::UnknownOperator,
            ParseError::ArityMismatch { .. } => SyntaxErrorKind::ArityMismatch,
            ParseError::UnexpectedToken { .. } => SyntaxErrorKind::UnexpectedToken,
            ParseError::UnexpectedEnd { .. } => SyntaxErrorKind::UnexpectedEnd,
            ParseError::InvalidToken { .. } => SyntaxErrorKind::InvalidToken,
            ParseError::NestingTooDeep { .. } => SyntaxErrorKind::NestingTooDeep,
        }
    }

    /// Byte range the error points at.
    pub fn span(&self) -> Span {
        let span = match self {
            ParseError::UnbalancedParentheses { span, .. }
            | ParseError::UnknownOperator { span, .. }
            | ParseError::ArityMismatch { span, .. }
            | ParseError::UnexpectedToken { span, .. }
            | ParseError::UnexpectedEnd { span, .. }
            | ParseError::InvalidToken { span, .. }
            | ParseError::NestingTooDeep { span, .. } => span,
        };
        Span::new(span.offset(), span.offset() + span.len())
    }
}
