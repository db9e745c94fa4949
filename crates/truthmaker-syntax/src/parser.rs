#![allow(clippy::result_large_err)]

use pest::Parser;
use pest_derive::Parser;

use crate::errors::{ParseError, SourceRef};
use crate::formula::{FormulaArena, NodeId, Sentence, Span, Syntax};
use crate::registry::{OperatorRegistry, OperatorSpec};

#[derive(Parser)]
#[grammar = "grammar.pest"]
struct SentenceParser;

/// Deepest nesting of operators and parentheses a sentence may have.
pub const MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    LParen,
    RParen,
    Letter,
    Operator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub span: Span,
}

/// Split a sentence into parentheses, letters and operator symbols.
pub fn tokenize<'a>(source: &'a str, filename: &str) -> Result<Vec<Token<'a>>, ParseError> {
    let src = SourceRef::new(source, filename);
    let pairs = SentenceParser::parse(Rule::tokens, source).map_err(|e| {
        let (start, end) = match e.location {
            pest::error::InputLocation::Pos(p) => (p, p + 1),
            pest::error::InputLocation::Span((s, e)) => (s, e),
        };
        let end = end.min(source.len()).max(start);
        let text = source.get(start..).and_then(|s| s.chars().next());
        let message = match text {
            Some('\\') => "`\\` must be followed by an operator name".to_string(),
            Some(c) => format!("unrecognised character `{c}`"),
            None => "unrecognised input".to_string(),
        };
        src.invalid(message, Span::new(start, end))
    })?;

    let mut tokens = Vec::new();
    for pair in pairs.flat_map(|p| p.into_inner()) {
        let kind = match pair.as_rule() {
            Rule::lparen => TokenKind::LParen,
            Rule::rparen => TokenKind::RParen,
            Rule::letter => TokenKind::Letter,
            Rule::command | Rule::symbol => TokenKind::Operator,
            _ => continue,
        };
        let span = pair.as_span();
        tokens.push(Token {
            kind,
            text: pair.as_str(),
            span: Span::new(span.start(), span.end()),
        });
    }
    Ok(tokens)
}

fn check_balance(tokens: &[Token<'_>], src: &SourceRef<'_>) -> Result<(), ParseError> {
    let mut open: Vec<Span> = Vec::new();
    for tok in tokens {
        match tok.kind {
            TokenKind::LParen => open.push(tok.span),
            TokenKind::RParen => {
                if open.pop().is_none() {
                    return Err(src.unbalanced(tok.span));
                }
            }
            _ => {}
        }
    }
    match open.pop() {
        Some(span) => Err(src.unbalanced(span)),
        None => Ok(()),
    }
}

struct Cursor<'t, 'a> {
    tokens: &'t [Token<'a>],
    pos: usize,
    depth: usize,
    src: SourceRef<'a>,
    registry: &'t OperatorRegistry,
    arena: &'t mut FormulaArena,
}

impl<'t, 'a> Cursor<'t, 'a> {
    fn peek(&self) -> Option<Token<'a>> {
        self.tokens.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<Token<'a>> {
        let tok = self.peek();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn operator(&self, tok: &Token<'a>) -> Result<&'t OperatorSpec, ParseError> {
        self.registry
            .lookup(tok.text)
            .ok_or_else(|| self.src.unknown_operator(tok.text, tok.span))
    }

    /// A letter, a nullary operator, a unary operator applied to a unit, or a
    /// parenthesised binary expression.
    fn unit(&mut self) -> Result<NodeId, ParseError> {
        let tok = self.next().ok_or_else(|| self.src.end("a sentence"))?;
        if self.depth >= MAX_DEPTH {
            return Err(self.src.too_deep(MAX_DEPTH, tok.span));
        }
        self.depth += 1;
        let node = self.unit_at(tok);
        self.depth -= 1;
        node
    }

    fn unit_at(&mut self, tok: Token<'a>) -> Result<NodeId, ParseError> {
        match tok.kind {
            TokenKind::Letter => Ok(self.arena.letter_at(tok.text, tok.span)),
            TokenKind::Operator => {
                let spec = self.operator(&tok)?;
                match spec.arity {
                    0 => Ok(self.arena.apply_at(spec.connective, vec![], tok.span)),
                    1 => {
                        let arg = self.unit()?;
                        let span = tok.span.join(self.arena.span(arg).unwrap_or(tok.span));
                        Ok(self.arena.apply_at(spec.connective, vec![arg], span))
                    }
                    n => Err(self.src.arity(
                        tok.text,
                        n,
                        "it is used in prefix position",
                        tok.span,
                    )),
                }
            }
            TokenKind::LParen => self.binary(tok.span),
            TokenKind::RParen => Err(self.src.unexpected("a sentence", tok.text, tok.span)),
        }
    }

    fn binary(&mut self, open: Span) -> Result<NodeId, ParseError> {
        let left = self.unit()?;
        let op = self.next().ok_or_else(|| self.src.end("a binary operator"))?;
        let spec = match op.kind {
            TokenKind::Operator => self.operator(&op)?,
            _ => {
                return Err(self.src.unexpected(
                    "a binary operator inside parentheses",
                    op.text,
                    op.span,
                ))
            }
        };
        if spec.arity != 2 {
            return Err(self.src.arity(
                op.text,
                spec.arity,
                "it is used between two operands",
                op.span,
            ));
        }
        let right = self.unit()?;
        let close = self.next().ok_or_else(|| self.src.end("`)`"))?;
        if close.kind != TokenKind::RParen {
            return Err(self.src.unexpected("`)`", close.text, close.span));
        }
        Ok(self
            .arena
            .apply_at(spec.connective, vec![left, right], open.join(close.span)))
    }

    /// Whole sentence. The outermost binary operator may omit its
    /// parentheses.
    fn sentence(&mut self) -> Result<NodeId, ParseError> {
        let first = self.unit()?;
        let Some(tok) = self.next() else {
            return Ok(first);
        };
        if tok.kind != TokenKind::Operator {
            return Err(self.src.unexpected("end of sentence", tok.text, tok.span));
        }
        let spec = self.operator(&tok)?;
        if spec.arity != 2 {
            return Err(self.src.arity(
                tok.text,
                spec.arity,
                "it is used between two operands",
                tok.span,
            ));
        }
        let right = self.unit()?;
        if let Some(extra) = self.next() {
            return Err(self.src.unexpected(
                "end of sentence; nested binary operators need parentheses",
                extra.text,
                extra.span,
            ));
        }
        let span = Span::new(0, self.src.source.len());
        Ok(self.arena.apply_at(spec.connective, vec![first, right], span))
    }
}

/// Parse one sentence into `arena`.
pub fn parse_sentence(
    arena: &mut FormulaArena,
    registry: &OperatorRegistry,
    source: &str,
    filename: &str,
) -> Result<NodeId, ParseError> {
    let src = SourceRef::new(source, filename);
    let tokens = tokenize(source, filename)?;
    check_balance(&tokens, &src)?;
    if tokens.is_empty() {
        return Err(src.end("a sentence"));
    }
    let mut cursor = Cursor {
        tokens: &tokens,
        pos: 0,
        depth: 0,
        src,
        registry,
        arena,
    };
    cursor.sentence()
}

/// Parse premises then conclusions into a shared arena.
pub fn parse_argument<P, C>(
    premises: &[P],
    conclusions: &[C],
    registry: &OperatorRegistry,
) -> Result<Syntax, ParseError>
where
    P: AsRef<str>,
    C: AsRef<str>,
{
    let mut syntax = Syntax::default();
    for (i, text) in premises.iter().enumerate() {
        let text = text.as_ref();
        let root = parse_sentence(&mut syntax.arena, registry, text, &format!("premise {}", i + 1))?;
        syntax.premises.push(Sentence {
            text: text.to_string(),
            root,
        });
    }
    for (i, text) in conclusions.iter().enumerate() {
        let text = text.as_ref();
        let root = parse_sentence(
            &mut syntax.arena,
            registry,
            text,
            &format!("conclusion {}", i + 1),
        )?;
        syntax.conclusions.push(Sentence {
            text: text.to_string(),
            root,
        });
    }
    Ok(syntax)
}
