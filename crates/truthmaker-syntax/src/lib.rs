#![doc = include_str!("../README.md")]

pub mod errors;
pub mod formula;
pub mod parser;
#[cfg(any(test, feature = "proptest"))]
pub mod proptest_generators;
pub mod registry;

pub use errors::{ParseError, SyntaxErrorKind};
pub use formula::{CanonId, FormulaArena, LetterId, Node, NodeId, Sentence, Span, Syntax};
pub use parser::{parse_argument, parse_sentence, tokenize, Token, TokenKind, MAX_DEPTH};
pub use registry::{Connective, OperatorRegistry, OperatorSpec, RegistryError};
