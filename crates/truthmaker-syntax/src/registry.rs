//! Operator registry: maps surface symbols to connectives and arities.

use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;
use thiserror::Error;

/// Closed set of operator kinds a theory may give meaning to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum Connective {
    Neg,
    And,
    Or,
    Conditional,
    Biconditional,
    Top,
    Bottom,
    Necessity,
    Possibility,
    Counterfactual,
    MightCounterfactual,
    Identity,
    Ground,
    Essence,
    Relevance,
    Always,
    Eventually,
    Past,
    SometimePast,
    Next,
    Previous,
    Until,
    Since,
}

impl Connective {
    pub const ALL: [Connective; 23] = [
        Connective::Neg,
        Connective::And,
        Connective::Or,
        Connective::Conditional,
        Connective::Biconditional,
        Connective::Top,
        Connective::Bottom,
        Connective::Necessity,
        Connective::Possibility,
        Connective::Counterfactual,
        Connective::MightCounterfactual,
        Connective::Identity,
        Connective::Ground,
        Connective::Essence,
        Connective::Relevance,
        Connective::Always,
        Connective::Eventually,
        Connective::Past,
        Connective::SometimePast,
        Connective::Next,
        Connective::Previous,
        Connective::Until,
        Connective::Since,
    ];

    pub fn arity(self) -> usize {
        match self {
            Connective::Top | Connective::Bottom => 0,
            Connective::Neg
            | Connective::Necessity
            | Connective::Possibility
            | Connective::Always
            | Connective::Eventually
            | Connective::Past
            | Connective::SometimePast
            | Connective::Next
            | Connective::Previous => 1,
            _ => 2,
        }
    }

    /// LaTeX-style symbol used when printing.
    pub fn default_symbol(self) -> &'static str {
        match self {
            Connective::Neg => "\\neg",
            Connective::And => "\\wedge",
            Connective::Or => "\\vee",
            Connective::Conditional => "\\rightarrow",
            Connective::Biconditional => "\\leftrightarrow",
            Connective::Top => "\\top",
            Connective::Bottom => "\\bot",
            Connective::Necessity => "\\Box",
            Connective::Possibility => "\\Diamond",
            Connective::Counterfactual => "\\boxright",
            Connective::MightCounterfactual => "\\diamondright",
            Connective::Identity => "\\equiv",
            Connective::Ground => "\\leq",
            Connective::Essence => "\\sqsubseteq",
            Connective::Relevance => "\\preceq",
            Connective::Always => "\\Future",
            Connective::Eventually => "\\future",
            Connective::Past => "\\Past",
            Connective::SometimePast => "\\past",
            Connective::Next => "\\Next",
            Connective::Previous => "\\Previous",
            Connective::Until => "\\Until",
            Connective::Since => "\\Since",
        }
    }

    pub fn default_aliases(self) -> &'static [&'static str] {
        match self {
            Connective::Neg => &["¬", "~"],
            Connective::And => &["∧", "&"],
            Connective::Or => &["∨", "|"],
            Connective::Conditional => &["→"],
            Connective::Biconditional => &["↔"],
            Connective::Top => &["⊤"],
            Connective::Bottom => &["⊥"],
            Connective::Necessity => &["□"],
            Connective::Possibility => &["◇"],
            Connective::Identity => &["≡"],
            Connective::Ground => &["≤"],
            Connective::Essence => &["⊑"],
            Connective::Relevance => &["⪯"],
            Connective::Always => &["\\Always"],
            Connective::Eventually => &["\\Eventually"],
            Connective::Next => &["○"],
            _ => &[],
        }
    }
}

impl fmt::Display for Connective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.default_symbol())
    }
}

/// Registration record for one operator.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct OperatorSpec {
    pub connective: Connective,
    /// Printed symbol.
    pub symbol: String,
    /// Further symbols accepted by the parser.
    pub aliases: Vec<String>,
    pub arity: usize,
}

impl OperatorSpec {
    pub fn new(connective: Connective, symbol: impl Into<String>, arity: usize) -> Self {
        Self {
            connective,
            symbol: symbol.into(),
            aliases: Vec::new(),
            arity,
        }
    }

    /// The connective's default symbol, aliases and arity.
    pub fn standard(connective: Connective) -> Self {
        Self {
            connective,
            symbol: connective.default_symbol().to_string(),
            aliases: connective
                .default_aliases()
                .iter()
                .map(|a| a.to_string())
                .collect(),
            arity: connective.arity(),
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.symbol.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("symbol `{symbol}` is already bound to {existing}")]
    DuplicateSymbol { symbol: String, existing: Connective },
    #[error("operator {0} is already registered")]
    DuplicateOperator(Connective),
    #[error("operator `{symbol}` has arity {arity}; only 0, 1 and 2 are supported")]
    UnsupportedArity { symbol: String, arity: usize },
    #[error("`{0}` cannot be tokenized as an operator symbol")]
    InvalidSymbol(String),
}

/// A symbol the tokenizer produces as a single operator token: a LaTeX-style
/// command or one non-alphanumeric character.
fn is_valid_symbol(symbol: &str) -> bool {
    if let Some(rest) = symbol.strip_prefix('\\') {
        return !rest.is_empty() && rest.chars().all(|c| c.is_ascii_alphabetic());
    }
    let mut chars = symbol.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => {
            !c.is_ascii_alphanumeric() && !c.is_whitespace() && c != '(' && c != ')'
        }
        _ => false,
    }
}

#[derive(Debug, Clone, Default)]
pub struct OperatorRegistry {
    specs: IndexMap<Connective, OperatorSpec>,
    symbols: HashMap<String, Connective>,
}

impl OperatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the standard spec of each listed connective.
    pub fn with_standard(connectives: &[Connective]) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for &c in connectives {
            registry.register(OperatorSpec::standard(c))?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, spec: OperatorSpec) -> Result<(), RegistryError> {
        if spec.arity > 2 {
            return Err(RegistryError::UnsupportedArity {
                symbol: spec.symbol,
                arity: spec.arity,
            });
        }
        if self.specs.contains_key(&spec.connective) {
            return Err(RegistryError::DuplicateOperator(spec.connective));
        }
        let mut fresh: Vec<&str> = Vec::new();
        for symbol in spec.symbols() {
            if !is_valid_symbol(symbol) {
                return Err(RegistryError::InvalidSymbol(symbol.to_string()));
            }
            if let Some(&existing) = self.symbols.get(symbol) {
                return Err(RegistryError::DuplicateSymbol {
                    symbol: symbol.to_string(),
                    existing,
                });
            }
            if fresh.contains(&symbol) {
                return Err(RegistryError::DuplicateSymbol {
                    symbol: symbol.to_string(),
                    existing: spec.connective,
                });
            }
            fresh.push(symbol);
        }
        for symbol in spec.symbols() {
            self.symbols.insert(symbol.to_string(), spec.connective);
        }
        self.specs.insert(spec.connective, spec);
        Ok(())
    }

    pub fn lookup(&self, symbol: &str) -> Option<&OperatorSpec> {
        self.symbols.get(symbol).and_then(|c| self.specs.get(c))
    }

    pub fn spec(&self, connective: Connective) -> Option<&OperatorSpec> {
        self.specs.get(&connective)
    }

    pub fn contains(&self, connective: Connective) -> bool {
        self.specs.contains_key(&connective)
    }

    pub fn symbol(&self, connective: Connective) -> &str {
        self.specs
            .get(&connective)
            .map_or(connective.default_symbol(), |s| s.symbol.as_str())
    }

    /// Registered connectives in registration order.
    pub fn connectives(&self) -> impl Iterator<Item = Connective> + '_ {
        self.specs.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_specs_resolve_aliases() {
        let reg = OperatorRegistry::with_standard(&[Connective::Neg, Connective::And]).unwrap();
        assert_eq!(reg.lookup("¬").unwrap().connective, Connective::Neg);
        assert_eq!(reg.lookup("\\wedge").unwrap().arity, 2);
        assert!(reg.lookup("\\vee").is_none());
    }

    #[test]
    fn duplicate_symbol_is_a_configuration_error() {
        let mut reg = OperatorRegistry::with_standard(&[Connective::And]).unwrap();
        let clash = OperatorSpec::new(Connective::Or, "∧", 2);
        assert_eq!(
            reg.register(clash),
            Err(RegistryError::DuplicateSymbol {
                symbol: "∧".into(),
                existing: Connective::And
            })
        );
        // The failed registration left no partial state behind.
        assert!(!reg.contains(Connective::Or));
        assert!(reg.register(OperatorSpec::standard(Connective::Or)).is_ok());
    }

    #[test]
    fn duplicate_connective_is_rejected() {
        let mut reg = OperatorRegistry::with_standard(&[Connective::Neg]).unwrap();
        assert_eq!(
            reg.register(OperatorSpec::new(Connective::Neg, "\\lnot", 1)),
            Err(RegistryError::DuplicateOperator(Connective::Neg))
        );
    }

    #[test]
    fn arity_above_two_and_untokenizable_symbols_are_rejected() {
        let mut reg = OperatorRegistry::new();
        assert!(matches!(
            reg.register(OperatorSpec::new(Connective::And, "\\and", 3)),
            Err(RegistryError::UnsupportedArity { .. })
        ));
        assert_eq!(
            reg.register(OperatorSpec::new(Connective::And, "and", 2)),
            Err(RegistryError::InvalidSymbol("and".into()))
        );
        assert_eq!(
            reg.register(OperatorSpec::new(Connective::And, "&&", 2)),
            Err(RegistryError::InvalidSymbol("&&".into()))
        );
    }

    #[test]
    fn every_standard_spec_is_registrable_together() {
        let reg = OperatorRegistry::with_standard(&Connective::ALL).unwrap();
        assert_eq!(reg.len(), Connective::ALL.len());
        assert_eq!(reg.symbol(Connective::Counterfactual), "\\boxright");
    }
}
