use miette::Diagnostic;
use thiserror::Error;
use truthmaker_syntax::{Connective, ParseError, RegistryError};

/// Problems with a theory or its settings. Fatal to instantiation.
#[derive(Debug, Clone, PartialEq, Error, Diagnostic)]
pub enum ConfigurationError {
    #[error("Operator registry error: {0}")]
    #[diagnostic(code(truthmaker::config::registry))]
    Registry(#[from] RegistryError),
    #[error("Operator {0} is registered but the theory gives it no clause")]
    #[diagnostic(
        code(truthmaker::config::missing_clause),
        help("give the operator a semantic clause or a definition, or drop it from the registry")
    )]
    MissingClause(Connective),
    #[error("Definition of {0} never reaches primitive operators")]
    #[diagnostic(code(truthmaker::config::definition_cycle))]
    DefinitionCycle(Connective),
    #[error("Invalid setting `{key}`: {reason}")]
    #[diagnostic(code(truthmaker::config::setting))]
    InvalidSetting { key: String, reason: String },
    #[error("Unknown sentence letter `{0}`")]
    #[diagnostic(code(truthmaker::config::letter))]
    UnknownLetter(String),
}

impl ConfigurationError {
    pub fn invalid(key: &str, reason: impl Into<String>) -> Self {
        ConfigurationError::InvalidSetting {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum CheckError {
    #[error("Syntax error: {0}")]
    #[diagnostic(transparent)]
    Syntax(#[from] ParseError),
    #[error("Configuration error: {0}")]
    #[diagnostic(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("Solver error: {0}")]
    #[diagnostic(code(truthmaker::solver))]
    Solver(String),
    #[error("Invalid model state: {0}")]
    #[diagnostic(code(truthmaker::state))]
    InvalidState(String),
}

impl From<RegistryError> for CheckError {
    fn from(e: RegistryError) -> Self {
        CheckError::Configuration(ConfigurationError::Registry(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use truthmaker_syntax::{parse_sentence, FormulaArena, OperatorRegistry};

    #[test]
    fn syntax_errors_keep_their_source_labels() {
        let registry = OperatorRegistry::with_standard(&Connective::ALL).unwrap();
        let mut arena = FormulaArena::new();
        let parse = parse_sentence(&mut arena, &registry, "(p \\wedge q", "premise 1").unwrap_err();
        let err = CheckError::from(parse);

        assert_eq!(
            err.code().map(|c| c.to_string()),
            Some("truthmaker::parse::unbalanced".to_string())
        );
        assert!(err.source_code().is_some());
        assert_eq!(err.labels().map(|l| l.count()), Some(1));
    }

    #[test]
    fn configuration_errors_carry_codes_and_help() {
        let err = CheckError::from(ConfigurationError::MissingClause(Connective::Next));
        assert_eq!(
            err.code().map(|c| c.to_string()),
            Some("truthmaker::config::missing_clause".to_string())
        );
        assert!(err.help().is_some());

        let solver = CheckError::Solver("z3 crashed".into());
        assert_eq!(
            solver.code().map(|c| c.to_string()),
            Some("truthmaker::solver".to_string())
        );
    }
}
