//! SMT-LIB2 backend driving an external solver process over stdin/stdout.

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::backends::smtlib_printer::{sort_to_smtlib, to_smtlib};
use crate::solver::{Model, ModelValue, SatResult, SmtSolver};
use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("solver I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("solver binary not found: {0}")]
    NotFound(String),
    #[error("solver error: {0}")]
    SolverError(String),
    #[error("failed to parse solver output: {0}")]
    ParseError(String),
}

/// Dialect differences between supported solver binaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Z3,
    Cvc5,
}

impl Dialect {
    fn default_args(self) -> &'static [&'static str] {
        match self {
            Dialect::Z3 => &["-in", "-smt2"],
            Dialect::Cvc5 => &["--lang", "smt2", "--incremental"],
        }
    }

    fn timeout_option(self, ms: u128) -> String {
        match self {
            Dialect::Z3 => format!("(set-option :timeout {ms})"),
            Dialect::Cvc5 => format!("(set-option :tlimit-per {ms})"),
        }
    }
}

pub struct ProcessSolver {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    dialect: Dialect,
    command: String,
}

impl ProcessSolver {
    /// Spawn `z3` from `PATH`.
    pub fn z3() -> Result<Self, ProcessError> {
        Self::with_command("z3", Dialect::Z3)
    }

    /// Spawn `cvc5` from `PATH`.
    pub fn cvc5() -> Result<Self, ProcessError> {
        Self::with_command("cvc5", Dialect::Cvc5)
    }

    pub fn with_command(cmd: &str, dialect: Dialect) -> Result<Self, ProcessError> {
        let mut child = Command::new(cmd)
            .args(dialect.default_args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| ProcessError::NotFound(format!("{cmd}: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ProcessError::SolverError("failed to capture solver stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ProcessError::SolverError("failed to capture solver stdout".into()))?;

        let mut solver = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            dialect,
            command: cmd.to_string(),
        };
        solver.configure()?;
        Ok(solver)
    }

    /// Returns true when `cmd` can be spawned; used to skip tests.
    pub fn is_available(cmd: &str) -> bool {
        Command::new(cmd)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn configure(&mut self) -> Result<(), ProcessError> {
        self.send_raw("(set-option :print-success true)")?;
        self.expect_success("(set-option :produce-models true)")?;
        self.expect_success("(set-option :produce-unsat-cores true)")?;
        Ok(())
    }

    fn send_raw(&mut self, cmd: &str) -> Result<String, ProcessError> {
        writeln!(self.stdin, "{cmd}")?;
        self.stdin.flush()?;
        self.read_response(cmd)
    }

    /// Read one balanced s-expression (or bare atom) from stdout.
    fn read_response(&mut self, cmd: &str) -> Result<String, ProcessError> {
        let mut response = String::new();
        let mut depth: i64 = 0;
        loop {
            let mut line = String::new();
            let read = self.stdout.read_line(&mut line)?;
            if read == 0 {
                return Err(ProcessError::SolverError(format!(
                    "{} closed its output while answering `{cmd}`",
                    self.command
                )));
            }
            let mut in_quote = false;
            for ch in line.chars() {
                match ch {
                    '|' | '"' => in_quote = !in_quote,
                    '(' if !in_quote => depth += 1,
                    ')' if !in_quote => depth -= 1,
                    _ => {}
                }
            }
            response.push_str(&line);
            if depth <= 0 && !response.trim().is_empty() {
                break;
            }
        }
        let response = response.trim().to_string();
        if response.starts_with("(error") {
            return Err(ProcessError::SolverError(format!("`{cmd}`: {response}")));
        }
        Ok(response)
    }

    fn expect_success(&mut self, cmd: &str) -> Result<(), ProcessError> {
        let response = self.send_raw(cmd)?;
        if response == "success" {
            Ok(())
        } else {
            Err(ProcessError::SolverError(format!(
                "`{cmd}` answered `{response}`"
            )))
        }
    }

    fn reason_unknown(&mut self) -> Result<String, ProcessError> {
        self.send_raw("(get-info :reason-unknown)")
    }
}

impl Drop for ProcessSolver {
    fn drop(&mut self) {
        let _ = writeln!(self.stdin, "(exit)");
        let _ = self.stdin.flush();
        let _ = self.child.wait();
    }
}

fn quote_symbol(name: &str) -> String {
    if name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "_-.!$%&*+<>=?@^~".contains(c))
    {
        name.to_string()
    } else {
        format!("|{name}|")
    }
}

impl SmtSolver for ProcessSolver {
    type Error = ProcessError;

    fn declare_const(&mut self, name: &str, sort: &SmtSort) -> Result<(), ProcessError> {
        let sort_str = sort_to_smtlib(sort);
        self.expect_success(&format!("(declare-const {name} {sort_str})"))
    }

    fn declare_fun(
        &mut self,
        name: &str,
        args: &[SmtSort],
        ret: &SmtSort,
    ) -> Result<(), ProcessError> {
        let arg_str: Vec<String> = args.iter().map(sort_to_smtlib).collect();
        self.expect_success(&format!(
            "(declare-fun {name} ({}) {})",
            arg_str.join(" "),
            sort_to_smtlib(ret)
        ))
    }

    fn assert(&mut self, term: &SmtTerm) -> Result<(), ProcessError> {
        let smt_str = to_smtlib(term);
        self.expect_success(&format!("(assert {smt_str})"))
    }

    fn assert_named(&mut self, name: &str, term: &SmtTerm) -> Result<(), ProcessError> {
        let smt_str = to_smtlib(term);
        self.expect_success(&format!(
            "(assert (! {smt_str} :named {}))",
            quote_symbol(name)
        ))
    }

    fn push(&mut self) -> Result<(), ProcessError> {
        self.expect_success("(push 1)")
    }

    fn pop(&mut self) -> Result<(), ProcessError> {
        self.expect_success("(pop 1)")
    }

    fn set_time_budget(&mut self, budget: Option<Duration>) -> Result<(), ProcessError> {
        // Zero disables the limit in both dialects.
        let ms = budget.map_or(0, |b| b.as_millis().max(1));
        let cmd = self.dialect.timeout_option(ms);
        self.expect_success(&cmd)
    }

    fn check_sat(&mut self) -> Result<SatResult, ProcessError> {
        let response = self.send_raw("(check-sat)")?;
        match response.as_str() {
            "sat" => Ok(SatResult::Sat),
            "unsat" => Ok(SatResult::Unsat),
            "unknown" => {
                let reason = self.reason_unknown()?;
                debug!(%reason, "solver returned unknown");
                if ["timeout", "canceled", "resourceout"]
                    .iter()
                    .any(|r| reason.contains(r))
                {
                    Ok(SatResult::Timeout)
                } else {
                    Ok(SatResult::Unknown(reason))
                }
            }
            other => Err(ProcessError::SolverError(other.to_string())),
        }
    }

    fn get_values(&mut self, queries: &[SmtTerm]) -> Result<Model, ProcessError> {
        let mut model = Model::default();
        for query in queries {
            let rendered = to_smtlib(query);
            let response = self.send_raw(&format!("(get-value ({rendered}))"))?;
            let value = parse_value(&response).ok_or_else(|| {
                ProcessError::ParseError(format!("value of {rendered}: {response}"))
            })?;
            model.insert(query, value);
        }
        Ok(model)
    }

    fn supports_unsat_core(&self) -> bool {
        true
    }

    fn unsat_core(&mut self) -> Result<Vec<String>, ProcessError> {
        let response = self.send_raw("(get-unsat-core)")?;
        Ok(parse_symbol_list(&response))
    }

    fn reset(&mut self) -> Result<(), ProcessError> {
        self.expect_success("(reset)")?;
        self.expect_success("(set-option :produce-models true)")?;
        self.expect_success("(set-option :produce-unsat-cores true)")?;
        Ok(())
    }
}

/// Parse the value out of a `get-value` response such as `((t #b011))`.
fn parse_value(response: &str) -> Option<ModelValue> {
    let trimmed = response.trim().trim_end_matches(')').trim();
    if let Some(idx) = trimmed.rfind("(_ bv") {
        let digits: String = trimmed[idx + 5..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        return digits.parse::<u64>().ok().map(ModelValue::BitVec);
    }
    let token = trimmed.rsplit(|c: char| c.is_whitespace() || c == '(').next()?;
    match token {
        "true" => Some(ModelValue::Bool(true)),
        "false" => Some(ModelValue::Bool(false)),
        t if t.starts_with("#b") => u64::from_str_radix(&t[2..], 2).ok().map(ModelValue::BitVec),
        t if t.starts_with("#x") => u64::from_str_radix(&t[2..], 16).ok().map(ModelValue::BitVec),
        _ => None,
    }
}

fn parse_symbol_list(response: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut buf = String::new();
    let mut in_quoted_symbol = false;
    for ch in response.trim().chars() {
        match ch {
            '(' | ')' if !in_quoted_symbol => {
                if !buf.is_empty() {
                    out.push(std::mem::take(&mut buf));
                }
            }
            '|' => {
                in_quoted_symbol = !in_quoted_symbol;
                if !buf.is_empty() {
                    out.push(std::mem::take(&mut buf));
                }
            }
            c if c.is_whitespace() && !in_quoted_symbol => {
                if !buf.is_empty() {
                    out.push(std::mem::take(&mut buf));
                }
            }
            other => buf.push(other),
        }
    }
    if !buf.is_empty() {
        out.push(buf);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_values() {
        assert_eq!(
            parse_value("(((possible #b011) true))"),
            Some(ModelValue::Bool(true))
        );
        assert_eq!(parse_value("((p false))"), Some(ModelValue::Bool(false)));
    }

    #[test]
    fn parse_bitvector_values_in_all_notations() {
        assert_eq!(parse_value("((w #b101))"), Some(ModelValue::BitVec(5)));
        assert_eq!(parse_value("((w #x1f))"), Some(ModelValue::BitVec(31)));
        assert_eq!(parse_value("((w (_ bv6 3)))"), Some(ModelValue::BitVec(6)));
        assert_eq!(parse_value("((w weird))"), None);
    }

    #[test]
    fn parse_quoted_core_names() {
        assert_eq!(
            parse_symbol_list("(|premise:0| conclusion |frame:world|)"),
            vec![
                "premise:0".to_string(),
                "conclusion".to_string(),
                "frame:world".to_string()
            ]
        );
    }

    #[test]
    fn symbols_with_colons_are_quoted() {
        assert_eq!(quote_symbol("premise:0"), "|premise:0|");
        assert_eq!(quote_symbol("conclusion"), "conclusion");
    }
}
