//! In-process evaluator over environment bindings.
//!
//! Understands a deliberately small language, one statement per line:
//!
//! ```text
//! let name = <json>     bind a JSON value (prints `undefined`)
//! name = other.path     rebind from an existing binding
//! name.field.sub        print a binding or one of its object fields
//! <json>                echo a JSON literal
//! ```

use serde_json::Value;

use super::Evaluator;
use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::stream::StreamAdapter;

/// Evaluates binding reads and JSON assignments against an [`Environment`].
#[derive(Debug, Clone)]
pub struct BindingEvaluator {
    env: Environment,
}

impl BindingEvaluator {
    /// Create an evaluator over `env`.
    pub fn new(env: Environment) -> Self {
        Self { env }
    }

    fn evaluate_line(&self, line: &str, out: &StreamAdapter) -> Result<()> {
        let statement = line.trim().trim_end_matches(';').trim_end();
        if statement.is_empty() {
            return Ok(());
        }

        if let Some((target, expr)) = split_assignment(statement) {
            let value = self.evaluate_expr(expr)?;
            self.env.set(target, value);
            out.write("undefined");
            return Ok(());
        }

        let value = self.evaluate_expr(statement)?;
        out.write(render(&value));
        Ok(())
    }

    fn evaluate_expr(&self, expr: &str) -> Result<Value> {
        let expr = expr.trim();
        if let Ok(value) = serde_json::from_str::<Value>(expr) {
            return Ok(value);
        }

        let mut segments = expr.split('.');
        let root = segments.next().unwrap_or_default();
        if !is_identifier(root) {
            return Err(Error::evaluation(format!(
                "SyntaxError: Unexpected token '{}'",
                expr
            )));
        }

        let mut value = self
            .env
            .get(root)
            .ok_or_else(|| Error::evaluation(format!("ReferenceError: {} is not defined", root)))?;
        let mut path = root.to_string();

        for field in segments {
            if !is_identifier(field) {
                return Err(Error::evaluation(format!(
                    "SyntaxError: Unexpected token '{}'",
                    expr
                )));
            }
            value = match value {
                Value::Object(mut map) => map.remove(field).unwrap_or(Value::Null),
                Value::Null => {
                    return Err(Error::evaluation(format!(
                        "TypeError: Cannot read properties of undefined (reading '{}')",
                        field
                    )))
                }
                _ => Value::Null,
            };
            path.push('.');
            path.push_str(field);
        }

        tracing::trace!(path = %path, "resolved binding");
        Ok(value)
    }

    /// Completions for the trailing identifier path of `partial`.
    fn candidates(&self, partial: &str) -> Vec<String> {
        let token_start = partial
            .rfind(|c: char| !(c == '.' || c == '_' || c == '$' || c.is_alphanumeric()))
            .map(|i| i + partial[i..].chars().next().map_or(1, char::len_utf8))
            .unwrap_or(0);
        let token = &partial[token_start..];

        let mut candidates: Vec<String> = match token.rsplit_once('.') {
            Some((base, prefix)) => match self.evaluate_expr(base) {
                Ok(Value::Object(map)) => map
                    .keys()
                    .filter(|key| key.starts_with(prefix))
                    .map(|key| format!("{}.{}", base, key))
                    .collect(),
                _ => Vec::new(),
            },
            None => self
                .env
                .names()
                .into_iter()
                .filter(|name| name.starts_with(token))
                .collect(),
        };

        candidates.sort();
        candidates
    }
}

impl Evaluator for BindingEvaluator {
    fn evaluate(&mut self, input: &str, out: &StreamAdapter) -> Result<()> {
        for line in input.lines() {
            self.evaluate_line(line, out)?;
        }
        Ok(())
    }

    fn complete(&mut self, partial: &str) -> Result<Vec<String>> {
        Ok(self.candidates(partial))
    }
}

/// Split `let a = b` or `a = b` into target and expression.
fn split_assignment(statement: &str) -> Option<(&str, &str)> {
    let body = statement
        .strip_prefix("let ")
        .or_else(|| statement.strip_prefix("const "))
        .or_else(|| statement.strip_prefix("var "))
        .unwrap_or(statement);

    let (target, expr) = body.split_once('=')?;
    let target = target.trim();
    if !is_identifier(target) || expr.starts_with('=') {
        return None;
    }
    Some((target, expr))
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

fn render(value: &Value) -> String {
    match value {
        Value::Null => "undefined".to_string(),
        Value::String(s) => format!("'{}'", s),
        other => other.to_string(),
    }
}
