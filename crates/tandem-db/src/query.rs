//! Conditional SQL assembly.
//!
//! A [`QuerySpec`] is an ordered list of SQL fragments, each gated by a
//! [`Cond`] over named parameters. [`QuerySpec::build`] keeps the fragments
//! whose condition holds, then rewrites every `@name` placeholder in the
//! kept text to an SQLite positional parameter (`?1`, `?2`, ...). Arguments
//! are emitted in the order their placeholders appear in the final string,
//! and placeholders inside dropped fragments are never looked up.
//!
//! Specs are usually assembled with the builder methods. [`QuerySpec::parse`]
//! accepts the equivalent template form:
//!
//! ```text
//! SELECT id FROM users {{if .search}}WHERE username LIKE @search{{end}}
//! ```
//!
//! Supported conditions are `.flag`, `and .a .b` and `or .a .b`.
//! Conditionals do not nest.

use std::collections::HashMap;

use rusqlite::types::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryBuildError {
    #[error("missing query parameter `{0}`")]
    MissingParam(String),

    #[error("unterminated conditional `{{{{if {0}}}}}`")]
    Unterminated(String),

    #[error("malformed template: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
}

impl Param {
    fn is_truthy(&self) -> bool {
        match self {
            Param::Null => false,
            Param::Bool(b) => *b,
            Param::Int(i) => *i != 0,
            Param::Text(s) => !s.is_empty(),
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Param::Null => Value::Null,
            Param::Bool(b) => Value::Integer(i64::from(*b)),
            Param::Int(i) => Value::Integer(*i),
            Param::Text(s) => Value::Text(s.clone()),
        }
    }
}

impl From<bool> for Param {
    fn from(v: bool) -> Self {
        Param::Bool(v)
    }
}

impl From<i64> for Param {
    fn from(v: i64) -> Self {
        Param::Int(v)
    }
}

impl From<&str> for Param {
    fn from(v: &str) -> Self {
        Param::Text(v.to_string())
    }
}

impl From<String> for Param {
    fn from(v: String) -> Self {
        Param::Text(v)
    }
}

impl<T: Into<Param>> From<Option<T>> for Param {
    fn from(v: Option<T>) -> Self {
        v.map_or(Param::Null, Into::into)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cond {
    Always,
    Flag(String),
    And(String, String),
    Or(String, String),
}

impl Cond {
    pub fn flag(name: &str) -> Self {
        Cond::Flag(name.to_string())
    }

    pub fn and(a: &str, b: &str) -> Self {
        Cond::And(a.to_string(), b.to_string())
    }

    pub fn or(a: &str, b: &str) -> Self {
        Cond::Or(a.to_string(), b.to_string())
    }
}

#[derive(Debug, Clone)]
struct Fragment {
    cond: Cond,
    sql: String,
}

#[derive(Debug, Clone, Default)]
pub struct QuerySpec {
    fragments: Vec<Fragment>,
    params: HashMap<String, Param>,
}

/// A resolved query ready to hand to rusqlite.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub sql: String,
    pub args: Vec<Value>,
}

impl QuerySpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a fragment that is always included.
    pub fn sql(self, sql: impl Into<String>) -> Self {
        self.sql_if(Cond::Always, sql)
    }

    pub fn sql_if(mut self, cond: Cond, sql: impl Into<String>) -> Self {
        self.fragments.push(Fragment { cond, sql: sql.into() });
        self
    }

    pub fn param(mut self, name: &str, value: impl Into<Param>) -> Self {
        self.params.insert(name.to_string(), value.into());
        self
    }

    pub fn parse(template: &str) -> Result<Self, QueryBuildError> {
        let mut spec = Self::new();
        let mut rest = template;

        while let Some(open) = rest.find("{{") {
            spec = spec.sql(&rest[..open]);
            let (directive, after) = take_directive(&rest[open..])?;

            let Some(cond) = directive.strip_prefix("if ") else {
                return Err(QueryBuildError::Malformed(format!("unexpected `{{{{{directive}}}}}`")));
            };
            let cond_src = cond.trim();
            let cond = parse_cond(cond_src)?;

            let Some(body_end) = after.find("{{") else {
                return Err(QueryBuildError::Unterminated(cond_src.to_string()));
            };
            let (closing, tail) = take_directive(&after[body_end..])?;
            if closing != "end" {
                return Err(QueryBuildError::Malformed(format!(
                    "expected `{{{{end}}}}` after `{{{{if {cond_src}}}}}`, found `{{{{{closing}}}}}`"
                )));
            }

            spec = spec.sql_if(cond, &after[..body_end]);
            rest = tail;
        }

        Ok(spec.sql(rest))
    }

    pub fn build(&self) -> Result<BuiltQuery, QueryBuildError> {
        let mut resolved = String::new();
        for fragment in &self.fragments {
            let sql = fragment.sql.trim();
            if sql.is_empty() || !self.eval(&fragment.cond)? {
                continue;
            }
            if !resolved.is_empty() {
                resolved.push(' ');
            }
            resolved.push_str(sql);
        }

        self.bind(&resolved)
    }

    fn eval(&self, cond: &Cond) -> Result<bool, QueryBuildError> {
        Ok(match cond {
            Cond::Always => true,
            Cond::Flag(name) => self.lookup(name)?.is_truthy(),
            Cond::And(a, b) => {
                let (a, b) = (self.lookup(a)?, self.lookup(b)?);
                a.is_truthy() && b.is_truthy()
            }
            Cond::Or(a, b) => {
                let (a, b) = (self.lookup(a)?, self.lookup(b)?);
                a.is_truthy() || b.is_truthy()
            }
        })
    }

    fn lookup(&self, name: &str) -> Result<&Param, QueryBuildError> {
        self.params
            .get(name)
            .ok_or_else(|| QueryBuildError::MissingParam(name.to_string()))
    }

    /// Rewrites `@name` placeholders outside string literals.
    fn bind(&self, sql: &str) -> Result<BuiltQuery, QueryBuildError> {
        let mut out = String::with_capacity(sql.len());
        let mut args = Vec::new();
        let mut in_literal = false;
        let mut chars = sql.char_indices().peekable();

        while let Some((i, c)) = chars.next() {
            if c == '\'' {
                in_literal = !in_literal;
            }

            let starts_ident = matches!(chars.peek(), Some((_, n)) if n.is_ascii_alphabetic() || *n == '_');
            if c != '@' || in_literal || !starts_ident {
                out.push(c);
                continue;
            }

            let start = i + 1;
            let mut end = start;
            while let Some(&(j, n)) = chars.peek() {
                if !(n.is_ascii_alphanumeric() || n == '_') {
                    break;
                }
                end = j + n.len_utf8();
                chars.next();
            }

            let value = self.lookup(&sql[start..end])?;
            args.push(value.to_value());
            out.push_str(&format!("?{}", args.len()));
        }

        Ok(BuiltQuery { sql: out, args })
    }
}

/// Splits `{{ directive }}rest` into the trimmed directive and the rest.
fn take_directive(s: &str) -> Result<(&str, &str), QueryBuildError> {
    let body = &s[2..];
    let close = body
        .find("}}")
        .ok_or_else(|| QueryBuildError::Malformed("unclosed `{{`".to_string()))?;
    Ok((body[..close].trim(), &body[close + 2..]))
}

fn parse_cond(src: &str) -> Result<Cond, QueryBuildError> {
    let tokens: Vec<&str> = src.split_whitespace().collect();
    let flag = |t: &str| {
        t.strip_prefix('.')
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .ok_or_else(|| QueryBuildError::Malformed(format!("expected `.flag`, found `{t}`")))
    };

    match tokens.as_slice() {
        [name] => Ok(Cond::Flag(flag(name)?)),
        ["and", a, b] => Ok(Cond::And(flag(a)?, flag(b)?)),
        ["or", a, b] => Ok(Cond::Or(flag(a)?, flag(b)?)),
        _ => Err(QueryBuildError::Malformed(format!("unsupported condition `{src}`"))),
    }
}
