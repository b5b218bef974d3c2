//! SQL fragments with positional `?` placeholders
//!
//! Fragments compose by concatenation and by nesting sub-queries as
//! arguments. Placeholders are numbered (`$1..$n`) exactly once, when the
//! outermost statement is rendered, so a sub-query can be spliced into any
//! position of any enclosing statement.

use talentbase_common::{Error, Result};

use crate::value::Value;

/// One positional argument of a fragment
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Value(Value),
    SubQuery(SubQuery),
}

/// A compiled, reusable query that can be substituted for a `?`
#[derive(Debug, Clone, PartialEq)]
pub struct SubQuery(pub(crate) Fragment);

impl SubQuery {
    /// The underlying fragment, placeholders still unnumbered
    pub fn fragment(&self) -> &Fragment {
        &self.0
    }
}

impl From<SubQuery> for Arg {
    fn from(sub: SubQuery) -> Self {
        Arg::SubQuery(sub)
    }
}

/// SQL text plus the arguments consumed by its placeholders, in order.
///
/// `??` renders a literal `?`. Placeholders inside single-quoted string
/// literals are left alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment {
    pub(crate) sql: String,
    pub(crate) args: Vec<Arg>,
}

impl Fragment {
    pub fn new(sql: impl Into<String>, args: Vec<Arg>) -> Self {
        Self {
            sql: sql.into(),
            args,
        }
    }

    /// A fragment without arguments
    pub fn text(sql: impl Into<String>) -> Self {
        Self::new(sql, Vec::new())
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn args(&self) -> &[Arg] {
        &self.args
    }

    pub fn is_empty(&self) -> bool {
        self.sql.trim().is_empty()
    }

    pub(crate) fn push_sql(&mut self, sql: &str) -> &mut Self {
        self.sql.push_str(sql);
        self
    }

    pub(crate) fn push_bind(&mut self, value: impl Into<Value>) -> &mut Self {
        self.sql.push('?');
        self.args.push(Arg::Value(value.into()));
        self
    }

    pub(crate) fn push(&mut self, other: &Fragment) -> &mut Self {
        self.sql.push_str(&other.sql);
        self.args.extend(other.args.iter().cloned());
        self
    }

    /// Number every placeholder and flatten nested sub-queries.
    ///
    /// Returns the final SQL and the values to bind, in `$n` order.
    pub fn render(&self) -> Result<(String, Vec<Value>)> {
        let mut out = String::with_capacity(self.sql.len() + 16);
        let mut binds = Vec::with_capacity(self.args.len());
        self.render_into(&mut out, &mut binds)?;
        Ok((out, binds))
    }

    fn render_into(&self, out: &mut String, binds: &mut Vec<Value>) -> Result<()> {
        let mut args = self.args.iter();
        let mut chars = self.sql.chars().peekable();
        let mut in_literal = false;

        while let Some(c) = chars.next() {
            if in_literal {
                out.push(c);
                if c == '\'' {
                    in_literal = false;
                }
                continue;
            }
            match c {
                '\'' => {
                    in_literal = true;
                    out.push(c);
                }
                '?' if chars.peek() == Some(&'?') => {
                    chars.next();
                    out.push('?');
                }
                '?' => match args.next() {
                    Some(Arg::Value(value)) => {
                        binds.push(value.clone());
                        out.push('$');
                        out.push_str(&binds.len().to_string());
                    }
                    Some(Arg::SubQuery(sub)) => {
                        out.push('(');
                        sub.0.render_into(out, binds)?;
                        out.push(')');
                    }
                    None => {
                        return Err(Error::Misuse(format!(
                            "Fragment has more placeholders than arguments: {}",
                            self.sql
                        )));
                    }
                },
                _ => out.push(c),
            }
        }

        if args.next().is_some() {
            return Err(Error::Misuse(format!(
                "Fragment has more arguments than placeholders: {}",
                self.sql
            )));
        }
        Ok(())
    }
}
