//! Dynamic compound predicates built from optional search fields

use std::sync::LazyLock;

use talentbase_common::{Error, Result};

use super::fragment::{Arg, Fragment};

/// Column references: plain identifiers, optionally table-qualified
static COLUMN_REGEX: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$")
        .expect("column reference regex is valid")
});

/// Boolean connective between two clauses of a compound predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connective {
    And,
    Or,
}

impl Connective {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Connective::And => "AND",
            Connective::Or => "OR",
        }
    }
}

impl std::str::FromStr for Connective {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AND" => Ok(Connective::And),
            "OR" => Ok(Connective::Or),
            other => Err(Error::Misuse(format!("Unsupported connective: {other:?}"))),
        }
    }
}

/// Whether `column` is safe to splice into SQL as a column reference
pub fn is_column_reference(column: &str) -> bool {
    COLUMN_REGEX.is_match(column)
}

/// Four parallel sequences describing one compound predicate.
///
/// Clause `i` renders as `columns[i] conditions[i]` with `values[i]`
/// bound to the condition's placeholder. A `None` value marks a condition
/// without a placeholder, such as `IS NULL`. `operators[i]` joins clause
/// `i` to clause `i + 1`; the last operator is ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct OperatorFilter {
    pub columns: Vec<String>,
    pub conditions: Vec<String>,
    pub operators: Vec<String>,
    pub values: Vec<Option<Arg>>,
}

impl OperatorFilter {
    /// Compile to a single parenthesised predicate, or `None` when empty
    pub fn build(&self) -> Result<Option<Fragment>> {
        let n = self.columns.len();
        if self.conditions.len() != n || self.operators.len() != n || self.values.len() != n {
            return Err(Error::Misuse(format!(
                "Operator filter sequences differ in length: {} columns, {} conditions, {} operators, {} values",
                n,
                self.conditions.len(),
                self.operators.len(),
                self.values.len()
            )));
        }
        if n == 0 {
            return Ok(None);
        }

        let mut fragment = Fragment::text("(");
        for i in 0..n {
            let column = self.columns[i].trim();
            if !is_column_reference(column) {
                return Err(Error::Misuse(format!("Invalid column reference: {column:?}")));
            }
            if i > 0 {
                let connective: Connective = self.operators[i - 1].parse()?;
                fragment.push_sql(" ").push_sql(connective.as_sql()).push_sql(" ");
            }
            let condition = Fragment::new(
                self.conditions[i].trim().to_string(),
                self.values[i].iter().cloned().collect(),
            );
            // Each clause must consume exactly its own value.
            condition.render()?;
            fragment.push_sql(column).push_sql(" ").push(&condition);
        }
        // The final connective is ignored, but it must still be a valid one.
        self.operators[n - 1].parse::<Connective>()?;
        fragment.push_sql(")");

        Ok(Some(fragment))
    }
}
