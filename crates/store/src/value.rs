//! Bound values carried by query fragments
//!
//! Every scalar variant wraps an `Option` so that a NULL keeps its SQL type
//! when bound; Postgres rejects an untyped text NULL written to a uuid column.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgArguments;
use sqlx::Arguments;
use talentbase_common::{Error, Result};
use uuid::Uuid;

use crate::query::Arg;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(Option<bool>),
    Int(Option<i32>),
    BigInt(Option<i64>),
    Float(Option<f64>),
    Text(Option<String>),
    Uuid(Option<Uuid>),
    Timestamp(Option<DateTime<Utc>>),
    Date(Option<NaiveDate>),
    Json(Option<serde_json::Value>),
    UuidArray(Vec<Uuid>),
    TextArray(Vec<String>),
    BigIntArray(Vec<i64>),
}

impl Value {
    /// Whether this value binds as SQL NULL
    pub fn is_null(&self) -> bool {
        match self {
            Value::Bool(v) => v.is_none(),
            Value::Int(v) => v.is_none(),
            Value::BigInt(v) => v.is_none(),
            Value::Float(v) => v.is_none(),
            Value::Text(v) => v.is_none(),
            Value::Uuid(v) => v.is_none(),
            Value::Timestamp(v) => v.is_none(),
            Value::Date(v) => v.is_none(),
            Value::Json(v) => v.is_none(),
            Value::UuidArray(_) | Value::TextArray(_) | Value::BigIntArray(_) => false,
        }
    }

    /// Append this value to a positional argument list
    pub(crate) fn bind(self, args: &mut PgArguments) -> Result<()> {
        let bound = match self {
            Value::Bool(v) => args.add(v),
            Value::Int(v) => args.add(v),
            Value::BigInt(v) => args.add(v),
            Value::Float(v) => args.add(v),
            Value::Text(v) => args.add(v),
            Value::Uuid(v) => args.add(v),
            Value::Timestamp(v) => args.add(v),
            Value::Date(v) => args.add(v),
            Value::Json(v) => args.add(v),
            Value::UuidArray(v) => args.add(v),
            Value::TextArray(v) => args.add(v),
            Value::BigIntArray(v) => args.add(v),
        };
        bound.map_err(|e| Error::Internal(format!("Failed to bind value: {e}")))
    }
}

/// Build the argument list for a rendered statement
pub(crate) fn arguments(binds: Vec<Value>) -> Result<PgArguments> {
    let mut args = PgArguments::default();
    for value in binds {
        value.bind(&mut args)?;
    }
    Ok(args)
}

macro_rules! impl_value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(Some(v.into()))
                }
            }

            impl From<Option<$ty>> for Value {
                fn from(v: Option<$ty>) -> Self {
                    Value::$variant(v.map(Into::into))
                }
            }

            impl From<$ty> for Arg {
                fn from(v: $ty) -> Self {
                    Arg::Value(v.into())
                }
            }

            impl From<Option<$ty>> for Arg {
                fn from(v: Option<$ty>) -> Self {
                    Arg::Value(v.into())
                }
            }
        )*
    };
}

impl_value_from!(
    bool => Bool,
    i32 => Int,
    i64 => BigInt,
    f64 => Float,
    String => Text,
    &str => Text,
    Uuid => Uuid,
    DateTime<Utc> => Timestamp,
    NaiveDate => Date,
    serde_json::Value => Json,
);

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(Some(v.clone()))
    }
}

impl From<&String> for Arg {
    fn from(v: &String) -> Self {
        Arg::Value(v.into())
    }
}

impl From<Vec<Uuid>> for Value {
    fn from(v: Vec<Uuid>) -> Self {
        Value::UuidArray(v)
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Value::TextArray(v)
    }
}

impl From<Vec<i64>> for Value {
    fn from(v: Vec<i64>) -> Self {
        Value::BigIntArray(v)
    }
}

impl From<Vec<Uuid>> for Arg {
    fn from(v: Vec<Uuid>) -> Self {
        Arg::Value(v.into())
    }
}

impl From<Vec<String>> for Arg {
    fn from(v: Vec<String>) -> Self {
        Arg::Value(v.into())
    }
}

impl From<Vec<i64>> for Arg {
    fn from(v: Vec<i64>) -> Self {
        Arg::Value(v.into())
    }
}

impl From<Value> for Arg {
    fn from(v: Value) -> Self {
        Arg::Value(v)
    }
}
