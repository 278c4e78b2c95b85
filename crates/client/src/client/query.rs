//! Query parameter encoding
//!
//! The service expects list-valued parameters in bracket-suffix array
//! notation (`assignees[]=1&assignees[]=2`); scalars encode as plain
//! `key=value` pairs. Keys and values are percent-encoded, the bracket
//! suffix is appended literally.

use std::borrow::Cow;

/// A single query parameter value, scalar or list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    /// A scalar value, encoded as `key=value`
    One(String),
    /// A list value, encoded as `key[]=v1&key[]=v2`
    Many(Vec<String>),
}

impl QueryValue {
    /// Scalar value from anything displayable
    pub fn one(value: impl ToString) -> Self {
        Self::One(value.to_string())
    }

    /// List value from an iterator of displayable items
    pub fn many<I, T>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: ToString,
    {
        Self::Many(values.into_iter().map(|value| value.to_string()).collect())
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        Self::One(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        Self::One(value)
    }
}

/// Encode parameters into a query string, without the leading `?`
pub(crate) fn encode_query(params: &[(&str, QueryValue)]) -> String {
    let mut pairs: Vec<String> = Vec::new();
    for (key, value) in params {
        let key = urlencoding::encode(key);
        match value {
            QueryValue::One(value) => {
                pairs.push(format!("{key}={}", urlencoding::encode(value)));
            }
            QueryValue::Many(values) => {
                for value in values {
                    pairs.push(format!("{key}[]={}", urlencoding::encode(value)));
                }
            }
        }
    }
    pairs.join("&")
}

/// Escape a single query component (exposed for the wrapper layer)
#[must_use]
pub fn escape_component(component: &str) -> Cow<'_, str> {
    urlencoding::encode(component)
}
