//! The builder contract: anything that can render itself to SQL text plus positional arguments.

use std::borrow::Cow;

use thiserror::Error;

use crate::types::RowValues;

/// Why a builder could not render.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct BuildError {
    message: Cow<'static, str>,
}

impl BuildError {
    pub fn new(message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Rendered statement: SQL text with `$n` placeholders and the ordered arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlParts {
    pub sql: String,
    pub args: Vec<RowValues>,
}

impl SqlParts {
    pub fn new(sql: impl Into<String>, args: Vec<RowValues>) -> Self {
        Self {
            sql: sql.into(),
            args,
        }
    }
}

/// Render to `(sql, args)`. This is the whole surface a query builder has to provide.
///
/// ```rust
/// use pg_middleware::prelude::*;
///
/// struct ById(i64);
///
/// impl Sqlizer for ById {
///     fn to_sql(&self) -> Result<SqlParts, BuildError> {
///         if self.0 <= 0 {
///             return Err(BuildError::new("id must be positive"));
///         }
///         Ok(SqlParts::new("SELECT name FROM users WHERE id = $1", vec![RowValues::Int(self.0)]))
///     }
/// }
///
/// assert!(ById(0).to_sql().is_err());
/// assert_eq!(ById(3).to_sql().unwrap().args, vec![RowValues::Int(3)]);
/// ```
pub trait Sqlizer {
    /// # Errors
    /// Returns `BuildError` if the builder describes a malformed query.
    fn to_sql(&self) -> Result<SqlParts, BuildError>;
}

impl<T: Sqlizer + ?Sized> Sqlizer for &T {
    fn to_sql(&self) -> Result<SqlParts, BuildError> {
        (**self).to_sql()
    }
}

impl<T: Sqlizer + ?Sized> Sqlizer for Box<T> {
    fn to_sql(&self) -> Result<SqlParts, BuildError> {
        (**self).to_sql()
    }
}

impl Sqlizer for SqlParts {
    fn to_sql(&self) -> Result<SqlParts, BuildError> {
        Ok(self.clone())
    }
}

impl Sqlizer for str {
    fn to_sql(&self) -> Result<SqlParts, BuildError> {
        if self.trim().is_empty() {
            return Err(BuildError::new("empty query"));
        }
        Ok(SqlParts::new(self, Vec::new()))
    }
}

impl Sqlizer for String {
    fn to_sql(&self) -> Result<SqlParts, BuildError> {
        self.as_str().to_sql()
    }
}

impl<S: AsRef<str>> Sqlizer for (S, Vec<RowValues>) {
    fn to_sql(&self) -> Result<SqlParts, BuildError> {
        RawQuery::new(self.0.as_ref()).args(self.1.clone()).to_sql()
    }
}

/// Fixed SQL text with arguments appended one by one.
///
/// Rendering checks that the highest `$n` placeholder matches the argument count.
#[derive(Debug, Clone, Default)]
pub struct RawQuery {
    sql: String,
    args: Vec<RowValues>,
}

impl RawQuery {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            args: Vec::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, value: impl Into<RowValues>) -> Self {
        self.args.push(value.into());
        self
    }

    #[must_use]
    pub fn args(mut self, values: impl IntoIterator<Item = RowValues>) -> Self {
        self.args.extend(values);
        self
    }
}

impl Sqlizer for RawQuery {
    fn to_sql(&self) -> Result<SqlParts, BuildError> {
        if self.sql.trim().is_empty() {
            return Err(BuildError::new("empty query"));
        }
        let expected = max_placeholder(&self.sql);
        if expected != self.args.len() {
            return Err(BuildError::new(format!(
                "query references {expected} placeholder(s) but {} argument(s) were bound",
                self.args.len()
            )));
        }
        Ok(SqlParts::new(self.sql.clone(), self.args.clone()))
    }
}

/// Highest `$n` outside string literals, quoted identifiers and comments.
fn max_placeholder(sql: &str) -> usize {
    #[derive(Clone, Copy, PartialEq)]
    enum State {
        Normal,
        SingleQuoted,
        DoubleQuoted,
        LineComment,
        BlockComment,
    }

    let bytes = sql.as_bytes();
    let mut state = State::Normal;
    let mut max = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match state {
            State::Normal => match b {
                b'\'' => state = State::SingleQuoted,
                b'"' => state = State::DoubleQuoted,
                b'-' if bytes.get(i + 1) == Some(&b'-') => state = State::LineComment,
                b'/' if bytes.get(i + 1) == Some(&b'*') => state = State::BlockComment,
                b'$' => {
                    let start = i + 1;
                    let mut end = start;
                    while end < bytes.len() && bytes[end].is_ascii_digit() {
                        end += 1;
                    }
                    if end > start {
                        if let Ok(n) = sql[start..end].parse::<usize>() {
                            max = max.max(n);
                        }
                        i = end;
                        continue;
                    }
                }
                _ => {}
            },
            State::SingleQuoted if b == b'\'' => state = State::Normal,
            State::DoubleQuoted if b == b'"' => state = State::Normal,
            State::LineComment if b == b'\n' => state = State::Normal,
            State::BlockComment if b == b'*' && bytes.get(i + 1) == Some(&b'/') => {
                state = State::Normal;
                i += 1;
            }
            _ => {}
        }
        i += 1;
    }
    max
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_query_renders_args_in_order() {
        let parts = RawQuery::new("INSERT INTO t (id, name) VALUES ($1, $2)")
            .arg(1_i64)
            .arg("alice")
            .to_sql()
            .unwrap();
        assert_eq!(
            parts.args,
            vec![RowValues::Int(1), RowValues::Text("alice".into())]
        );
    }

    #[test]
    fn raw_query_rejects_argument_mismatch() {
        let err = RawQuery::new("SELECT * FROM t WHERE id = $1 AND name = $2")
            .arg(1_i64)
            .to_sql()
            .unwrap_err();
        assert!(err.to_string().contains("2 placeholder(s)"));
    }

    #[test]
    fn placeholders_inside_literals_are_ignored() {
        assert_eq!(max_placeholder("SELECT '$3', \"$4\" -- $5\n, $1 /* $9 */"), 1);
        assert_eq!(max_placeholder("SELECT $1, $2, $1"), 2);
        assert_eq!(max_placeholder("SELECT 1"), 0);
    }

    #[test]
    fn empty_text_is_a_build_error() {
        assert!("   ".to_sql().is_err());
        assert!(RawQuery::new("").to_sql().is_err());
    }

    #[test]
    fn tuple_builder() {
        let parts = ("SELECT $1::int8", vec![RowValues::Int(5)]).to_sql().unwrap();
        assert_eq!(parts.sql, "SELECT $1::int8");
    }
}
