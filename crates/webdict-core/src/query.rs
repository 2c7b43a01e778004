//! SQL generation for path-indexed dictionary tables.
//!
//! A dictionary lives in two tables: `<table>` with one row per entry
//! (`id`, `entry`, `lemma`) and `<table>_ndx` with one row per indexed
//! (`id`, `xpath`, `txt`) triple. Queries select index tokens together with
//! the entries they occur in.
//!
//! All values are bound parameters. Table names cannot be bound, so they are
//! checked against a strict identifier pattern instead.

use regex::Regex;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

use crate::charref;
use crate::config::SchemaConfig;
use crate::error::{Result, WebdictError};

static SQL_IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Options recognized by [`build_query`].
///
/// Built per request and consumed once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOptions {
    /// Overrides the table passed to [`build_query`].
    pub table: Option<String>,
    /// Overrides the xpath passed to [`build_query`].
    pub xpath: Option<String>,
    /// Also return the lemma column.
    pub show_lemma: bool,
    /// Token searched for in the selected xpaths.
    pub query: Option<String>,
    /// Match `query` exactly instead of anywhere in the token.
    pub exact: bool,
    /// Token (or `LIKE` pattern when it contains `%`) to exclude.
    pub filter: Option<String>,
    /// Ordered (xpath, token) pairs every matching entry must contain.
    pub xpath_filters: Vec<(String, String)>,
    /// One row per distinct token instead of one per entry.
    pub distinct_values: bool,
    /// Only count matching index rows.
    pub just_count: bool,
    /// 1-based first record of a bounded page.
    pub start_record: Option<u64>,
    /// Page size; only honored together with `start_record`.
    pub maximum_records: Option<u64>,
}

impl QueryOptions {
    /// Whether a bounded page was requested.
    pub fn is_paginated(&self) -> bool {
        self.start_record.is_some() || self.maximum_records.is_some()
    }

    /// The same constraints as a count-only, unbounded query.
    pub fn count_only(&self) -> Self {
        Self {
            just_count: true,
            start_record: None,
            maximum_records: None,
            ..self.clone()
        }
    }
}

/// SQL text with its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

impl SqlQuery {
    /// A query without parameters.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// A query with positional parameters.
    pub fn with_params(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// Renders the query with its parameters inlined, for echoing back to
/// clients as the transformed query. Never executed.
impl fmt::Display for SqlQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut params = self.params.iter();
        for (i, part) in self.sql.split('?').enumerate() {
            if i > 0 {
                match params.next() {
                    Some(value) => write!(f, "{}", display_literal(value))?,
                    None => f.write_str("?")?,
                }
            }
            f.write_str(part)?;
        }
        Ok(())
    }
}

fn display_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Real(r) => r.to_string(),
        Value::Text(s) => format!("'{}'", s.replace('\'', "''")),
        Value::Blob(b) => format!("<{} bytes>", b.len()),
    }
}

/// A relation usable in a `FROM` clause: a bare table or a prefilter
/// subquery with the parameters it binds.
#[derive(Debug, Clone)]
struct TableRef {
    sql: String,
    params: Vec<Value>,
}

impl TableRef {
    fn table(name: &str) -> Self {
        Self {
            sql: name.to_string(),
            params: Vec::new(),
        }
    }

    /// Wrap this relation so only entries having `token` at `xpath` remain.
    fn constrained(self, table: &str, xpath: &str, token: &str) -> Self {
        let sql = format!(
            "(SELECT base.* FROM {} AS base INNER JOIN {}{} AS prefilter \
             ON base.id = prefilter.id \
             WHERE prefilter.xpath LIKE ? ESCAPE '\\' AND prefilter.txt = ?)",
            self.sql,
            table,
            SchemaConfig::INDEX_TABLE_SUFFIX
        );
        let mut params = self.params;
        params.push(Value::Text(like_suffix(xpath)));
        params.push(Value::Text(charref::encode(token)));
        Self { sql, params }
    }
}

/// Nest one constraint layer per xpath filter around `table`.
///
/// The first filter ends up outermost. Each layer may match a different
/// index row of the same entry, so the result holds the entries satisfying
/// all filters at once.
fn prefilter_relation(table: &str, xpath_filters: &[(String, String)]) -> TableRef {
    xpath_filters
        .iter()
        .rev()
        .fold(TableRef::table(table), |inner, (xpath, token)| {
            inner.constrained(table, xpath, token)
        })
}

/// Check that `name` can be spliced into SQL as a table name.
pub fn validate_identifier(name: &str) -> Result<()> {
    if SQL_IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(WebdictError::InvalidIdentifier(name.to_string()))
    }
}

/// Escape `LIKE` metacharacters for use with `ESCAPE '\'`.
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Pattern matching every xpath that ends with `xpath`.
fn like_suffix(xpath: &str) -> String {
    format!("%{}", escape_like(xpath))
}

/// Build the SQL for fetching tokens and entries from `table`.
///
/// Result columns are `txt`, `entry`, `id`, optionally `lemma`, and `hits`
/// (the group count); a count-only query has just `hits`.
///
/// `xpath` is a suffix of the form `-node-node-`; an empty string selects
/// every xpath.
pub fn build_query(table: &str, xpath: &str, options: &QueryOptions) -> Result<SqlQuery> {
    let table = options.table.as_deref().unwrap_or(table);
    let xpath = options.xpath.as_deref().unwrap_or(xpath);
    validate_identifier(table)?;

    let relation = prefilter_relation(table, &options.xpath_filters);
    let mut params = relation.params;

    let columns = if options.just_count {
        format!("COUNT(*) AS {}", SchemaConfig::COUNT_COLUMN)
    } else {
        let lemma = if options.show_lemma {
            ", base.lemma AS lemma"
        } else {
            ""
        };
        format!(
            "ndx.txt AS txt, base.entry AS entry, base.id AS id{}, COUNT(*) AS {}",
            lemma,
            SchemaConfig::COUNT_COLUMN
        )
    };

    let mut sql = format!(
        "SELECT {} FROM {} AS base INNER JOIN {}{} AS ndx ON base.id = ndx.id \
         WHERE ndx.xpath LIKE ? ESCAPE '\\'",
        columns,
        relation.sql,
        table,
        SchemaConfig::INDEX_TABLE_SUFFIX
    );
    params.push(Value::Text(like_suffix(xpath)));

    if let Some(query) = &options.query {
        let encoded = charref::encode(query);
        if options.exact {
            sql.push_str(" AND ndx.txt = ?");
            params.push(Value::Text(encoded));
        } else {
            sql.push_str(" AND ndx.txt LIKE ? ESCAPE '\\'");
            params.push(Value::Text(format!("%{}%", escape_like(&encoded))));
        }
    }

    if let Some(filter) = &options.filter {
        if filter.contains('%') {
            sql.push_str(" AND ndx.txt NOT LIKE ?");
        } else {
            sql.push_str(" AND ndx.txt != ?");
        }
        params.push(Value::Text(filter.clone()));
    }

    // A count-only query counts matching index rows and is never grouped.
    if !options.just_count {
        if options.distinct_values {
            sql.push_str(" GROUP BY ndx.txt ORDER BY ndx.txt");
        } else {
            sql.push_str(" GROUP BY base.id");
        }
    }

    if let Some(start) = options.start_record {
        let limit = options
            .maximum_records
            .map(|max| i64::try_from(max).unwrap_or(i64::MAX))
            .unwrap_or(-1);
        let offset = i64::try_from(start.saturating_sub(1)).unwrap_or(i64::MAX);
        sql.push_str(" LIMIT ? OFFSET ?");
        params.push(Value::Integer(limit));
        params.push(Value::Integer(offset));
    }

    Ok(SqlQuery::with_params(sql, params))
}
