//! Scan: ordered, windowed term lists with counts.
//!
//! Terms are sorted by a normalized key that ignores case and a fixed set of
//! punctuation. Terms starting with a digit go after every alphabetic term,
//! and terms that normalize to nothing go last.

use serde::Serialize;
use tracing::{debug, warn};

use crate::charref;
use crate::config::{SchemaConfig, SortConfig, SruConfig};
use crate::error::Result;
use crate::params::SruParams;
use crate::query::SqlQuery;
use crate::store::{IndexStore, RowSet};

/// One term of a scan response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TermResult {
    /// Decoded token.
    pub value: String,
    pub number_of_records: u64,
    pub sort_key: String,
    /// Decoded lemma, present only when it differs from `value`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_term: Option<String>,
    /// 1-based position in the full sorted list.
    pub position: usize,
}

/// Normalized key used to order terms.
pub fn sort_key(value: &str) -> String {
    let upper: String = value
        .to_uppercase()
        .chars()
        .filter(|c| !SortConfig::IGNORED_PUNCTUATION.contains(c))
        .collect();
    let key = upper.trim();

    if key.is_empty() {
        SortConfig::EMPTY_KEY.to_string()
    } else if key.starts_with(|c: char| c.is_ascii_digit()) {
        format!("{}{}", SortConfig::NUMERIC_PREFIX, key)
    } else {
        key.to_string()
    }
}

/// Turn index rows into a sorted window of terms.
///
/// Rows provide the token in column `txt` (column 0 when there is none), the
/// count in `hits` and the lemma in `lemma`. The window starts at the first
/// term whose value begins with `resume` (or merely contains it when
/// `exact` is false) and holds at most `maximum_terms` terms. When no term
/// matches, the window is empty.
///
/// Returns the window and the number of terms in the full sorted list.
pub fn scan_terms(
    rows: &mut RowSet,
    resume: Option<&str>,
    exact: bool,
    maximum_terms: usize,
) -> (Vec<TermResult>, usize) {
    let token_col = rows.column_index("txt").unwrap_or(0);
    let count_col = rows.column_index(SchemaConfig::COUNT_COLUMN);
    let lemma_col = rows.column_index("lemma");

    let mut terms = Vec::with_capacity(rows.len());
    while let Some(row) = rows.next_row() {
        let Some(token) = row.text(token_col) else {
            warn!("Skipping index row without a token");
            continue;
        };
        let value = charref::decode(&token);
        let number_of_records = count_col
            .and_then(|i| row.integer(i))
            .map(|n| n.max(0) as u64)
            .unwrap_or(0);
        let display_term = lemma_col
            .and_then(|i| row.text(i))
            .map(|lemma| charref::decode(&lemma))
            .filter(|lemma| *lemma != value);

        terms.push(TermResult {
            sort_key: sort_key(&value),
            value,
            number_of_records,
            display_term,
            position: 0,
        });
    }
    rows.close();

    terms.sort_by(|a, b| a.sort_key.cmp(&b.sort_key));

    let total = terms.len();
    let start = resume_position(&terms, resume, exact);
    debug!("Scan over {} terms resumes at {}", total, start);

    let window = terms
        .into_iter()
        .enumerate()
        .skip(start)
        .take(maximum_terms)
        .map(|(index, term)| TermResult {
            position: index + 1,
            ..term
        })
        .collect();
    (window, total)
}

fn resume_position(terms: &[TermResult], resume: Option<&str>, exact: bool) -> usize {
    let token = match resume {
        Some(token) if !token.is_empty() => token,
        _ => return 0,
    };
    terms
        .iter()
        .position(|term| {
            if exact {
                term.value.starts_with(token)
            } else {
                term.value.contains(token)
            }
        })
        .unwrap_or(terms.len())
}

/// Result model of a scan operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResponse {
    pub version: String,
    /// Number of terms in the full sorted list, before windowing.
    pub count: usize,
    pub transformed_query: String,
    pub clause: String,
    pub response_position: usize,
    pub maximum_terms: usize,
    pub terms: Vec<TermResult>,
}

/// Runs scan queries against a store.
#[derive(Debug, Clone, Copy)]
pub struct ScanEngine {
    default_maximum_terms: usize,
}

impl Default for ScanEngine {
    fn default() -> Self {
        Self::new(SruConfig::DEFAULT_MAXIMUM_TERMS)
    }
}

impl ScanEngine {
    /// Engine using `default_maximum_terms` when a request names no limit.
    pub fn new(default_maximum_terms: usize) -> Self {
        Self {
            default_maximum_terms,
        }
    }

    /// Execute `query` and window its terms per `params`.
    pub fn scan(
        &self,
        store: &dyn IndexStore,
        query: &SqlQuery,
        resume: Option<&str>,
        exact: bool,
        params: &SruParams,
    ) -> Result<ScanResponse> {
        let maximum_terms = params.maximum_terms.unwrap_or(self.default_maximum_terms);
        let mut rows = store.execute(query)?;
        let (terms, count) = scan_terms(&mut rows, resume, exact, maximum_terms);

        Ok(ScanResponse {
            version: params.version().to_string(),
            count,
            transformed_query: query.to_string(),
            clause: params.scan_clause.clone(),
            response_position: 0,
            maximum_terms,
            terms,
        })
    }
}
