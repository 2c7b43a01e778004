//! CQL-style index term matching.
//!
//! Only the `[context.]index <comparator> <term>` form is recognized. The two
//! grammars overlap: `=` also matches the first character of `==`, so callers
//! that register both for one index must try [`term_for_exact_search`] first.

use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;

use crate::charref;

static WILDCARD_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\w*)([?*]+)(\w*)").unwrap());

/// Return the search term if a wildcard (anywhere) search on `index` is requested.
///
/// Grammar: `[context.]index (= | any) <term>`. The term comes back encoded
/// for comparison with stored index values. `None` means the query does not
/// address this index; `Some("")` is an empty term.
pub fn term_for_wildcard_search(
    index: &str,
    query: &str,
    context: Option<&str>,
) -> Option<String> {
    capture_term(index, r"(?:=|any)", query, context)
}

/// Return the search term if an exact search on `index` is requested.
///
/// Grammar: `[context.]index (== | [cql.]string) <term>`.
pub fn term_for_exact_search(index: &str, query: &str, context: Option<&str>) -> Option<String> {
    capture_term(index, r"(?:==|(?:cql\.)?string)", query, context)
}

fn capture_term(index: &str, comparator: &str, query: &str, context: Option<&str>) -> Option<String> {
    let index = regex::escape(index);
    let pattern = match context {
        Some(context) => format!(
            r"(?:{}\.)?{} *{} *(.*)",
            regex::escape(context),
            index,
            comparator
        ),
        None => format!(r"{} *{} *(.*)", index, comparator),
    };
    let re = match Regex::new(&pattern) {
        Ok(re) => re,
        Err(e) => {
            warn!("Failed to compile index pattern {}: {}", pattern, e);
            return None;
        }
    };
    re.captures(query)
        .and_then(|caps| caps.get(1))
        .map(|term| charref::encode(term.as_str()))
}

/// A token decomposed around its first run of `?`/`*` wildcards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WildcardSplit {
    /// The token contained a wildcard run.
    Split {
        prefix: String,
        wildcard: String,
        suffix: String,
    },
    /// No wildcard; the original token.
    Plain(String),
}

impl WildcardSplit {
    /// Literal text usable as a search anchor.
    ///
    /// The prefix when there is one, otherwise the suffix (`*tion` anchors on
    /// `tion`), otherwise the plain token.
    pub fn anchor(&self) -> &str {
        match self {
            WildcardSplit::Split { prefix, .. } if !prefix.is_empty() => prefix,
            WildcardSplit::Split { suffix, .. } => suffix,
            WildcardSplit::Plain(token) => token,
        }
    }

    /// Whether the anchor must sit at the start of a term.
    ///
    /// False only for leading wildcards, where the anchor may occur anywhere.
    pub fn anchored_at_start(&self) -> bool {
        !matches!(self, WildcardSplit::Split { prefix, .. } if prefix.is_empty())
    }
}

/// Split `input` into (prefix, wildcard run, suffix) around the first run of
/// `?`/`*`, or return it unchanged.
pub fn split_wildcard(input: &str) -> WildcardSplit {
    match WILDCARD_RUN.captures(input) {
        Some(caps) => WildcardSplit::Split {
            prefix: caps[1].to_string(),
            wildcard: caps[2].to_string(),
            suffix: caps[3].to_string(),
        },
        None => WildcardSplit::Plain(input.to_string()),
    }
}
