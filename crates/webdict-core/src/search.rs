//! searchRetrieve: entries matching a query, with optional titles.

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, LazyLock};
use tracing::{debug, warn};

use crate::charref;
use crate::config::SchemaConfig;
use crate::document::XmlDocument;
use crate::error::Result;
use crate::params::SruParams;
use crate::query::{build_query, QueryOptions, SqlQuery};
use crate::store::{IndexStore, Row};
use crate::tei;

static FROM_TABLE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" FROM (\w+) ").unwrap());

/// What to run for a search.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryInput {
    /// A ready query; every returned row is a hit.
    Raw(SqlQuery),
    /// Options for [`build_query`]; bounded pages get their total from a
    /// separate count query.
    Structured(QueryOptions),
}

/// Produces the content of a hit from its row.
pub type ContentExtractor = Arc<dyn Fn(&Row<'_>) -> Option<String> + Send + Sync>;

/// One record of a search response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Hit {
    pub record_schema: String,
    pub record_packing: String,
    /// Decoded entry markup.
    pub content: String,
    pub title: String,
    pub want_title: bool,
    pub want_metadata: bool,
    /// Serialized database header, when metadata was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header_xml: Option<String>,
    /// Query string reproducing this request.
    pub query_url: String,
}

/// Result model of a searchRetrieve operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub version: String,
    pub number_of_records: u64,
    pub returned_records: usize,
    pub query: String,
    pub transformed_query: String,
    #[serde(rename = "baseURL")]
    pub base_url: String,
    pub xcontext: String,
    pub xdataview: String,
    pub next_record_position: u64,
    pub hits: Vec<Hit>,
}

/// Runs searches against a store.
#[derive(Clone, Default)]
pub struct SearchEngine {
    base_url: String,
    content: Option<ContentExtractor>,
}

impl fmt::Debug for SearchEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchEngine")
            .field("base_url", &self.base_url)
            .field("content", &self.content.as_ref().map(|_| "<extractor>"))
            .finish()
    }
}

impl SearchEngine {
    /// Engine whose responses name `base_url` as the endpoint address.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            content: None,
        }
    }

    /// Take hit content from `extractor` instead of the `entry` column.
    pub fn with_content_extractor(mut self, extractor: ContentExtractor) -> Self {
        self.content = Some(extractor);
        self
    }

    /// Run `input` and build the response model.
    pub fn search(
        &self,
        store: &dyn IndexStore,
        input: QueryInput,
        params: &SruParams,
    ) -> Result<SearchResponse> {
        let want_title = params.want_title();
        let want_metadata = params.want_metadata();

        let (query, header_table, total) = match input {
            QueryInput::Raw(query) => {
                let table = FROM_TABLE
                    .captures(&query.sql)
                    .map(|caps| caps[1].to_string());
                (query, table, None)
            }
            QueryInput::Structured(options) => {
                let query = build_query("", "", &options)?;
                let total = if options.is_paginated() {
                    Some(count_matches(store, &options)?)
                } else {
                    None
                };
                (query, options.table.clone(), total)
            }
        };

        let header = match (&header_table, want_title || want_metadata) {
            (Some(table), true) => tei::fetch_header(store, table)?,
            _ => None,
        };
        let header_title = header.as_ref().map(tei::title_of).unwrap_or_default();
        let header_xml = if want_metadata {
            header.as_ref().map(XmlDocument::root_xml)
        } else {
            None
        };

        let mut rows = store.execute(&query)?;
        let returned_records = rows.len();
        let number_of_records = total.unwrap_or(returned_records as u64);
        let content_col = rows.column_index("entry").unwrap_or(1);
        let query_url = format!("?{}", params.to_query_string());

        let mut hits = Vec::with_capacity(returned_records);
        while let Some(row) = rows.next_row() {
            let stored = match &self.content {
                Some(extract) => extract(&row),
                None => row.text(content_col),
            };
            let content = charref::decode(&stored.unwrap_or_default());

            let title = if want_title {
                let own = entry_title(&content);
                if own.is_empty() {
                    header_title.clone()
                } else {
                    own
                }
            } else {
                String::new()
            };

            hits.push(Hit {
                record_schema: params.record_schema().to_string(),
                record_packing: params.record_packing().to_string(),
                content,
                title,
                want_title,
                want_metadata,
                header_xml: header_xml.clone(),
                query_url: query_url.clone(),
            });
        }
        rows.close();

        debug!("Search returned {} of {} records", returned_records, number_of_records);

        Ok(SearchResponse {
            version: params.version().to_string(),
            number_of_records,
            returned_records,
            query: params.query.clone(),
            transformed_query: query.to_string(),
            base_url: self.base_url.clone(),
            xcontext: params.xcontext.clone(),
            xdataview: params.xdataview.clone(),
            next_record_position: 0,
            hits,
        })
    }
}

/// Total number of index rows matching `options`, ignoring pagination.
fn count_matches(store: &dyn IndexStore, options: &QueryOptions) -> Result<u64> {
    let count = build_query("", "", &options.count_only())?;
    let mut rows = store.execute(&count)?;
    let col = rows.column_index(SchemaConfig::COUNT_COLUMN).unwrap_or(0);
    let total = rows
        .next_row()
        .and_then(|row| row.integer(col))
        .map(|n| n.max(0) as u64)
        .unwrap_or(0);
    rows.close();
    Ok(total)
}

fn entry_title(content: &str) -> String {
    if content.trim().is_empty() {
        return String::new();
    }
    match XmlDocument::parse(content) {
        Ok(doc) => tei::title_of(&doc),
        Err(e) => {
            warn!("Entry content is not well-formed: {}", e);
            String::new()
        }
    }
}
