//! SRU/FCS endpoint: request dispatch over one dictionary table.
//!
//! An endpoint is configured with the dictionary table and the CQL indices it
//! exposes. Each request is dispatched to explain, scan or searchRetrieve;
//! failures go to the caller's [`Diagnostics`] sink exactly once.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use crate::charref;
use crate::config::SruConfig;
use crate::error::{Result, WebdictError};
use crate::explain::{explain, ExplainResponse};
use crate::matcher::{split_wildcard, term_for_exact_search, term_for_wildcard_search, WildcardSplit};
use crate::params::{Operation, SruParams};
use crate::query::{build_query, validate_identifier, QueryOptions};
use crate::scan::{ScanEngine, ScanResponse};
use crate::search::{QueryInput, SearchEngine, SearchResponse};
use crate::store::IndexStore;

/// One CQL index exposed by the endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexDescriptor {
    /// Index name as used in queries (`lemma` in `lemma=cat`).
    pub name: String,
    /// Human-readable title.
    #[serde(default)]
    pub title: String,
    /// Xpath suffix of the indexed tokens, e.g. `-form-orth-`.
    pub xpath: String,
    #[serde(default)]
    pub search: bool,
    #[serde(default)]
    pub scan: bool,
    #[serde(default)]
    pub sort: bool,
    /// Report lemmas alongside scanned terms.
    #[serde(default)]
    pub show_lemma: bool,
}

fn default_maximum_terms() -> usize {
    SruConfig::DEFAULT_MAXIMUM_TERMS
}

/// Per-endpoint settings, usually read from a JSON file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointConfig {
    /// Dictionary table; its index table is `<table>_ndx`.
    pub table: String,
    /// Database name reported by explain.
    pub public_name: String,
    /// Context set queries may prefix index names with.
    #[serde(default)]
    pub context_set: Option<String>,
    #[serde(default)]
    pub indices: Vec<IndexDescriptor>,
    #[serde(default = "default_maximum_terms")]
    pub default_maximum_terms: usize,
    /// Endpoint address reported in search responses.
    #[serde(default)]
    pub base_url: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            table: String::new(),
            public_name: String::new(),
            context_set: None,
            indices: Vec::new(),
            default_maximum_terms: default_maximum_terms(),
            base_url: String::new(),
        }
    }
}

impl EndpointConfig {
    /// Load and validate a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents =
            fs::read_to_string(path).map_err(|e| WebdictError::io_with_path(e, path))?;

        let config: Self = serde_json::from_str(&contents).map_err(|e| WebdictError::Json {
            message: format!("Failed to parse {}: {}", path.display(), e),
            source: Some(e),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration can serve requests.
    pub fn validate(&self) -> Result<()> {
        if validate_identifier(&self.table).is_err() {
            return Err(WebdictError::Config {
                message: format!("invalid table name {:?}", self.table),
            });
        }
        if let Some(index) = self.indices.iter().find(|i| i.name.trim().is_empty()) {
            return Err(WebdictError::Config {
                message: format!("index with xpath {:?} has no name", index.xpath),
            });
        }
        Ok(())
    }
}

/// One SRU diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: u32,
    pub message: String,
}

/// Receives the diagnostic of a failed request.
pub trait Diagnostics {
    fn report(&mut self, code: u32, message: &str);
}

/// [`Diagnostics`] sink that keeps every report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectingDiagnostics {
    pub reports: Vec<Diagnostic>,
}

impl CollectingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// The first report, if any.
    pub fn first(&self) -> Option<&Diagnostic> {
        self.reports.first()
    }
}

impl Diagnostics for CollectingDiagnostics {
    fn report(&mut self, code: u32, message: &str) {
        self.reports.push(Diagnostic {
            code,
            message: message.to_string(),
        });
    }
}

/// Result model of any operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "operation", rename_all = "camelCase")]
pub enum SruResponse {
    Explain(ExplainResponse),
    Scan(ScanResponse),
    SearchRetrieve(SearchResponse),
}

/// A query term resolved against the configured indices.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ResolvedTerm<'a> {
    index: &'a IndexDescriptor,
    /// Decoded term text.
    term: String,
    /// Matched by the exact-search grammar.
    exact: bool,
}

/// Serves SRU requests for one dictionary table.
pub struct SruEndpoint<S: IndexStore> {
    store: S,
    config: EndpointConfig,
    host: String,
    scan_engine: ScanEngine,
    search_engine: SearchEngine,
}

impl<S: IndexStore> SruEndpoint<S> {
    pub fn new(store: S, config: EndpointConfig) -> Self {
        let scan_engine = ScanEngine::new(config.default_maximum_terms);
        let search_engine = SearchEngine::new(config.base_url.clone());
        Self {
            store,
            config,
            host: String::new(),
            scan_engine,
            search_engine,
        }
    }

    /// Set the host id reported by explain.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Replace the search engine, e.g. to install a content extractor.
    pub fn with_search_engine(mut self, engine: SearchEngine) -> Self {
        self.search_engine = engine;
        self
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Handle one request.
    ///
    /// On failure the diagnostic goes to `diagnostics` and `None` is
    /// returned; nothing is retried.
    pub fn process_request(
        &self,
        params: &SruParams,
        diagnostics: &mut dyn Diagnostics,
    ) -> Option<SruResponse> {
        match self.dispatch(params) {
            Ok(response) => Some(response),
            Err(e) => {
                warn!("Request failed: {}", e);
                diagnostics.report(e.to_diagnostic_code(), &e.to_string());
                None
            }
        }
    }

    fn dispatch(&self, params: &SruParams) -> Result<SruResponse> {
        let operation = params.operation()?;
        debug!("Dispatching {}", operation);
        match operation {
            Operation::Explain => {
                explain(&self.store, &self.config, &self.host).map(SruResponse::Explain)
            }
            Operation::Scan => self.scan(params).map(SruResponse::Scan),
            Operation::SearchRetrieve => self.search(params).map(SruResponse::SearchRetrieve),
        }
    }

    /// Scan the terms of the index named in `scanClause`.
    pub fn scan(&self, params: &SruParams) -> Result<ScanResponse> {
        let resolved = self.resolve(&params.scan_clause)?;
        if !resolved.index.scan {
            return Err(WebdictError::UnsupportedIndex(format!(
                "{} does not support scan",
                resolved.index.name
            )));
        }

        let split = split_wildcard(&resolved.term);
        let options = QueryOptions {
            table: Some(self.config.table.clone()),
            xpath: Some(resolved.index.xpath.clone()),
            show_lemma: resolved.index.show_lemma,
            distinct_values: true,
            ..Default::default()
        };
        let query = build_query("", "", &options)?;

        self.scan_engine.scan(
            &self.store,
            &query,
            Some(split.anchor()),
            split.anchored_at_start(),
            params,
        )
    }

    /// Retrieve the entries matching `query`.
    pub fn search(&self, params: &SruParams) -> Result<SearchResponse> {
        let resolved = self.resolve(&params.query)?;
        if !resolved.index.search {
            return Err(WebdictError::UnsupportedIndex(format!(
                "{} does not support searchRetrieve",
                resolved.index.name
            )));
        }

        let split = split_wildcard(&resolved.term);
        let token = split.anchor();
        let start_record = match (params.start_record, params.maximum_records) {
            (Some(start), _) => Some(start),
            (None, Some(_)) => Some(1),
            (None, None) => None,
        };
        let options = QueryOptions {
            table: Some(self.config.table.clone()),
            xpath: Some(resolved.index.xpath.clone()),
            show_lemma: resolved.index.show_lemma,
            query: (!token.is_empty()).then(|| token.to_string()),
            exact: resolved.exact && matches!(split, WildcardSplit::Plain(_)),
            start_record,
            maximum_records: params.maximum_records,
            ..Default::default()
        };

        self.search_engine
            .search(&self.store, QueryInput::Structured(options), params)
    }

    /// Find the first configured index addressed by `query`, preferring the
    /// exact grammar over the wildcard one for each index.
    fn resolve(&self, query: &str) -> Result<ResolvedTerm<'_>> {
        if query.trim().is_empty() {
            return Err(WebdictError::QuerySyntax("empty query".to_string()));
        }
        let context = self.config.context_set.as_deref();

        for index in &self.config.indices {
            let (term, exact) = match term_for_exact_search(&index.name, query, context) {
                Some(term) => (term, true),
                None => match term_for_wildcard_search(&index.name, query, context) {
                    Some(term) => (term, false),
                    None => continue,
                },
            };
            debug!("Query {:?} addresses index {}", query, index.name);
            return Ok(ResolvedTerm {
                index,
                term: charref::decode(term.trim()),
                exact,
            });
        }

        Err(WebdictError::UnsupportedIndex(query.to_string()))
    }
}
