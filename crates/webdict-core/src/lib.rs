//! Webdict Core - SRU/FCS search over path-indexed dictionary tables.
//!
//! A dictionary is stored as a table of TEI entries plus a companion
//! `<table>_ndx` table of (entry id, xpath, token) rows. This crate turns
//! CQL-style queries into parameter-bound SQL against that pair, and turns
//! the rows back into explain, scan and searchRetrieve result models. It
//! renders no markup; the models serialize with serde.
//!
//! # Example
//!
//! ```rust,ignore
//! use webdict_core::{CollectingDiagnostics, EndpointConfig, SqliteStore, SruEndpoint, SruParams};
//!
//! fn main() -> webdict_core::Result<()> {
//!     let config = EndpointConfig::from_file("endpoint.json")?;
//!     let store = SqliteStore::open("dictionaries.db")?;
//!     let endpoint = SruEndpoint::new(store, config);
//!
//!     let params = SruParams {
//!         operation: "scan".to_string(),
//!         scan_clause: "lemma=ka*".to_string(),
//!         ..Default::default()
//!     };
//!     let mut diagnostics = CollectingDiagnostics::new();
//!     if let Some(response) = endpoint.process_request(&params, &mut diagnostics) {
//!         println!("{}", serde_json::to_string_pretty(&response).unwrap());
//!     }
//!     Ok(())
//! }
//! ```

pub mod charref;
pub mod config;
pub mod document;
pub mod endpoint;
pub mod error;
pub mod explain;
pub mod matcher;
pub mod params;
pub mod query;
pub mod scan;
pub mod search;
pub mod store;
pub mod tei;

// Re-export commonly used types
pub use document::XmlDocument;
pub use endpoint::{
    CollectingDiagnostics, Diagnostic, Diagnostics, EndpointConfig, IndexDescriptor, SruEndpoint,
    SruResponse,
};
pub use error::{Result, WebdictError};
pub use explain::ExplainResponse;
pub use params::{Operation, SruParams};
pub use query::{build_query, QueryOptions, SqlQuery};
pub use scan::{ScanEngine, ScanResponse, TermResult};
pub use search::{Hit, QueryInput, SearchEngine, SearchResponse};
pub use store::{IndexStore, Row, RowSet, SqliteStore};
