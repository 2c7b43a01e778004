//! explain: what the endpoint serves, taken from the database's TEI header.

use serde::Serialize;

use crate::endpoint::{EndpointConfig, IndexDescriptor};
use crate::error::Result;
use crate::store::IndexStore;
use crate::tei;

/// Result model of an explain operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplainResponse {
    pub host_id: String,
    /// Public name of the database.
    pub database: String,
    pub database_title: String,
    /// Authors joined with `"; "`.
    pub database_author: String,
    /// Target of the restricted availability reference, if any.
    pub restrictions: String,
    /// Serialized front matter, or the serialized header without one.
    pub description: String,
    pub indices: Vec<IndexDescriptor>,
}

/// Describe the endpoint configured by `config`.
///
/// Header fields stay empty when the table has no usable header.
pub fn explain(store: &dyn IndexStore, config: &EndpointConfig, host: &str) -> Result<ExplainResponse> {
    let mut response = ExplainResponse {
        host_id: host.to_string(),
        database: config.public_name.clone(),
        database_title: String::new(),
        database_author: String::new(),
        restrictions: String::new(),
        description: String::new(),
        indices: config.indices.clone(),
    };

    if let Some(header) = tei::fetch_header(store, &config.table)? {
        response.database_title = header.string("//titleStmt/title");
        response.database_author = header.values("//fileDesc/author").join("; ");
        response.restrictions = header
            .string(r#"//publicationStmt/availability[@status="restricted"]//ref/@target"#);
        response.description = match tei::fetch_front_matter(store, &config.table)? {
            Some(front) => front.root_xml(),
            None => header.root_xml(),
        };
    }

    Ok(response)
}
