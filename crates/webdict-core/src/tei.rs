//! Well-known TEI parts stored inside dictionary tables.
//!
//! Some dictionary tables keep their TEI header at row id 1 and their front
//! matter at row id 5, next to the ordinary entries.

use rusqlite::types::Value;
use tracing::{debug, warn};

use crate::charref;
use crate::config::SchemaConfig;
use crate::document::XmlDocument;
use crate::error::Result;
use crate::query::{validate_identifier, SqlQuery};
use crate::store::IndexStore;

/// Path of the title inside an entry's or the database's TEI header.
pub const TITLE_PATH: &str = "//teiHeader/fileDesc/titleStmt/title";

/// Fetch the part stored at row `id` of `table` as a parsed document.
///
/// Returns `Ok(None)` when there is no such row, its content is blank, it is
/// not well-formed XML, or the lookup itself fails. Only an unusable table
/// name is an error.
pub fn fetch_part(store: &dyn IndexStore, table: &str, id: i64) -> Result<Option<XmlDocument>> {
    validate_identifier(table)?;
    let query = SqlQuery::with_params(
        format!("SELECT entry FROM {} WHERE id = ?", table),
        vec![Value::Integer(id)],
    );

    let mut rows = match store.execute(&query) {
        Ok(rows) => rows,
        Err(e) => {
            warn!("Lookup of part {} in {} failed: {}", id, table, e);
            return Ok(None);
        }
    };

    let Some(stored) = rows.next_row().and_then(|row| row.text(0)) else {
        debug!("No part {} in {}", id, table);
        return Ok(None);
    };
    rows.close();

    let decoded = charref::decode(&stored);
    if decoded.trim().is_empty() {
        return Ok(None);
    }

    match XmlDocument::parse(&decoded) {
        Ok(doc) => Ok(Some(doc)),
        Err(e) => {
            warn!("Part {} in {} is not well-formed: {}", id, table, e);
            Ok(None)
        }
    }
}

/// The TEI header (well-known id 1).
pub fn fetch_header(store: &dyn IndexStore, table: &str) -> Result<Option<XmlDocument>> {
    fetch_part(store, table, SchemaConfig::HEADER_PART_ID)
}

/// The TEI front matter (well-known id 5).
pub fn fetch_front_matter(store: &dyn IndexStore, table: &str) -> Result<Option<XmlDocument>> {
    fetch_part(store, table, SchemaConfig::FRONT_MATTER_PART_ID)
}

/// Concatenated text of the header titles in `doc`.
pub fn title_of(doc: &XmlDocument) -> String {
    doc.concat_text(TITLE_PATH)
}
