//! Centralized configuration constants for webdict-core.
//!
//! Per-endpoint settings (table, indices) live in
//! [`EndpointConfig`](crate::endpoint::EndpointConfig); this module holds the
//! fixed protocol and schema conventions.

/// SRU protocol defaults.
pub struct SruConfig;

impl SruConfig {
    pub const DEFAULT_VERSION: &'static str = "1.2";
    pub const DEFAULT_RECORD_SCHEMA: &'static str = "http://clarin.eu/fcs/resource";
    pub const DEFAULT_RECORD_PACKING: &'static str = "xml";
    pub const DEFAULT_MAXIMUM_TERMS: usize = 100;
}

/// Conventions of the path-indexed dictionary schema.
pub struct SchemaConfig;

impl SchemaConfig {
    /// Suffix of the companion index table (`<table>_ndx`).
    pub const INDEX_TABLE_SUFFIX: &'static str = "_ndx";
    /// Row id of the TEI header within a dictionary table.
    pub const HEADER_PART_ID: i64 = 1;
    /// Row id of the TEI front matter within a dictionary table.
    pub const FRONT_MATTER_PART_ID: i64 = 5;
    /// Column alias carrying per-group counts.
    pub const COUNT_COLUMN: &'static str = "hits";
}

/// Sort-key sentinels used by the scan engine.
pub struct SortConfig;

impl SortConfig {
    /// Punctuation ignored when building sort keys.
    pub const IGNORED_PUNCTUATION: &'static [char] =
        &['?', '!', '(', ')', '*', ',', '.', '-', '/', '|', '='];
    /// Prefix for keys starting with a digit; sorts after every letter.
    pub const NUMERIC_PREFIX: char = '\u{10FFFE}';
    /// Key for terms that are empty after normalization; sorts last.
    pub const EMPTY_KEY: &'static str = "\u{10FFFF}";
}

/// SRU diagnostic codes reported by the endpoint.
pub struct DiagnosticCodes;

impl DiagnosticCodes {
    pub const GENERAL_SYSTEM_ERROR: u32 = 1;
    pub const UNSUPPORTED_OPERATION: u32 = 4;
    pub const QUERY_SYNTAX_ERROR: u32 = 10;
    pub const UNSUPPORTED_INDEX: u32 = 16;
}
