//! SRU request parameters.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::SruConfig;
use crate::error::{Result, WebdictError};

/// The supported SRU operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Operation {
    #[default]
    Explain,
    Scan,
    SearchRetrieve,
}

impl Operation {
    /// Parse an `operation` parameter; an empty value means `explain`.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "" | "explain" => Ok(Operation::Explain),
            "scan" => Ok(Operation::Scan),
            "searchRetrieve" => Ok(Operation::SearchRetrieve),
            other => Err(WebdictError::UnsupportedOperation(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Explain => "explain",
            Operation::Scan => "scan",
            Operation::SearchRetrieve => "searchRetrieve",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Read-only protocol parameters of one request.
///
/// Field names follow the SRU/FCS parameter names, so a request's query
/// string or JSON body deserializes directly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SruParams {
    pub operation: String,
    pub version: String,
    pub query: String,
    pub scan_clause: String,
    pub maximum_terms: Option<usize>,
    pub start_record: Option<u64>,
    pub maximum_records: Option<u64>,
    pub record_schema: String,
    pub record_packing: String,
    #[serde(rename = "x-context")]
    pub xcontext: String,
    #[serde(rename = "x-dataview")]
    pub xdataview: String,
}

impl SruParams {
    /// The requested operation.
    pub fn operation(&self) -> Result<Operation> {
        Operation::parse(&self.operation)
    }

    /// The protocol version, defaulting to the one this endpoint speaks.
    pub fn version(&self) -> &str {
        if self.version.is_empty() {
            SruConfig::DEFAULT_VERSION
        } else {
            &self.version
        }
    }

    pub fn record_schema(&self) -> &str {
        if self.record_schema.is_empty() {
            SruConfig::DEFAULT_RECORD_SCHEMA
        } else {
            &self.record_schema
        }
    }

    pub fn record_packing(&self) -> &str {
        if self.record_packing.is_empty() {
            SruConfig::DEFAULT_RECORD_PACKING
        } else {
            &self.record_packing
        }
    }

    /// Whether the data view asks for entry titles.
    pub fn want_title(&self) -> bool {
        self.xdataview.to_lowercase().contains("title")
    }

    /// Whether the data view asks for the database header.
    pub fn want_metadata(&self) -> bool {
        self.xdataview.to_lowercase().contains("metadata")
    }

    /// Rebuild the request's query string (without `?`), for permalinks.
    pub fn to_query_string(&self) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        let numbers = [
            ("maximumTerms", self.maximum_terms.map(|n| n as u64)),
            ("startRecord", self.start_record),
            ("maximumRecords", self.maximum_records),
        ];
        for (key, value) in [
            ("operation", &self.operation),
            ("version", &self.version),
            ("query", &self.query),
            ("scanClause", &self.scan_clause),
        ] {
            if !value.is_empty() {
                serializer.append_pair(key, value);
            }
        }
        for (key, value) in numbers {
            if let Some(value) = value {
                serializer.append_pair(key, &value.to_string());
            }
        }
        for (key, value) in [
            ("recordSchema", &self.record_schema),
            ("recordPacking", &self.record_packing),
            ("x-context", &self.xcontext),
            ("x-dataview", &self.xdataview),
        ] {
            if !value.is_empty() {
                serializer.append_pair(key, value);
            }
        }
        serializer.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_parse() {
        assert_eq!(Operation::parse("").unwrap(), Operation::Explain);
        assert_eq!(Operation::parse("explain").unwrap(), Operation::Explain);
        assert_eq!(Operation::parse("scan").unwrap(), Operation::Scan);
        assert_eq!(
            Operation::parse("searchRetrieve").unwrap(),
            Operation::SearchRetrieve
        );
        assert!(matches!(
            Operation::parse("update"),
            Err(WebdictError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn test_operation_roundtrip() {
        for op in [Operation::Explain, Operation::Scan, Operation::SearchRetrieve] {
            assert_eq!(Operation::parse(op.as_str()).unwrap(), op);
        }
    }

    #[test]
    fn test_data_view_flags() {
        let params = SruParams {
            xdataview: "full,Title".to_string(),
            ..Default::default()
        };
        assert!(params.want_title());
        assert!(!params.want_metadata());
    }

    #[test]
    fn test_defaults() {
        let params = SruParams::default();
        assert_eq!(params.version(), "1.2");
        assert_eq!(params.record_packing(), "xml");
        assert_eq!(params.operation().unwrap(), Operation::Explain);
    }

    #[test]
    fn test_deserialize_protocol_names() {
        let params: SruParams = serde_json::from_value(serde_json::json!({
            "operation": "searchRetrieve",
            "query": "lemma=cat",
            "maximumRecords": 10,
            "x-dataview": "title"
        }))
        .unwrap();
        assert_eq!(params.operation().unwrap(), Operation::SearchRetrieve);
        assert_eq!(params.maximum_records, Some(10));
        assert_eq!(params.start_record, None);
        assert!(params.want_title());
    }

    #[test]
    fn test_to_query_string() {
        let params = SruParams {
            operation: "searchRetrieve".to_string(),
            query: "lemma=ʕayn & co".to_string(),
            start_record: Some(5),
            xdataview: "title".to_string(),
            ..Default::default()
        };
        assert_eq!(
            params.to_query_string(),
            "operation=searchRetrieve&query=lemma%3D%CA%95ayn+%26+co&startRecord=5&x-dataview=title"
        );
    }
}
