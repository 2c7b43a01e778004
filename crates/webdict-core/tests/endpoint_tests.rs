//! Integration tests for SruEndpoint against an on-disk dictionary.
//!
//! The fixture mimics a dictionary table pair: a TEI header at id 1, front
//! matter at id 5 and a handful of entries with their index rows.

use rusqlite::Connection;
use std::path::Path;
use tempfile::TempDir;
use webdict_core::{
    build_query, CollectingDiagnostics, EndpointConfig, IndexDescriptor, QueryInput,
    QueryOptions, SearchEngine, SqliteStore, SruEndpoint, SruParams, SruResponse,
};

const HEADER: &str = "<teiHeader><fileDesc><titleStmt><title>Fruit Dictionary</title></titleStmt>\
<author>Pomologist</author></fileDesc></teiHeader>";

fn create_dictionary(path: &Path) {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TABLE fruit (id INTEGER PRIMARY KEY, entry TEXT, lemma TEXT);
         CREATE TABLE fruit_ndx (id INTEGER, xpath TEXT, txt TEXT);",
    )
    .unwrap();

    let mut insert_entry = conn
        .prepare("INSERT INTO fruit (id, entry, lemma) VALUES (?1, ?2, ?3)")
        .unwrap();
    insert_entry.execute((1, HEADER, None::<String>)).unwrap();
    insert_entry
        .execute((5, "<front><p>Fruits of the world</p></front>", None::<String>))
        .unwrap();

    let entries = [
        (10, "Apple", "noun"),
        (11, "Banana", "noun"),
        (12, "Cherry", "noun"),
        (13, "Cherry-pick", "verb"),
        (14, "K#8#252#9#rbis", "noun"),
        (15, "1st-grade apple", "noun"),
    ];
    let mut insert_ndx = conn
        .prepare("INSERT INTO fruit_ndx (id, xpath, txt) VALUES (?1, ?2, ?3)")
        .unwrap();
    for (id, orth, pos) in entries {
        let entry = format!(
            "<entry><form><orth>{}</orth></form><gramGrp><pos>{}</pos></gramGrp></entry>",
            orth, pos
        );
        insert_entry.execute((id, entry, orth)).unwrap();
        insert_ndx.execute((id, "-entry-form-orth-", orth)).unwrap();
        insert_ndx.execute((id, "-entry-gramGrp-pos-", pos)).unwrap();
    }

    // An entry carrying its own title.
    insert_entry
        .execute((
            20,
            "<entry><teiHeader><fileDesc><titleStmt><title>Date palm</title></titleStmt></fileDesc></teiHeader><form><orth>Date</orth></form></entry>",
            "Date",
        ))
        .unwrap();
    insert_ndx.execute((20, "-entry-form-orth-", "Date")).unwrap();
    insert_ndx.execute((20, "-entry-gramGrp-pos-", "noun")).unwrap();
}

fn create_endpoint() -> (SruEndpoint<SqliteStore>, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("dict.db");
    create_dictionary(&db_path);

    let config = EndpointConfig {
        table: "fruit".to_string(),
        public_name: "fruit_eng".to_string(),
        context_set: Some("fcs".to_string()),
        indices: vec![
            IndexDescriptor {
                name: "lemma".to_string(),
                title: "Lemma".to_string(),
                xpath: "-form-orth-".to_string(),
                search: true,
                scan: true,
                sort: true,
                show_lemma: false,
            },
            IndexDescriptor {
                name: "pos".to_string(),
                title: "Part of speech".to_string(),
                xpath: "-gramGrp-pos-".to_string(),
                search: true,
                scan: true,
                ..Default::default()
            },
        ],
        base_url: "http://localhost/fruit".to_string(),
        ..Default::default()
    };
    let store = SqliteStore::open(&db_path).unwrap();
    (SruEndpoint::new(store, config).with_host("localhost:3000"), temp_dir)
}

fn scan(endpoint: &SruEndpoint<SqliteStore>, clause: &str, maximum_terms: Option<usize>) -> Vec<(String, usize)> {
    let params = SruParams {
        operation: "scan".to_string(),
        scan_clause: clause.to_string(),
        maximum_terms,
        ..Default::default()
    };
    let mut diagnostics = CollectingDiagnostics::new();
    match endpoint.process_request(&params, &mut diagnostics) {
        Some(SruResponse::Scan(response)) => response
            .terms
            .into_iter()
            .map(|t| (t.value, t.position))
            .collect(),
        other => panic!("expected scan response, got {:?} / {:?}", other, diagnostics),
    }
}

#[test]
fn test_explain_describes_database() {
    let (endpoint, _temp) = create_endpoint();
    let mut diagnostics = CollectingDiagnostics::new();
    let Some(SruResponse::Explain(explain)) =
        endpoint.process_request(&SruParams::default(), &mut diagnostics)
    else {
        panic!("expected explain response");
    };
    assert_eq!(explain.host_id, "localhost:3000");
    assert_eq!(explain.database, "fruit_eng");
    assert_eq!(explain.database_title, "Fruit Dictionary");
    assert_eq!(explain.database_author, "Pomologist");
    assert_eq!(explain.description, "<front><p>Fruits of the world</p></front>");
    assert_eq!(explain.indices.len(), 2);
}

#[test]
fn test_scan_orders_terms() {
    let (endpoint, _temp) = create_endpoint();
    let terms: Vec<String> = scan(&endpoint, "lemma=", None)
        .into_iter()
        .map(|(value, _)| value)
        .collect();
    assert_eq!(
        terms,
        vec!["Apple", "Banana", "Cherry", "Cherry-pick", "Date", "Kürbis", "1st-grade apple"]
    );
}

#[test]
fn test_scan_resume_and_window() {
    let (endpoint, _temp) = create_endpoint();
    assert_eq!(
        scan(&endpoint, "lemma=Ban", Some(2)),
        vec![("Banana".to_string(), 2), ("Cherry".to_string(), 3)]
    );
    assert_eq!(
        scan(&endpoint, "fcs.lemma = *ana", Some(1)),
        vec![("Banana".to_string(), 2)]
    );
    assert!(scan(&endpoint, "lemma=Zucchini", None).is_empty());
}

#[test]
fn test_scan_count_is_full_list_size() {
    let (endpoint, _temp) = create_endpoint();
    let params = SruParams {
        scan_clause: "lemma=Ban".to_string(),
        maximum_terms: Some(2),
        ..Default::default()
    };
    let response = endpoint.scan(&params).unwrap();
    assert_eq!(response.terms.len(), 2);
    assert_eq!(response.count, 7);
}

#[test]
fn test_scan_counts_records_per_term() {
    let (endpoint, _temp) = create_endpoint();
    let params = SruParams {
        scan_clause: "pos=".to_string(),
        ..Default::default()
    };
    let response = endpoint.scan(&params).unwrap();
    let counts: Vec<(&str, u64)> = response
        .terms
        .iter()
        .map(|t| (t.value.as_str(), t.number_of_records))
        .collect();
    assert_eq!(counts, vec![("noun", 6), ("verb", 1)]);
}

#[test]
fn test_search_pagination_total() {
    let (endpoint, _temp) = create_endpoint();
    let params = SruParams {
        operation: "searchRetrieve".to_string(),
        query: "pos=noun".to_string(),
        start_record: Some(5),
        maximum_records: Some(10),
        ..Default::default()
    };
    let mut diagnostics = CollectingDiagnostics::new();
    let Some(SruResponse::SearchRetrieve(response)) =
        endpoint.process_request(&params, &mut diagnostics)
    else {
        panic!("expected search response: {:?}", diagnostics);
    };
    assert_eq!(response.number_of_records, 6);
    assert_eq!(response.returned_records, 2);
    assert_eq!(response.base_url, "http://localhost/fruit");
    assert!(response.hits[0]
        .query_url
        .contains("startRecord=5&maximumRecords=10"));
}

#[test]
fn test_search_title_fallback() {
    let (endpoint, _temp) = create_endpoint();
    let params = SruParams {
        query: "lemma=Da".to_string(),
        xdataview: "title".to_string(),
        ..Default::default()
    };
    let response = endpoint.search(&params).unwrap();
    assert_eq!(response.hits.len(), 1);
    assert_eq!(response.hits[0].title, "Date palm");

    let params = SruParams {
        query: "lemma==Apple".to_string(),
        xdataview: "title".to_string(),
        ..Default::default()
    };
    let response = endpoint.search(&params).unwrap();
    assert_eq!(response.hits[0].title, "Fruit Dictionary");
}

#[test]
fn test_search_decodes_stored_terms() {
    let (endpoint, _temp) = create_endpoint();
    let params = SruParams {
        query: "lemma=Kür".to_string(),
        ..Default::default()
    };
    let response = endpoint.search(&params).unwrap();
    assert_eq!(response.number_of_records, 1);
    assert!(response.hits[0].content.contains("<orth>Kürbis</orth>"));
}

#[test]
fn test_prefiltered_structured_search() {
    let (endpoint, _temp) = create_endpoint();
    let options = QueryOptions {
        table: Some("fruit".to_string()),
        xpath: Some("-form-orth-".to_string()),
        query: Some("Cherry".to_string()),
        xpath_filters: vec![("-gramGrp-pos-".to_string(), "verb".to_string())],
        ..Default::default()
    };
    let response = SearchEngine::default()
        .search(
            endpoint.store(),
            QueryInput::Structured(options),
            &SruParams::default(),
        )
        .unwrap();
    assert_eq!(response.number_of_records, 1);
    assert!(response.hits[0].content.contains("Cherry-pick"));
}

#[test]
fn test_raw_search_uses_rows_returned() {
    let (endpoint, _temp) = create_endpoint();
    let query = build_query(
        "fruit",
        "-gramGrp-pos-",
        &QueryOptions {
            query: Some("noun".to_string()),
            exact: true,
            ..Default::default()
        },
    )
    .unwrap();
    let response = SearchEngine::default()
        .search(endpoint.store(), QueryInput::Raw(query), &SruParams::default())
        .unwrap();
    assert_eq!(response.number_of_records, 6);
    assert_eq!(response.returned_records, 6);
}

#[test]
fn test_diagnostics_for_bad_requests() {
    let (endpoint, _temp) = create_endpoint();
    let cases = [
        ("scan", "sense=x", "", 16),
        ("searchRetrieve", "", "", 10),
        ("delete", "", "", 4),
    ];
    for (operation, scan_clause, query, code) in cases {
        let params = SruParams {
            operation: operation.to_string(),
            scan_clause: scan_clause.to_string(),
            query: query.to_string(),
            ..Default::default()
        };
        let mut diagnostics = CollectingDiagnostics::new();
        assert!(endpoint.process_request(&params, &mut diagnostics).is_none());
        assert_eq!(diagnostics.reports.len(), 1, "{operation}");
        assert_eq!(diagnostics.reports[0].code, code, "{operation}");
    }
}
