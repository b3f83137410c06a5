use fuzzwire::parameters::ParamPosition;
use fuzzwire::reporting::{export_csv, export_json, export_markdown, FuzzResult};
use fuzzwire::response_analysis::Finding;
use std::fs;

fn sample_results() -> Vec<FuzzResult> {
    let mut clean = FuzzResult::new("GET", "http://shop.test/search?q=shoes", "q", ParamPosition::Query, "shoes");
    clean.status = Some(200);
    clean.length = Some(512);
    clean.duration_ms = Some(12);

    let mut anomaly = FuzzResult::new("GET", "http://shop.test/search?q=shoes", "q", ParamPosition::Query, "=HYPERLINK(\"http://evil.com\")")
        .with_findings(&[Finding::ServerError(500)]);
    anomaly.status = Some(500);

    let failed = FuzzResult::new("POST", "http://shop.test/login", "user", ParamPosition::Form, "@SUM(1+1)")
        .with_error("connection refused");

    vec![clean, anomaly, failed]
}

// Single test: report names only have second resolution, so parallel tests
// would write to the same files.
#[test]
fn reporting_exports_create_files() {
    let results = sample_results();

    let csv_filename = export_csv(&results).expect("CSV export should succeed");
    let md_filename = export_markdown(&results).expect("Markdown export should succeed");
    let json_filename = export_json(&results).expect("JSON export should succeed");

    assert!(csv_filename.starts_with("fuzzwire_report_") && csv_filename.ends_with(".csv"));
    assert!(md_filename.starts_with("fuzzwire_report_") && md_filename.ends_with(".md"));
    assert!(json_filename.starts_with("fuzzwire_report_") && json_filename.ends_with(".json"));

    let csv = fs::read_to_string(&csv_filename).expect("CSV file should exist");
    assert!(csv.starts_with("Method,URL,Parameter,Position,Payload,Status,Length,DurationMs,Result,Findings\n"));
    assert!(csv.contains("GET,http://shop.test/search?q=shoes,q,query,shoes,200,512,12,CLEAN,\n"));
    assert!(csv.contains("\"'=HYPERLINK(\"\"http://evil.com\"\")\""), "CSV should escape = prefix");
    assert!(csv.contains("\"'@SUM(1+1)\""), "CSV should escape @ prefix");
    assert!(csv.contains(",ERROR,connection refused"));

    let markdown = fs::read_to_string(&md_filename).expect("Markdown file should exist");
    assert!(markdown.starts_with("# fuzzwire Report\n"));
    assert!(markdown.contains("3 probes, 1 anomalies"));
    assert!(markdown.contains("  - server error 500"));

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&json_filename).expect("JSON file should exist")).unwrap();
    assert_eq!(json[1]["position"], "query");
    assert_eq!(json[2]["error"], "connection refused");

    let _ = fs::remove_file(&csv_filename);
    let _ = fs::remove_file(&md_filename);
    let _ = fs::remove_file(&json_filename);
}
