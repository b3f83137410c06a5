// Reporting and output for fuzzwire
// Supports CSV, Markdown and JSON export of fuzz results

use crate::parameters::ParamPosition;
use crate::response_analysis::Finding;
use chrono::Local;
use serde::Serialize;
use std::fs::File;
use std::io::Write;

/// One probe: the parameter that was changed, what it was set to and what came back.
#[derive(Debug, Clone, Serialize)]
pub struct FuzzResult {
    pub method: String,
    pub url: String,
    pub param: String,
    pub position: ParamPosition,
    pub payload: String,
    pub status: Option<u16>,
    pub length: Option<usize>,
    pub duration_ms: Option<u128>,
    pub findings: Vec<String>,
    pub error: Option<String>,
}

impl FuzzResult {
    pub fn new(method: &str, url: &str, param: &str, position: ParamPosition, payload: &str) -> Self {
        Self {
            method: method.to_string(),
            url: url.to_string(),
            param: param.to_string(),
            position,
            payload: payload.to_string(),
            status: None,
            length: None,
            duration_ms: None,
            findings: Vec::new(),
            error: None,
        }
    }

    pub fn with_findings(mut self, findings: &[Finding]) -> Self {
        self.findings = findings.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn with_error(mut self, error: impl ToString) -> Self {
        self.error = Some(error.to_string());
        self
    }

    pub fn verdict(&self) -> &'static str {
        if self.error.is_some() {
            "ERROR"
        } else if self.findings.is_empty() {
            "CLEAN"
        } else {
            "ANOMALY"
        }
    }
}

/// Escape CSV field to prevent formula injection attacks
/// Cells starting with =, +, -, @, or tab are prefixed with single quote
pub fn escape_csv_field(field: &str) -> String {
    let Some(first_char) = field.chars().next() else {
        return String::new();
    };
    let needs_escaping = matches!(first_char, '=' | '+' | '-' | '@' | '\t');

    if needs_escaping {
        format!("\"'{}\"", field.replace('"', "\"\""))
    } else if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn report_filename(extension: &str) -> String {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    format!("fuzzwire_report_{}.{}", timestamp, extension)
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

pub fn export_csv(results: &[FuzzResult]) -> Result<String, std::io::Error> {
    let filename = report_filename("csv");
    let mut file = File::create(&filename)?;

    writeln!(file, "Method,URL,Parameter,Position,Payload,Status,Length,DurationMs,Result,Findings")?;
    for result in results {
        let findings = match &result.error {
            Some(error) => error.clone(),
            None => result.findings.join("; "),
        };
        writeln!(
            file,
            "{},{},{},{},{},{},{},{},{},{}",
            escape_csv_field(&result.method),
            escape_csv_field(&result.url),
            escape_csv_field(&result.param),
            result.position,
            escape_csv_field(&result.payload),
            optional(result.status),
            optional(result.length),
            optional(result.duration_ms),
            result.verdict(),
            escape_csv_field(&findings)
        )?;
    }

    Ok(filename)
}

pub fn export_markdown(results: &[FuzzResult]) -> Result<String, std::io::Error> {
    let filename = report_filename("md");
    let mut file = File::create(&filename)?;

    let anomalies = results.iter().filter(|r| r.verdict() == "ANOMALY").count();
    writeln!(file, "# fuzzwire Report\n")?;
    writeln!(file, "{} probes, {} anomalies\n", results.len(), anomalies)?;
    for result in results {
        writeln!(
            file,
            "- **{}** {} `{}` ({}) = `{}`: {}",
            result.method,
            result.url,
            result.param,
            result.position,
            result.payload.replace('`', "'"),
            result.verdict()
        )?;
        for finding in &result.findings {
            writeln!(file, "  - {}", finding)?;
        }
        if let Some(error) = &result.error {
            writeln!(file, "  - error: {}", error)?;
        }
    }

    Ok(filename)
}

pub fn export_json(results: &[FuzzResult]) -> Result<String, crate::error::Error> {
    let filename = report_filename("json");
    let file = File::create(&filename)?;
    serde_json::to_writer_pretty(file, results)?;
    Ok(filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_formula_cells() {
        assert_eq!(escape_csv_field("=SUM(A1)"), "\"'=SUM(A1)\"");
        assert_eq!(escape_csv_field("-1"), "\"'-1\"");
        assert_eq!(escape_csv_field("a,b"), "\"a,b\"");
        assert_eq!(escape_csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_csv_field("plain"), "plain");
        assert_eq!(escape_csv_field(""), "");
    }

    #[test]
    fn verdict_reflects_findings_and_errors() {
        let clean = FuzzResult::new("GET", "http://h/", "q", ParamPosition::Query, "x");
        assert_eq!(clean.verdict(), "CLEAN");

        let anomaly = clean.clone().with_findings(&[Finding::Reflected]);
        assert_eq!(anomaly.verdict(), "ANOMALY");
        assert_eq!(anomaly.findings, vec!["payload reflected"]);

        let failed = clean.with_error("connection refused");
        assert_eq!(failed.verdict(), "ERROR");
    }
}
