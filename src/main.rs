// Main CLI entry point for fuzzwire
// Uses clap for argument parsing

use clap::{Arg, Command};
use fuzzwire::codec::parse_request_with_scheme;
use fuzzwire::config::FuzzConfig;
use fuzzwire::engine::HttpTransport;
use fuzzwire::har::har_to_http_text;
use fuzzwire::payloads::{payload_variants, Payload};
use fuzzwire::reporting::{export_csv, export_markdown, FuzzResult};
use fuzzwire::response_analysis::{ResponseAnalyzer, ResponseSummary};
use fuzzwire::session::FuzzSession;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use walkdir::WalkDir;

const CAPTURE_EXTENSIONS: &[&str] = &["http", "req", "txt", "har"];

/// A file is used as given; a directory is walked for capture files.
fn collect_inputs(input: &Path) -> Vec<PathBuf> {
    if !input.is_dir() {
        return vec![input.to_path_buf()];
    }

    let mut files: Vec<PathBuf> = WalkDir::new(input)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| CAPTURE_EXTENSIONS.iter().any(|c| c.eq_ignore_ascii_case(ext)))
        })
        .collect();
    files.sort();
    files
}

struct RunOptions {
    scheme: &'static str,
    list_params: bool,
    payload_expansion: bool,
}

fn is_har(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("har"))
}

/// Raw request texts in a capture file: one for a raw capture, one per entry for a HAR.
fn load_requests(path: &Path) -> fuzzwire::Result<Vec<(String, Vec<u8>)>> {
    if !is_har(path) {
        return Ok(vec![(path.display().to_string(), std::fs::read(path)?)]);
    }
    let content = std::fs::read_to_string(path)?;
    Ok(har_to_http_text(&content)?
        .into_iter()
        .enumerate()
        .map(|(i, pair)| (format!("{}#{}", path.display(), i + 1), pair.request.into_bytes()))
        .collect())
}

async fn fuzz_capture(
    label: &str,
    raw: &[u8],
    config: &FuzzConfig,
    transport: &HttpTransport,
    options: &RunOptions,
    results: &mut Vec<FuzzResult>,
) -> fuzzwire::Result<()> {
    let request = parse_request_with_scheme(raw, options.scheme)?;
    let session = FuzzSession::from_request(request, config, transport.clone()).await?;

    let method = session.request().method.to_string();
    let url = session.request().url.to_string();

    if options.list_params {
        println!("{}: {} {}", label, method, url);
        println!("{}", serde_json::to_string_pretty(session.get_all_params())?);
        return Ok(());
    }

    let start = Instant::now();
    let mut baseline_response = session.send_original_request().await?;
    let baseline = ResponseSummary::capture(&mut baseline_response, start.elapsed())?;
    println!(
        "[BASELINE] {} {}: {} ({} bytes, {}ms)",
        method,
        url,
        baseline.status,
        baseline.length,
        baseline.duration.as_millis()
    );

    let analyzer = ResponseAnalyzer::new(config);
    for param in session.get_all_fuzzable_params() {
        let original = param.value.first().unwrap_or_default();
        let payloads = if options.payload_expansion {
            payload_variants(original)
        } else {
            vec![Payload::original(original)]
        };

        for payload in payloads {
            let probe = param.with_value(payload.value.as_str());
            let result = FuzzResult::new(&method, &url, &param.name, param.position, &payload.value);

            let result = match session.send_modified_request_ex(&probe).await {
                Ok(mut exchange) => match ResponseSummary::capture(&mut exchange.response, exchange.duration) {
                    Ok(summary) => {
                        let findings = analyzer.analyze(&baseline, &summary, &payload);
                        let mut result = result.with_findings(&findings);
                        result.status = Some(summary.status);
                        result.length = Some(summary.length);
                        result.duration_ms = Some(summary.duration.as_millis());
                        result
                    }
                    Err(e) => result.with_error(e),
                },
                Err(e) => result.with_error(e),
            };

            let detail = match &result.error {
                Some(error) => error.clone(),
                None => result.findings.join(" | "),
            };
            println!(
                "[{}] {} {} {}={:?} {}",
                result.verdict(),
                method,
                url,
                param.name,
                payload.value,
                detail
            );
            results.push(result);
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fuzzwire=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let matches = Command::new("fuzzwire")
        .version(clap::crate_version!())
        .author("Jake Abendroth")
        .about("Replays raw HTTP captures with one parameter fuzzed at a time")
        .after_help("EXAMPLES:\n  fuzzwire -i login.http --https\n  fuzzwire -i captures/ --config fuzzwire.toml --csv-report\n  fuzzwire -i search.req --list-params\n  fuzzwire -i session.har --https")
        .arg(Arg::new("input")
            .short('i')
            .long("input")
            .required(true)
            .num_args(1)
            .help("Raw HTTP request or HAR file, or a directory of .http/.req/.txt/.har captures"))
        .arg(Arg::new("config")
            .short('c')
            .long("config")
            .num_args(1)
            .help("TOML config file (path templates, sensitive headers, thresholds)"))
        .arg(Arg::new("https")
            .long("https")
            .action(clap::ArgAction::SetTrue)
            .help("Send captures over https instead of http"))
        .arg(Arg::new("list_params")
            .long("list-params")
            .action(clap::ArgAction::SetTrue)
            .help("Print extracted parameters as JSON and exit without sending"))
        .arg(Arg::new("no_payload_expansion")
            .long("no-payload-expansion")
            .action(clap::ArgAction::SetTrue)
            .help("Replay each parameter with its captured value only"))
        .arg(Arg::new("csv_report")
            .long("csv-report")
            .action(clap::ArgAction::SetTrue)
            .help("Output CSV report (default: on)"))
        .arg(Arg::new("markdown_report")
            .long("markdown-report")
            .action(clap::ArgAction::SetTrue)
            .help("Output Markdown report (default: on)"))
        .get_matches();

    let Some(input) = matches.get_one::<String>("input") else {
        eprintln!("--input is required");
        std::process::exit(2);
    };
    let csv_report = matches.get_flag("csv_report") || !matches.get_flag("markdown_report");
    let markdown_report = matches.get_flag("markdown_report") || !matches.get_flag("csv_report");
    let options = RunOptions {
        scheme: if matches.get_flag("https") { "https" } else { "http" },
        list_params: matches.get_flag("list_params"),
        payload_expansion: !matches.get_flag("no_payload_expansion"),
    };

    let config = match matches.get_one::<String>("config") {
        Some(path) => FuzzConfig::load(Path::new(path)).unwrap_or_else(|e| {
            eprintln!("Failed to load config {}: {}", path, e);
            std::process::exit(2);
        }),
        None => FuzzConfig::default(),
    };

    let inputs = collect_inputs(Path::new(input));
    if inputs.is_empty() {
        eprintln!("No capture files found under {}", input);
        std::process::exit(2);
    }
    println!("Discovered {} capture files.", inputs.len());

    let transport = HttpTransport::new().unwrap_or_else(|e| {
        eprintln!("Failed to build HTTP client: {}", e);
        std::process::exit(1);
    });

    let mut results = Vec::new();
    let mut failed = 0;
    let mut captures = 0;
    for path in &inputs {
        let requests = match load_requests(path) {
            Ok(requests) => requests,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Capture file skipped");
                println!("[ERROR] {}: {}", path.display(), e);
                failed += 1;
                captures += 1;
                continue;
            }
        };
        for (label, raw) in requests {
            captures += 1;
            if let Err(e) = fuzz_capture(&label, &raw, &config, &transport, &options, &mut results).await {
                tracing::warn!(capture = %label, error = %e, "Capture skipped");
                println!("[ERROR] {}: {}", label, e);
                failed += 1;
            }
        }
    }

    if options.list_params {
        return;
    }

    if csv_report {
        match export_csv(&results) {
            Ok(file) => println!("CSV report written to {}", file),
            Err(e) => eprintln!("Failed to write CSV report: {}", e),
        }
    }
    if markdown_report {
        match export_markdown(&results) {
            Ok(file) => println!("Markdown report written to {}", file),
            Err(e) => eprintln!("Failed to write Markdown report: {}", e),
        }
    }

    if failed > 0 && failed == captures {
        std::process::exit(1);
    }
}
