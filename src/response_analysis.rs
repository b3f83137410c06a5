// Response analysis for fuzzwire
// Compares a probe response against the baseline of the unmodified request

use crate::config::FuzzConfig;
use crate::error::Result;
use crate::models::HttpResponse;
use crate::payloads::{Payload, PayloadKind};
use std::fmt;
use std::time::Duration;

/// Extra latency a probe needs before it can count as slow.
const MIN_SLOW_DELTA: Duration = Duration::from_secs(1);

/// The parts of a response the analyzer compares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseSummary {
    pub status: u16,
    pub length: usize,
    pub duration: Duration,
    pub body: String,
}

impl ResponseSummary {
    /// Read the response body (consuming it) and record its shape.
    pub fn capture(response: &mut HttpResponse, duration: Duration) -> Result<Self> {
        let body = response.body.text()?;
        Ok(Self {
            status: response.status,
            length: body.len(),
            duration,
            body,
        })
    }
}

/// Something about a probe response that differs from the baseline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finding {
    StatusChanged { baseline: u16, probe: u16 },
    ServerError(u16),
    LengthDeviation { baseline: usize, probe: usize },
    Reflected,
    ExpressionEvaluated(i64),
    Slow { baseline: Duration, probe: Duration },
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::StatusChanged { baseline, probe } => write!(f, "status {} -> {}", baseline, probe),
            Finding::ServerError(status) => write!(f, "server error {}", status),
            Finding::LengthDeviation { baseline, probe } => write!(f, "length {} -> {}", baseline, probe),
            Finding::Reflected => write!(f, "payload reflected"),
            Finding::ExpressionEvaluated(result) => write!(f, "expression evaluated to {}", result),
            Finding::Slow { baseline, probe } => {
                write!(f, "slow {}ms -> {}ms", baseline.as_millis(), probe.as_millis())
            }
        }
    }
}

/// Baseline-vs-probe comparison with thresholds from the config.
#[derive(Debug, Clone)]
pub struct ResponseAnalyzer {
    length_deviation: f64,
    slow_factor: f64,
}

impl ResponseAnalyzer {
    pub fn new(config: &FuzzConfig) -> Self {
        Self {
            length_deviation: config.length_deviation,
            slow_factor: config.slow_factor,
        }
    }

    pub fn analyze(&self, baseline: &ResponseSummary, probe: &ResponseSummary, payload: &Payload) -> Vec<Finding> {
        let mut findings = Vec::new();

        if probe.status >= 500 && baseline.status < 500 {
            findings.push(Finding::ServerError(probe.status));
        } else if probe.status / 100 != baseline.status / 100 {
            findings.push(Finding::StatusChanged {
                baseline: baseline.status,
                probe: probe.status,
            });
        }

        if self.length_deviates(baseline.length, probe.length) {
            findings.push(Finding::LengthDeviation {
                baseline: baseline.length,
                probe: probe.length,
            });
        }

        match &payload.kind {
            PayloadKind::Injection | PayloadKind::Reflection
                if payload.value.len() >= 3
                    && probe.body.contains(&payload.value)
                    && !baseline.body.contains(&payload.value) =>
            {
                findings.push(Finding::Reflected);
            }
            PayloadKind::Expression { result } => {
                let result_text = result.to_string();
                if probe.body.contains(&result_text)
                    && !baseline.body.contains(&result_text)
                    && !payload.value.contains(&result_text)
                {
                    findings.push(Finding::ExpressionEvaluated(*result));
                }
            }
            _ => {}
        }

        let baseline_time = baseline.duration.max(Duration::from_millis(1));
        if probe.duration.as_secs_f64() > baseline_time.as_secs_f64() * self.slow_factor
            && probe.duration.saturating_sub(baseline.duration) >= MIN_SLOW_DELTA
        {
            findings.push(Finding::Slow {
                baseline: baseline.duration,
                probe: probe.duration,
            });
        }

        findings
    }

    fn length_deviates(&self, baseline: usize, probe: usize) -> bool {
        if baseline == 0 {
            return probe > 0;
        }
        let delta = (probe as f64 - baseline as f64).abs();
        delta / baseline as f64 > self.length_deviation
    }
}
