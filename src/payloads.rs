// Fuzz payload generation
// Builds the replacement values tried against each parameter
//
// - adjacent ids:  user_123 -> user_121 .. user_125
// - boundary:      0, 1, -1, empty, null, admin
// - injection:     quote breakers, a unique reflection marker, path traversal
// - expression:    arithmetic probes whose result is known up front

use lazy_static::lazy_static;
use rand::distributions::Alphanumeric;
use rand::Rng;
use regex::{Captures, Regex};
use std::collections::HashMap;

lazy_static! {
    static ref RANDSTR: Regex = Regex::new(r"\{\{randstr\((\d+)\)\}\}").unwrap();
    static ref PARAMS: Regex = Regex::new(r"\{\{params\((.*?)\)\}\}").unwrap();
}

const BOUNDARY_VALUES: &[&str] = &["0", "1", "-1", "", "null", "admin"];
const INJECTION_VALUES: &[&str] = &["'", "\"", "../../../../etc/passwd"];

/// Why a payload was generated; drives what the analyzer looks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadKind {
    Original,
    Adjacent,
    Boundary,
    Injection,
    /// Random marker expected to come back verbatim if reflected.
    Reflection,
    /// Arithmetic probe; `result` shows up in the body if it was evaluated.
    Expression { result: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub value: String,
    pub kind: PayloadKind,
}

impl Payload {
    pub fn new(value: impl Into<String>, kind: PayloadKind) -> Self {
        Self {
            value: value.into(),
            kind,
        }
    }

    pub fn original(value: impl Into<String>) -> Self {
        Self::new(value, PayloadKind::Original)
    }
}

/// Arithmetic operators used by expression probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Add,
    Sub,
    Mul,
}

impl Operator {
    const ALL: [Operator; 3] = [Operator::Add, Operator::Sub, Operator::Mul];

    pub fn symbol(&self) -> char {
        match self {
            Operator::Add => '+',
            Operator::Sub => '-',
            Operator::Mul => '*',
        }
    }

    pub fn apply(&self, lhs: i64, rhs: i64) -> i64 {
        match self {
            Operator::Add => lhs + rhs,
            Operator::Sub => lhs - rhs,
            Operator::Mul => lhs * rhs,
        }
    }
}

/// An expression string and the value it evaluates to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalcExpr {
    pub expr: String,
    pub lhs: i64,
    pub rhs: i64,
    pub result: i64,
}

/// `lhs<op>rhs` with operands below 1000 and a random operator.
pub fn calc_expr() -> CalcExpr {
    let mut rng = rand::thread_rng();
    let lhs = rng.gen_range(0..1000);
    let rhs = rng.gen_range(0..1000);
    let op = Operator::ALL[rng.gen_range(0..Operator::ALL.len())];
    CalcExpr {
        expr: format!("{}{}{}", lhs, op.symbol(), rhs),
        lhs,
        rhs,
        result: op.apply(lhs, rhs),
    }
}

/// `lhs - rhs` where both operands and the result fit a non-negative i32.
pub fn calc_expr_int32_safe() -> CalcExpr {
    let mut rng = rand::thread_rng();
    let lhs = rng.gen_range(0..i64::from(i32::MAX));
    let rhs = rng.gen_range(0..=lhs);
    CalcExpr {
        expr: format!("{} - {}", lhs, rhs),
        lhs,
        rhs,
        result: lhs - rhs,
    }
}

/// Random ASCII letters and digits.
pub fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Randomly flip the case of every ASCII letter (WAF keyword evasion).
pub fn random_case(input: &str) -> String {
    let mut rng = rand::thread_rng();
    input
        .chars()
        .map(|c| {
            if c.is_ascii_alphabetic() && rng.gen_bool(0.5) {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            }
        })
        .collect()
}

/// Replace every `{{randstr(n)}}` with `n` random characters.
pub fn expand_randstr(template: &str) -> String {
    RANDSTR
        .replace_all(template, |caps: &Captures| random_string(caps[1].parse().unwrap_or(0)))
        .into_owned()
}

/// Fill `{{params(key)}}` from `params` (unknown keys stay as written), then
/// expand `{{randstr(n)}}`.
pub fn expand_template(template: &str, params: &HashMap<String, String>) -> String {
    let filled = PARAMS.replace_all(template, |caps: &Captures| {
        params
            .get(&caps[1])
            .cloned()
            .unwrap_or_else(|| caps[0].to_string())
    });
    expand_randstr(&filled)
}

/// Neighbouring ids: the trailing number of `value` moved by up to `range`
/// in each direction, never below zero, zero padding kept.
pub fn adjacent_values(value: &str, range: u64) -> Vec<String> {
    let digits_start = value
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i);
    let Some(start) = digits_start else {
        return Vec::new();
    };
    let (prefix, digits) = value.split_at(start);
    let Ok(number) = digits.parse::<u64>() else {
        return Vec::new();
    };
    let width = if digits.len() > 1 && digits.starts_with('0') { digits.len() } else { 0 };

    let low = number.saturating_sub(range);
    let high = number.saturating_add(range);
    (low..=high)
        .filter(|n| *n != number)
        .map(|n| format!("{}{:0width$}", prefix, n, width = width))
        .collect()
}

/// Every payload tried against a parameter whose current value is
/// `original`, deduplicated by value in generation order.
pub fn payload_variants(original: &str) -> Vec<Payload> {
    let mut payloads = vec![Payload::original(original)];
    payloads.extend(adjacent_values(original, 2).into_iter().map(|v| Payload::new(v, PayloadKind::Adjacent)));
    payloads.extend(BOUNDARY_VALUES.iter().map(|v| Payload::new(*v, PayloadKind::Boundary)));
    payloads.extend(INJECTION_VALUES.iter().map(|v| Payload::new(*v, PayloadKind::Injection)));
    payloads.push(Payload::new(
        format!("<fz{}>", random_string(8).to_ascii_lowercase()),
        PayloadKind::Reflection,
    ));

    let probe = calc_expr_int32_safe();
    payloads.push(Payload::new(probe.expr.clone(), PayloadKind::Expression { result: probe.result }));
    payloads.push(Payload::new(
        format!("${{{}}}", probe.expr.replace(' ', "")),
        PayloadKind::Expression { result: probe.result },
    ));

    let mut seen = std::collections::HashSet::new();
    payloads.retain(|p| seen.insert(p.value.clone()));
    payloads
}
