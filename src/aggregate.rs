//! Confidence aggregation: turning per-backend attempts into one field result.
//!
//! The aggregator is pure. It never talks to a backend, so every resolution
//! rule is testable with synthetic attempt lists. Discarded values stay in
//! the attempt list for audit.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::catalog::{AccuracyClass, ModelProfile};
use crate::models::{ExtractionAttempt, FieldKind, FieldResult, FieldSpec, Resolution};

/// Default confidence window within which accuracy class breaks ties.
pub const DEFAULT_CONFIDENCE_EPSILON: f64 = 0.2;

static BARE_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}$").expect("year pattern compiles"));

/// Date formats accepted during canonicalization, tried in order.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y.%m.%d",
    "%d %B %Y",
    "%d %b %Y",
    "%B %d, %Y",
    "%B %d %Y",
    "%b %d, %Y",
    "%b %d %Y",
    "%m/%d/%Y",
    "%m-%d-%Y",
];

/// Aggregate one field's attempts into a final result.
///
/// `profiles` supplies declared accuracy classes for the static tie-break;
/// attempts from unregistered backends count as `Approximate`.
pub fn aggregate(
    field: &FieldSpec,
    attempts: Vec<ExtractionAttempt>,
    profiles: &[ModelProfile],
    epsilon: f64,
) -> FieldResult {
    let successes: Vec<usize> = attempts
        .iter()
        .enumerate()
        .filter(|(_, a)| a.is_success())
        .map(|(i, _)| i)
        .collect();

    match successes.len() {
        // Every attempt failed: explicitly unresolved, never an error.
        0 => FieldResult {
            field: field.name.to_string(),
            value: None,
            confidence: 0.0,
            resolution: Resolution::Unresolved,
            attempts,
        },

        // One source: its value and confidence pass through unchanged.
        1 => {
            let a = &attempts[successes[0]];
            FieldResult {
                field: field.name.to_string(),
                value: a.value.clone(),
                confidence: a.confidence,
                resolution: Resolution::SingleSource,
                attempts,
            }
        }

        _ => resolve_multiple(field, attempts, &successes, profiles, epsilon),
    }
}

/// Resolve two or more successful attempts.
fn resolve_multiple(
    field: &FieldSpec,
    attempts: Vec<ExtractionAttempt>,
    successes: &[usize],
    profiles: &[ModelProfile],
    epsilon: f64,
) -> FieldResult {
    let normalized: Vec<String> = successes
        .iter()
        .map(|&i| normalize_value(field.kind, attempts[i].value.as_deref().unwrap_or_default()))
        .collect();

    let all_agree = normalized.windows(2).all(|w| w[0] == w[1]);

    if all_agree {
        // Adopt the most confident contributor's raw value; confidence is
        // the max across contributors.
        let &best = successes
            .iter()
            .max_by(|&&a, &&b| {
                attempts[a]
                    .confidence
                    .partial_cmp(&attempts[b].confidence)
                    .expect("confidences are finite")
            })
            .expect("successes are non-empty");
        return FieldResult {
            field: field.name.to_string(),
            value: attempts[best].value.clone(),
            confidence: attempts[best].confidence,
            resolution: Resolution::Agreement,
            attempts,
        };
    }

    // Values differ: rank by confidence.
    let mut ranked: Vec<usize> = successes.to_vec();
    ranked.sort_by(|&a, &b| {
        attempts[b]
            .confidence
            .partial_cmp(&attempts[a].confidence)
            .expect("confidences are finite")
            .then_with(|| attempts[a].model.cmp(&attempts[b].model))
    });

    let top = ranked[0];
    let runner_up = ranked[1];
    let gap = attempts[top].confidence - attempts[runner_up].confidence;

    if gap > epsilon {
        return FieldResult {
            field: field.name.to_string(),
            value: attempts[top].value.clone(),
            confidence: attempts[top].confidence,
            resolution: Resolution::HighestConfidence,
            attempts,
        };
    }

    // Confidences are effectively tied: the higher declared accuracy class
    // wins, falling back to confidence then backend id.
    let &winner = ranked
        .iter()
        .filter(|&&i| attempts[top].confidence - attempts[i].confidence <= epsilon)
        .max_by(|&&a, &&b| {
            let acc_a = accuracy_for(&attempts[a].model, profiles);
            let acc_b = accuracy_for(&attempts[b].model, profiles);
            acc_a
                .cmp(&acc_b)
                .then_with(|| {
                    attempts[a]
                        .confidence
                        .partial_cmp(&attempts[b].confidence)
                        .expect("confidences are finite")
                })
                .then_with(|| attempts[b].model.cmp(&attempts[a].model))
        })
        .expect("ranked is non-empty");

    FieldResult {
        field: field.name.to_string(),
        value: attempts[winner].value.clone(),
        confidence: attempts[winner].confidence,
        resolution: Resolution::AccuracyTiebreak,
        attempts,
    }
}

fn accuracy_for(model: &str, profiles: &[ModelProfile]) -> AccuracyClass {
    profiles
        .iter()
        .find(|p| p.id == model)
        .map(|p| p.accuracy)
        .unwrap_or(AccuracyClass::Approximate)
}

/// Normalize a raw value for semantic comparison.
///
/// Dates canonicalize to ISO 8601 (or a bare year); text folds case and
/// whitespace; structured values normalize their volume/issue vocabulary so
/// "Vol. 2 No. 4" and "Volume 2, Issue 4" compare equal.
pub fn normalize_value(kind: FieldKind, value: &str) -> String {
    let base = collapse_whitespace(strip_quotes(value.trim()));
    match kind {
        FieldKind::Date => canonicalize_date(&base).unwrap_or_else(|| base.to_lowercase()),
        FieldKind::Text => base.to_lowercase(),
        FieldKind::Structured => normalize_structured(&base),
    }
}

/// Canonicalize a date string to "YYYY-MM-DD", or "YYYY" for bare years.
pub fn canonicalize_date(value: &str) -> Option<String> {
    let cleaned = value.trim().trim_end_matches('.').trim();
    if BARE_YEAR.is_match(cleaned) {
        return Some(cleaned.to_string());
    }
    // "Jan. 6, 1986" style: drop the period after the month abbreviation.
    let without_abbrev_dot = cleaned.replace(". ", " ");
    for candidate in [cleaned, without_abbrev_dot.as_str()] {
        for format in DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(candidate, format) {
                return Some(date.format("%Y-%m-%d").to_string());
            }
        }
    }
    None
}

fn strip_quotes(value: &str) -> &str {
    value
        .trim_matches(|c| c == '"' || c == '\'' || c == '\u{201c}' || c == '\u{201d}')
        .trim()
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Fold volume/issue vocabulary into canonical tokens.
fn normalize_structured(value: &str) -> String {
    value
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|token| match token {
            "vol" | "volume" => "volume",
            "no" | "num" | "nr" | "iss" | "issue" => "issue",
            other => other,
        })
        .collect::<Vec<_>>()
        .join(" ")
}
