//! Derived confidence for raw extraction output.
//!
//! Local models do not report calibrated confidences, so we estimate one from
//! the shape of the answer: does it look like the field we asked for, and
//! does it appear in the source text at all.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{FieldKind, FieldSpec};

static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}").expect("iso date pattern compiles"));
static BARE_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}$").expect("year pattern compiles"));

/// Refusal phrases that mean the model found nothing.
const NON_ANSWERS: &[&str] = &["no", "none", "not found", "n/a", "unknown"];

/// Estimate confidence in a raw extraction result, in [0,1].
pub fn estimate(field: &FieldSpec, value: &str, context: &[String]) -> f64 {
    let trimmed = value.trim();
    if trimmed.is_empty() || NON_ANSWERS.contains(&trimmed.to_lowercase().as_str()) {
        return 0.1;
    }

    let mut confidence: f64 = 0.5;

    match (field.name, field.kind) {
        (_, FieldKind::Date) => {
            if ISO_DATE.is_match(trimmed) {
                confidence += 0.4;
            } else if BARE_YEAR.is_match(trimmed) {
                confidence += 0.3;
            }
        }
        ("title", _) => {
            if (10..=100).contains(&trimmed.len()) {
                confidence += 0.3;
            }
            if trimmed.chars().next().is_some_and(|c| c.is_uppercase()) {
                confidence += 0.1;
            }
        }
        ("description", _) => {
            if (50..=500).contains(&trimmed.len()) {
                confidence += 0.3;
            }
            if trimmed.matches('.').count() >= 2 {
                confidence += 0.1;
            }
        }
        (_, FieldKind::Structured) => {
            let lowered = trimmed.to_lowercase();
            if ["volume", "vol", "issue", "no"]
                .iter()
                .any(|w| lowered.contains(w))
            {
                confidence += 0.4;
            }
        }
        _ => {}
    }

    // A value that literally appears in the source is more trustworthy.
    let source = context.join(" ").to_lowercase();
    if source.contains(&trimmed.to_lowercase()) {
        confidence += 0.1;
    }

    confidence.min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BUILTIN_FIELDS;

    fn field(name: &str) -> &'static FieldSpec {
        BUILTIN_FIELDS.iter().find(|f| f.name == name).unwrap()
    }

    #[test]
    fn non_answers_score_low() {
        for value in ["", "none", "Not found", "N/A"] {
            assert_eq!(estimate(field("title"), value, &[]), 0.1);
        }
    }

    #[test]
    fn iso_dates_score_high() {
        let c = estimate(field("date"), "1986-01-06", &[]);
        assert!(c >= 0.9);
        let year_only = estimate(field("date"), "1986", &[]);
        assert!(year_only < c);
        assert!(year_only >= 0.8);
    }

    #[test]
    fn source_presence_raises_confidence() {
        let context = vec!["COMMUNITY TASK FORCE NEWSLETTER".to_string()];
        let grounded = estimate(field("title"), "Community Task Force Newsletter", &context);
        let ungrounded = estimate(field("title"), "Community Task Force Newsletter", &[]);
        assert!(grounded > ungrounded);
    }

    #[test]
    fn estimates_stay_in_unit_interval() {
        let context = vec!["Volume 3, Issue 1".to_string()];
        for f in BUILTIN_FIELDS.iter() {
            for value in ["Volume 3, Issue 1", "x", &"long ".repeat(200)] {
                let c = estimate(f, value, &context);
                assert!((0.0..=1.0).contains(&c));
            }
        }
    }
}
