//! Text quality metrics for OCR-corrected documents.
//!
//! Noise in the input lowers the scores; it never makes analysis fail.

use crate::models::QualityMetrics;

/// Weight of each component in the overall score.
const CLARITY_WEIGHT: f64 = 0.4;
const STRUCTURE_WEIGHT: f64 = 0.3;
const COMPLETENESS_WEIGHT: f64 = 0.3;

/// Compute quality metrics for a block of text. All scores land in [0,1].
pub fn assess(text: &str) -> QualityMetrics {
    let text_clarity = clarity(text);
    let structure_clarity = structure(text);
    let completeness = completeness(text);
    let overall = (text_clarity * CLARITY_WEIGHT
        + structure_clarity * STRUCTURE_WEIGHT
        + completeness * COMPLETENESS_WEIGHT)
        .clamp(0.0, 1.0);

    QualityMetrics {
        text_clarity,
        structure_clarity,
        completeness,
        overall,
    }
}

/// Character-level clarity: clean OCR output is mostly alphabetic with
/// reasonable spacing and punctuation.
fn clarity(text: &str) -> f64 {
    let total = text.chars().count();
    if total == 0 {
        return 0.0;
    }
    let alpha = text.chars().filter(|c| c.is_alphabetic()).count() as f64;
    let space = text.chars().filter(|c| c.is_whitespace()).count() as f64;
    let punct = text
        .chars()
        .filter(|c| matches!(c, '.' | ',' | '!' | '?' | ';' | ':'))
        .count() as f64;
    let total = total as f64;

    (alpha / total + (space / total) * 2.0 + (punct / total) * 5.0).clamp(0.0, 1.0)
}

/// Line-length regularity: garbled scans produce erratic line lengths.
fn structure(text: &str) -> f64 {
    let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    if lines.is_empty() {
        return 0.0;
    }
    let avg = lines.iter().map(|l| l.len()).sum::<usize>() as f64 / lines.len() as f64;
    let variance = lines
        .iter()
        .map(|l| (l.len() as f64 - avg).powi(2))
        .sum::<f64>()
        / lines.len() as f64;

    ((avg / 100.0) * (1.0 - variance / 10_000.0)).clamp(0.0, 1.0)
}

/// Presence of expected document elements: a real beginning, a closing
/// sentence, and multi-line structure.
fn completeness(text: &str) -> f64 {
    let trimmed = text.trim();
    let has_beginning = trimmed.len() > 100;
    let has_end = trimmed.ends_with(['.', '!', '?', '"']) || trimmed.len() > 500;
    let has_structure = trimmed.lines().filter(|l| !l.trim().is_empty()).count() > 3;

    [has_beginning, has_end, has_structure]
        .iter()
        .filter(|&&b| b)
        .count() as f64
        / 3.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scores_stay_in_unit_interval() {
        let samples = [
            "",
            "x",
            "A clean paragraph of prose, with punctuation. It has several sentences.\nAnd more than one line.\nAnd a third line here.\nClosing out properly.",
            "@@## 0101010 ~~~~ %%%%",
            &"word ".repeat(500),
        ];
        for sample in samples {
            let q = assess(sample);
            for score in [q.text_clarity, q.structure_clarity, q.completeness, q.overall] {
                assert!((0.0..=1.0).contains(&score), "score {score} for {sample:?}");
            }
        }
    }

    #[test]
    fn noisy_text_scores_below_clean_text() {
        let clean = "The committee met on Tuesday to review the annual budget. \
                     Several proposals were discussed in detail.\n\
                     Members voted to adopt the revised schedule.\n\
                     The next meeting is planned for March.\n\
                     Minutes were recorded and distributed.";
        let noisy = "Th3 c0mm!tt## m3t 0n Tu3$d@y t0 r#v!3w ### @nnu@1 budg3t";
        assert!(assess(clean).overall > assess(noisy).overall);
    }
}
