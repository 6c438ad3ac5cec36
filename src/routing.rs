//! Model routing: choosing which backend(s) handle a field.
//!
//! Routing is a pure function of (document profile, field, priority, mode,
//! catalog profiles). Identical inputs always produce identical selections,
//! so decisions are reproducible and testable without any backend.

use std::cmp::Reverse;

use thiserror::Error;

use crate::catalog::ModelProfile;
use crate::models::{DocumentProfile, FieldSpec, Mode, Priority};

/// Document quality below this biases selection toward accuracy.
const LOW_QUALITY_THRESHOLD: f64 = 0.4;

/// Errors from routing.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// The catalog has no registered backends. Fatal for the run.
    #[error("no eligible model: catalog is empty")]
    EmptyCatalog,
}

/// Select backends for one field.
///
/// Parallel mode returns exactly one profile. Consensus mode returns two
/// distinct profiles when the catalog has at least two entries, otherwise
/// whatever single backend exists.
pub fn route(
    profile: &DocumentProfile,
    field: &FieldSpec,
    priority: Priority,
    mode: Mode,
    candidates: &[ModelProfile],
) -> Result<Vec<ModelProfile>, RoutingError> {
    if candidates.is_empty() {
        return Err(RoutingError::EmptyCatalog);
    }

    // Degraded scans get the accuracy policy even on balanced runs.
    let effective = if priority == Priority::Balanced
        && profile.quality.overall < LOW_QUALITY_THRESHOLD
    {
        Priority::Accuracy
    } else {
        priority
    };

    let primary = select_primary(field, effective, candidates);

    match mode {
        Mode::Parallel => Ok(vec![primary]),
        Mode::Consensus => {
            let mut selected = vec![primary];
            if let Some(secondary) = select_secondary(effective, candidates, &selected[0]) {
                selected.push(secondary);
            }
            Ok(selected)
        }
    }
}

/// Ordering key preferring higher accuracy, then lower cost, then smaller id.
fn accuracy_key(p: &ModelProfile) -> (crate::catalog::AccuracyClass, Reverse<u64>, Reverse<String>) {
    (p.accuracy, Reverse(ordered_cost(p)), Reverse(p.id.clone()))
}

/// Ordering key preferring lower latency, then lower cost, then smaller id.
fn speed_key(p: &ModelProfile) -> (crate::catalog::LatencyClass, u64, String) {
    (p.latency, ordered_cost(p), p.id.clone())
}

/// Pick the single best backend for a field under a priority tier.
fn select_primary(field: &FieldSpec, priority: Priority, candidates: &[ModelProfile]) -> ModelProfile {
    match priority {
        // Lowest latency wins; cost then id break ties.
        Priority::Speed => candidates
            .iter()
            .min_by_key(|p| speed_key(p))
            .cloned()
            .expect("candidates are non-empty"),

        // Highest declared accuracy wins; specialists, then cost, break ties.
        Priority::Accuracy => candidates
            .iter()
            .max_by_key(|p| {
                let (accuracy, cost, id) = accuracy_key(p);
                (accuracy, p.specializes_in(field.name), cost, id)
            })
            .cloned()
            .expect("candidates are non-empty"),

        // The field's declared specialist when one exists, else the most
        // accurate backend overall.
        Priority::Balanced => candidates
            .iter()
            .filter(|p| p.specializes_in(field.name))
            .max_by_key(|p| accuracy_key(p))
            .or_else(|| candidates.iter().max_by_key(|p| accuracy_key(p)))
            .cloned()
            .expect("candidates are non-empty"),
    }
}

/// Pick a distinct second backend for consensus cross-validation.
///
/// Speed runs pair the two fastest backends; every other tier adds the most
/// accurate backend not already selected.
fn select_secondary(
    priority: Priority,
    candidates: &[ModelProfile],
    primary: &ModelProfile,
) -> Option<ModelProfile> {
    let remaining: Vec<&ModelProfile> =
        candidates.iter().filter(|p| p.id != primary.id).collect();

    match priority {
        Priority::Speed => remaining
            .into_iter()
            .min_by_key(|p| speed_key(p))
            .cloned(),
        _ => remaining
            .into_iter()
            .max_by_key(|p| accuracy_key(p))
            .cloned(),
    }
}

/// Total ordering over cost weights for tie-breaking.
fn ordered_cost(p: &ModelProfile) -> u64 {
    // Cost weights are small non-negative config values; the bit pattern of
    // the normalized float orders them totally.
    (p.cost_weight.max(0.0) * 1000.0) as u64
}
