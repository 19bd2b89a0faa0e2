//! Similarity scoring between two signatures.
//!
//! Score = weighted sum of independent sub-metrics, each in [0, 1]:
//! - title: token-set Jaccard or edit ratio (one declared metric per pass)
//! - content: edit ratio over the first `content_prefix_chars` characters
//! - shape: two binary halves, each satisfied when within `shape_tolerance`
//!
//! In `ScoreMode::Resolution` a containment bonus is added when one title is a
//! substring of the other, and the total is capped at 1. In
//! `ScoreMode::Similarity` the weighted sum is rescaled by the sum of the
//! weights so identical signatures still score exactly 1.
//!
//! Scores are quantized to six decimals so threshold comparisons do not
//! depend on floating-point summation order.

use strsim::normalized_levenshtein;

use crate::config::{ReconConfig, TitleMetric};
use crate::model::{ScoreBreakdown, Shape, Signature};
use crate::signature::{title_words, truncate_chars};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreMode {
    /// Dedup and other symmetric comparisons.
    Similarity,
    /// Identifier resolution: title containment earns the substring bonus.
    Resolution,
}

/// Score two signatures. Empty signatures always score 0.
pub fn score(
    a: &Signature,
    b: &Signature,
    config: &ReconConfig,
    mode: ScoreMode,
) -> (f64, ScoreBreakdown) {
    if a.is_empty() || b.is_empty() {
        return (
            0.0,
            ScoreBreakdown {
                empty_signature: true,
                ..ScoreBreakdown::default()
            },
        );
    }

    let w = &config.weights;
    let s = &config.scoring;

    let title_sim = match s.title_metric {
        TitleMetric::Jaccard => jaccard(&a.normalized_title, &b.normalized_title),
        TitleMetric::EditRatio => normalized_levenshtein(&a.normalized_title, &b.normalized_title),
    };
    let content_sim = normalized_levenshtein(
        truncate_chars(&a.content_sample, s.content_prefix_chars),
        truncate_chars(&b.content_sample, s.content_prefix_chars),
    );
    let (primary, secondary) = shape_compatibility(a.shape_key, b.shape_key, s.shape_tolerance);

    let half_shape = w.shape / 2.0;
    let mut breakdown = ScoreBreakdown {
        title: w.title * title_sim,
        content: w.content * content_sim,
        shape_primary: if primary { half_shape } else { 0.0 },
        shape_secondary: if secondary { half_shape } else { 0.0 },
        substring_bonus: 0.0,
        empty_signature: false,
    };
    let base =
        breakdown.title + breakdown.content + breakdown.shape_primary + breakdown.shape_secondary;

    let total = match mode {
        ScoreMode::Similarity => base / w.base_total(),
        ScoreMode::Resolution => {
            if titles_contain(&a.normalized_title, &b.normalized_title) {
                breakdown.substring_bonus = w.substring_bonus.min((1.0 - base).max(0.0));
            }
            base + breakdown.substring_bonus
        }
    };

    (quantize(total.clamp(0.0, 1.0)), breakdown)
}

/// Jaccard over title word sets. Two empty titles agree.
fn jaccard(a: &str, b: &str) -> f64 {
    let wa = title_words(a);
    let wb = title_words(b);
    if wa.is_empty() && wb.is_empty() {
        return 1.0;
    }
    let inter = wa.intersection(&wb).count();
    let union = wa.union(&wb).count();
    inter as f64 / union as f64
}

fn titles_contain(a: &str, b: &str) -> bool {
    !a.is_empty() && !b.is_empty() && (a.contains(b) || b.contains(a))
}

/// Binary compatibility of the two shape dimensions.
///
/// Grids compare rows then cols; nestings compare depth, and the second half
/// is granted because there is no second dimension to contradict. Two
/// shapeless elements agree on both halves; mixed variants agree on neither.
fn shape_compatibility(a: Option<Shape>, b: Option<Shape>, tolerance: u32) -> (bool, bool) {
    match (a, b) {
        (None, None) => (true, true),
        (
            Some(Shape::Grid { rows: ra, cols: ca }),
            Some(Shape::Grid { rows: rb, cols: cb }),
        ) => (ra.abs_diff(rb) <= tolerance, ca.abs_diff(cb) <= tolerance),
        (Some(Shape::Nesting { depth: da }), Some(Shape::Nesting { depth: db })) => {
            let ok = da.abs_diff(db) <= tolerance;
            (ok, ok)
        }
        _ => (false, false),
    }
}

fn quantize(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}
