//! Identifier resolution: map a foreign reference onto a target element id.
//!
//! 1. Exact native-id match short-circuits with confidence 1.0.
//! 2. Otherwise every candidate with a native id is scored (resolution mode).
//! 3. The best score must clear `thresholds.resolution`.
//! 4. A different target within `thresholds.tie_margin` of the best makes the
//!    result AMBIGUOUS rather than an arbitrary pick.
//!
//! Every outcome is terminal for the pass and cached by foreign ref.

use log::{debug, trace};

use crate::context::ReconciliationContext;
use crate::model::{
    Issue, IssueKind, MatchCandidate, ResolutionMethod, ResolutionRecord, ResolutionTier,
};
use crate::scorer::{score, ScoreMode};
use crate::signature::SignedElement;

/// Absorbs float noise in the tie comparison.
const TIE_EPSILON: f64 = 1e-9;

pub fn resolve(
    ctx: &mut ReconciliationContext<'_>,
    foreign: &SignedElement<'_>,
    candidates: &[SignedElement<'_>],
) -> ResolutionRecord {
    let foreign_ref = foreign.element.key();
    if let Some(hit) = ctx.cached(&foreign_ref) {
        return hit.clone();
    }

    let record = resolve_uncached(ctx, &foreign_ref, foreign, candidates);
    ctx.remember(record.clone());
    record
}

fn resolve_uncached(
    ctx: &mut ReconciliationContext<'_>,
    foreign_ref: &str,
    foreign: &SignedElement<'_>,
    candidates: &[SignedElement<'_>],
) -> ResolutionRecord {
    let tier = ctx.tier();

    if let Some(id) = foreign.element.native_id.as_deref().filter(|id| !id.is_empty()) {
        if candidates
            .iter()
            .any(|c| c.element.native_id.as_deref() == Some(id))
        {
            return ResolutionRecord {
                foreign_ref: foreign_ref.to_string(),
                resolved_id: Some(id.to_string()),
                confidence: 1.0,
                method: ResolutionMethod::Exact,
                tier,
                best: None,
                contenders: Vec::new(),
            };
        }
    }

    if foreign.signature.is_empty() {
        ctx.report(Issue::new(
            IssueKind::EmptySignature,
            foreign_ref,
            "foreign reference has no extractable text",
        ));
    }

    let config = ctx.config();
    let scored: Vec<MatchCandidate> = candidates
        .iter()
        .filter_map(|c| {
            let target_id = c.element.native_id.as_deref().filter(|id| !id.is_empty())?;
            let (value, breakdown) =
                score(&foreign.signature, &c.signature, config, ScoreMode::Resolution);
            trace!("{foreign_ref} vs {target_id}: {value:.6} {breakdown:?}");
            Some(MatchCandidate {
                source_ref: foreign_ref.to_string(),
                target_id: target_id.to_string(),
                score: value,
                breakdown,
            })
        })
        .collect();

    // Earliest candidate wins equal scores so the pick is order-stable.
    let best = scored
        .iter()
        .enumerate()
        .fold(None::<(usize, f64)>, |acc, (i, c)| match acc {
            Some((_, s)) if s >= c.score => acc,
            _ => Some((i, c.score)),
        })
        .map(|(i, _)| scored[i].clone());

    let Some(best) = best else {
        return unresolved(foreign_ref, tier, ResolutionMethod::NoMatch, None, Vec::new());
    };

    if best.score < config.thresholds.resolution {
        debug!(
            "{foreign_ref}: best {} at {:.3} below threshold {:.3}",
            best.target_id, best.score, config.thresholds.resolution
        );
        return unresolved(foreign_ref, tier, ResolutionMethod::NoMatch, Some(best), Vec::new());
    }

    let floor = best.score - config.thresholds.tie_margin - TIE_EPSILON;
    let contenders: Vec<MatchCandidate> = scored
        .iter()
        .filter(|c| c.target_id != best.target_id && c.score >= floor)
        .cloned()
        .collect();

    if !contenders.is_empty() {
        debug!(
            "{foreign_ref}: {} ties {} other candidate(s) within {:.3}",
            best.target_id,
            contenders.len(),
            config.thresholds.tie_margin
        );
        return unresolved(foreign_ref, tier, ResolutionMethod::Ambiguous, Some(best), contenders);
    }

    ResolutionRecord {
        foreign_ref: foreign_ref.to_string(),
        resolved_id: Some(best.target_id.clone()),
        confidence: best.score,
        method: ResolutionMethod::Fuzzy,
        tier,
        best: Some(best),
        contenders: Vec::new(),
    }
}

fn unresolved(
    foreign_ref: &str,
    tier: ResolutionTier,
    method: ResolutionMethod,
    best: Option<MatchCandidate>,
    contenders: Vec<MatchCandidate>,
) -> ResolutionRecord {
    ResolutionRecord {
        foreign_ref: foreign_ref.to_string(),
        resolved_id: None,
        confidence: best.as_ref().map(|b| b.score).unwrap_or(0.0),
        method,
        tier,
        best,
        contenders,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReconConfig;
    use crate::model::{Element, ElementKind, ResolutionState};
    use crate::signature::sign_all;

    fn heading(order: usize, id: &str, title: &str, content: &str) -> Element {
        Element::new(ElementKind::Heading, order)
            .with_id(id)
            .with_title(title)
            .with_content(content)
    }

    #[test]
    fn exact_id_short_circuits() {
        let config = ReconConfig::default();
        let foreign = vec![heading(0, "ch0012", "Completely different", "")];
        let targets = vec![
            heading(0, "ch0011", "Completely different", ""),
            heading(1, "ch0012", "Renal system", ""),
        ];
        let fs = sign_all(&foreign, &config.scoring);
        let ts = sign_all(&targets, &config.scoring);
        let mut ctx = ReconciliationContext::new(&config);
        let rec = resolve(&mut ctx, &fs[0], &ts);
        assert_eq!(rec.state(), ResolutionState::ResolvedExact);
        assert_eq!(rec.resolved_id.as_deref(), Some("ch0012"));
        assert_eq!(rec.confidence, 1.0);
    }

    #[test]
    fn fuzzy_match_above_threshold() {
        let config = ReconConfig::default();
        let foreign = vec![heading(3, "a-17", "Fluid Balance", "Intake and output monitoring")];
        let targets = vec![
            heading(0, "s1", "Oxygenation", "Airway management and oxygen delivery"),
            heading(1, "s2", "Fluid Balance", "Intake and output monitoring"),
        ];
        let fs = sign_all(&foreign, &config.scoring);
        let ts = sign_all(&targets, &config.scoring);
        let mut ctx = ReconciliationContext::new(&config);
        let rec = resolve(&mut ctx, &fs[0], &ts);
        assert_eq!(rec.state(), ResolutionState::ResolvedFuzzy);
        assert_eq!(rec.resolved_id.as_deref(), Some("s2"));
        assert_eq!(rec.confidence, 1.0);
    }

    #[test]
    fn ties_are_ambiguous() {
        let config = ReconConfig::default();
        let body = "Patient safety means preventing errors and adverse effects to patients";
        let foreign = vec![heading(0, "x1", "Patient Safety", body)];
        let targets = vec![
            heading(0, "t1", "Patient Safety Overview", body),
            heading(1, "t2", "Patient Safety Overview", &body.replace("errors", "error")),
        ];
        let fs = sign_all(&foreign, &config.scoring);
        let ts = sign_all(&targets, &config.scoring);
        let mut ctx = ReconciliationContext::new(&config);
        let rec = resolve(&mut ctx, &fs[0], &ts);
        assert_eq!(rec.state(), ResolutionState::UnresolvedAmbiguous);
        assert!(rec.resolved_id.is_none());
        assert_eq!(rec.best.as_ref().unwrap().target_id, "t1");
        assert_eq!(rec.contenders.len(), 1);
        assert_eq!(rec.contenders[0].target_id, "t2");
    }

    #[test]
    fn same_target_id_twice_is_not_a_tie() {
        let config = ReconConfig::default();
        let foreign = vec![heading(0, "x1", "Pain Assessment", "Numeric rating scales")];
        let targets = vec![
            heading(0, "p1", "Pain Assessment", "Numeric rating scales"),
            heading(1, "p1", "Pain Assessment", "Numeric rating scales"),
        ];
        let fs = sign_all(&foreign, &config.scoring);
        let ts = sign_all(&targets, &config.scoring);
        let mut ctx = ReconciliationContext::new(&config);
        let rec = resolve(&mut ctx, &fs[0], &ts);
        assert_eq!(rec.state(), ResolutionState::ResolvedFuzzy);
    }

    #[test]
    fn below_threshold_is_no_match() {
        let config = ReconConfig::default();
        let foreign = vec![heading(0, "x1", "Mobility", "Range of motion exercises")];
        let targets = vec![heading(0, "t1", "Nutrition", "Enteral feeding schedules")];
        let fs = sign_all(&foreign, &config.scoring);
        let ts = sign_all(&targets, &config.scoring);
        let mut ctx = ReconciliationContext::new(&config);
        let rec = resolve(&mut ctx, &fs[0], &ts);
        assert_eq!(rec.state(), ResolutionState::UnresolvedNoMatch);
        assert!(rec.best.is_some());
        assert!(rec.confidence < 0.7);
    }

    #[test]
    fn candidates_without_ids_are_skipped() {
        let config = ReconConfig::default();
        let foreign = vec![heading(0, "x1", "Mobility", "Range of motion exercises")];
        let targets = vec![Element::new(ElementKind::Heading, 0)
            .with_title("Mobility")
            .with_content("Range of motion exercises")];
        let fs = sign_all(&foreign, &config.scoring);
        let ts = sign_all(&targets, &config.scoring);
        let mut ctx = ReconciliationContext::new(&config);
        let rec = resolve(&mut ctx, &fs[0], &ts);
        assert_eq!(rec.state(), ResolutionState::UnresolvedNoMatch);
        assert!(rec.best.is_none());
        assert_eq!(rec.confidence, 0.0);
    }

    #[test]
    fn empty_foreign_signature_reports_issue_once() {
        let config = ReconConfig::default();
        let foreign = vec![Element::new(ElementKind::Heading, 0)];
        let targets = vec![heading(0, "t1", "Nutrition", "")];
        let fs = sign_all(&foreign, &config.scoring);
        let ts = sign_all(&targets, &config.scoring);
        let mut ctx = ReconciliationContext::new(&config);
        let first = resolve(&mut ctx, &fs[0], &ts);
        let second = resolve(&mut ctx, &fs[0], &ts);
        assert_eq!(first, second);
        assert_eq!(first.state(), ResolutionState::UnresolvedNoMatch);
        assert_eq!(ctx.issues().len(), 1);
        assert_eq!(ctx.issues()[0].kind, IssueKind::EmptySignature);
    }

    #[test]
    fn cache_serves_repeat_lookups() {
        let config = ReconConfig::default();
        let foreign = vec![heading(0, "x1", "Fluid Balance", "Intake and output")];
        let targets = vec![heading(0, "t1", "Fluid Balance", "Intake and output")];
        let fs = sign_all(&foreign, &config.scoring);
        let ts = sign_all(&targets, &config.scoring);
        let mut ctx = ReconciliationContext::new(&config);
        let first = resolve(&mut ctx, &fs[0], &ts);
        // Candidates no longer matter once the record is cached.
        let second = resolve(&mut ctx, &fs[0], &[]);
        assert_eq!(first, second);
        assert_eq!(ctx.cache_len(), 1);
    }
}
