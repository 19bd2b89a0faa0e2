use std::collections::BTreeMap;

use crate::model::{ChapterResult, IssueKind, ResolutionMethod, ResolutionTier, ReconSummary};

/// Compute pass-wide counts from per-chapter results.
pub fn compute_summary(chapters: &[ChapterResult]) -> ReconSummary {
    let mut summary = ReconSummary {
        chapters: chapters.len(),
        ..ReconSummary::default()
    };
    let mut issue_counts: BTreeMap<String, usize> = BTreeMap::new();

    for c in chapters {
        for r in &c.resolutions {
            summary.references += 1;
            match r.method {
                ResolutionMethod::Exact => summary.resolved_exact += 1,
                ResolutionMethod::Fuzzy => summary.resolved_fuzzy += 1,
                ResolutionMethod::Ambiguous => summary.ambiguous += 1,
                ResolutionMethod::NoMatch => summary.no_match += 1,
            }
            if r.tier == ResolutionTier::Book && r.is_resolved() {
                summary.resolved_escalated += 1;
            }
        }

        summary.duplicate_groups += c.duplicate_groups.len();
        summary.duplicates_removed += c.duplicate_groups.iter().map(|g| g.removals().count()).sum::<usize>();

        for p in &c.placements {
            if p.is_fallback() {
                summary.fallback_placed += 1;
            } else {
                summary.placed += 1;
            }
        }

        for issue in &c.issues {
            if issue.kind == IssueKind::MalformedElement {
                summary.malformed_skipped += 1;
            }
            *issue_counts.entry(issue.kind.to_string()).or_insert(0) += 1;
        }
    }

    summary.issue_counts = issue_counts;
    summary
}
