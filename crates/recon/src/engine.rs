use std::collections::HashSet;

use log::info;
use rayon::prelude::*;

use crate::config::ReconConfig;
use crate::context::ReconciliationContext;
use crate::dedup::{find_duplicates, retain_representatives};
use crate::error::ReconError;
use crate::evidence::compute_summary;
use crate::loader::{drain, RawElementLoader, RawFloatingLoader};
use crate::model::{
    Anchor, ChapterDoc, ChapterResult, Element, ElementRef, FloatingElement, Issue, IssueKind, ReconInput,
    ReconMeta, ReconResult, ResolutionMethod, ResolutionRecord,
};
use crate::placement::place_all;
use crate::resolver::resolve;
use crate::signature::{sign_all, SignedElement};

/// One chapter of the document pair, after intake.
#[derive(Debug, Default)]
pub struct LoadedChapter {
    pub id: String,
    /// Source elements whose identifiers need a target counterpart.
    pub foreign: Vec<Element>,
    /// Target elements: resolution candidates and dedup scope.
    pub targets: Vec<Element>,
    pub anchors: Vec<Anchor>,
    pub floating: Vec<FloatingElement>,
    pub intake_issues: Vec<Issue>,
}

/// Run one reconciliation pass over a source/target document pair.
///
/// Nothing in `input` is mutated; the result is the complete decision set
/// for the tree-mutation layer.
pub fn run(config: &ReconConfig, input: &ReconInput) -> Result<ReconResult, ReconError> {
    config.validate()?;

    let chapters = load_chapters(input)?;
    info!(
        "pass '{}': {} chapter(s), parallel={}",
        config.name,
        chapters.len(),
        config.pass.parallel
    );

    let mut results = map_chapters(&chapters, config.pass.parallel, |c| reconcile_chapter(c, config));

    if config.pass.escalate_to_book_scope {
        escalate_to_book(&chapters, &mut results, config);
    }

    for result in &mut results {
        record_outcome_issues(result);
    }

    let summary = compute_summary(&results);
    info!(
        "pass '{}': {} reference(s), {} resolved, {} ambiguous, {} no match, {} duplicate(s) removed, {} fallback placement(s)",
        config.name,
        summary.references,
        summary.resolved_exact + summary.resolved_fuzzy,
        summary.ambiguous,
        summary.no_match,
        summary.duplicates_removed,
        summary.fallback_placed,
    );

    Ok(ReconResult {
        meta: ReconMeta {
            config_name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
            title_metric: config.scoring.title_metric,
        },
        summary,
        chapters: results,
    })
}

/// Pair source and target chapters by id and pull their elements through the loaders.
///
/// Chapters keep source order; target-only chapters follow in target order.
pub fn load_chapters(input: &ReconInput) -> Result<Vec<LoadedChapter>, ReconError> {
    check_unique_ids("source", &input.source.chapters)?;
    check_unique_ids("target", &input.target.chapters)?;

    let mut ids: Vec<&str> = input.source.chapters.iter().map(|c| c.id.as_str()).collect();
    for c in &input.target.chapters {
        if !ids.contains(&c.id.as_str()) {
            ids.push(c.id.as_str());
        }
    }

    let mut chapters = Vec::with_capacity(ids.len());
    for id in ids {
        let mut chapter = LoadedChapter {
            id: id.to_string(),
            ..LoadedChapter::default()
        };

        if let Some(src) = input.source.chapters.iter().find(|c| c.id == id) {
            let scope = format!("source/{id}");
            let (foreign, mut issues) = drain(&mut RawElementLoader::new(&src.elements), &scope);
            let (floating, floating_issues) = drain(&mut RawFloatingLoader::new(&src.floating), &scope);
            issues.extend(floating_issues);
            chapter.foreign = foreign;
            chapter.floating = floating;
            chapter.intake_issues.extend(issues);
        }

        if let Some(tgt) = input.target.chapters.iter().find(|c| c.id == id) {
            let scope = format!("target/{id}");
            let (targets, issues) = drain(&mut RawElementLoader::new(&tgt.elements), &scope);
            chapter.targets = targets;
            chapter.anchors = tgt.anchors.clone();
            chapter.intake_issues.extend(issues);
        }

        chapters.push(chapter);
    }
    Ok(chapters)
}

fn check_unique_ids(side: &str, chapters: &[ChapterDoc]) -> Result<(), ReconError> {
    let mut seen = HashSet::new();
    for c in chapters {
        if !seen.insert(c.id.as_str()) {
            return Err(ReconError::Input(format!("{side}: duplicate chapter id '{}'", c.id)));
        }
    }
    Ok(())
}

/// Dedup targets, resolve foreign references against the survivors, place floating elements.
pub fn reconcile_chapter(chapter: &LoadedChapter, config: &ReconConfig) -> ChapterResult {
    let mut ctx = ReconciliationContext::new(config);
    for issue in &chapter.intake_issues {
        ctx.report(issue.clone());
    }

    let signed_targets = sign_all(&chapter.targets, &config.scoring);
    for t in signed_targets.iter().filter(|t| t.signature.is_empty()) {
        ctx.report(Issue::new(
            IssueKind::EmptySignature,
            format!("{}/{}", chapter.id, t.element.key()),
            "target element has no extractable text",
        ));
    }

    let duplicate_groups = find_duplicates(&signed_targets, config);
    let removed: HashSet<&ElementRef> = duplicate_groups.iter().flat_map(|g| g.removals()).collect();
    let candidates: Vec<SignedElement<'_>> = signed_targets
        .into_iter()
        .filter(|s| !removed.contains(&s.element.element_ref()))
        .collect();

    let resolutions: Vec<ResolutionRecord> = sign_all(&chapter.foreign, &config.scoring)
        .iter()
        .map(|f| resolve(&mut ctx, f, &candidates))
        .collect();

    let placements = place_all(&chapter.floating, &chapter.anchors, &chapter.id, config);

    ChapterResult {
        chapter_id: chapter.id.clone(),
        resolutions,
        duplicate_groups,
        placements,
        issues: ctx.take_issues(),
    }
}

/// Second tier: retry every chapter-level unresolved record (AMBIGUOUS or
/// NO_MATCH) against every surviving target element in the book. Each
/// chapter gets a fresh context.
///
/// A book record replaces the chapter record when it resolves, or when it
/// narrows a NO_MATCH to an AMBIGUOUS tie. Which records retry does not
/// depend on the resolution threshold, so a stricter threshold can never
/// resolve more references than a looser one.
fn escalate_to_book(chapters: &[LoadedChapter], results: &mut [ChapterResult], config: &ReconConfig) {
    let book: Vec<Element> = chapters
        .iter()
        .zip(results.iter())
        .flat_map(|(c, r)| retain_representatives(&c.targets, &r.duplicate_groups))
        .cloned()
        .collect();
    let book_signed = sign_all(&book, &config.scoring);

    let pairs: Vec<(&LoadedChapter, &ChapterResult)> = chapters.iter().zip(results.iter()).collect();
    let upgrades = map_chapters(&pairs, config.pass.parallel, |(chapter, result)| {
        let pending: Vec<usize> = result
            .resolutions
            .iter()
            .enumerate()
            .filter(|(_, r)| !r.is_resolved())
            .map(|(i, _)| i)
            .collect();
        if pending.is_empty() {
            return Vec::new();
        }

        let foreign = sign_all(&chapter.foreign, &config.scoring);
        let mut ctx = ReconciliationContext::escalated(config);
        pending
            .into_iter()
            .filter_map(|i| {
                let record = resolve(&mut ctx, &foreign[i], &book_signed);
                let narrowed = result.resolutions[i].method == ResolutionMethod::NoMatch
                    && record.method == ResolutionMethod::Ambiguous;
                (record.is_resolved() || narrowed).then_some((i, record))
            })
            .collect::<Vec<_>>()
    });

    for (result, found) in results.iter_mut().zip(upgrades) {
        for (i, record) in found {
            result.resolutions[i] = record;
        }
    }
}

/// Turn final unresolved records and fallback placements into countable issues.
fn record_outcome_issues(result: &mut ChapterResult) {
    for r in &result.resolutions {
        match r.method {
            ResolutionMethod::Ambiguous => {
                let mut ids: Vec<&str> = r.contenders.iter().map(|c| c.target_id.as_str()).collect();
                if let Some(best) = &r.best {
                    ids.insert(0, best.target_id.as_str());
                }
                result.issues.push(Issue::new(
                    IssueKind::AmbiguousMatch,
                    format!("{}/{}", result.chapter_id, r.foreign_ref),
                    format!("tied candidates: {}", ids.join(", ")),
                ));
            }
            ResolutionMethod::NoMatch => {
                result.issues.push(Issue::new(
                    IssueKind::NoMatch,
                    format!("{}/{}", result.chapter_id, r.foreign_ref),
                    format!("best confidence {:.3}", r.confidence),
                ));
            }
            ResolutionMethod::Exact | ResolutionMethod::Fuzzy => {}
        }
    }
    for p in result.placements.iter().filter(|p| p.is_fallback()) {
        result.issues.push(Issue::new(
            IssueKind::PlacementFallback,
            format!("{}/{}", result.chapter_id, p.element.id),
            format!("{} appended at end of section", p.label),
        ));
    }
}

fn map_chapters<I, T, F>(items: &[I], parallel: bool, f: F) -> Vec<T>
where
    I: Sync,
    T: Send,
    F: Fn(&I) -> T + Sync + Send,
{
    if parallel {
        items.par_iter().map(f).collect()
    } else {
        items.iter().map(f).collect()
    }
}
