//! Duplicate detection within one document's element collection.
//!
//! Pairwise O(n²) scan in `order_index` order. A pair merges when it is
//! interchangeable or scores at least `thresholds.dedup`; merges chain
//! transitively (A~B, B~C groups A, B and C even when A≁C). The earliest
//! member of a chain is its representative. No global clustering is
//! attempted.

use std::collections::HashSet;

use log::debug;

use crate::config::ReconConfig;
use crate::model::{DuplicateGroup, Element, ElementRef, PairScore};
use crate::scorer::{score, ScoreMode};
use crate::signature::SignedElement;

/// Partition `elements` into duplicate groups. Singletons are not returned.
pub fn find_duplicates(elements: &[SignedElement<'_>], config: &ReconConfig) -> Vec<DuplicateGroup> {
    let mut order: Vec<usize> = (0..elements.len()).collect();
    order.sort_by_key(|&i| (elements[i].element.order_index, i));

    // Union-find over positions in `order`; the root is always the smallest
    // position, which makes it the first-seen member.
    let mut parent: Vec<usize> = (0..order.len()).collect();
    let mut edges: Vec<(usize, usize, f64)> = Vec::new();

    for a in 0..order.len() {
        for b in (a + 1)..order.len() {
            let (ra, rb) = (find(&mut parent, a), find(&mut parent, b));
            if ra == rb {
                continue;
            }
            let left = &elements[order[a]];
            let right = &elements[order[b]];
            if left.element.kind != right.element.kind {
                continue;
            }

            let (value, _) = score(&left.signature, &right.signature, config, ScoreMode::Similarity);
            if value >= config.thresholds.dedup || left.signature.interchangeable(&right.signature) {
                parent[ra.max(rb)] = ra.min(rb);
                edges.push((a, b, value));
            }
        }
    }

    let mut groups: Vec<(usize, DuplicateGroup)> = Vec::new();
    for pos in 0..order.len() {
        let root = find(&mut parent, pos);
        if root == pos {
            continue;
        }
        let member = elements[order[pos]].element.element_ref();
        match groups.iter_mut().find(|(r, _)| *r == root) {
            Some((_, group)) => group.members.push(member),
            None => {
                let representative = elements[order[root]].element.element_ref();
                groups.push((
                    root,
                    DuplicateGroup {
                        representative: representative.clone(),
                        members: vec![representative, member],
                        pairwise_scores: Vec::new(),
                    },
                ));
            }
        }
    }

    for (a, b, value) in edges {
        let root = find(&mut parent, a);
        if let Some((_, group)) = groups.iter_mut().find(|(r, _)| *r == root) {
            group.pairwise_scores.push(PairScore {
                left: elements[order[a]].element.element_ref(),
                right: elements[order[b]].element.element_ref(),
                score: value,
            });
        }
    }

    groups.sort_by_key(|(root, _)| *root);
    let groups: Vec<DuplicateGroup> = groups.into_iter().map(|(_, g)| g).collect();
    for g in &groups {
        debug!(
            "duplicate group: keep {} drop {}",
            g.representative.id,
            g.members.len() - 1
        );
    }
    groups
}

/// The elements that survive once every non-representative member is removed.
pub fn retain_representatives<'e>(
    elements: &'e [Element],
    groups: &[DuplicateGroup],
) -> Vec<&'e Element> {
    let removed: HashSet<&ElementRef> = groups.iter().flat_map(|g| g.removals()).collect();
    elements
        .iter()
        .filter(|e| !removed.contains(&e.element_ref()))
        .collect()
}

fn find(parent: &mut [usize], mut x: usize) -> usize {
    while parent[x] != x {
        parent[x] = parent[parent[x]];
        x = parent[x];
    }
    x
}
