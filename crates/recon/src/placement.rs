//! Anchor placement for floating elements (tables, figures).
//!
//! Each candidate anchor gets a reference-proximity score:
//! - caption of this element ("Table 9. ...")   → `CAPTION_PENALTY`, never eligible
//! - no mention of the label at all              → the floor, never eligible
//! - mention near a contextual verb              → +15..+30 (closer is higher)
//! - longer surrounding text                     → +5..+15
//! - mention without a contextual verb           → +1
//!
//! The best eligible anchor strictly above `thresholds.placement_floor` wins,
//! ties going to the earliest anchor. Otherwise the decision is the
//! append-at-section-end fallback, which cannot fail.

use std::cmp::Ordering;

use log::debug;

use crate::config::ReconConfig;
use crate::model::{Anchor, AnchorChoice, FloatKind, FloatingElement, PlacementDecision};
use crate::signature::reference_tokens;

pub const CAPTION_PENALTY: i32 = -50;

const CONTEXT_BONUS_MAX: i32 = 30;
const CONTEXT_BONUS_MIN: i32 = 15;
/// Max token distance between a mention and a contextual verb.
const VERB_WINDOW: usize = 8;
const GENERIC_MENTION_BONUS: i32 = 1;

/// Verb stems that mark a deliberate reference ("Table 4 summarizes ...").
const CONTEXT_VERB_STEMS: &[&str] = &[
    "show", "provid", "present", "summar", "list", "illustrat", "display", "outline", "detail",
    "describ", "compar",
];

/// Tokens that may sit between a plural label and the wanted number
/// ("Tables 3, 4 and 7").
const LIST_JOINERS: &[&str] = &["and", "or", "to", "through"];

/// Words that turn a leading "Table 4" into the subject of running text.
const SUBJECT_FOLLOWERS: &[&str] = &[
    "is", "was", "are", "were", "has", "gives", "contains", "also", "below", "above",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorScore {
    pub score: i32,
    pub caption: bool,
    pub mentioned: bool,
    pub verb_distance: Option<usize>,
}

impl AnchorScore {
    pub fn eligible(&self, floor: i32) -> bool {
        self.mentioned && !self.caption && self.score > floor
    }
}

/// Score one anchor for one floating element.
pub fn score_anchor(floating: &FloatingElement, anchor: &Anchor, config: &ReconConfig) -> AnchorScore {
    let floor = config.thresholds.placement_floor;
    let tokens = reference_tokens(&anchor.text);
    let number = normalize_number(&floating.reference_number);

    if is_caption(&tokens, floating.float_kind, &number) {
        return AnchorScore {
            score: CAPTION_PENALTY,
            caption: true,
            mentioned: true,
            verb_distance: None,
        };
    }

    let mentions = mention_positions(&tokens, floating.float_kind, &number);
    if mentions.is_empty() {
        return AnchorScore {
            score: floor,
            caption: false,
            mentioned: false,
            verb_distance: None,
        };
    }

    let verb_distance = nearest_verb_distance(&tokens, &mentions);
    let context = match verb_distance {
        Some(d) => (CONTEXT_BONUS_MAX - 2 * (d.saturating_sub(1) as i32)).max(CONTEXT_BONUS_MIN),
        None => GENERIC_MENTION_BONUS,
    };

    AnchorScore {
        score: context + length_bonus(&anchor.text),
        caption: false,
        mentioned: true,
        verb_distance,
    }
}

/// Pick the anchor for one floating element.
pub fn place(floating: &FloatingElement, anchors: &[Anchor], config: &ReconConfig) -> PlacementDecision {
    let floor = config.thresholds.placement_floor;
    let mut best: Option<(&Anchor, AnchorScore)> = None;

    for anchor in anchors {
        let scored = score_anchor(floating, anchor, config);
        if !scored.eligible(floor) {
            continue;
        }
        let better = match best {
            None => true,
            Some((current, current_score)) => {
                scored.score > current_score.score
                    || (scored.score == current_score.score && anchor.order_index < current.order_index)
            }
        };
        if better {
            best = Some((anchor, scored));
        }
    }

    let label = floating.label();
    match best {
        Some((anchor, scored)) => PlacementDecision {
            element: floating.element.element_ref(),
            label,
            anchor: Some(AnchorChoice {
                id: anchor.id.clone(),
                order_index: anchor.order_index,
                score: scored.score,
            }),
            insert_after: true,
            sequence: 0,
            fallback_section: None,
        },
        None => {
            debug!("{label}: no anchor above floor {floor}, appending at section end");
            PlacementDecision {
                element: floating.element.element_ref(),
                label,
                anchor: None,
                insert_after: false,
                sequence: 0,
                fallback_section: None,
            }
        }
    }
}

/// Place every floating element of one section.
///
/// Decisions come back in insertion order: grouped by anchor in document
/// order, then the section-end fallbacks. Within a group elements follow
/// their numeral order and `sequence` counts from 0.
pub fn place_all(
    floating: &[FloatingElement],
    anchors: &[Anchor],
    section_id: &str,
    config: &ReconConfig,
) -> Vec<PlacementDecision> {
    let mut decisions: Vec<(usize, PlacementDecision)> = floating
        .iter()
        .enumerate()
        .map(|(i, f)| {
            let mut d = place(f, anchors, config);
            if d.anchor.is_none() {
                d.fallback_section = Some(section_id.to_string());
            }
            (i, d)
        })
        .collect();

    decisions.sort_by(|(ia, a), (ib, b)| {
        let slot_a = a.anchor.as_ref().map(|c| c.order_index).unwrap_or(usize::MAX);
        let slot_b = b.anchor.as_ref().map(|c| c.order_index).unwrap_or(usize::MAX);
        slot_a
            .cmp(&slot_b)
            .then_with(|| {
                let ida = a.anchor.as_ref().map(|c| c.id.as_str());
                let idb = b.anchor.as_ref().map(|c| c.id.as_str());
                ida.cmp(&idb)
            })
            .then_with(|| {
                compare_numerals(&floating[*ia].reference_number, &floating[*ib].reference_number)
            })
            .then_with(|| a.element.order_index.cmp(&b.element.order_index))
            .then_with(|| ia.cmp(ib))
    });

    let mut out: Vec<PlacementDecision> = Vec::with_capacity(decisions.len());
    for (_, mut d) in decisions {
        d.sequence = match out.last() {
            Some(prev) if prev.anchor.as_ref().map(|c| &c.id) == d.anchor.as_ref().map(|c| &c.id) => {
                prev.sequence + 1
            }
            _ => 0,
        };
        out.push(d);
    }
    out
}

/// Natural order for reference numerals: "2.9" < "2.10", "3" < "3a" < "A1".
pub fn compare_numerals(a: &str, b: &str) -> Ordering {
    let split = |s: &str| -> Vec<String> {
        s.split(|c: char| c == '.' || c == '-')
            .map(|p| p.trim().to_ascii_lowercase())
            .collect()
    };
    let (pa, pb) = (split(a), split(b));
    for (x, y) in pa.iter().zip(pb.iter()) {
        let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
            (Ok(nx), Ok(ny)) => nx.cmp(&ny),
            (Ok(_), Err(_)) => Ordering::Less,
            (Err(_), Ok(_)) => Ordering::Greater,
            (Err(_), Err(_)) => x.cmp(y),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    pa.len().cmp(&pb.len())
}

/// The numeral as `reference_tokens` would spell it in running text.
fn normalize_number(number: &str) -> String {
    reference_tokens(number).concat()
}

fn label_words(kind: FloatKind) -> (&'static [&'static str], &'static [&'static str]) {
    match kind {
        FloatKind::Table => (&["table", "tab"], &["tables", "tabs"]),
        FloatKind::Figure => (&["figure", "fig"], &["figures", "figs"]),
    }
}

/// Caption: the text opens with the element's own label, and the label is
/// not the subject of a sentence ("Table 4 summarizes ..." is a reference).
fn is_caption(tokens: &[String], kind: FloatKind, number: &str) -> bool {
    let (singular, _) = label_words(kind);
    match tokens {
        [first, second, rest @ ..] if singular.contains(&first.as_str()) && second == number => {
            !rest.first().is_some_and(|next| is_verb(next) || SUBJECT_FOLLOWERS.contains(&next.as_str()))
        }
        _ => false,
    }
}

fn is_verb(token: &str) -> bool {
    CONTEXT_VERB_STEMS.iter().any(|stem| token.starts_with(stem))
}

/// Token positions where the label is mentioned with this number.
fn mention_positions(tokens: &[String], kind: FloatKind, number: &str) -> Vec<usize> {
    let (singular, plural) = label_words(kind);
    let mut positions = Vec::new();

    for (i, tok) in tokens.iter().enumerate() {
        if singular.contains(&tok.as_str()) {
            if tokens.get(i + 1).is_some_and(|n| n == number) {
                positions.push(i);
            }
        } else if plural.contains(&tok.as_str()) {
            for next in tokens.iter().skip(i + 1).take(6) {
                if next == number {
                    positions.push(i);
                    break;
                }
                let is_numeral = next.chars().any(|c| c.is_ascii_digit());
                if !is_numeral && !LIST_JOINERS.contains(&next.as_str()) {
                    break;
                }
            }
        }
    }
    positions
}

fn nearest_verb_distance(tokens: &[String], mentions: &[usize]) -> Option<usize> {
    let mut nearest: Option<usize> = None;
    for &m in mentions {
        let lo = m.saturating_sub(VERB_WINDOW);
        let hi = (m + 1 + VERB_WINDOW).min(tokens.len().saturating_sub(1));
        for pos in lo..=hi {
            if pos == m || pos == m + 1 {
                continue;
            }
            let Some(tok) = tokens.get(pos) else { continue };
            if is_verb(tok) {
                // Distance from the nearer end of "label number".
                let d = if pos < m { m - pos } else { pos - (m + 1) };
                if d <= VERB_WINDOW {
                    nearest = Some(nearest.map_or(d, |n| n.min(d)));
                }
            }
        }
    }
    nearest
}

fn length_bonus(text: &str) -> i32 {
    match text.chars().count() {
        n if n >= 200 => 15,
        n if n >= 100 => 10,
        n if n >= 40 => 5,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Element, ElementKind};

    fn table(number: &str, order: usize) -> FloatingElement {
        FloatingElement::new(
            Element::new(ElementKind::Table, order).with_id(format!("tbl-{number}")),
            FloatKind::Table,
            number,
        )
    }

    fn anchor(id: &str, order: usize, text: &str) -> Anchor {
        Anchor {
            id: id.into(),
            text: text.into(),
            order_index: order,
        }
    }

    #[test]
    fn caption_scores_penalty_and_is_never_chosen() {
        let config = ReconConfig::default();
        let f = table("9", 0);
        let caption = anchor("p1", 0, "Table 9. Overview of experimental data collected across all study sites");
        let scored = score_anchor(&f, &caption, &config);
        assert_eq!(scored.score, CAPTION_PENALTY);
        assert!(scored.caption);

        let d = place(&f, &[caption], &config);
        assert!(d.anchor.is_none());
        assert!(!d.insert_after);
    }

    #[test]
    fn contextual_reference_beats_incidental_mention() {
        let config = ReconConfig::default();
        let f = table("4", 0);
        let anchors = vec![
            anchor("p1", 0, "Values are also in table 4."),
            anchor("p2", 1, "Table 4 summarizes the recommended adult doses."),
            anchor("p3", 2, "Table 4. Recommended adult doses"),
        ];
        let d = place(&f, &anchors, &config);
        let chosen = d.anchor.unwrap();
        assert_eq!(chosen.id, "p2");
        assert!(chosen.score >= 15);
        assert!(d.insert_after);
    }

    #[test]
    fn verb_proximity_grades_bonus() {
        let config = ReconConfig::default();
        let f = table("2", 0);
        let near = score_anchor(&f, &anchor("a", 0, "Table 2 shows it"), &config);
        let far = score_anchor(
            &f,
            &anchor("b", 1, "In this chapter Table 2 and other sources of data here shows it"),
            &config,
        );
        assert_eq!(near.verb_distance, Some(1));
        assert_eq!(near.score, 30);
        assert!(far.score < near.score);
        assert!(far.score >= 15);
    }

    #[test]
    fn leading_label_with_verb_is_not_a_caption() {
        let config = ReconConfig::default();
        let f = table("4", 0);
        let scored = score_anchor(&f, &anchor("a", 0, "Table 4 summarizes the doses."), &config);
        assert!(!scored.caption);
        assert!(scored.eligible(config.thresholds.placement_floor));
        let caption = score_anchor(&f, &anchor("b", 1, "Table 4 Recommended doses"), &config);
        assert!(caption.caption);
    }

    #[test]
    fn generic_mention_gets_one_point() {
        let config = ReconConfig::default();
        let f = table("6", 0);
        let scored = score_anchor(&f, &anchor("a", 0, "See table 6."), &config);
        assert_eq!(scored.score, 1);
        assert!(scored.eligible(config.thresholds.placement_floor));
    }

    #[test]
    fn longer_text_adds_bonus() {
        assert_eq!(length_bonus("short"), 0);
        assert_eq!(length_bonus(&"x".repeat(40)), 5);
        assert_eq!(length_bonus(&"x".repeat(150)), 10);
        assert_eq!(length_bonus(&"x".repeat(250)), 15);
    }

    #[test]
    fn other_numbers_do_not_count() {
        let config = ReconConfig::default();
        let f = table("9", 0);
        let anchors = vec![
            anchor("p1", 0, "Table 19 shows the results."),
            anchor("p2", 1, "Table 9.1 lists adverse effects."),
            anchor("p3", 2, "There were 9 tables in total."),
        ];
        let d = place(&f, &anchors, &config);
        assert!(d.anchor.is_none());
    }

    #[test]
    fn plural_lists_mention_each_number() {
        let config = ReconConfig::default();
        let f = table("7", 0);
        let scored = score_anchor(&f, &anchor("a", 0, "Tables 3, 5 and 7 present the data"), &config);
        assert!(scored.mentioned);
        assert!(scored.verb_distance.is_some());
    }

    #[test]
    fn figure_labels_are_separate_from_tables() {
        let config = ReconConfig::default();
        let fig = FloatingElement::new(Element::new(ElementKind::Table, 0), FloatKind::Figure, "3");
        let d = place(&fig, &[anchor("a", 0, "Table 3 shows the pulse sites.")], &config);
        assert!(d.anchor.is_none());
        let d = place(&fig, &[anchor("a", 0, "Fig. 3 shows the pulse sites.")], &config);
        assert_eq!(d.anchor.unwrap().id, "a");
    }

    #[test]
    fn ties_go_to_earliest_anchor() {
        let config = ReconConfig::default();
        let f = table("1", 0);
        let anchors = vec![
            anchor("later", 5, "Table 1 lists values."),
            anchor("earlier", 2, "Table 1 lists values."),
        ];
        assert_eq!(place(&f, &anchors, &config).anchor.unwrap().id, "earlier");
    }

    #[test]
    fn shared_anchor_keeps_numeral_order() {
        let config = ReconConfig::default();
        let floating = vec![table("2.10", 0), table("2.9", 1), table("5", 2), table("3", 3)];
        let anchors = vec![
            anchor("p1", 0, "Tables 2.9 and 2.10 summarize the renal panel."),
            anchor("p2", 1, "Unrelated paragraph."),
            anchor("p3", 2, "Table 3 lists common antiemetics."),
        ];
        let plan = place_all(&floating, &anchors, "ch07", &config);
        let order: Vec<(&str, Option<&str>, usize)> = plan
            .iter()
            .map(|d| (d.label.as_str(), d.anchor.as_ref().map(|a| a.id.as_str()), d.sequence))
            .collect();
        assert_eq!(
            order,
            vec![
                ("Table 2.9", Some("p1"), 0),
                ("Table 2.10", Some("p1"), 1),
                ("Table 3", Some("p3"), 0),
                ("Table 5", None, 0),
            ]
        );
        assert_eq!(plan[3].fallback_section.as_deref(), Some("ch07"));
    }

    #[test]
    fn hyphenated_and_lettered_numerals_are_anchored() {
        let config = ReconConfig::default();
        let d = place(
            &table("2-1", 0),
            &[anchor("p1", 0, "Table 2-1 lists the normal adult values.")],
            &config,
        );
        assert_eq!(d.anchor.unwrap().id, "p1");

        let d = place(&table("A.1", 1), &[anchor("p2", 0, "Table A.1 shows the conversion factors.")], &config);
        assert_eq!(d.anchor.unwrap().id, "p2");

        let d = place(&table("2-1", 2), &[anchor("p3", 0, "Table 2\u{2013}1 summarizes the ranges.")], &config);
        assert_eq!(d.anchor.unwrap().id, "p3");
    }

    #[test]
    fn hyphenated_numeral_is_not_a_prefix_match() {
        let config = ReconConfig::default();
        let anchors = [anchor("p1", 0, "Table 2-10 lists the pediatric values.")];
        assert!(place(&table("2-1", 0), &anchors, &config).anchor.is_none());
        assert!(place(&table("2", 0), &anchors, &config).anchor.is_none());
    }

    #[test]
    fn hyphenated_caption_is_still_a_caption() {
        let config = ReconConfig::default();
        let scored = score_anchor(&table("2-1", 0), &anchor("c", 0, "Table 2-1. Normal adult values"), &config);
        assert!(scored.caption);
    }

    #[test]
    fn numerals_compare_naturally() {
        assert_eq!(compare_numerals("2.9", "2.10"), Ordering::Less);
        assert_eq!(compare_numerals("10", "9"), Ordering::Greater);
        assert_eq!(compare_numerals("3", "3.1"), Ordering::Less);
        assert_eq!(compare_numerals("4", "A1"), Ordering::Less);
        assert_eq!(compare_numerals("7", "7"), Ordering::Equal);
    }
}
