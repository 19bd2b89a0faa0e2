use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::config::TitleMetric;
use crate::error::ReconError;

// ---------------------------------------------------------------------------
// Elements
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Heading,
    Section,
    Table,
    Figure,
    Paragraph,
}

impl ElementKind {
    /// Parse a loosely spelled kind name. Chapters are sections.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "heading" | "title" => Some(Self::Heading),
            "section" | "chapter" => Some(Self::Section),
            "table" => Some(Self::Table),
            "figure" | "fig" => Some(Self::Figure),
            "paragraph" | "para" => Some(Self::Paragraph),
            _ => None,
        }
    }
}

impl std::fmt::Display for ElementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Heading => write!(f, "heading"),
            Self::Section => write!(f, "section"),
            Self::Table => write!(f, "table"),
            Self::Figure => write!(f, "figure"),
            Self::Paragraph => write!(f, "paragraph"),
        }
    }
}

/// Structural shape of an element: grid size for tables, nesting depth for sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Shape {
    Grid { rows: u32, cols: u32 },
    Nesting { depth: u32 },
}

/// Immutable snapshot of a node from either document tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub kind: ElementKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content_sample: String,
    /// Table cell texts in reading order. Empty for non-tables.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cells: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<Shape>,
    pub order_index: usize,
}

impl Element {
    pub fn new(kind: ElementKind, order_index: usize) -> Self {
        Self {
            kind,
            native_id: None,
            title: String::new(),
            content_sample: String::new(),
            cells: Vec::new(),
            shape: None,
            order_index,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.native_id = Some(id.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content_sample = content.into();
        self
    }

    pub fn with_cells<S: Into<String>>(mut self, cells: impl IntoIterator<Item = S>) -> Self {
        self.cells = cells.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_shape(mut self, shape: Shape) -> Self {
        self.shape = Some(shape);
        self
    }

    /// Stable key for this element within its own document.
    ///
    /// Uses the native id when present; otherwise synthesizes one from kind,
    /// position and title so two untitled siblings never collide.
    pub fn key(&self) -> String {
        match self.native_id.as_deref() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => format!("{}#{}:{}", self.kind, self.order_index, self.title.trim()),
        }
    }

    pub fn element_ref(&self) -> ElementRef {
        ElementRef {
            id: self.key(),
            order_index: self.order_index,
        }
    }
}

/// Lightweight handle to an element, used in results the mutation layer consumes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementRef {
    pub id: String,
    pub order_index: usize,
}

// ---------------------------------------------------------------------------
// Signatures + scoring
// ---------------------------------------------------------------------------

/// Comparable fingerprint of an element. See `signature::extract`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Signature {
    pub kind: ElementKind,
    pub normalized_title: String,
    /// Normalized, length-capped text the content metric compares.
    pub content_sample: String,
    pub content_tokens: BTreeSet<String>,
    pub shape_key: Option<Shape>,
}

impl Signature {
    /// No usable text anywhere. Empty signatures are unmatchable.
    pub fn is_empty(&self) -> bool {
        self.normalized_title.is_empty() && self.content_sample.is_empty()
    }

    /// Equal `(kind, normalized_title, content_tokens)` means the two elements
    /// are interchangeable for matching.
    pub fn interchangeable(&self, other: &Signature) -> bool {
        !self.is_empty()
            && self.kind == other.kind
            && self.normalized_title == other.normalized_title
            && self.content_tokens == other.content_tokens
    }
}

/// Weighted contribution of each sub-metric to a score.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub title: f64,
    pub content: f64,
    pub shape_primary: f64,
    pub shape_secondary: f64,
    pub substring_bonus: f64,
    /// Set when either side had an empty signature; the score is forced to 0.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub empty_signature: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchCandidate {
    pub source_ref: String,
    pub target_id: String,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    Exact,
    Fuzzy,
    Ambiguous,
    NoMatch,
}

/// Terminal state of a resolution. There is no retry inside a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionState {
    ResolvedExact,
    ResolvedFuzzy,
    UnresolvedAmbiguous,
    UnresolvedNoMatch,
}

impl std::fmt::Display for ResolutionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ResolvedExact => write!(f, "resolved_exact"),
            Self::ResolvedFuzzy => write!(f, "resolved_fuzzy"),
            Self::UnresolvedAmbiguous => write!(f, "unresolved_ambiguous"),
            Self::UnresolvedNoMatch => write!(f, "unresolved_no_match"),
        }
    }
}

/// Candidate scope a record was resolved in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionTier {
    #[default]
    Chapter,
    Book,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolutionRecord {
    pub foreign_ref: String,
    /// `None` means UNRESOLVED.
    pub resolved_id: Option<String>,
    pub confidence: f64,
    pub method: ResolutionMethod,
    pub tier: ResolutionTier,
    /// Highest-scoring candidate, kept for diagnostics even when unresolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best: Option<MatchCandidate>,
    /// Candidates tied with `best` within the tie margin.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub contenders: Vec<MatchCandidate>,
}

impl ResolutionRecord {
    pub fn state(&self) -> ResolutionState {
        match self.method {
            ResolutionMethod::Exact => ResolutionState::ResolvedExact,
            ResolutionMethod::Fuzzy => ResolutionState::ResolvedFuzzy,
            ResolutionMethod::Ambiguous => ResolutionState::UnresolvedAmbiguous,
            ResolutionMethod::NoMatch => ResolutionState::UnresolvedNoMatch,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved_id.is_some()
    }
}

// ---------------------------------------------------------------------------
// Dedup
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairScore {
    pub left: ElementRef,
    pub right: ElementRef,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateGroup {
    pub representative: ElementRef,
    /// All members in `order_index` order, representative first.
    pub members: Vec<ElementRef>,
    /// The pairs whose scores merged this group.
    pub pairwise_scores: Vec<PairScore>,
}

impl DuplicateGroup {
    /// Members the mutation layer should delete.
    pub fn removals(&self) -> impl Iterator<Item = &ElementRef> {
        self.members.iter().filter(move |m| **m != self.representative)
    }
}

// ---------------------------------------------------------------------------
// Placement
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FloatKind {
    Table,
    Figure,
}

impl FloatKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "table" | "tab" => Some(Self::Table),
            "figure" | "fig" => Some(Self::Figure),
            _ => None,
        }
    }

    /// Element kind a floating entry gets when upstream leaves it unset.
    pub fn element_kind(&self) -> ElementKind {
        match self {
            Self::Table => ElementKind::Table,
            Self::Figure => ElementKind::Figure,
        }
    }
}

impl std::fmt::Display for FloatKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Table => write!(f, "Table"),
            Self::Figure => write!(f, "Figure"),
        }
    }
}

/// An element extracted from the source whose target position must be found.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FloatingElement {
    pub element: Element,
    pub float_kind: FloatKind,
    /// The numeral identifying the element, e.g. "7" for "Table 7".
    pub reference_number: String,
}

impl FloatingElement {
    pub fn new(element: Element, float_kind: FloatKind, reference_number: impl Into<String>) -> Self {
        Self {
            element,
            float_kind,
            reference_number: reference_number.into(),
        }
    }

    pub fn label(&self) -> String {
        format!("{} {}", self.float_kind, self.reference_number)
    }
}

/// Paragraph-like node in the target tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anchor {
    pub id: String,
    pub text: String,
    pub order_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnchorChoice {
    pub id: String,
    pub order_index: usize,
    pub score: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlacementDecision {
    pub element: ElementRef,
    pub label: String,
    /// `None` is the append-at-section-end fallback.
    pub anchor: Option<AnchorChoice>,
    pub insert_after: bool,
    /// Position among decisions sharing the same anchor (or the same fallback section).
    pub sequence: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_section: Option<String>,
}

impl PlacementDecision {
    pub fn is_fallback(&self) -> bool {
        self.anchor.is_none()
    }
}

// ---------------------------------------------------------------------------
// Issues
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    EmptySignature,
    AmbiguousMatch,
    NoMatch,
    MalformedElement,
    PlacementFallback,
}

impl std::fmt::Display for IssueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptySignature => write!(f, "empty_signature"),
            Self::AmbiguousMatch => write!(f, "ambiguous_match"),
            Self::NoMatch => write!(f, "no_match"),
            Self::MalformedElement => write!(f, "malformed_element"),
            Self::PlacementFallback => write!(f, "placement_fallback"),
        }
    }
}

/// Non-fatal outcome worth a human look. Never raised, only counted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub kind: IssueKind,
    pub subject: String,
    pub detail: String,
}

impl Issue {
    pub fn new(kind: IssueKind, subject: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            subject: subject.into(),
            detail: detail.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Input documents
// ---------------------------------------------------------------------------

/// Element as handed over by an upstream loader. Every field is optional so
/// malformed entries can be reported instead of failing the whole document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawElement {
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub native_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content_sample: Option<String>,
    #[serde(default)]
    pub cells: Vec<String>,
    #[serde(default)]
    pub shape: Option<Shape>,
    #[serde(default)]
    pub order_index: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawFloating {
    #[serde(flatten)]
    pub element: RawElement,
    /// "table" or "figure"; defaults to table.
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub number: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChapterDoc {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub elements: Vec<RawElement>,
    #[serde(default)]
    pub anchors: Vec<Anchor>,
    #[serde(default)]
    pub floating: Vec<RawFloating>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub chapters: Vec<ChapterDoc>,
}

impl Document {
    /// Decode a JSON element dump as produced by an upstream loader.
    pub fn from_json(input: &str) -> Result<Self, ReconError> {
        serde_json::from_str(input).map_err(|e| ReconError::Input(format!("invalid document: {e}")))
    }
}

/// One document pair. Source chapters supply foreign references and floating
/// elements; target chapters supply candidates and anchors.
#[derive(Debug, Clone, Default)]
pub struct ReconInput {
    pub source: Document,
    pub target: Document,
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ChapterResult {
    pub chapter_id: String,
    pub resolutions: Vec<ResolutionRecord>,
    pub duplicate_groups: Vec<DuplicateGroup>,
    pub placements: Vec<PlacementDecision>,
    pub issues: Vec<Issue>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconSummary {
    pub chapters: usize,
    pub references: usize,
    pub resolved_exact: usize,
    pub resolved_fuzzy: usize,
    /// Resolved only after escalating to book scope.
    pub resolved_escalated: usize,
    pub ambiguous: usize,
    pub no_match: usize,
    pub duplicate_groups: usize,
    pub duplicates_removed: usize,
    pub placed: usize,
    pub fallback_placed: usize,
    pub malformed_skipped: usize,
    pub issue_counts: BTreeMap<String, usize>,
}

impl ReconSummary {
    /// Items a human should audit before trusting the pass.
    pub fn needs_review(&self) -> usize {
        self.ambiguous + self.no_match + self.fallback_placed
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconMeta {
    pub config_name: String,
    pub engine_version: String,
    pub run_at: String,
    pub title_metric: TitleMetric,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconResult {
    pub meta: ReconMeta,
    pub summary: ReconSummary,
    pub chapters: Vec<ChapterResult>,
}
