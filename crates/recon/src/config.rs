use serde::{Deserialize, Serialize};

use crate::error::ReconError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Engine configuration for one reconciliation pass.
///
/// Every section is optional; an empty TOML document yields the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub weights: Weights,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub pass: PassConfig,
    #[serde(default)]
    pub inputs: InputsConfig,
}

fn default_name() -> String {
    "reconciliation".into()
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            thresholds: Thresholds::default(),
            weights: Weights::default(),
            scoring: ScoringConfig::default(),
            pass: PassConfig::default(),
            inputs: InputsConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

/// Acceptance cutoffs, one per consumer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    #[serde(default = "default_resolution")]
    pub resolution: f64,
    #[serde(default = "default_dedup")]
    pub dedup: f64,
    /// Anchor scores must be strictly above this to be selected.
    #[serde(default = "default_placement_floor")]
    pub placement_floor: i32,
    /// Two resolution candidates within this distance of the best are a tie.
    #[serde(default = "default_tie_margin")]
    pub tie_margin: f64,
}

fn default_resolution() -> f64 {
    0.7
}

fn default_dedup() -> f64 {
    0.75
}

fn default_placement_floor() -> i32 {
    -50
}

fn default_tie_margin() -> f64 {
    0.02
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            resolution: default_resolution(),
            dedup: default_dedup(),
            placement_floor: default_placement_floor(),
            tie_margin: default_tie_margin(),
        }
    }
}

/// Per-call replacements for any subset of thresholds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct ThresholdOverrides {
    pub resolution: Option<f64>,
    pub dedup: Option<f64>,
    pub placement_floor: Option<i32>,
    pub tie_margin: Option<f64>,
}

// ---------------------------------------------------------------------------
// Weights + scoring
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    #[serde(default = "default_title_weight")]
    pub title: f64,
    #[serde(default = "default_content_weight")]
    pub content: f64,
    /// Split evenly between the two shape dimensions.
    #[serde(default = "default_shape_weight")]
    pub shape: f64,
    /// Added on title containment, resolution only.
    #[serde(default = "default_substring_bonus")]
    pub substring_bonus: f64,
}

fn default_title_weight() -> f64 {
    0.3
}

fn default_content_weight() -> f64 {
    0.4
}

fn default_shape_weight() -> f64 {
    0.2
}

fn default_substring_bonus() -> f64 {
    0.1
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            title: default_title_weight(),
            content: default_content_weight(),
            shape: default_shape_weight(),
            substring_bonus: default_substring_bonus(),
        }
    }
}

impl Weights {
    /// Sum of the weighted sub-metrics, excluding the bonus.
    pub fn base_total(&self) -> f64 {
        self.title + self.content + self.shape
    }
}

/// Title comparison metric. Fixed for a whole pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TitleMetric {
    /// Token-set Jaccard over normalized title words.
    #[default]
    Jaccard,
    /// Normalized Levenshtein ratio over the normalized titles.
    EditRatio,
}

impl std::fmt::Display for TitleMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Jaccard => write!(f, "jaccard"),
            Self::EditRatio => write!(f, "edit_ratio"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default)]
    pub title_metric: TitleMetric,
    /// Characters of the content sample the content metric compares.
    #[serde(default = "default_content_prefix_chars")]
    pub content_prefix_chars: usize,
    /// Cap on the first-cell text used as a table's content sample.
    #[serde(default = "default_table_sample_chars")]
    pub table_sample_chars: usize,
    /// Allowed difference per shape dimension (rows, cols, depth).
    #[serde(default = "default_shape_tolerance")]
    pub shape_tolerance: u32,
}

fn default_content_prefix_chars() -> usize {
    100
}

fn default_table_sample_chars() -> usize {
    50
}

fn default_shape_tolerance() -> u32 {
    1
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            title_metric: TitleMetric::default(),
            content_prefix_chars: default_content_prefix_chars(),
            table_sample_chars: default_table_sample_chars(),
            shape_tolerance: default_shape_tolerance(),
        }
    }
}

// ---------------------------------------------------------------------------
// Pass + inputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassConfig {
    /// Process chapters on the rayon pool.
    #[serde(default = "default_true")]
    pub parallel: bool,
    /// Retry chapter-level NO_MATCH references against the whole book.
    #[serde(default = "default_true")]
    pub escalate_to_book_scope: bool,
}

fn default_true() -> bool {
    true
}

impl Default for PassConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            escalate_to_book_scope: true,
        }
    }
}

/// Input file locations, relative to the config file. Only the CLI reads these.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputsConfig {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Copy of this config with the given thresholds replaced.
    pub fn with_overrides(&self, overrides: &ThresholdOverrides) -> Self {
        let mut config = self.clone();
        if let Some(v) = overrides.resolution {
            config.thresholds.resolution = v;
        }
        if let Some(v) = overrides.dedup {
            config.thresholds.dedup = v;
        }
        if let Some(v) = overrides.placement_floor {
            config.thresholds.placement_floor = v;
        }
        if let Some(v) = overrides.tie_margin {
            config.thresholds.tie_margin = v;
        }
        config
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        let t = &self.thresholds;
        for (name, value) in [("resolution", t.resolution), ("dedup", t.dedup)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ReconError::ConfigValidation(format!(
                    "thresholds.{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if !(0.0..1.0).contains(&t.tie_margin) {
            return Err(ReconError::ConfigValidation(format!(
                "thresholds.tie_margin must be within [0, 1), got {}",
                t.tie_margin
            )));
        }

        let w = &self.weights;
        for (name, value) in [
            ("title", w.title),
            ("content", w.content),
            ("shape", w.shape),
            ("substring_bonus", w.substring_bonus),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ReconError::ConfigValidation(format!(
                    "weights.{name} must be a non-negative number, got {value}"
                )));
            }
        }
        if w.base_total() <= 0.0 || w.base_total() > 1.0 + 1e-9 {
            return Err(ReconError::ConfigValidation(format!(
                "weights.title + weights.content + weights.shape must be within (0, 1], got {}",
                w.base_total()
            )));
        }

        let s = &self.scoring;
        if s.content_prefix_chars == 0 {
            return Err(ReconError::ConfigValidation(
                "scoring.content_prefix_chars must be greater than 0".into(),
            ));
        }
        if s.table_sample_chars == 0 {
            return Err(ReconError::ConfigValidation(
                "scoring.table_sample_chars must be greater than 0".into(),
            ));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
