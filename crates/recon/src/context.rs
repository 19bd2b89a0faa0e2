use std::collections::HashMap;

use crate::config::ReconConfig;
use crate::model::{Issue, ResolutionRecord, ResolutionTier};

/// State owned by one reconciliation pass.
///
/// Holds the resolution cache and the issues raised along the way. Create a
/// fresh context for every document pair (or escalation tier); reusing one
/// across unrelated pairs would serve stale records.
#[derive(Debug)]
pub struct ReconciliationContext<'c> {
    config: &'c ReconConfig,
    tier: ResolutionTier,
    cache: HashMap<String, ResolutionRecord>,
    issues: Vec<Issue>,
}

impl<'c> ReconciliationContext<'c> {
    pub fn new(config: &'c ReconConfig) -> Self {
        Self::with_tier(config, ResolutionTier::Chapter)
    }

    /// Context for the book-wide retry tier.
    pub fn escalated(config: &'c ReconConfig) -> Self {
        Self::with_tier(config, ResolutionTier::Book)
    }

    fn with_tier(config: &'c ReconConfig, tier: ResolutionTier) -> Self {
        Self {
            config,
            tier,
            cache: HashMap::new(),
            issues: Vec::new(),
        }
    }

    pub fn config(&self) -> &'c ReconConfig {
        self.config
    }

    pub fn tier(&self) -> ResolutionTier {
        self.tier
    }

    pub fn cached(&self, foreign_ref: &str) -> Option<&ResolutionRecord> {
        self.cache.get(foreign_ref)
    }

    pub fn remember(&mut self, record: ResolutionRecord) {
        self.cache.insert(record.foreign_ref.clone(), record);
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn report(&mut self, issue: Issue) {
        self.issues.push(issue);
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn take_issues(&mut self) -> Vec<Issue> {
        std::mem::take(&mut self.issues)
    }
}
