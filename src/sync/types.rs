//! Core sync data model: categories, documents, outcomes, and counters

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Identifier of a result document within its category
///
/// Stable across retries and used as the idempotency key for existence checks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for DocumentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A class of result document with its own listing, fetch and insert routines
///
/// Variant order is the canonical run order when every category is selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Solver,
    PackageExtract,
    Adviser,
    ProvenanceChecker,
    DependencyMonkey,
    Inspection,
}

impl Category {
    /// All categories in run order
    pub const ALL: [Category; 6] = [
        Category::Solver,
        Category::PackageExtract,
        Category::Adviser,
        Category::ProvenanceChecker,
        Category::DependencyMonkey,
        Category::Inspection,
    ];

    /// Name used on the command line, in logs and in metric labels
    pub fn slug(&self) -> &'static str {
        match self {
            Category::Solver => "solver",
            Category::PackageExtract => "package-extract",
            Category::Adviser => "adviser",
            Category::ProvenanceChecker => "provenance-checker",
            Category::DependencyMonkey => "dependency-monkey",
            Category::Inspection => "inspection",
        }
    }

    /// Object-store prefix under which documents of this category live
    pub fn store_prefix(&self) -> &'static str {
        match self {
            Category::Solver => "solver",
            Category::PackageExtract => "analysis",
            Category::Adviser => "adviser",
            Category::ProvenanceChecker => "provenance",
            Category::DependencyMonkey => "dependency-monkey",
            Category::Inspection => "inspections",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.slug())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown category: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.slug() == s)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

/// Raw payload of one result document
///
/// Opaque to the orchestrator beyond its id and category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub category: Category,
    pub payload: serde_json::Value,
}

impl Document {
    pub fn new(category: Category, id: impl Into<DocumentId>, payload: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            category,
            payload,
        }
    }
}

/// Classification of one attempted document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncOutcome {
    Synced,
    /// Already present in the graph and not forced
    Skipped,
    /// Fetch or insertion raised an error
    Failed,
}

impl std::fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncOutcome::Synced => f.write_str("synced"),
            SyncOutcome::Skipped => f.write_str("skipped"),
            SyncOutcome::Failed => f.write_str("failed"),
        }
    }
}

/// Per-category counters for one run
///
/// `processed == synced + skipped + failed` holds after every `record`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub processed: u64,
    pub synced: u64,
    pub skipped: u64,
    pub failed: u64,
}

impl CategoryStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one attempted document
    pub fn record(&mut self, outcome: SyncOutcome) {
        self.processed += 1;
        match outcome {
            SyncOutcome::Synced => self.synced += 1,
            SyncOutcome::Skipped => self.skipped += 1,
            SyncOutcome::Failed => self.failed += 1,
        }
    }

    pub fn is_conserved(&self) -> bool {
        self.processed == self.synced + self.skipped + self.failed
    }

    pub fn merge(&mut self, other: &CategoryStats) {
        self.processed += other.processed;
        self.synced += other.synced;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

impl std::fmt::Display for CategoryStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "processed={} synced={} skipped={} failed={}",
            self.processed, self.synced, self.skipped, self.failed
        )
    }
}

/// Stats of every category that ran in one invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunResult {
    categories: BTreeMap<Category, CategoryStats>,
}

impl RunResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a category's stats into the result
    pub fn merge(&mut self, category: Category, stats: CategoryStats) {
        self.categories.entry(category).or_default().merge(&stats);
    }

    pub fn get(&self, category: Category) -> Option<&CategoryStats> {
        self.categories.get(&category)
    }

    pub fn contains(&self, category: Category) -> bool {
        self.categories.contains_key(&category)
    }

    /// Iterate in run order
    pub fn iter(&self) -> impl Iterator<Item = (Category, &CategoryStats)> {
        self.categories.iter().map(|(c, s)| (*c, s))
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Sum of all category counters
    pub fn totals(&self) -> CategoryStats {
        let mut totals = CategoryStats::new();
        for stats in self.categories.values() {
            totals.merge(stats);
        }
        totals
    }
}
