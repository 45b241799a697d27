//! Run configuration: validation of command-line selections before any I/O

use crate::sync::{Category, DocumentId};
use thiserror::Error;
use tracing::warn;

pub const EXIT_OK: i32 = 0;
pub const EXIT_CONFLICTING_FLAGS: i32 = 1;
pub const EXIT_DOCUMENT_IDS_WITHOUT_CATEGORY: i32 = 2;
pub const EXIT_MISSING_AMUN_API_URL: i32 = 3;
pub const EXIT_SYNC_FAILED: i32 = 4;
/// `EX_TEMPFAIL`: the scheduler should re-invoke the job later
pub const EXIT_RETRY: i32 = 75;

/// Invalid flag combinations, reported before any work is attempted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("only one category may be selected, got: {}", join_slugs(.0))]
    ConflictingCategories(Vec<Category>),

    #[error("--only-graph-sync and --only-ceph-sync cannot be combined")]
    ConflictingInspectionTargets,

    #[error("no documents can be synced for category {0}: it is not configured")]
    UnboundCategory(Category),

    #[error("document ids can only be used together with exactly one selected category")]
    DocumentIdsWithoutCategory,

    #[error("inspection sync requires the Amun API URL (--amun-api-url)")]
    MissingAmunApiUrl,

    #[error("invalid Amun API URL {url:?}: {reason}")]
    InvalidAmunApiUrl { url: String, reason: String },
}

impl ConfigError {
    pub fn exit_code(&self) -> i32 {
        match self {
            ConfigError::ConflictingCategories(_)
            | ConfigError::ConflictingInspectionTargets
            | ConfigError::UnboundCategory(_) => EXIT_CONFLICTING_FLAGS,
            ConfigError::DocumentIdsWithoutCategory => EXIT_DOCUMENT_IDS_WITHOUT_CATEGORY,
            ConfigError::MissingAmunApiUrl | ConfigError::InvalidAmunApiUrl { .. } => {
                EXIT_MISSING_AMUN_API_URL
            }
        }
    }
}

fn join_slugs(categories: &[Category]) -> String {
    categories
        .iter()
        .map(Category::slug)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Which categories a run covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    All,
    Only(Category),
}

impl Selection {
    /// Selected categories in run order
    pub fn categories(&self) -> Vec<Category> {
        match self {
            Selection::All => Category::ALL.to_vec(),
            Selection::Only(category) => vec![*category],
        }
    }

    pub fn includes(&self, category: Category) -> bool {
        match self {
            Selection::All => true,
            Selection::Only(selected) => *selected == category,
        }
    }
}

/// The "only this category" switches as given on the command line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryFlags {
    pub solver: bool,
    pub package_extract: bool,
    pub adviser: bool,
    pub provenance_checker: bool,
    pub dependency_monkey: bool,
    pub inspection: bool,
}

impl CategoryFlags {
    pub fn only(category: Category) -> Self {
        let mut flags = Self::default();
        flags.set(category);
        flags
    }

    pub fn set(&mut self, category: Category) {
        match category {
            Category::Solver => self.solver = true,
            Category::PackageExtract => self.package_extract = true,
            Category::Adviser => self.adviser = true,
            Category::ProvenanceChecker => self.provenance_checker = true,
            Category::DependencyMonkey => self.dependency_monkey = true,
            Category::Inspection => self.inspection = true,
        }
    }

    /// Categories whose switch is on, in run order
    pub fn selected(&self) -> Vec<Category> {
        Category::ALL
            .into_iter()
            .filter(|category| match category {
                Category::Solver => self.solver,
                Category::PackageExtract => self.package_extract,
                Category::Adviser => self.adviser,
                Category::ProvenanceChecker => self.provenance_checker,
                Category::DependencyMonkey => self.dependency_monkey,
                Category::Inspection => self.inspection,
            })
            .collect()
    }

    pub fn selection(&self) -> Result<Selection, ConfigError> {
        let selected = self.selected();
        match selected.as_slice() {
            [] => Ok(Selection::All),
            [category] => Ok(Selection::Only(*category)),
            _ => Err(ConfigError::ConflictingCategories(selected)),
        }
    }
}

/// Destinations of inspection sync; both enabled unless a flag turns one off
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InspectionTargets {
    pub graph: bool,
    pub mirror: bool,
}

impl Default for InspectionTargets {
    fn default() -> Self {
        Self {
            graph: true,
            mirror: true,
        }
    }
}

impl InspectionTargets {
    /// `only_graph_sync` turns the raw mirror off, `only_ceph_sync` the graph
    pub fn from_flags(only_graph_sync: bool, only_ceph_sync: bool) -> Result<Self, ConfigError> {
        if only_graph_sync && only_ceph_sync {
            return Err(ConfigError::ConflictingInspectionTargets);
        }
        Ok(Self {
            graph: !only_ceph_sync,
            mirror: !only_graph_sync,
        })
    }
}

/// Raw flag values before validation
#[derive(Debug, Clone, Default)]
pub struct SyncFlags {
    pub categories: CategoryFlags,
    pub document_ids: Vec<String>,
    pub force: bool,
    pub graceful: bool,
    pub amun_api_url: Option<String>,
    pub only_graph_sync: bool,
    pub only_ceph_sync: bool,
    pub workers: usize,
}

/// A validated run request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub selection: Selection,
    pub document_ids: Vec<DocumentId>,
    pub force: bool,
    pub graceful: bool,
    pub amun_api_url: Option<String>,
    pub inspection: InspectionTargets,
    /// Zero runs insertions sequentially
    pub workers: usize,
}

impl RunConfig {
    /// Sync every category, fail-fast, unforced, sequential
    pub fn all() -> Self {
        Self {
            selection: Selection::All,
            document_ids: Vec::new(),
            force: false,
            graceful: false,
            amun_api_url: None,
            inspection: InspectionTargets::default(),
            workers: 0,
        }
    }

    pub fn only(category: Category) -> Self {
        Self {
            selection: Selection::Only(category),
            ..Self::all()
        }
    }

    pub fn with_document_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<DocumentId>,
    {
        self.document_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }

    pub fn graceful(mut self) -> Self {
        self.graceful = true;
        self
    }

    pub fn with_amun_api_url(mut self, url: impl Into<String>) -> Self {
        self.amun_api_url = Some(url.into());
        self
    }

    pub fn with_inspection_targets(mut self, targets: InspectionTargets) -> Self {
        self.inspection = targets;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Validate raw flags into a run configuration
    pub fn resolve(flags: &SyncFlags) -> Result<Self, ConfigError> {
        let selection = flags.categories.selection()?;
        let inspection = if selection.includes(Category::Inspection) {
            InspectionTargets::from_flags(flags.only_graph_sync, flags.only_ceph_sync)?
        } else {
            if flags.only_graph_sync || flags.only_ceph_sync {
                warn!("--only-graph-sync/--only-ceph-sync have no effect without inspection sync");
            }
            InspectionTargets::default()
        };

        let amun_api_url = flags
            .amun_api_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_string);

        let config = Self {
            selection,
            document_ids: flags.document_ids.iter().cloned().map(DocumentId::from).collect(),
            force: flags.force,
            graceful: flags.graceful,
            amun_api_url,
            inspection,
            workers: flags.workers,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the cross-flag rules
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.document_ids.is_empty() && self.selection == Selection::All {
            return Err(ConfigError::DocumentIdsWithoutCategory);
        }
        if self.selection.includes(Category::Inspection) {
            if !self.inspection.graph && !self.inspection.mirror {
                return Err(ConfigError::ConflictingInspectionTargets);
            }
            let Some(url) = self.amun_api_url.as_deref() else {
                return Err(ConfigError::MissingAmunApiUrl);
            };
            reqwest::Url::parse(url).map_err(|err| ConfigError::InvalidAmunApiUrl {
                url: url.to_string(),
                reason: err.to_string(),
            })?;
        }
        Ok(())
    }

    pub fn categories(&self) -> Vec<Category> {
        self.selection.categories()
    }
}
