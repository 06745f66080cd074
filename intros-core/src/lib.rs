pub mod catalog;
pub mod config;
pub mod criteria;
pub mod error;
pub mod provider;
pub mod reconcile;
pub mod rules;
pub mod selection;
mod sqlite;

pub use catalog::{
    derive_display_name, Catalog, CatalogError, CatalogResult, CatalogStore, IntroEntry, IntroId,
    MemoryCatalogStore, SqliteCatalogStore, SqliteCatalogStoreBuilder, PROVIDER_KEY,
};
pub use config::{load_intros_config, IntrosConfig};
pub use criteria::{extract_criteria, ItemKind, MatchCriteria, MediaItem, PlaybackTarget};
pub use error::{ConfigError, Result};
pub use provider::{
    IntroProvider, LibrarySnapshot, ProviderConfig, ProviderError, ProviderResult, ResyncReport,
};
pub use reconcile::{ReconcileError, ReconciliationResult};
pub use rules::{
    DetectedVideo, IntroSettings, JsonSettingsFile, PruneReport, RuleCriterion, RuleStore,
    SelectionRule, SettingsError, SettingsStore,
};
pub use selection::{IntroSelection, SelectionError};
