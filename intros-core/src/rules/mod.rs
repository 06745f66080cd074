pub mod models;
pub mod settings;

pub use models::{PruneReport, RuleCriterion, RuleFamily, RuleStore, SelectionRule};
pub use settings::{
    DetectedVideo, IntroSettings, JsonSettingsFile, SettingsError, SettingsResult, SettingsStore,
};
