pub mod catalog;
pub mod defaults;
pub mod resync;
pub mod rules;
pub mod select;

pub use catalog::CatalogCommands;
pub use defaults::{DefaultArgs, DefaultsCommands};
pub use resync::ResyncArgs;
pub use rules::{RuleAddArgs, RuleKind, RuleRemoveArgs, RulesCommands};
pub use select::SelectArgs;
