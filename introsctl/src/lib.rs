pub mod commands;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use intros_core::criteria::extract_criteria_now;
use intros_core::{
    load_intros_config, Catalog, IntroId, IntroProvider, IntroSelection, IntrosConfig,
    JsonSettingsFile, PlaybackTarget, ProviderConfig, ProviderError, ResyncReport,
    SelectionRule, SqliteCatalogStore,
};
use serde::Serialize;
use thiserror::Error;

use crate::commands::{
    CatalogCommands, DefaultArgs, DefaultsCommands, ResyncArgs, RuleAddArgs, RuleRemoveArgs,
    RulesCommands, SelectArgs,
};

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] intros_core::ConfigError),
    #[error("catalog error: {0}")]
    Catalog(#[from] intros_core::CatalogError),
    #[error("{0}")]
    Provider(#[from] ProviderError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("authentication failed")]
    Authentication,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Pre-roll intro library control interface", long_about = None)]
pub struct Cli {
    /// Path to intros.toml
    #[arg(long, default_value = "configs/intros.toml")]
    pub config: PathBuf,
    /// Override for the catalog database (storage.catalog_db)
    #[arg(long)]
    pub catalog_db: Option<PathBuf>,
    /// Override for the settings document (storage.settings_file)
    #[arg(long)]
    pub settings: Option<PathBuf>,
    /// Local authentication token, required when INTROSCTL_TOKEN is set
    #[arg(long)]
    pub token: Option<String>,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Shows configuration and library counts
    Status,
    /// Reconciles the catalog with the intro directory
    Resync(ResyncArgs),
    /// Catalog inspection
    #[command(subcommand)]
    Catalog(CatalogCommands),
    /// Selection rule management
    #[command(subcommand)]
    Rules(RulesCommands),
    /// Default set management
    #[command(subcommand)]
    Defaults(DefaultsCommands),
    /// Picks an intro for an item, as the media server would
    Select(SelectArgs),
}

pub fn run(cli: Cli) -> Result<()> {
    enforce_token(&cli)?;
    let context = AppContext::new(&cli)?;

    match &cli.command {
        Commands::Status => render(&context.status(), cli.format)?,
        Commands::Resync(args) => render(&context.resync(args)?, cli.format)?,
        Commands::Catalog(CatalogCommands::List) => render(&context.catalog_list(), cli.format)?,
        Commands::Rules(RulesCommands::List) => render(&context.rule_list(), cli.format)?,
        Commands::Rules(RulesCommands::Add(args)) => {
            render(&context.rule_add(args)?, cli.format)?
        }
        Commands::Rules(RulesCommands::Remove(args)) => {
            render(&context.rule_remove(args)?, cli.format)?
        }
        Commands::Defaults(DefaultsCommands::Add(args)) => {
            render(&context.default_add(args)?, cli.format)?
        }
        Commands::Defaults(DefaultsCommands::Remove(args)) => {
            render(&context.default_remove(args)?, cli.format)?
        }
        Commands::Select(args) => render(&context.select(args)?, cli.format)?,
    }

    Ok(())
}

fn enforce_token(cli: &Cli) -> Result<()> {
    let expected = std::env::var("INTROSCTL_TOKEN").ok();
    verify_token(expected.as_deref(), cli.token.as_deref())
}

fn verify_token(expected: Option<&str>, provided: Option<&str>) -> Result<()> {
    match (expected, provided) {
        (None, _) => Ok(()),
        (Some(expected), Some(provided)) if provided == expected => Ok(()),
        _ => Err(AppError::Authentication),
    }
}

fn render<T>(value: &T, format: OutputFormat) -> Result<()>
where
    T: Serialize + DisplayFallback,
{
    match format {
        OutputFormat::Text => {
            println!("{}", value.display());
            Ok(())
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{}", json);
            Ok(())
        }
    }
}

trait DisplayFallback {
    fn display(&self) -> String;
}

type Provider = IntroProvider<SqliteCatalogStore, JsonSettingsFile>;

struct AppContext {
    config: IntrosConfig,
    config_path: PathBuf,
    catalog_db: PathBuf,
    settings_path: PathBuf,
    provider: Arc<Provider>,
}

impl AppContext {
    fn new(cli: &Cli) -> Result<Self> {
        let config_path = cli.config.clone();
        let config = load_intros_config(&config_path)?;

        let catalog_db = cli
            .catalog_db
            .clone()
            .unwrap_or_else(|| config.catalog_db_path());
        let settings_path = cli
            .settings
            .clone()
            .unwrap_or_else(|| config.settings_path());

        if let Some(parent) = catalog_db.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let store = SqliteCatalogStore::builder()
            .path(&catalog_db)
            .create_if_missing(true)
            .build()?;
        store.initialize()?;

        let provider = IntroProvider::new(
            ProviderConfig::from(&config),
            store,
            JsonSettingsFile::new(&settings_path),
        );
        provider.load()?;

        Ok(Self {
            config,
            config_path,
            catalog_db,
            settings_path,
            provider: Arc::new(provider),
        })
    }

    fn status(&self) -> StatusReport {
        let snapshot = self.provider.snapshot();
        StatusReport {
            config_path: self.config_path.clone(),
            scan_path: self.config.scan_path(),
            catalog_db: self.catalog_db.clone(),
            settings_file: self.settings_path.clone(),
            show_on_movies: self.config.playback.show_on_movies,
            show_on_episodes: self.config.playback.show_on_episodes,
            seed: self.config.selection.seed,
            intros: snapshot.catalog.len(),
            rules: snapshot.rules().rules.len(),
            default_videos: snapshot.rules().default_videos.len(),
        }
    }

    fn resync(&self, args: &ResyncArgs) -> Result<ResyncSummary> {
        let report = match &args.path {
            Some(path) => self.provider.resync_path(path)?,
            None => {
                let runtime = tokio::runtime::Builder::new_current_thread().build()?;
                let provider = Arc::clone(&self.provider);
                runtime
                    .block_on(async move { provider.spawn_resync().await })
                    .map_err(ProviderError::from)??
            }
        };
        Ok(ResyncSummary::from(report))
    }

    fn catalog_list(&self) -> CatalogList {
        let snapshot = self.provider.snapshot();
        let rules = snapshot.rules();
        let rows = snapshot
            .catalog
            .sorted_by_path()
            .into_iter()
            .map(|entry| CatalogRow {
                id: entry.id,
                name: entry.name.clone(),
                path: entry.path.clone(),
                default: rules.default_videos.contains(&entry.id),
                rules: rules
                    .rules
                    .iter()
                    .filter(|rule| rule.intro_id == entry.id)
                    .count(),
            })
            .collect();
        CatalogList { rows }
    }

    fn rule_list(&self) -> RuleList {
        let snapshot = self.provider.snapshot();
        RuleList::build(&snapshot.rules().rules, &snapshot.catalog)
    }

    fn rule_add(&self, args: &RuleAddArgs) -> Result<RuleList> {
        let rule = args.to_rule()?;
        self.require_intro(&rule.intro_id)?;
        let snapshot = self.provider.update_rules(|rules| rules.add_rule(rule))?;
        Ok(RuleList::build(&snapshot.rules().rules, &snapshot.catalog))
    }

    fn rule_remove(&self, args: &RuleRemoveArgs) -> Result<RulesRemoved> {
        let mut removed = 0;
        self.provider.update_rules(|rules| {
            removed = rules.remove_rules_for(&args.intro);
        })?;
        Ok(RulesRemoved {
            intro_id: args.intro,
            removed,
        })
    }

    fn default_add(&self, args: &DefaultArgs) -> Result<DefaultList> {
        self.require_intro(&args.intro)?;
        let snapshot = self.provider.update_rules(|rules| {
            rules.add_default(args.intro);
        })?;
        Ok(DefaultList::build(
            snapshot.rules().default_videos.iter(),
            &snapshot.catalog,
        ))
    }

    fn default_remove(&self, args: &DefaultArgs) -> Result<DefaultList> {
        let mut found = false;
        let snapshot = self.provider.update_rules(|rules| {
            found = rules.remove_default(&args.intro);
        })?;
        if !found {
            return Err(AppError::InvalidArgument(format!(
                "{} is not in the default set",
                args.intro
            )));
        }
        Ok(DefaultList::build(
            snapshot.rules().default_videos.iter(),
            &snapshot.catalog,
        ))
    }

    fn select(&self, args: &SelectArgs) -> Result<SelectOutcome> {
        let item = args.media_item()?;
        let criteria = extract_criteria_now(&item);
        let selection = self.provider.try_get_intro(&item)?;
        let name = selection.as_ref().and_then(|picked| {
            self.provider
                .snapshot()
                .catalog
                .get(&picked.item_id)
                .map(|entry| entry.name.clone())
        });
        Ok(SelectOutcome {
            kind: item.kind().to_string(),
            tags: sorted(criteria.tags),
            genres: sorted(criteria.genres),
            studios: sorted(criteria.studios),
            today: criteria.today.to_string(),
            name,
            selection,
        })
    }

    fn require_intro(&self, id: &IntroId) -> Result<()> {
        if self.provider.snapshot().catalog.contains(id) {
            Ok(())
        } else {
            Err(AppError::InvalidArgument(format!(
                "intro {id} is not in the catalog"
            )))
        }
    }
}

fn sorted(values: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut values: Vec<String> = values.into_iter().collect();
    values.sort();
    values
}

fn intro_name(catalog: &Catalog, id: &IntroId) -> String {
    catalog
        .get(id)
        .map(|entry| entry.name.clone())
        .unwrap_or_else(|| "<missing>".to_string())
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub config_path: PathBuf,
    pub scan_path: Option<PathBuf>,
    pub catalog_db: PathBuf,
    pub settings_file: PathBuf,
    pub show_on_movies: bool,
    pub show_on_episodes: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub intros: usize,
    pub rules: usize,
    pub default_videos: usize,
}

impl DisplayFallback for StatusReport {
    fn display(&self) -> String {
        let scan = self
            .scan_path
            .as_ref()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "<not configured>".to_string());
        let mut lines = vec![
            format!("Config: {}", self.config_path.display()),
            format!("Intro path: {scan}"),
            format!("Catalog: {}", self.catalog_db.display()),
            format!("Settings: {}", self.settings_file.display()),
            format!(
                "Playback: movies={} episodes={}",
                self.show_on_movies, self.show_on_episodes
            ),
        ];
        if let Some(seed) = self.seed {
            lines.push(format!("Seed: {seed}"));
        }
        lines.push(format!(
            "Library: {} intros, {} rules, {} defaults",
            self.intros, self.rules, self.default_videos
        ));
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct ResyncSummary {
    pub intros: usize,
    pub added: Vec<CatalogRow>,
    pub removed: Vec<IntroId>,
    pub rules_pruned: usize,
    pub defaults_pruned: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seeded_default: Option<IntroId>,
}

impl From<ResyncReport> for ResyncSummary {
    fn from(report: ResyncReport) -> Self {
        let added = report
            .result
            .added
            .iter()
            .map(|entry| CatalogRow {
                id: entry.id,
                name: entry.name.clone(),
                path: entry.path.clone(),
                default: report.seeded_default == Some(entry.id),
                rules: 0,
            })
            .collect();
        Self {
            intros: report.result.catalog.len(),
            added,
            removed: report.result.removed.clone(),
            rules_pruned: report.pruned.rules_removed,
            defaults_pruned: report.pruned.defaults_removed,
            seeded_default: report.seeded_default,
        }
    }
}

impl DisplayFallback for ResyncSummary {
    fn display(&self) -> String {
        let mut lines = vec![format!(
            "Catalog: {} intros (+{} / -{})",
            self.intros,
            self.added.len(),
            self.removed.len()
        )];
        for row in &self.added {
            lines.push(format!("  + {} {} ({})", row.id, row.name, row.path.display()));
        }
        for id in &self.removed {
            lines.push(format!("  - {id}"));
        }
        if self.rules_pruned > 0 || self.defaults_pruned > 0 {
            lines.push(format!(
                "Pruned: {} rules, {} defaults",
                self.rules_pruned, self.defaults_pruned
            ));
        }
        if let Some(id) = self.seeded_default {
            lines.push(format!("Default intro: {id}"));
        }
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct CatalogRow {
    pub id: IntroId,
    pub name: String,
    pub path: PathBuf,
    pub default: bool,
    pub rules: usize,
}

#[derive(Debug, Serialize)]
pub struct CatalogList {
    pub rows: Vec<CatalogRow>,
}

impl DisplayFallback for CatalogList {
    fn display(&self) -> String {
        if self.rows.is_empty() {
            return "No intros in catalog".to_string();
        }
        self.rows
            .iter()
            .map(|row| {
                format!(
                    "{} | {} | {} | rules={}{}",
                    row.id,
                    row.name,
                    row.path.display(),
                    row.rules,
                    if row.default { " | default" } else { "" }
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct RuleRow {
    pub intro_id: IntroId,
    pub intro_name: String,
    pub criterion: String,
    pub precedence: i32,
    pub prevalence: u32,
}

#[derive(Debug, Serialize)]
pub struct RuleList {
    pub rows: Vec<RuleRow>,
}

impl RuleList {
    fn build(rules: &[SelectionRule], catalog: &Catalog) -> Self {
        let mut rows: Vec<(_, RuleRow)> = rules
            .iter()
            .map(|rule| {
                (
                    rule.criterion.family(),
                    RuleRow {
                        intro_id: rule.intro_id,
                        intro_name: intro_name(catalog, &rule.intro_id),
                        criterion: rule.criterion.to_string(),
                        precedence: rule.precedence,
                        prevalence: rule.prevalence,
                    },
                )
            })
            .collect();
        rows.sort_by_key(|(family, _)| *family);
        Self {
            rows: rows.into_iter().map(|(_, row)| row).collect(),
        }
    }
}

impl DisplayFallback for RuleList {
    fn display(&self) -> String {
        if self.rows.is_empty() {
            return "No selection rules".to_string();
        }
        self.rows
            .iter()
            .map(|row| {
                format!(
                    "{} | precedence={} prevalence={} | {} ({})",
                    row.criterion, row.precedence, row.prevalence, row.intro_name, row.intro_id
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct RulesRemoved {
    pub intro_id: IntroId,
    pub removed: usize,
}

impl DisplayFallback for RulesRemoved {
    fn display(&self) -> String {
        format!("Removed {} rules for {}", self.removed, self.intro_id)
    }
}

#[derive(Debug, Serialize)]
pub struct DefaultEntry {
    pub id: IntroId,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct DefaultList {
    pub defaults: Vec<DefaultEntry>,
}

impl DefaultList {
    fn build<'a>(ids: impl Iterator<Item = &'a IntroId>, catalog: &Catalog) -> Self {
        Self {
            defaults: ids
                .map(|id| DefaultEntry {
                    id: *id,
                    name: intro_name(catalog, id),
                })
                .collect(),
        }
    }
}

impl DisplayFallback for DefaultList {
    fn display(&self) -> String {
        if self.defaults.is_empty() {
            return "Default set is empty".to_string();
        }
        self.defaults
            .iter()
            .map(|entry| format!("{} | {}", entry.id, entry.name))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct SelectOutcome {
    pub kind: String,
    pub tags: Vec<String>,
    pub genres: Vec<String>,
    pub studios: Vec<String>,
    pub today: String,
    pub name: Option<String>,
    pub selection: Option<IntroSelection>,
}

impl DisplayFallback for SelectOutcome {
    fn display(&self) -> String {
        let mut lines = vec![
            format!("Item: {} on {}", self.kind, self.today),
            format!("  tags: {}", self.tags.join(", ")),
            format!("  genres: {}", self.genres.join(", ")),
            format!("  studios: {}", self.studios.join(", ")),
        ];
        match &self.selection {
            Some(picked) => lines.push(format!(
                "Intro: {} ({})",
                self.name.as_deref().unwrap_or("<unnamed>"),
                picked.path.display()
            )),
            None => lines.push("Intro: none".to_string()),
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::RuleKind;
    use chrono::NaiveDate;
    use std::fs;
    use tempfile::TempDir;

    fn prepare_test_context() -> Result<(TempDir, AppContext)> {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        let configs_dir = root.join("configs");
        fs::create_dir_all(&configs_dir).unwrap();
        fs::copy("../configs/intros.toml", configs_dir.join("intros.toml")).unwrap();

        let media = root.join("prerolls");
        fs::create_dir_all(&media).unwrap();
        for name in ["jellyfin-pre-roll-classic.mp4", "noir_night.mkv", "summer.mp4"] {
            fs::write(media.join(name), b"intro").unwrap();
        }

        let cli = Cli {
            config: configs_dir.join("intros.toml"),
            catalog_db: Some(root.join("data/catalog.sqlite")),
            settings: Some(root.join("data/intros.json")),
            token: None,
            format: OutputFormat::Json,
            command: Commands::Status,
        };

        let context = AppContext::new(&cli)?;
        context.resync(&ResyncArgs { path: Some(media) })?;
        Ok((temp, context))
    }

    fn intro_id(context: &AppContext, name: &str) -> IntroId {
        context
            .catalog_list()
            .rows
            .into_iter()
            .find(|row| row.name == name)
            .map(|row| row.id)
            .unwrap()
    }

    fn rule_args(kind: RuleKind, intro: IntroId) -> RuleAddArgs {
        RuleAddArgs {
            kind,
            value: None,
            start: None,
            end: None,
            intro,
            precedence: 0,
            prevalence: 1,
        }
    }

    fn select_json(context: &AppContext, json: &str) -> SelectOutcome {
        context
            .select(&SelectArgs {
                item: Some(json.to_string()),
                item_file: None,
            })
            .unwrap()
    }

    #[test]
    fn resync_populates_catalog_and_default() {
        let (_temp, context) = prepare_test_context().unwrap();
        let status = context.status();
        assert_eq!(status.intros, 3);
        assert_eq!(status.default_videos, 1);
        assert_eq!(status.rules, 0);

        let list = context.catalog_list();
        let names: Vec<_> = list.rows.iter().map(|row| row.name.as_str()).collect();
        assert_eq!(names, vec!["classic", "noir night", "summer"]);
        assert!(list.rows[0].default);
    }

    #[test]
    fn second_resync_reports_no_changes() {
        let (temp, context) = prepare_test_context().unwrap();
        let summary = context
            .resync(&ResyncArgs {
                path: Some(temp.path().join("prerolls")),
            })
            .unwrap();
        assert_eq!(summary.intros, 3);
        assert!(summary.added.is_empty());
        assert!(summary.removed.is_empty());
        assert_eq!(summary.seeded_default, None);
    }

    #[test]
    fn configured_path_missing_fails_resync() {
        let (_temp, context) = prepare_test_context().unwrap();
        let err = context.resync(&ResyncArgs::default()).unwrap_err();
        assert!(matches!(
            err,
            AppError::Provider(ProviderError::Reconcile(_))
        ));
        assert_eq!(context.status().intros, 3);
    }

    #[test]
    fn tag_rule_drives_selection() {
        let (_temp, context) = prepare_test_context().unwrap();
        let noir = intro_id(&context, "noir night");
        let mut args = rule_args(RuleKind::Tag, noir);
        args.value = Some("Noir".to_string());
        args.precedence = 5;
        let rules = context.rule_add(&args).unwrap();
        assert_eq!(rules.rows.len(), 1);
        assert_eq!(rules.rows[0].criterion, "tag=Noir");

        let outcome = select_json(
            &context,
            r#"{"kind": "episode", "parent": {"kind": "season", "parent": {"kind": "series", "tags": ["noir"]}}}"#,
        );
        assert_eq!(outcome.tags, vec!["noir".to_string()]);
        assert_eq!(outcome.selection.unwrap().item_id, noir);
        assert_eq!(outcome.name.as_deref(), Some("noir night"));
    }

    #[test]
    fn rules_for_unknown_intro_are_rejected() {
        let (_temp, context) = prepare_test_context().unwrap();
        let mut args = rule_args(RuleKind::Genre, uuid::Uuid::new_v4());
        args.value = Some("Drama".to_string());
        assert!(matches!(
            context.rule_add(&args),
            Err(AppError::InvalidArgument(_))
        ));
    }

    #[test]
    fn rule_arguments_are_validated() {
        let id = uuid::Uuid::nil();
        assert!(rule_args(RuleKind::Studio, id).to_rule().is_err());

        let mut range = rule_args(RuleKind::DateRange, id);
        range.start = NaiveDate::from_ymd_opt(2024, 12, 31);
        range.end = NaiveDate::from_ymd_opt(2024, 12, 1);
        assert!(range.to_rule().is_err());

        range.end = NaiveDate::from_ymd_opt(2025, 1, 6);
        let rule = range.to_rule().unwrap();
        assert_eq!(rule.criterion.to_string(), "date=2024-12-31..=2025-01-06");
    }

    #[test]
    fn remove_rules_and_defaults() {
        let (_temp, context) = prepare_test_context().unwrap();
        let summer = intro_id(&context, "summer");
        let mut args = rule_args(RuleKind::Tag, summer);
        args.value = Some("beach".to_string());
        context.rule_add(&args).unwrap();

        let removed = context
            .rule_remove(&RuleRemoveArgs { intro: summer })
            .unwrap();
        assert_eq!(removed.removed, 1);
        assert!(context.rule_list().rows.is_empty());

        let classic = intro_id(&context, "classic");
        let defaults = context
            .default_remove(&DefaultArgs { intro: classic })
            .unwrap();
        assert!(defaults.defaults.is_empty());
        assert!(context
            .default_remove(&DefaultArgs { intro: classic })
            .is_err());

        let outcome = select_json(&context, r#"{"kind": "movie", "tags": ["beach"]}"#);
        assert!(outcome.selection.is_none());
    }

    #[test]
    fn defaults_feed_unmatched_items() {
        let (_temp, context) = prepare_test_context().unwrap();
        let summer = intro_id(&context, "summer");
        let classic = intro_id(&context, "classic");
        let defaults = context
            .default_add(&DefaultArgs { intro: summer })
            .unwrap();
        assert_eq!(defaults.defaults.len(), 2);

        for _ in 0..20 {
            let outcome = select_json(&context, r#"{"kind": "movie", "genres": ["Western"]}"#);
            let picked = outcome.selection.unwrap().item_id;
            assert!(picked == summer || picked == classic);
        }
    }

    #[test]
    fn settings_survive_a_new_context() {
        let (temp, context) = prepare_test_context().unwrap();
        let summer = intro_id(&context, "summer");
        let mut args = rule_args(RuleKind::Studio, summer);
        args.value = Some("A24".to_string());
        context.rule_add(&args).unwrap();
        drop(context);

        let cli = Cli {
            config: temp.path().join("configs/intros.toml"),
            catalog_db: Some(temp.path().join("data/catalog.sqlite")),
            settings: Some(temp.path().join("data/intros.json")),
            token: None,
            format: OutputFormat::Text,
            command: Commands::Status,
        };
        let reopened = AppContext::new(&cli).unwrap();
        assert_eq!(reopened.status().intros, 3);
        assert_eq!(reopened.rule_list().rows.len(), 1);
    }

    #[test]
    fn token_checks() {
        assert!(verify_token(None, None).is_ok());
        assert!(verify_token(Some("s3cret"), Some("s3cret")).is_ok());
        assert!(matches!(
            verify_token(Some("s3cret"), None),
            Err(AppError::Authentication)
        ));
        assert!(verify_token(Some("s3cret"), Some("guess")).is_err());
    }

    #[test]
    fn text_rendering_mentions_intro() {
        let (_temp, context) = prepare_test_context().unwrap();
        let text = context.status().display();
        assert!(text.contains("Library: 3 intros, 0 rules, 1 defaults"));
        let outcome = select_json(&context, r#"{"kind": "movie"}"#);
        assert!(outcome.display().contains("Intro: classic"));
    }
}
