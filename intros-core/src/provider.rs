use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::catalog::{Catalog, CatalogError, CatalogStore, IntroId};
use crate::config::IntrosConfig;
use crate::criteria::{extract_criteria_now, ItemKind, PlaybackTarget};
use crate::reconcile::{self, ReconcileError, ReconciliationResult};
use crate::rules::{IntroSettings, PruneReport, RuleStore, SettingsError, SettingsStore};
use crate::selection::{self, IntroSelection, SelectionError};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("no intro path configured")]
    ScanPathNotConfigured,
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error("resync task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for ProviderError {
    fn from(err: tokio::task::JoinError) -> Self {
        ProviderError::Task(err.to_string())
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Directory or single file holding the intros. `None` disables intros.
    pub scan_path: Option<PathBuf>,
    pub show_on_movies: bool,
    pub show_on_episodes: bool,
    /// Fixed seed making selections reproducible.
    pub seed: Option<u64>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            scan_path: None,
            show_on_movies: true,
            show_on_episodes: true,
            seed: None,
        }
    }
}

impl From<&IntrosConfig> for ProviderConfig {
    fn from(config: &IntrosConfig) -> Self {
        Self {
            scan_path: config.scan_path(),
            show_on_movies: config.playback.show_on_movies,
            show_on_episodes: config.playback.show_on_episodes,
            seed: config.selection.seed,
        }
    }
}

/// Catalog and rules as of the last commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibrarySnapshot {
    pub catalog: Catalog,
    pub settings: IntroSettings,
    /// False until the first load or resync has committed.
    pub ready: bool,
}

impl LibrarySnapshot {
    pub fn rules(&self) -> &RuleStore {
        &self.settings.rules
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResyncReport {
    #[serde(flatten)]
    pub result: ReconciliationResult,
    pub pruned: PruneReport,
    pub seeded_default: Option<IntroId>,
}

/// Entry point used by the host: answers intro requests and runs resyncs.
///
/// Readers take the current snapshot and keep it for the whole request.
/// Writers are serialized by `commit_lock` and publish a new snapshot only
/// after the catalog store and the settings document have been written.
pub struct IntroProvider<C, S>
where
    C: CatalogStore,
    S: SettingsStore,
{
    config: ProviderConfig,
    catalog_store: C,
    settings_store: S,
    snapshot: RwLock<Arc<LibrarySnapshot>>,
    commit_lock: Mutex<()>,
    sequence: AtomicU64,
}

impl<C, S> IntroProvider<C, S>
where
    C: CatalogStore,
    S: SettingsStore,
{
    pub fn new(config: ProviderConfig, catalog_store: C, settings_store: S) -> Self {
        Self {
            config,
            catalog_store,
            settings_store,
            snapshot: RwLock::new(Arc::new(LibrarySnapshot::default())),
            commit_lock: Mutex::new(()),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn catalog_store(&self) -> &C {
        &self.catalog_store
    }

    pub fn settings_store(&self) -> &S {
        &self.settings_store
    }

    pub fn snapshot(&self) -> Arc<LibrarySnapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn publish(&self, snapshot: LibrarySnapshot) -> Arc<LibrarySnapshot> {
        let snapshot = Arc::new(snapshot);
        *self
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = snapshot.clone();
        snapshot
    }

    /// Reads the persisted settings and the catalog, drops dangling rule
    /// references and publishes the result.
    pub fn load(&self) -> ProviderResult<Arc<LibrarySnapshot>> {
        let _guard = self.commit_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let catalog = reconcile::load_catalog(&self.catalog_store)?;
        let mut settings = self.settings_store.load()?;
        let pruned = settings.rules.prune(&catalog);
        if !pruned.is_empty() {
            info!(
                target: "intros.rules",
                rules = pruned.rules_removed,
                defaults = pruned.defaults_removed,
                "pruned dangling intro references on load"
            );
            self.settings_store.save(&settings)?;
        }
        info!(
            target: "intros.provider",
            intros = catalog.len(),
            rules = settings.rules.rules.len(),
            defaults = settings.rules.default_videos.len(),
            "intro library loaded"
        );
        Ok(self.publish(LibrarySnapshot {
            catalog,
            settings,
            ready: true,
        }))
    }

    /// Intro to play before `target`, or `None`. Failures are logged and
    /// degrade to no intro.
    pub fn get_intro(&self, target: &dyn PlaybackTarget) -> Option<IntroSelection> {
        match self.try_get_intro(target) {
            Ok(selection) => selection,
            Err(err) => {
                warn!(target: "intros.provider", error = %err, "intro selection failed");
                None
            }
        }
    }

    pub fn try_get_intro(
        &self,
        target: &dyn PlaybackTarget,
    ) -> ProviderResult<Option<IntroSelection>> {
        if self.config.scan_path.is_none() {
            debug!(target: "intros.provider", "no intro path configured");
            return Ok(None);
        }
        let kind = target.kind();
        if (kind == ItemKind::Movie && !self.config.show_on_movies)
            || (kind == ItemKind::Episode && !self.config.show_on_episodes)
        {
            debug!(target: "intros.provider", kind = %kind, "intros disabled for item kind");
            return Ok(None);
        }

        let snapshot = self.snapshot();
        if !snapshot.ready {
            debug!(target: "intros.provider", "intro library not loaded yet");
            return Ok(None);
        }

        let criteria = extract_criteria_now(target);
        let mut rng = self.request_rng();
        let picked = selection::select(&criteria, snapshot.rules(), &snapshot.catalog, &mut rng)?;
        Ok(picked)
    }

    fn request_rng(&self) -> ChaCha20Rng {
        match self.config.seed {
            Some(seed) => {
                let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
                ChaCha20Rng::seed_from_u64(selection::request_seed(seed, sequence))
            }
            None => ChaCha20Rng::from_entropy(),
        }
    }

    /// Resyncs against the configured intro path.
    pub fn resync(&self) -> ProviderResult<ResyncReport> {
        let path = self
            .config
            .scan_path
            .clone()
            .ok_or(ProviderError::ScanPathNotConfigured)?;
        self.resync_path(&path)
    }

    /// Reconciles `scan_path` with the catalog store and commits the new
    /// catalog, pruned rules and refreshed settings in one step.
    pub fn resync_path(&self, scan_path: &Path) -> ProviderResult<ResyncReport> {
        let _guard = self.commit_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let existing = reconcile::load_catalog(&self.catalog_store)?;
        let result = reconcile::reconcile(scan_path, &existing)?;

        let current = self.snapshot();
        let mut settings = if current.ready {
            current.settings.clone()
        } else {
            self.settings_store.load()?
        };
        let pruned = settings.rules.prune(&result.catalog);
        let seeded_default = settings.rules.seed_default(
            existing.is_empty(),
            !result.is_unchanged(),
            &result.catalog,
        );
        settings.refresh_detected(&result.catalog);

        if let Err(err) = self.commit(&result, &settings) {
            if let Err(revert_err) = reconcile::revert(&self.catalog_store, &existing, &result) {
                warn!(
                    target: "intros.reconcile",
                    error = %revert_err,
                    "failed to roll back catalog after aborted resync"
                );
            }
            return Err(err);
        }

        if !pruned.is_empty() {
            info!(
                target: "intros.rules",
                rules = pruned.rules_removed,
                defaults = pruned.defaults_removed,
                "pruned rules for removed intros"
            );
        }
        if let Some(id) = seeded_default {
            info!(target: "intros.rules", intro_id = %id, "added default intro");
        }

        self.publish(LibrarySnapshot {
            catalog: result.catalog.clone(),
            settings,
            ready: true,
        });
        Ok(ResyncReport {
            result,
            pruned,
            seeded_default,
        })
    }

    fn commit(&self, result: &ReconciliationResult, settings: &IntroSettings) -> ProviderResult<()> {
        reconcile::apply(&self.catalog_store, result)?;
        self.settings_store.save(settings)?;
        Ok(())
    }

    /// Applies an administrative edit to the rule store and commits it.
    /// References to intros outside the catalog are pruned before saving.
    pub fn update_rules<F>(&self, edit: F) -> ProviderResult<Arc<LibrarySnapshot>>
    where
        F: FnOnce(&mut RuleStore),
    {
        let _guard = self.commit_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.snapshot();
        let (catalog, mut settings) = if current.ready {
            (current.catalog.clone(), current.settings.clone())
        } else {
            (
                reconcile::load_catalog(&self.catalog_store)?,
                self.settings_store.load()?,
            )
        };

        edit(&mut settings.rules);
        let pruned = settings.rules.prune(&catalog);
        if !pruned.is_empty() {
            warn!(
                target: "intros.rules",
                rules = pruned.rules_removed,
                defaults = pruned.defaults_removed,
                "dropped rules referencing unknown intros"
            );
        }
        self.settings_store.save(&settings)?;
        Ok(self.publish(LibrarySnapshot {
            catalog,
            settings,
            ready: true,
        }))
    }
}

impl<C, S> IntroProvider<C, S>
where
    C: CatalogStore + 'static,
    S: SettingsStore + 'static,
{
    /// Runs [`IntroProvider::resync`] on the blocking pool so the caller can
    /// keep it off the playback path.
    pub fn spawn_resync(self: &Arc<Self>) -> JoinHandle<ProviderResult<ResyncReport>> {
        let provider = Arc::clone(self);
        tokio::task::spawn_blocking(move || provider.resync())
    }
}
