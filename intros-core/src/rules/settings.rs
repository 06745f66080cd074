use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::catalog::{Catalog, IntroId};

use super::models::RuleStore;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to access settings {path}: {source}")]
    Io { source: io::Error, path: PathBuf },
    #[error("failed to parse settings {path}: {source}")]
    Parse {
        source: serde_json::Error,
        path: PathBuf,
    },
    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to replace settings {path}: {source}")]
    Persist {
        source: tempfile::PersistError,
        path: PathBuf,
    },
}

pub type SettingsResult<T> = Result<T, SettingsError>;

/// Intro known to the library, as listed to administrators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedVideo {
    pub item_id: IntroId,
    pub name: String,
}

/// Persisted selection settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntroSettings {
    #[serde(flatten)]
    pub rules: RuleStore,
    #[serde(default)]
    pub detected_videos: Vec<DetectedVideo>,
}

impl IntroSettings {
    /// Rebuilds `detected_videos` from the catalog, sorted by name.
    pub fn refresh_detected(&mut self, catalog: &Catalog) {
        let mut detected: Vec<DetectedVideo> = catalog
            .entries()
            .map(|entry| DetectedVideo {
                item_id: entry.id,
                name: entry.name.clone(),
            })
            .collect();
        detected.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.item_id.cmp(&b.item_id)));
        self.detected_videos = detected;
    }
}

pub trait SettingsStore: Send + Sync {
    fn load(&self) -> SettingsResult<IntroSettings>;
    fn save(&self, settings: &IntroSettings) -> SettingsResult<()>;
}

/// Settings kept as a pretty-printed JSON document. A missing file reads as
/// empty settings; saves replace the file atomically.
#[derive(Debug, Clone)]
pub struct JsonSettingsFile {
    path: PathBuf,
}

impl JsonSettingsFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> SettingsError {
        SettingsError::Io {
            source,
            path: self.path.clone(),
        }
    }
}

impl SettingsStore for JsonSettingsFile {
    fn load(&self) -> SettingsResult<IntroSettings> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(IntroSettings::default())
            }
            Err(err) => return Err(self.io_error(err)),
        };
        serde_json::from_str(&content).map_err(|source| SettingsError::Parse {
            source,
            path: self.path.clone(),
        })
    }

    fn save(&self, settings: &IntroSettings) -> SettingsResult<()> {
        let json = serde_json::to_string_pretty(settings)?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|err| self.io_error(err))?;

        let mut temp = NamedTempFile::new_in(&dir).map_err(|err| self.io_error(err))?;
        temp.write_all(json.as_bytes())
            .and_then(|_| temp.as_file().sync_all())
            .map_err(|err| self.io_error(err))?;
        temp.persist(&self.path)
            .map_err(|source| SettingsError::Persist {
                source,
                path: self.path.clone(),
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::IntroEntry;
    use crate::rules::SelectionRule;
    use tempfile::TempDir;

    #[test]
    fn missing_file_loads_defaults() {
        let dir = TempDir::new().unwrap();
        let store = JsonSettingsFile::new(dir.path().join("absent.json"));
        assert_eq!(store.load().unwrap(), IntroSettings::default());
    }

    #[test]
    fn save_then_load_preserves_rules() {
        let dir = TempDir::new().unwrap();
        let store = JsonSettingsFile::new(dir.path().join("nested/intros.json"));
        let entry = IntroEntry::discovered("/intros/snow.mp4");
        let catalog: Catalog = [entry.clone()].into_iter().collect();

        let mut settings = IntroSettings::default();
        settings
            .rules
            .add_rule(SelectionRule::tag(entry.id, "winter").with_precedence(4));
        settings.rules.add_default(entry.id);
        settings.refresh_detected(&catalog);
        store.save(&settings).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded, settings);
        assert_eq!(loaded.detected_videos[0].name, "snow");
    }

    #[test]
    fn corrupt_document_reports_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("intros.json");
        fs::write(&path, "{not json").unwrap();
        let err = JsonSettingsFile::new(&path).load().unwrap_err();
        match err {
            SettingsError::Parse { path: reported, .. } => assert_eq!(reported, path),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn detected_videos_sorted_by_name() {
        let catalog: Catalog = ["/intros/zeta.mp4", "/intros/alpha.mp4"]
            .into_iter()
            .map(IntroEntry::discovered)
            .collect();
        let mut settings = IntroSettings::default();
        settings.refresh_detected(&catalog);
        let names: Vec<_> = settings
            .detected_videos
            .iter()
            .map(|video| video.name.as_str())
            .collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }
}
