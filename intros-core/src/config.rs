use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct IntrosConfig {
    pub library: LibrarySection,
    #[serde(default)]
    pub playback: PlaybackSection,
    pub storage: StorageSection,
    #[serde(default)]
    pub selection: SelectionSection,
}

impl IntrosConfig {
    pub fn resolve_path<P: AsRef<Path>>(&self, candidate: P) -> PathBuf {
        let path = candidate.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            Path::new(&self.storage.base_dir).join(path)
        }
    }

    pub fn catalog_db_path(&self) -> PathBuf {
        self.resolve_path(&self.storage.catalog_db)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.resolve_path(&self.storage.settings_file)
    }

    /// The configured intro location, or `None` when intros are disabled.
    pub fn scan_path(&self) -> Option<PathBuf> {
        let raw = self.library.scan_path.trim();
        if raw.is_empty() {
            None
        } else {
            Some(PathBuf::from(raw))
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LibrarySection {
    #[serde(default)]
    pub scan_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackSection {
    #[serde(default = "enabled")]
    pub show_on_movies: bool,
    #[serde(default = "enabled")]
    pub show_on_episodes: bool,
}

impl Default for PlaybackSection {
    fn default() -> Self {
        Self {
            show_on_movies: true,
            show_on_episodes: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageSection {
    pub base_dir: String,
    pub catalog_db: String,
    pub settings_file: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SelectionSection {
    pub seed: Option<u64>,
}

fn enabled() -> bool {
    true
}

pub fn load_intros_config<P: AsRef<Path>>(path: P) -> Result<IntrosConfig> {
    load_toml(path)
}

fn load_toml<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_fixture_config() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../configs/intros.toml");
        let config = load_intros_config(path).expect("config should parse");
        assert_eq!(
            config.scan_path(),
            Some(PathBuf::from("/srv/media/prerolls"))
        );
        assert!(config.playback.show_on_movies);
        assert_eq!(config.selection.seed, None);
        assert_eq!(
            config.catalog_db_path(),
            PathBuf::from("/var/lib/intros/data/catalog.sqlite")
        );
    }

    #[test]
    fn blank_scan_path_disables_intros() {
        let config: IntrosConfig = toml::from_str(
            r#"
            [library]
            scan_path = "   "

            [storage]
            base_dir = "/tmp"
            catalog_db = "catalog.sqlite"
            settings_file = "/etc/intros.json"
            "#,
        )
        .unwrap();
        assert!(config.scan_path().is_none());
        assert!(config.playback.show_on_episodes);
        assert_eq!(config.settings_path(), PathBuf::from("/etc/intros.json"));
    }
}
