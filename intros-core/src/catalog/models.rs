use std::collections::btree_map;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Provider key tagging every intro registered by the reconciler. The value
/// is the path of the backing file.
pub const PROVIDER_KEY: &str = "prerolls.video";

pub type IntroId = Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IntroEntry {
    pub id: IntroId,
    pub path: PathBuf,
    pub name: String,
    #[serde(default)]
    pub provider_ids: BTreeMap<String, String>,
}

impl IntroEntry {
    /// Builds a fresh entry for a file seen on disk for the first time.
    pub fn discovered(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut provider_ids = BTreeMap::new();
        provider_ids.insert(
            PROVIDER_KEY.to_string(),
            path.to_string_lossy().into_owned(),
        );
        Self {
            id: Uuid::new_v4(),
            name: derive_display_name(&path),
            path,
            provider_ids,
        }
    }

    pub fn provider_id(&self, key: &str) -> Option<&str> {
        self.provider_ids.get(key).map(String::as_str)
    }
}

/// Strips the extension and the "jellyfin"/"pre-roll" markers from a file
/// name and turns separators into spaces. The markers are removed one after
/// the other, "jellyfin" first.
pub fn derive_display_name(path: &Path) -> String {
    static JELLYFIN: OnceLock<Regex> = OnceLock::new();
    static PRE_ROLL: OnceLock<Regex> = OnceLock::new();
    let jellyfin = JELLYFIN.get_or_init(|| Regex::new(r"(?i)jellyfin").expect("valid marker regex"));
    let pre_roll = PRE_ROLL.get_or_init(|| Regex::new(r"(?i)pre-roll").expect("valid marker regex"));

    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let without_jellyfin = jellyfin.replace_all(&stem, "");
    pre_roll
        .replace_all(&without_jellyfin, "")
        .replace(&['_', '-'][..], " ")
        .trim()
        .to_string()
}

/// Id-keyed view of the intro entries known to the library.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    entries: BTreeMap<IntroId, IntroEntry>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: IntroEntry) -> Option<IntroEntry> {
        self.entries.insert(entry.id, entry)
    }

    pub fn remove(&mut self, id: &IntroId) -> Option<IntroEntry> {
        self.entries.remove(id)
    }

    pub fn get(&self, id: &IntroId) -> Option<&IntroEntry> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &IntroId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &IntroId> {
        self.entries.keys()
    }

    pub fn entries(&self) -> btree_map::Values<'_, IntroId, IntroEntry> {
        self.entries.values()
    }

    /// Entries ordered by path, then id.
    pub fn sorted_by_path(&self) -> Vec<&IntroEntry> {
        let mut entries: Vec<&IntroEntry> = self.entries.values().collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path).then_with(|| a.id.cmp(&b.id)));
        entries
    }

    pub fn first_by_path(&self) -> Option<&IntroEntry> {
        self.entries
            .values()
            .min_by(|a, b| a.path.cmp(&b.path).then_with(|| a.id.cmp(&b.id)))
    }
}

impl FromIterator<IntroEntry> for Catalog {
    fn from_iter<I: IntoIterator<Item = IntroEntry>>(iter: I) -> Self {
        let mut catalog = Catalog::new();
        for entry in iter {
            catalog.insert(entry);
        }
        catalog
    }
}

impl<'a> IntoIterator for &'a Catalog {
    type Item = &'a IntroEntry;
    type IntoIter = btree_map::Values<'a, IntroId, IntroEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.values()
    }
}
