//! Derives the labels a playback target is matched against.

use std::collections::HashSet;
use std::fmt;

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Movie,
    Episode,
    Season,
    Series,
    #[default]
    Other,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Movie => "movie",
            ItemKind::Episode => "episode",
            ItemKind::Season => "season",
            ItemKind::Series => "series",
            ItemKind::Other => "other",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An item the host is about to play.
pub trait PlaybackTarget {
    fn kind(&self) -> ItemKind;
    fn tags(&self) -> &[String];
    fn genres(&self) -> &[String];
    fn studios(&self) -> &[String];
    /// Containment chain, nearest container first (season, then series).
    fn ancestors(&self) -> Vec<&dyn PlaybackTarget>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchCriteria {
    pub tags: HashSet<String>,
    pub genres: HashSet<String>,
    pub studios: HashSet<String>,
    pub today: NaiveDate,
}

impl MatchCriteria {
    pub fn empty(today: NaiveDate) -> Self {
        Self {
            tags: HashSet::new(),
            genres: HashSet::new(),
            studios: HashSet::new(),
            today,
        }
    }

    pub fn has_tag(&self, name: &str) -> bool {
        contains_ignore_case(&self.tags, name)
    }

    pub fn has_genre(&self, name: &str) -> bool {
        contains_ignore_case(&self.genres, name)
    }

    pub fn has_studio(&self, name: &str) -> bool {
        contains_ignore_case(&self.studios, name)
    }

    fn absorb(&mut self, target: &dyn PlaybackTarget) {
        self.tags.extend(target.tags().iter().cloned());
        self.genres.extend(target.genres().iter().cloned());
        self.studios.extend(target.studios().iter().cloned());
    }
}

fn contains_ignore_case(values: &HashSet<String>, name: &str) -> bool {
    let needle = name.to_lowercase();
    values.iter().any(|value| value.to_lowercase() == needle)
}

/// Movies contribute their own labels, episodes the union of their own and
/// every ancestor's labels. Other kinds match nothing, which routes them to
/// the default set.
pub fn extract_criteria(target: &dyn PlaybackTarget, today: NaiveDate) -> MatchCriteria {
    let mut criteria = MatchCriteria::empty(today);
    match target.kind() {
        ItemKind::Movie => criteria.absorb(target),
        ItemKind::Episode => {
            criteria.absorb(target);
            for ancestor in target.ancestors() {
                criteria.absorb(ancestor);
            }
        }
        ItemKind::Season | ItemKind::Series | ItemKind::Other => {}
    }
    criteria
}

/// Same as [`extract_criteria`] evaluated against the local calendar date.
pub fn extract_criteria_now(target: &dyn PlaybackTarget) -> MatchCriteria {
    extract_criteria(target, Local::now().date_naive())
}

/// Owned playback target, typically deserialized from the host's item
/// description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub kind: ItemKind,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub studios: Vec<String>,
    #[serde(default)]
    pub parent: Option<Box<MediaItem>>,
}

impl MediaItem {
    pub fn new(kind: ItemKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_genres<I, S>(mut self, genres: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.genres = genres.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_studios<I, S>(mut self, studios: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.studios = studios.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_parent(mut self, parent: MediaItem) -> Self {
        self.parent = Some(Box::new(parent));
        self
    }
}

impl PlaybackTarget for MediaItem {
    fn kind(&self) -> ItemKind {
        self.kind
    }

    fn tags(&self) -> &[String] {
        &self.tags
    }

    fn genres(&self) -> &[String] {
        &self.genres
    }

    fn studios(&self) -> &[String] {
        &self.studios
    }

    fn ancestors(&self) -> Vec<&dyn PlaybackTarget> {
        let mut chain: Vec<&dyn PlaybackTarget> = Vec::new();
        let mut current = self.parent.as_deref();
        while let Some(parent) = current {
            chain.push(parent);
            current = parent.parent.as_deref();
        }
        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 12, 24).unwrap()
    }

    fn set(values: &[&str]) -> HashSet<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn episode_unions_season_and_series_labels() {
        let series = MediaItem::new(ItemKind::Series)
            .with_tags(["z"])
            .with_genres(["Drama"])
            .with_studios(["HBO"]);
        let season = MediaItem::new(ItemKind::Season)
            .with_tags(["y"])
            .with_parent(series);
        let episode = MediaItem::new(ItemKind::Episode)
            .with_tags(["x"])
            .with_genres(["Drama", "Crime"])
            .with_parent(season);

        let criteria = extract_criteria(&episode, today());
        assert_eq!(criteria.tags, set(&["x", "y", "z"]));
        assert_eq!(criteria.genres, set(&["Drama", "Crime"]));
        assert_eq!(criteria.studios, set(&["HBO"]));
        assert_eq!(criteria.today, today());
    }

    #[test]
    fn movie_uses_only_its_own_labels() {
        let movie = MediaItem::new(ItemKind::Movie)
            .with_tags(["noir"])
            .with_parent(MediaItem::new(ItemKind::Other).with_tags(["collection"]));
        let criteria = extract_criteria(&movie, today());
        assert_eq!(criteria.tags, set(&["noir"]));
    }

    #[test]
    fn unrecognized_kinds_match_nothing() {
        let clip = MediaItem::new(ItemKind::Other)
            .with_tags(["music-video"])
            .with_genres(["Pop"]);
        let criteria = extract_criteria(&clip, today());
        assert_eq!(criteria, MatchCriteria::empty(today()));
    }

    #[test]
    fn label_lookup_ignores_case() {
        let movie = MediaItem::new(ItemKind::Movie)
            .with_tags(["Christmas"])
            .with_studios(["A24"]);
        let criteria = extract_criteria(&movie, today());
        assert!(criteria.has_tag("christmas"));
        assert!(criteria.has_studio("a24"));
        assert!(!criteria.has_genre("christmas"));
    }

    #[test]
    fn media_item_deserializes_nested_parents() {
        let item: MediaItem = serde_json::from_str(
            r#"{"kind":"episode","tags":["x"],"parent":{"kind":"season","parent":{"kind":"series","tags":["z"]}}}"#,
        )
        .unwrap();
        assert_eq!(item.ancestors().len(), 2);
        assert_eq!(extract_criteria(&item, today()).tags, set(&["x", "z"]));
    }
}
