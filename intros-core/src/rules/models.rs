use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, IntroId};
use crate::criteria::MatchCriteria;

/// Variant-specific predicate of a [`SelectionRule`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleCriterion {
    Tag { name: String },
    Genre { name: String },
    Studio { name: String },
    /// Inclusive on both ends.
    DateRange { start: NaiveDate, end: NaiveDate },
}

impl RuleCriterion {
    pub fn matches(&self, criteria: &MatchCriteria) -> bool {
        match self {
            RuleCriterion::Tag { name } => criteria.has_tag(name),
            RuleCriterion::Genre { name } => criteria.has_genre(name),
            RuleCriterion::Studio { name } => criteria.has_studio(name),
            RuleCriterion::DateRange { start, end } => {
                *start <= criteria.today && criteria.today <= *end
            }
        }
    }

    pub fn family(&self) -> RuleFamily {
        match self {
            RuleCriterion::Tag { .. } => RuleFamily::Tag,
            RuleCriterion::Genre { .. } => RuleFamily::Genre,
            RuleCriterion::Studio { .. } => RuleFamily::Studio,
            RuleCriterion::DateRange { .. } => RuleFamily::DateRange,
        }
    }
}

impl fmt::Display for RuleCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleCriterion::Tag { name } => write!(f, "tag={name}"),
            RuleCriterion::Genre { name } => write!(f, "genre={name}"),
            RuleCriterion::Studio { name } => write!(f, "studio={name}"),
            RuleCriterion::DateRange { start, end } => write!(f, "date={start}..={end}"),
        }
    }
}

/// Rule families in the order their matches are concatenated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RuleFamily {
    Tag,
    Genre,
    Studio,
    DateRange,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionRule {
    pub intro_id: IntroId,
    pub precedence: i32,
    pub prevalence: u32,
    #[serde(flatten)]
    pub criterion: RuleCriterion,
}

impl SelectionRule {
    pub fn new(intro_id: IntroId, criterion: RuleCriterion) -> Self {
        Self {
            intro_id,
            precedence: 0,
            prevalence: 1,
            criterion,
        }
    }

    pub fn tag(intro_id: IntroId, name: impl Into<String>) -> Self {
        Self::new(intro_id, RuleCriterion::Tag { name: name.into() })
    }

    pub fn genre(intro_id: IntroId, name: impl Into<String>) -> Self {
        Self::new(intro_id, RuleCriterion::Genre { name: name.into() })
    }

    pub fn studio(intro_id: IntroId, name: impl Into<String>) -> Self {
        Self::new(intro_id, RuleCriterion::Studio { name: name.into() })
    }

    pub fn date_range(intro_id: IntroId, start: NaiveDate, end: NaiveDate) -> Self {
        Self::new(intro_id, RuleCriterion::DateRange { start, end })
    }

    pub fn with_precedence(mut self, precedence: i32) -> Self {
        self.precedence = precedence;
        self
    }

    pub fn with_prevalence(mut self, prevalence: u32) -> Self {
        self.prevalence = prevalence;
        self
    }

    pub fn matches(&self, criteria: &MatchCriteria) -> bool {
        self.criterion.matches(criteria)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PruneReport {
    pub rules_removed: usize,
    pub defaults_removed: usize,
}

impl PruneReport {
    pub fn is_empty(&self) -> bool {
        self.rules_removed == 0 && self.defaults_removed == 0
    }
}

/// Selection rules plus the default fallback set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleStore {
    #[serde(default)]
    pub rules: Vec<SelectionRule>,
    #[serde(default)]
    pub default_videos: BTreeSet<IntroId>,
}

impl RuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.default_videos.is_empty()
    }

    pub fn add_rule(&mut self, rule: SelectionRule) {
        self.rules.push(rule);
    }

    /// Removes every rule pointing at `intro_id`, returning how many went.
    pub fn remove_rules_for(&mut self, intro_id: &IntroId) -> usize {
        let before = self.rules.len();
        self.rules.retain(|rule| &rule.intro_id != intro_id);
        before - self.rules.len()
    }

    pub fn add_default(&mut self, intro_id: IntroId) -> bool {
        self.default_videos.insert(intro_id)
    }

    pub fn remove_default(&mut self, intro_id: &IntroId) -> bool {
        self.default_videos.remove(intro_id)
    }

    /// Matching rules in tag, genre, studio, date order; insertion order is
    /// kept within a family.
    pub fn matching<'a>(&'a self, criteria: &MatchCriteria) -> Vec<&'a SelectionRule> {
        let mut matched: Vec<&SelectionRule> = self
            .rules
            .iter()
            .filter(|rule| rule.matches(criteria))
            .collect();
        matched.sort_by_key(|rule| rule.criterion.family());
        matched
    }

    /// Drops rules and default members whose intro is not in `catalog`.
    pub fn prune(&mut self, catalog: &Catalog) -> PruneReport {
        let rules_before = self.rules.len();
        self.rules.retain(|rule| catalog.contains(&rule.intro_id));
        let defaults_before = self.default_videos.len();
        self.default_videos.retain(|id| catalog.contains(id));
        PruneReport {
            rules_removed: rules_before - self.rules.len(),
            defaults_removed: defaults_before - self.default_videos.len(),
        }
    }

    /// Puts the first catalog entry (by path) into the default set when the
    /// catalog was previously empty, or when the catalog just changed and
    /// nothing is configured at all. An unchanged catalog never reseeds, so an
    /// emptied default set stays empty.
    pub fn seed_default(
        &mut self,
        previously_empty: bool,
        catalog_changed: bool,
        catalog: &Catalog,
    ) -> Option<IntroId> {
        if !(previously_empty || (catalog_changed && self.is_empty())) {
            return None;
        }
        let first = catalog.first_by_path()?;
        if self.default_videos.insert(first.id) {
            Some(first.id)
        } else {
            None
        }
    }
}
