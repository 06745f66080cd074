use std::path::PathBuf;

use rand::seq::IteratorRandom;
use rand::Rng;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::catalog::{Catalog, IntroId};
use crate::criteria::MatchCriteria;
use crate::rules::{RuleStore, SelectionRule};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("selected intro {intro_id} not found in library")]
    NotFound { intro_id: IntroId },
}

pub type SelectionResult<T> = Result<T, SelectionError>;

/// The intro handed back to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntroSelection {
    pub item_id: IntroId,
    pub path: PathBuf,
}

/// Rules matching `criteria` whose intro is still in the catalog, in
/// tag, genre, studio, date order.
pub fn candidate_rules<'a>(
    rules: &'a RuleStore,
    criteria: &MatchCriteria,
    catalog: &Catalog,
) -> Vec<&'a SelectionRule> {
    rules
        .matching(criteria)
        .into_iter()
        .filter(|rule| catalog.contains(&rule.intro_id))
        .collect()
}

/// Keeps only the candidates sharing the highest precedence.
pub fn winning_set<'a>(candidates: &[&'a SelectionRule]) -> Vec<&'a SelectionRule> {
    let Some(highest) = candidates.iter().map(|rule| rule.precedence).max() else {
        return Vec::new();
    };
    candidates
        .iter()
        .copied()
        .filter(|rule| rule.precedence == highest)
        .collect()
}

/// Prevalence-weighted draw over `winners`.
///
/// A uniform draw in `[0, total)` is walked down the list; when every
/// prevalence is zero the last rule is returned.
pub fn weighted_pick<'a, R>(winners: &[&'a SelectionRule], rng: &mut R) -> Option<&'a SelectionRule>
where
    R: Rng + ?Sized,
{
    let last = *winners.last()?;
    let total: u64 = winners.iter().map(|rule| u64::from(rule.prevalence)).sum();
    if total == 0 {
        return Some(last);
    }

    let mut index = rng.gen_range(0..total);
    for rule in winners {
        let weight = u64::from(rule.prevalence);
        if index < weight {
            return Some(*rule);
        }
        index -= weight;
    }
    Some(last)
}

/// Picks one intro for `criteria`.
///
/// `Ok(None)` means nothing matched and the default set is empty.
pub fn select<R>(
    criteria: &MatchCriteria,
    rules: &RuleStore,
    catalog: &Catalog,
    rng: &mut R,
) -> SelectionResult<Option<IntroSelection>>
where
    R: Rng + ?Sized,
{
    let candidates = candidate_rules(rules, criteria, catalog);

    let chosen = if candidates.is_empty() {
        let picked = rules.default_videos.iter().choose(rng).copied();
        debug!(
            target: "intros.selection",
            defaults = rules.default_videos.len(),
            picked = ?picked,
            "no rule matched, using default set"
        );
        picked
    } else {
        let winners = winning_set(&candidates);
        let picked = weighted_pick(&winners, rng);
        if let Some(rule) = picked {
            debug!(
                target: "intros.selection",
                candidates = candidates.len(),
                winners = winners.len(),
                precedence = rule.precedence,
                shares = ?prevalence_shares(&winners),
                criterion = %rule.criterion,
                "weighted draw over winning set"
            );
        }
        picked.map(|rule| rule.intro_id)
    };

    let Some(intro_id) = chosen else {
        return Ok(None);
    };
    let entry = catalog
        .get(&intro_id)
        .ok_or(SelectionError::NotFound { intro_id })?;
    info!(
        target: "intros.selection",
        intro_id = %entry.id,
        name = %entry.name,
        path = %entry.path.display(),
        "selected intro"
    );
    Ok(Some(IntroSelection {
        item_id: entry.id,
        path: entry.path.clone(),
    }))
}

/// Selection probability of each rule in a winning set, for logging.
pub fn prevalence_shares(winners: &[&SelectionRule]) -> Vec<f64> {
    if winners.is_empty() {
        return Vec::new();
    }
    let total: u64 = winners.iter().map(|rule| u64::from(rule.prevalence)).sum();
    if total == 0 {
        let mut shares = vec![0.0; winners.len()];
        if let Some(last) = shares.last_mut() {
            *last = 1.0;
        }
        return shares;
    }
    winners
        .iter()
        .map(|rule| f64::from(rule.prevalence) / total as f64)
        .collect()
}

/// Derives a reproducible per-request seed from a configured global seed and
/// the request sequence number. Uses a fixed splitmix64 mix so the sequence
/// of seeds does not depend on the toolchain.
pub fn request_seed(global_seed: u64, sequence: u64) -> u64 {
    splitmix64(global_seed ^ splitmix64(sequence))
}

fn splitmix64(value: u64) -> u64 {
    let mut z = value.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
