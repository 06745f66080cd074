use chrono::NaiveDate;
use clap::{Args, Subcommand, ValueEnum};
use intros_core::SelectionRule;
use uuid::Uuid;

use crate::{AppError, Result};

#[derive(Subcommand, Debug, Clone)]
pub enum RulesCommands {
    /// Lists selection rules in evaluation order.
    List,
    /// Adds a selection rule for an intro.
    Add(RuleAddArgs),
    /// Removes every rule pointing at an intro.
    Remove(RuleRemoveArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RuleKind {
    Tag,
    Genre,
    Studio,
    DateRange,
}

/// Parameters of `rules add`.
#[derive(Args, Debug, Clone)]
pub struct RuleAddArgs {
    /// Criterion family.
    #[arg(long, value_enum)]
    pub kind: RuleKind,
    /// Tag, genre or studio name (case-insensitive).
    #[arg(long)]
    pub value: Option<String>,
    /// First day of a date range (YYYY-MM-DD).
    #[arg(long)]
    pub start: Option<NaiveDate>,
    /// Last day of a date range, inclusive.
    #[arg(long)]
    pub end: Option<NaiveDate>,
    /// Intro to play when the rule wins.
    #[arg(long)]
    pub intro: Uuid,
    /// Higher precedence always wins over lower.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub precedence: i32,
    /// Relative weight among rules sharing the winning precedence.
    #[arg(long, default_value_t = 1)]
    pub prevalence: u32,
}

impl RuleAddArgs {
    pub fn to_rule(&self) -> Result<SelectionRule> {
        let rule = match self.kind {
            RuleKind::Tag => SelectionRule::tag(self.intro, self.required_value()?),
            RuleKind::Genre => SelectionRule::genre(self.intro, self.required_value()?),
            RuleKind::Studio => SelectionRule::studio(self.intro, self.required_value()?),
            RuleKind::DateRange => {
                let (Some(start), Some(end)) = (self.start, self.end) else {
                    return Err(AppError::InvalidArgument(
                        "date-range rules need --start and --end".to_string(),
                    ));
                };
                if start > end {
                    return Err(AppError::InvalidArgument(format!(
                        "date range starts after it ends ({start} > {end})"
                    )));
                }
                SelectionRule::date_range(self.intro, start, end)
            }
        };
        Ok(rule
            .with_precedence(self.precedence)
            .with_prevalence(self.prevalence))
    }

    fn required_value(&self) -> Result<&str> {
        match self.value.as_deref().map(str::trim) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(AppError::InvalidArgument(format!(
                "{:?} rules need a non-empty --value",
                self.kind
            ))),
        }
    }
}

/// Parameters of `rules remove`.
#[derive(Args, Debug, Clone)]
pub struct RuleRemoveArgs {
    /// Intro whose rules are removed.
    #[arg(long)]
    pub intro: Uuid,
}
