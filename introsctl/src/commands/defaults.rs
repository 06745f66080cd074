use clap::{Args, Subcommand};
use uuid::Uuid;

/// Membership of the default set used when no rule matches.
#[derive(Subcommand, Debug, Clone)]
pub enum DefaultsCommands {
    /// Adds an intro to the default set.
    Add(DefaultArgs),
    /// Removes an intro from the default set.
    Remove(DefaultArgs),
}

#[derive(Args, Debug, Clone)]
pub struct DefaultArgs {
    /// Intro id as listed by `catalog list`.
    pub intro: Uuid,
}
