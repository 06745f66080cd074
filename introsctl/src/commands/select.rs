use std::fs;
use std::path::PathBuf;

use clap::Args;
use intros_core::MediaItem;

use crate::{AppError, Result};

/// Parameters of `select`: the item about to be played, as JSON.
///
/// The document follows the `MediaItem` shape, for example
/// `{"kind": "episode", "tags": ["noir"], "parent": {"kind": "season"}}`.
#[derive(Args, Debug, Clone)]
pub struct SelectArgs {
    /// Inline JSON description of the item.
    #[arg(long, conflicts_with = "item_file", required_unless_present = "item_file")]
    pub item: Option<String>,
    /// File holding the JSON description of the item.
    #[arg(long)]
    pub item_file: Option<PathBuf>,
}

impl SelectArgs {
    pub fn media_item(&self) -> Result<MediaItem> {
        let json = match (&self.item, &self.item_file) {
            (Some(inline), _) => inline.clone(),
            (None, Some(path)) => fs::read_to_string(path)?,
            (None, None) => {
                return Err(AppError::InvalidArgument(
                    "either --item or --item-file is required".to_string(),
                ))
            }
        };
        Ok(serde_json::from_str(&json)?)
    }
}
