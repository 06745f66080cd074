use std::path::PathBuf;

use clap::Args;

/// Parameters of `resync`.
#[derive(Args, Debug, Clone, Default)]
pub struct ResyncArgs {
    /// Directory or single file to scan instead of `library.scan_path`.
    #[arg(long)]
    pub path: Option<PathBuf>,
}
