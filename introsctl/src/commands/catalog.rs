use clap::Subcommand;

#[derive(Subcommand, Debug, Clone)]
pub enum CatalogCommands {
    /// Lists the intros registered in the catalog, ordered by path.
    List,
}
