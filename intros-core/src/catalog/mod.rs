pub mod error;
pub mod models;
pub mod store;

pub use error::{CatalogError, CatalogResult};
pub use models::{derive_display_name, Catalog, IntroEntry, IntroId, PROVIDER_KEY};
pub use store::{CatalogStore, MemoryCatalogStore, SqliteCatalogStore, SqliteCatalogStoreBuilder};
