use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use uuid::Uuid;

use crate::sqlite::configure_connection;

use super::models::{IntroEntry, IntroId};
use super::{CatalogError, CatalogResult};

const CATALOG_SCHEMA: &str = include_str!("../../../sql/catalog.sql");

/// Library catalog holding the registered intro entries.
///
/// The reconciler only talks to the catalog through this trait: lookups by
/// provider tag, inserts and deletes.
pub trait CatalogStore: Send + Sync {
    /// Returns every entry carrying the provider tag `key`. When `value` is
    /// `None` any value matches.
    fn find_by_tag(&self, key: &str, value: Option<&str>) -> CatalogResult<Vec<IntroEntry>>;

    fn create(&self, entry: &IntroEntry) -> CatalogResult<IntroId>;

    /// Deleting an unknown id is a no-op.
    fn delete(&self, id: IntroId) -> CatalogResult<()>;
}

#[derive(Debug, Clone)]
pub struct SqliteCatalogStoreBuilder {
    path: Option<PathBuf>,
    read_only: bool,
    create_if_missing: bool,
}

impl Default for SqliteCatalogStoreBuilder {
    fn default() -> Self {
        Self {
            path: None,
            read_only: false,
            create_if_missing: true,
        }
    }
}

impl SqliteCatalogStoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn read_only(mut self, value: bool) -> Self {
        self.read_only = value;
        self
    }

    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    pub fn build(self) -> CatalogResult<SqliteCatalogStore> {
        let path = self.path.ok_or(CatalogError::MissingStore)?;
        let mut flags = if self.read_only {
            OpenFlags::SQLITE_OPEN_READ_ONLY
        } else {
            OpenFlags::SQLITE_OPEN_READ_WRITE
        };

        if !self.read_only && self.create_if_missing {
            flags |= OpenFlags::SQLITE_OPEN_CREATE;
        }

        Ok(SqliteCatalogStore { path, flags })
    }
}

#[derive(Debug, Clone)]
pub struct SqliteCatalogStore {
    path: PathBuf,
    flags: OpenFlags,
}

impl SqliteCatalogStore {
    pub fn builder() -> SqliteCatalogStoreBuilder {
        SqliteCatalogStoreBuilder::new()
    }

    pub fn new(path: impl AsRef<Path>) -> CatalogResult<Self> {
        SqliteCatalogStoreBuilder::new().path(path).build()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> CatalogResult<Connection> {
        let conn = Connection::open_with_flags(&self.path, self.flags).map_err(|source| {
            CatalogError::OpenDatabase {
                path: self.path.clone(),
                source,
            }
        })?;
        configure_connection(&conn).map_err(|source| CatalogError::OpenDatabase {
            path: self.path.clone(),
            source,
        })?;
        Ok(conn)
    }

    pub fn initialize(&self) -> CatalogResult<()> {
        let conn = self.open()?;
        conn.execute_batch(CATALOG_SCHEMA)?;
        Ok(())
    }

    pub fn fetch_by_id(&self, id: IntroId) -> CatalogResult<Option<IntroEntry>> {
        let conn = self.open()?;
        let row = conn
            .query_row(
                "SELECT id, path, name FROM intro_items WHERE id = ?1",
                [id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Vec<u8>>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;
        match row {
            Some(raw) => Ok(Some(hydrate(&conn, raw)?)),
            None => Ok(None),
        }
    }

    pub fn count(&self) -> CatalogResult<usize> {
        let conn = self.open()?;
        let total: i64 = conn.query_row("SELECT COUNT(*) FROM intro_items", [], |row| row.get(0))?;
        Ok(total as usize)
    }
}

impl CatalogStore for SqliteCatalogStore {
    fn find_by_tag(&self, key: &str, value: Option<&str>) -> CatalogResult<Vec<IntroEntry>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT i.id, i.path, i.name FROM intro_items i
             WHERE EXISTS (
                SELECT 1 FROM intro_provider_ids p
                WHERE p.item_id = i.id AND p.key = ?1 AND (?2 IS NULL OR p.value = ?2)
             )
             ORDER BY i.path ASC, i.id ASC",
        )?;
        let rows = stmt
            .query_map(params![key, value], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Vec<u8>>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(|raw| hydrate(&conn, raw)).collect()
    }

    fn create(&self, entry: &IntroEntry) -> CatalogResult<IntroId> {
        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        let path = path_to_bytes(&entry.path);
        let existing: Option<String> = tx
            .query_row(
                "SELECT id FROM intro_items WHERE path = ?1 LIMIT 1",
                [&path],
                |row| row.get(0),
            )
            .optional()?;
        if existing.is_some() {
            return Err(CatalogError::DuplicatePath {
                path: entry.path.clone(),
            });
        }
        tx.execute(
            "INSERT INTO intro_items (id, path, name) VALUES (?1, ?2, ?3)",
            params![entry.id.to_string(), path, &entry.name],
        )?;
        for (key, value) in &entry.provider_ids {
            tx.execute(
                "INSERT INTO intro_provider_ids (item_id, key, value) VALUES (?1, ?2, ?3)",
                params![entry.id.to_string(), key, value],
            )?;
        }
        tx.commit()?;
        Ok(entry.id)
    }

    fn delete(&self, id: IntroId) -> CatalogResult<()> {
        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM intro_provider_ids WHERE item_id = ?1",
            [id.to_string()],
        )?;
        tx.execute("DELETE FROM intro_items WHERE id = ?1", [id.to_string()])?;
        tx.commit()?;
        Ok(())
    }
}

/// Raw bytes of a path, so names that are not valid UTF-8 survive a round
/// trip through the database unchanged.
#[cfg(unix)]
fn path_to_bytes(path: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes().to_vec()
}

#[cfg(not(unix))]
fn path_to_bytes(path: &Path) -> Vec<u8> {
    path.to_string_lossy().into_owned().into_bytes()
}

#[cfg(unix)]
fn path_from_bytes(bytes: Vec<u8>) -> PathBuf {
    use std::ffi::OsString;
    use std::os::unix::ffi::OsStringExt;
    PathBuf::from(OsString::from_vec(bytes))
}

#[cfg(not(unix))]
fn path_from_bytes(bytes: Vec<u8>) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(&bytes).into_owned())
}

fn hydrate(conn: &Connection, (id, path, name): (String, Vec<u8>, String)) -> CatalogResult<IntroEntry> {
    let parsed = Uuid::parse_str(&id).map_err(|_| CatalogError::CorruptId { id: id.clone() })?;
    let mut stmt = conn.prepare("SELECT key, value FROM intro_provider_ids WHERE item_id = ?1")?;
    let provider_ids = stmt
        .query_map([&id], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
        .collect::<Result<BTreeMap<_, _>, _>>()?;
    Ok(IntroEntry {
        id: parsed,
        path: path_from_bytes(path),
        name,
        provider_ids,
    })
}

/// Catalog kept in process memory. Used by embedders without a database
/// and throughout the tests.
#[derive(Debug, Default)]
pub struct MemoryCatalogStore {
    entries: Mutex<BTreeMap<IntroId, IntroEntry>>,
}

impl MemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CatalogStore for MemoryCatalogStore {
    fn find_by_tag(&self, key: &str, value: Option<&str>) -> CatalogResult<Vec<IntroEntry>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let mut found: Vec<IntroEntry> = entries
            .values()
            .filter(|entry| match (entry.provider_id(key), value) {
                (Some(_), None) => true,
                (Some(actual), Some(expected)) => actual == expected,
                (None, _) => false,
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| a.path.cmp(&b.path).then_with(|| a.id.cmp(&b.id)));
        Ok(found)
    }

    fn create(&self, entry: &IntroEntry) -> CatalogResult<IntroId> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.values().any(|existing| existing.path == entry.path) {
            return Err(CatalogError::DuplicatePath {
                path: entry.path.clone(),
            });
        }
        entries.insert(entry.id, entry.clone());
        Ok(entry.id)
    }

    fn delete(&self, id: IntroId) -> CatalogResult<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::PROVIDER_KEY;
    use tempfile::TempDir;

    fn sqlite_store(dir: &TempDir) -> SqliteCatalogStore {
        let store = SqliteCatalogStore::builder()
            .path(dir.path().join("catalog.sqlite"))
            .create_if_missing(true)
            .build()
            .unwrap();
        store.initialize().unwrap();
        store
    }

    #[test]
    fn sqlite_create_find_delete() {
        let dir = TempDir::new().unwrap();
        let store = sqlite_store(&dir);
        let first = IntroEntry::discovered("/intros/a.mp4");
        let second = IntroEntry::discovered("/intros/b.mp4");
        store.create(&second).unwrap();
        store.create(&first).unwrap();

        let all = store.find_by_tag(PROVIDER_KEY, None).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0], first);

        let exact = store
            .find_by_tag(PROVIDER_KEY, Some("/intros/b.mp4"))
            .unwrap();
        assert_eq!(exact, vec![second.clone()]);

        store.delete(second.id).unwrap();
        assert_eq!(store.count().unwrap(), 1);
        assert!(store.fetch_by_id(second.id).unwrap().is_none());
        // deleting twice is harmless
        store.delete(second.id).unwrap();
    }

    #[test]
    fn sqlite_rejects_duplicate_paths() {
        let dir = TempDir::new().unwrap();
        let store = sqlite_store(&dir);
        store.create(&IntroEntry::discovered("/intros/a.mp4")).unwrap();
        let err = store
            .create(&IntroEntry::discovered("/intros/a.mp4"))
            .unwrap_err();
        assert!(matches!(err, CatalogError::DuplicatePath { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn sqlite_keeps_non_utf8_paths_exact() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = TempDir::new().unwrap();
        let store = sqlite_store(&dir);
        // Both names decode to the same lossy string.
        let first = IntroEntry::discovered(Path::new(OsStr::from_bytes(b"/intros/a\xff.mp4")));
        let second = IntroEntry::discovered(Path::new(OsStr::from_bytes(b"/intros/a\xfe.mp4")));
        store.create(&first).unwrap();
        store.create(&second).unwrap();

        assert_eq!(store.fetch_by_id(first.id).unwrap().unwrap().path, first.path);
        assert_eq!(store.fetch_by_id(second.id).unwrap().unwrap().path, second.path);
        assert_eq!(store.find_by_tag(PROVIDER_KEY, None).unwrap().len(), 2);
    }

    #[test]
    fn memory_store_filters_on_tag() {
        let store = MemoryCatalogStore::new();
        let tagged = IntroEntry::discovered("/intros/a.mp4");
        let mut untagged = IntroEntry::discovered("/intros/b.mp4");
        untagged.provider_ids.clear();
        store.create(&tagged).unwrap();
        store.create(&untagged).unwrap();

        let found = store.find_by_tag(PROVIDER_KEY, None).unwrap();
        assert_eq!(found, vec![tagged]);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn missing_path_is_reported() {
        let err = SqliteCatalogStoreBuilder::new().build().unwrap_err();
        assert!(matches!(err, CatalogError::MissingStore));
    }
}
