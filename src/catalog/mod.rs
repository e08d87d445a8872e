use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use log::{info, warn};
use parking_lot::RwLock;

use crate::common::{TableId, HEAP_FILE_EXTENSION};
use crate::config::StorageConfig;
use crate::error::{Result, StorageError};
use crate::storage::heap::file::HeapFile;
use crate::tuple::schema::TupleDesc;

pub mod loader;

struct TableEntry {
    file: Arc<HeapFile>,
    name: String,
    primary_key: String,
    /// Position in registry order; entries added later get larger values.
    seq: u64,
}

/// The registry proper. Tables are keyed by id; a secondary index maps every current
/// name to the tables carrying it, ordered by registry position. A name can be carried
/// by more than one table after collision renames.
#[derive(Default)]
struct CatalogIndex {
    next_seq: u64,
    next_anonymous: u64,
    tables: HashMap<TableId, TableEntry>,
    order: BTreeMap<u64, TableId>,
    names: HashMap<String, BTreeMap<u64, TableId>>,
}

impl CatalogIndex {
    fn first_with_name(&self, name: &str) -> Option<TableId> {
        self.names
            .get(name)
            .and_then(|ids| ids.values().next().copied())
    }

    fn all_with_name(&self, name: &str) -> Vec<TableId> {
        self.names
            .get(name)
            .map(|ids| ids.values().copied().collect())
            .unwrap_or_default()
    }

    fn unlink_name(&mut self, name: &str, seq: u64) {
        if let Some(ids) = self.names.get_mut(name) {
            ids.remove(&seq);
            if ids.is_empty() {
                self.names.remove(name);
            }
        }
    }

    /// Gives table `table_id` a new name, keeping both indexes consistent.
    fn rename(&mut self, table_id: TableId, new_name: String) {
        let Some(entry) = self.tables.get_mut(&table_id) else {
            return;
        };
        let old_name = std::mem::replace(&mut entry.name, new_name.clone());
        let seq = entry.seq;
        self.unlink_name(&old_name, seq);
        self.names.entry(new_name).or_default().insert(seq, table_id);
    }

    fn remove(&mut self, table_id: TableId) -> Option<TableEntry> {
        let entry = self.tables.remove(&table_id)?;
        self.order.remove(&entry.seq);
        self.unlink_name(&entry.name, entry.seq);
        Some(entry)
    }

    fn insert(&mut self, file: Arc<HeapFile>, name: String, primary_key: String) {
        let seq = self.next_seq;
        self.next_seq += 1;
        let table_id = file.id();
        self.order.insert(seq, table_id);
        self.names.entry(name.clone()).or_default().insert(seq, table_id);
        self.tables.insert(
            table_id,
            TableEntry {
                file,
                name,
                primary_key,
                seq,
            },
        );
    }

    fn entry(&self, table_id: TableId) -> Result<&TableEntry> {
        self.tables
            .get(&table_id)
            .ok_or(StorageError::NoSuchTableId(table_id))
    }

    fn clear(&mut self) {
        self.tables.clear();
        self.order.clear();
        self.names.clear();
    }
}

/// Registry of all tables known to the process, mapping table ids to their heap file,
/// name and primary key field.
///
/// Lookups take a shared lock, registrations and [`Catalog::clear`] take the exclusive
/// lock, so readers never observe a half-applied rename or replacement.
pub struct Catalog {
    config: StorageConfig,
    index: RwLock<CatalogIndex>,
}

impl Catalog {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            index: RwLock::new(CatalogIndex::default()),
        }
    }

    /// The storage configuration heap files loaded by this catalog are built with.
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Registers `file` under `name`.
    ///
    /// Every table currently called `name` is renamed to `name` followed by its own id,
    /// so the plain name refers to the new table afterwards. A table already registered
    /// for the same file is replaced. A different file whose id happens to be equal to a
    /// registered one is rejected.
    pub fn add_table(&self, file: Arc<HeapFile>, name: &str, primary_key: &str) -> Result<()> {
        let table_id = file.id();
        let mut index = self.index.write();

        if let Ok(existing) = index.entry(table_id) {
            if existing.file.path() != file.path() {
                return Err(StorageError::TableIdCollision {
                    table_id,
                    existing: existing.file.path().to_path_buf(),
                    incoming: file.path().to_path_buf(),
                });
            }
        }

        for colliding in index.all_with_name(name) {
            let renamed = format!("{name}{colliding}");
            warn!("table name {name} is taken, renaming table {colliding} to {renamed}");
            index.rename(colliding, renamed);
        }

        if let Some(replaced) = index.remove(table_id) {
            warn!(
                "table {} ({}) is replaced by {}",
                table_id, replaced.name, name
            );
        }

        info!(
            "added table {} with id {} and schema {}",
            name,
            table_id,
            file.tuple_desc()
        );
        index.insert(file, name.to_owned(), primary_key.to_owned());
        Ok(())
    }

    /// Registers `file` under `name` without a primary key.
    pub fn add_table_with_name(&self, file: Arc<HeapFile>, name: &str) -> Result<()> {
        self.add_table(file, name, "")
    }

    /// Registers `file` under a freshly generated name and returns that name.
    pub fn add_anonymous_table(&self, file: Arc<HeapFile>) -> Result<String> {
        let name = {
            let mut index = self.index.write();
            loop {
                let candidate = format!("table_{}", index.next_anonymous);
                index.next_anonymous += 1;
                if index.first_with_name(&candidate).is_none() {
                    break candidate;
                }
            }
        };
        self.add_table(file, &name, "")?;
        Ok(name)
    }

    /// Id of the first table, in registry order, currently called `name`.
    pub fn get_table_id(&self, name: &str) -> Result<TableId> {
        self.index
            .read()
            .first_with_name(name)
            .ok_or_else(|| StorageError::NoSuchTable(name.to_owned()))
    }

    pub fn get_tuple_desc(&self, table_id: TableId) -> Result<Arc<TupleDesc>> {
        let index = self.index.read();
        Ok(Arc::clone(index.entry(table_id)?.file.tuple_desc()))
    }

    pub fn get_database_file(&self, table_id: TableId) -> Result<Arc<HeapFile>> {
        let index = self.index.read();
        Ok(Arc::clone(&index.entry(table_id)?.file))
    }

    /// Name of the primary key field, empty if the table has none.
    pub fn get_primary_key(&self, table_id: TableId) -> Result<String> {
        let index = self.index.read();
        Ok(index.entry(table_id)?.primary_key.clone())
    }

    pub fn get_table_name(&self, table_id: TableId) -> Result<String> {
        let index = self.index.read();
        Ok(index.entry(table_id)?.name.clone())
    }

    /// Ids of all registered tables in registry order, as of the time of the call.
    pub fn table_id_iterator(&self) -> std::vec::IntoIter<TableId> {
        let index = self.index.read();
        index.order.values().copied().collect::<Vec<_>>().into_iter()
    }

    /// Names of all registered tables in registry order.
    pub fn table_names(&self) -> Vec<String> {
        let index = self.index.read();
        index
            .order
            .values()
            .filter_map(|table_id| index.tables.get(table_id))
            .map(|entry| entry.name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.index.read().tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops all tables. Heap files already handed out stay usable.
    pub fn clear(&self) {
        self.index.write().clear();
    }

    /// Reads a schema description (see [`loader::parse_schema`]) and registers one table
    /// per line, backed by `<name>.dat` next to the schema file. Nothing is registered if
    /// any line is malformed. Returns the ids of the added tables in file order.
    pub fn load_schema(&self, path: impl AsRef<Path>) -> Result<Vec<TableId>> {
        let path = std::path::absolute(path.as_ref())?;
        let text = std::fs::read_to_string(&path)?;
        let tables = loader::parse_schema(&text)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("/"));

        let mut table_ids = Vec::with_capacity(tables.len());
        for table in tables {
            let file_path = base_dir.join(format!("{}.{}", table.name, HEAP_FILE_EXTENSION));
            let file = Arc::new(HeapFile::new(file_path, table.tuple_desc, &self.config)?);
            table_ids.push(file.id());
            self.add_table(file, &table.name, &table.primary_key)?;
        }
        info!(
            "loaded {} tables from {}",
            table_ids.len(),
            path.display()
        );
        Ok(table_ids)
    }
}
