use crate::errors::{StoreError, StoreResult};
use parking_lot::RwLock;
use rocksdb::{ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteBatch, DB};
use std::path::Path;
use std::sync::Arc;

pub const CF_PROFILES: &str = "profiles";
pub const CF_BALANCES: &str = "balances";
pub const CF_ORDERS_BY_ID: &str = "orders_by_id";
pub const CF_ORDERS_MATCH_INDEX: &str = "orders_match_index";
pub const CF_ORDERS_BY_TRANSACTOR: &str = "orders_by_transactor";
pub const CF_ACCESS_GROUPS: &str = "access_groups";
pub const CF_ACCESS_GROUP_MEMBERS: &str = "access_group_members";
pub const CF_ACCESS_GROUP_MEMBER_ENUM_INDEX: &str = "access_group_member_enum_index";
pub const CF_DERIVED_KEYS: &str = "derived_keys";
pub const CF_GLOBAL_PARAMS: &str = "global_params";
pub const CF_EPOCH: &str = "epoch";
pub const CF_UTXOS: &str = "utxos";

pub const ALL_COLUMN_FAMILIES: &[&str] = &[
    CF_PROFILES,
    CF_BALANCES,
    CF_ORDERS_BY_ID,
    CF_ORDERS_MATCH_INDEX,
    CF_ORDERS_BY_TRANSACTOR,
    CF_ACCESS_GROUPS,
    CF_ACCESS_GROUP_MEMBERS,
    CF_ACCESS_GROUP_MEMBER_ENUM_INDEX,
    CF_DERIVED_KEYS,
    CF_GLOBAL_PARAMS,
    CF_EPOCH,
    CF_UTXOS,
];

/// A set of puts and deletes applied to the store atomically by
/// [`Database::commit`]. `Staged View` flush builds exactly one of these
/// per block.
#[derive(Default)]
pub struct Batch(WriteBatch);

impl Batch {
    pub fn put(&mut self, cf_name: &str, key: &[u8], value: &[u8]) {
        self.0.put(cf_qualified_key(cf_name, key), value);
    }

    pub fn delete(&mut self, cf_name: &str, key: &[u8]) {
        self.0.delete(cf_qualified_key(cf_name, key));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// rocksdb's `WriteBatch` doesn't expose a `put_cf`-capable builder without
/// holding the column family handle alive across the call, so puts/deletes
/// are namespaced into a single CF-qualified key instead of relying on
/// per-entry column family handles inside the batch itself.
fn cf_qualified_key(cf_name: &str, key: &[u8]) -> Vec<u8> {
    let mut qualified = Vec::with_capacity(cf_name.len() + 1 + key.len());
    qualified.extend_from_slice(cf_name.as_bytes());
    qualified.push(0);
    qualified.extend_from_slice(key);
    qualified
}

/// Uniform read/write/range-scan over the durable store. Column families
/// partition the entities by type; a single `commit` applies a batch of
/// puts and deletes atomically.
pub struct Database {
    db: Arc<DB>,
    is_closed: Arc<RwLock<bool>>,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_max_open_files(10000);
        opts.set_keep_log_file_num(10);
        opts.set_max_background_jobs(4);
        opts.set_bytes_per_sync(1048576);
        opts.increase_parallelism(4);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts.set_write_buffer_size(64 * 1024 * 1024);
        opts.set_max_write_buffer_number(3);

        let cf_descriptors: Vec<_> =
            ALL_COLUMN_FAMILIES.iter().map(|name| ColumnFamilyDescriptor::new(*name, Options::default())).collect();

        let db = DB::open_cf_descriptors(&opts, path, cf_descriptors)?;
        Ok(Self { db: Arc::new(db), is_closed: Arc::new(RwLock::new(false)) })
    }

    fn check_closed(&self) -> StoreResult<()> {
        if *self.is_closed.read() {
            return Err(StoreError::DatabaseClosed);
        }
        Ok(())
    }

    fn get_cf_handle(&self, cf_name: &str) -> StoreResult<&rocksdb::ColumnFamily> {
        self.db.cf_handle(cf_name).ok_or_else(|| StoreError::ColumnFamilyNotFound(cf_name.to_string()))
    }

    pub fn put(&self, cf_name: &str, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.check_closed()?;
        let cf = self.get_cf_handle(cf_name)?;
        self.db.put_cf(cf, key, value)?;
        Ok(())
    }

    pub fn get(&self, cf_name: &str, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        self.check_closed()?;
        let cf = self.get_cf_handle(cf_name)?;
        Ok(self.db.get_cf(cf, key)?)
    }

    pub fn delete(&self, cf_name: &str, key: &[u8]) -> StoreResult<()> {
        self.check_closed()?;
        let cf = self.get_cf_handle(cf_name)?;
        self.db.delete_cf(cf, key)?;
        Ok(())
    }

    /// Range-scan in ascending byte-lexicographic key order, starting at
    /// (and including) `start_key`. Callers rely on this order matching
    /// semantic order — see `core_types::keys` for how each index's key
    /// encoding is chosen so this holds.
    pub fn scan_from(&self, cf_name: &str, start_key: &[u8]) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
        self.check_closed()?;
        let cf = self.get_cf_handle(cf_name)?;
        let mode = IteratorMode::From(start_key, Direction::Forward);
        let mut out = Vec::new();
        for item in self.db.iterator_cf(cf, mode) {
            let (key, value) = item?;
            out.push((key.to_vec(), value.to_vec()));
        }
        Ok(out)
    }

    pub fn new_batch(&self) -> Batch {
        Batch::default()
    }

    /// Applies a batch of puts and deletes atomically. The `Staged View`
    /// is the only caller; it builds exactly one batch per flush.
    pub fn commit(&self, batch: Batch) -> StoreResult<()> {
        self.check_closed()?;
        self.db.write(batch.0)?;
        Ok(())
    }

    pub fn close(&self) {
        *self.is_closed.write() = true;
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self { db: self.db.clone(), is_closed: self.is_closed.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn put_get_delete_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let db = Database::open(tmp.path()).unwrap();
        db.put(CF_GLOBAL_PARAMS, b"k", b"v").unwrap();
        assert_eq!(db.get(CF_GLOBAL_PARAMS, b"k").unwrap(), Some(b"v".to_vec()));
        db.delete(CF_GLOBAL_PARAMS, b"k").unwrap();
        assert_eq!(db.get(CF_GLOBAL_PARAMS, b"k").unwrap(), None);
    }

    #[test]
    fn scan_from_returns_ascending_order() {
        let tmp = TempDir::new().unwrap();
        let db = Database::open(tmp.path()).unwrap();
        db.put(CF_ORDERS_MATCH_INDEX, b"b", b"2").unwrap();
        db.put(CF_ORDERS_MATCH_INDEX, b"a", b"1").unwrap();
        db.put(CF_ORDERS_MATCH_INDEX, b"c", b"3").unwrap();
        let entries = db.scan_from(CF_ORDERS_MATCH_INDEX, b"a").unwrap();
        let keys: Vec<_> = entries.iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn operations_fail_after_close() {
        let tmp = TempDir::new().unwrap();
        let db = Database::open(tmp.path()).unwrap();
        db.close();
        assert!(matches!(db.get(CF_GLOBAL_PARAMS, b"k"), Err(StoreError::DatabaseClosed)));
    }

    #[test]
    fn batch_commit_is_atomic_with_respect_to_reads() {
        let tmp = TempDir::new().unwrap();
        let db = Database::open(tmp.path()).unwrap();
        let mut batch = db.new_batch();
        batch.put(CF_BALANCES, b"a", b"1");
        batch.put(CF_BALANCES, b"b", b"2");
        db.commit(batch).unwrap();
        assert_eq!(db.get(CF_BALANCES, b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(db.get(CF_BALANCES, b"b").unwrap(), Some(b"2".to_vec()));
    }
}
