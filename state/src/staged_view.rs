use crate::errors::StateResult;
use std::collections::BTreeMap;
use std::sync::Arc;
use store::Database;

/// In-memory overlay on the [`Database`]. Staged puts and tombstones
/// shadow the store on read; nothing is written through until [`flush`].
///
/// [`flush`]: StagedView::flush
pub struct StagedView {
    store: Arc<Database>,
    // `None` is a staged tombstone; `Some` is a staged write. Keyed by
    // (column family, natural key) so a `BTreeMap` iterates in the same
    // deterministic key order flush must emit.
    staged: BTreeMap<(String, Vec<u8>), Option<Vec<u8>>>,
}

impl StagedView {
    pub fn new(store: Arc<Database>) -> Self {
        Self { store, staged: BTreeMap::new() }
    }

    /// Staged entry wins over the store; a tombstone shadows it entirely.
    pub fn get(&self, cf: &str, key: &[u8]) -> StateResult<Option<Vec<u8>>> {
        if let Some(staged) = self.staged.get(&(cf.to_string(), key.to_vec())) {
            return Ok(staged.clone());
        }
        Ok(self.store.get(cf, key)?)
    }

    pub fn put(&mut self, cf: &str, key: &[u8], value: Vec<u8>) {
        self.staged.insert((cf.to_string(), key.to_vec()), Some(value));
    }

    pub fn delete(&mut self, cf: &str, key: &[u8]) {
        self.staged.insert((cf.to_string(), key.to_vec()), None);
    }

    /// Ascending range scan from `start_key`, merging the staged overlay
    /// over the store and dropping tombstoned keys.
    pub fn scan_from(&self, cf: &str, start_key: &[u8]) -> StateResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> =
            self.store.scan_from(cf, start_key)?.into_iter().collect();

        for ((entry_cf, key), value) in self.staged.range((cf.to_string(), start_key.to_vec())..) {
            if entry_cf != cf {
                break;
            }
            match value {
                Some(v) => {
                    merged.insert(key.clone(), v.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }

        Ok(merged.into_iter().collect())
    }

    /// Ascending range scan of the durable store alone, bypassing the
    /// staged overlay entirely. Used by callers that maintain their own
    /// session cache of store contents (e.g. the access-group enumeration
    /// index) and need to tell "this is what's durably committed" apart
    /// from "this is what the current transaction trial has staged".
    pub fn scan_store_from(&self, cf: &str, start_key: &[u8]) -> StateResult<Vec<(Vec<u8>, Vec<u8>)>> {
        Ok(self.store.scan_from(cf, start_key)?)
    }

    /// Produces an independent view with identical contents, used by the
    /// Safe View for speculative trials.
    pub fn copy(&self) -> Self {
        Self { store: self.store.clone(), staged: self.staged.clone() }
    }

    /// Emits one commit batch in deterministic key order, then clears the
    /// staging maps. Atomic with respect to readers: `store.commit` applies
    /// the whole batch in a single rocksdb write.
    pub fn flush(&mut self) -> StateResult<()> {
        let mut batch = self.store.new_batch();
        for ((cf, key), value) in self.staged.iter() {
            match value {
                Some(v) => batch.put(cf, key, v),
                None => batch.delete(cf, key),
            }
        }
        if !batch.is_empty() {
            self.store.commit(batch)?;
        }
        self.staged.clear();
        Ok(())
    }

    /// Drops all staged mutations without writing them through.
    pub fn discard(&mut self) {
        self.staged.clear();
    }

    /// The store's checksum as it would read after `flush`: every column
    /// family's store contents with the staged overlay merged in. Used by
    /// `chain::driver`'s connect-then-disconnect round-trip check, which
    /// needs to compare state before a block is staged against state after
    /// it is staged and unstaged again, without an intervening flush.
    pub fn checksum(&self) -> StateResult<store::Checksum> {
        let mut checksum = store::Checksum::EMPTY;
        for cf in store::ALL_COLUMN_FAMILIES {
            for (key, value) in self.scan_from(cf, &[])? {
                checksum.fold(cf, &key, &value);
            }
        }
        Ok(checksum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open() -> (TempDir, Arc<Database>) {
        let tmp = TempDir::new().unwrap();
        let db = Arc::new(Database::open(tmp.path()).unwrap());
        (tmp, db)
    }

    #[test]
    fn staged_write_shadows_store_until_flush() {
        let (_tmp, db) = open();
        db.put(store::db::CF_GLOBAL_PARAMS, b"k", b"old").unwrap();

        let mut view = StagedView::new(db.clone());
        view.put(store::db::CF_GLOBAL_PARAMS, b"k", b"new".to_vec());
        assert_eq!(view.get(store::db::CF_GLOBAL_PARAMS, b"k").unwrap(), Some(b"new".to_vec()));
        assert_eq!(db.get(store::db::CF_GLOBAL_PARAMS, b"k").unwrap(), Some(b"old".to_vec()));

        view.flush().unwrap();
        assert_eq!(db.get(store::db::CF_GLOBAL_PARAMS, b"k").unwrap(), Some(b"new".to_vec()));
    }

    #[test]
    fn tombstone_shadows_store_read() {
        let (_tmp, db) = open();
        db.put(store::db::CF_GLOBAL_PARAMS, b"k", b"old").unwrap();

        let mut view = StagedView::new(db.clone());
        view.delete(store::db::CF_GLOBAL_PARAMS, b"k");
        assert_eq!(view.get(store::db::CF_GLOBAL_PARAMS, b"k").unwrap(), None);

        view.flush().unwrap();
        assert_eq!(db.get(store::db::CF_GLOBAL_PARAMS, b"k").unwrap(), None);
    }

    #[test]
    fn discard_drops_staged_mutations() {
        let (_tmp, db) = open();
        let mut view = StagedView::new(db.clone());
        view.put(store::db::CF_GLOBAL_PARAMS, b"k", b"v".to_vec());
        view.discard();
        assert_eq!(view.get(store::db::CF_GLOBAL_PARAMS, b"k").unwrap(), None);
    }

    #[test]
    fn copy_is_independent_of_original() {
        let (_tmp, db) = open();
        let mut view = StagedView::new(db.clone());
        view.put(store::db::CF_GLOBAL_PARAMS, b"k", b"v".to_vec());

        let mut copy = view.copy();
        copy.put(store::db::CF_GLOBAL_PARAMS, b"k", b"other".to_vec());

        assert_eq!(view.get(store::db::CF_GLOBAL_PARAMS, b"k").unwrap(), Some(b"v".to_vec()));
        assert_eq!(copy.get(store::db::CF_GLOBAL_PARAMS, b"k").unwrap(), Some(b"other".to_vec()));
    }

    #[test]
    fn scan_from_merges_staged_overlay_in_order() {
        let (_tmp, db) = open();
        db.put(store::db::CF_ORDERS_MATCH_INDEX, b"a", b"1").unwrap();
        db.put(store::db::CF_ORDERS_MATCH_INDEX, b"c", b"3").unwrap();

        let mut view = StagedView::new(db.clone());
        view.put(store::db::CF_ORDERS_MATCH_INDEX, b"b", b"2".to_vec());
        view.delete(store::db::CF_ORDERS_MATCH_INDEX, b"a");

        let scanned = view.scan_from(store::db::CF_ORDERS_MATCH_INDEX, b"a").unwrap();
        assert_eq!(scanned, vec![(b"b".to_vec(), b"2".to_vec()), (b"c".to_vec(), b"3".to_vec())]);
    }

    #[test]
    fn scan_store_from_ignores_staged_overlay() {
        let (_tmp, db) = open();
        db.put(store::db::CF_ORDERS_MATCH_INDEX, b"a", b"1").unwrap();

        let mut view = StagedView::new(db.clone());
        view.put(store::db::CF_ORDERS_MATCH_INDEX, b"b", b"2".to_vec());
        view.delete(store::db::CF_ORDERS_MATCH_INDEX, b"a");

        let scanned = view.scan_store_from(store::db::CF_ORDERS_MATCH_INDEX, b"a").unwrap();
        assert_eq!(scanned, vec![(b"a".to_vec(), b"1".to_vec())]);
    }
}
