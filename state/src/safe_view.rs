use crate::staged_view::StagedView;
use std::sync::Arc;
use store::Database;

/// Two-view wrapper giving all-or-nothing transaction trials.
///
/// `try_connect` runs the caller's connect logic against `primary`; on
/// success it mirrors the same call on `backup` and returns the primary's
/// result. On failure, `primary` is replaced by a fresh copy of `backup`
/// so no partial effect of the failed trial is observable.
pub struct SafeView {
    primary: StagedView,
    backup: StagedView,
}

impl SafeView {
    pub fn new(store: Arc<Database>) -> Self {
        Self { primary: StagedView::new(store.clone()), backup: StagedView::new(store) }
    }

    pub fn primary(&self) -> &StagedView {
        &self.primary
    }

    pub fn primary_mut(&mut self) -> &mut StagedView {
        &mut self.primary
    }

    /// Runs `f` against the primary view. On success, `f` is re-run against
    /// the backup to keep it in lockstep; if that mirror run itself fails
    /// (it should not, short of a bug, since it mutates identical starting
    /// state), the backup is instead refreshed from the now-ahead primary.
    /// On primary failure, the primary is discarded and replaced with a
    /// fresh copy of the backup, so the caller observes no staged mutation
    /// from the failed trial.
    pub fn try_connect<R, E, F>(&mut self, mut f: F) -> Result<R, E>
    where
        F: FnMut(&mut StagedView) -> Result<R, E>,
    {
        match f(&mut self.primary) {
            Ok(result) => {
                if f(&mut self.backup).is_err() {
                    self.backup = self.primary.copy();
                }
                Ok(result)
            }
            Err(err) => {
                self.primary = self.backup.copy();
                Err(err)
            }
        }
    }

    /// Flushes the primary to the store and discards the backup's staged
    /// overlay, starting a fresh backup copy from the now-flushed primary.
    pub fn flush_primary(&mut self) -> crate::errors::StateResult<()> {
        self.primary.flush()?;
        self.backup = self.primary.copy();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[derive(Debug, PartialEq, Eq)]
    struct Rejected;

    #[test]
    fn successful_connect_mirrors_onto_backup() {
        let tmp = TempDir::new().unwrap();
        let db = Arc::new(Database::open(tmp.path()).unwrap());
        let mut safe = SafeView::new(db);

        let result: Result<(), Rejected> = safe.try_connect(|view| {
            view.put(store::db::CF_GLOBAL_PARAMS, b"k", b"v".to_vec());
            Ok(())
        });
        assert!(result.is_ok());
        assert_eq!(safe.primary().get(store::db::CF_GLOBAL_PARAMS, b"k").unwrap(), Some(b"v".to_vec()));
        assert_eq!(safe.backup.get(store::db::CF_GLOBAL_PARAMS, b"k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn failed_connect_leaves_no_staged_trace() {
        let tmp = TempDir::new().unwrap();
        let db = Arc::new(Database::open(tmp.path()).unwrap());
        let mut safe = SafeView::new(db);

        let result: Result<(), Rejected> = safe.try_connect(|view| {
            view.put(store::db::CF_GLOBAL_PARAMS, b"k", b"v".to_vec());
            Err(Rejected)
        });
        assert_eq!(result, Err(Rejected));
        assert_eq!(safe.primary().get(store::db::CF_GLOBAL_PARAMS, b"k").unwrap(), None);
    }
}
