//! Process-wide list of live tables, consulted only by the low-memory handler. See §5/§9.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::table::PurgeableTable;

/// The global table list. A table registers itself on creation and deregisters on `Drop`
/// (`Destroy`, §6). Modeled as an explicit mutex-guarded registry per the design notes rather
/// than raw global mutable state.
pub struct Registry {
    tables: Mutex<Vec<Weak<dyn PurgeableTable>>>,
}

impl Registry {
    const fn new() -> Self {
        Self {
            tables: Mutex::new(Vec::new()),
        }
    }

    pub fn register(&self, table: Arc<dyn PurgeableTable>) {
        self.tables.lock().push(Arc::downgrade(&table));
    }

    /// Iterates over all live tables, soliciting and releasing memory from each in turn until
    /// `bytes_needed` has been recovered or every table has been asked. Declines entirely
    /// (returns `0`) if the registry lock can't be acquired, matching the tryLock-and-decline
    /// policy in §5.
    pub fn solicit_and_release(&self, bytes_needed: usize) -> usize {
        let Some(tables) = self.tables.try_lock() else {
            return 0;
        };
        let mut reclaimed = 0usize;
        for weak in tables.iter() {
            if reclaimed >= bytes_needed {
                break;
            }
            if let Some(table) = weak.upgrade() {
                reclaimed += table.release(bytes_needed - reclaimed);
            }
        }
        reclaimed
    }

    pub fn prune_dead(&self) {
        if let Some(mut tables) = self.tables.try_lock() {
            tables.retain(|w| w.strong_count() > 0);
        }
    }
}

/// The process-wide registry instance.
pub static REGISTRY: Registry = Registry::new();

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeTable(usize);

    impl PurgeableTable for FakeTable {
        fn release(&self, _bytes_needed: usize) -> usize {
            self.0
        }
    }

    #[test]
    fn register_and_solicit_reaches_live_tables() {
        let registry = Registry::new();
        let table: Arc<dyn PurgeableTable> = Arc::new(FakeTable(100));
        registry.register(table.clone());
        assert_eq!(registry.solicit_and_release(50), 100);
    }

    #[test]
    fn solicit_stops_once_enough_is_reclaimed() {
        let registry = Registry::new();
        let a: Arc<dyn PurgeableTable> = Arc::new(FakeTable(100));
        let b: Arc<dyn PurgeableTable> = Arc::new(FakeTable(100));
        registry.register(a.clone());
        registry.register(b.clone());
        assert_eq!(registry.solicit_and_release(50), 100);
    }

    #[test]
    fn dead_tables_are_pruned_and_skipped() {
        let registry = Registry::new();
        registry.register(Arc::new(FakeTable(100)));
        assert_eq!(registry.tables.lock().len(), 1);

        assert_eq!(registry.solicit_and_release(50), 0);
        registry.prune_dead();
        assert_eq!(registry.tables.lock().len(), 0);
    }
}
