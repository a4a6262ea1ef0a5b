pub mod store;

pub use store::{FileStore, FlagStoreError, KeyValueStore, MemoryStore};

use std::sync::Arc;
use tracing::warn;

/// Key of the flag that suppresses action execution.
pub const HIDE_ACTIVITY_KEY: &str = "sdsat_hide_activity";

/// Key of the flag that enables debug output.
pub const DEBUG_KEY: &str = "sdsat_debug";

/// Boolean flags persisted in a key/value store.
///
/// Values are the strings "true" and "false". A store read error is logged
/// and treated as an unset flag.
#[derive(Clone)]
pub struct FlagStore {
    store: Arc<dyn KeyValueStore>,
}

impl FlagStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        FlagStore { store }
    }

    pub fn in_memory() -> Self {
        FlagStore::new(Arc::new(MemoryStore::new()))
    }

    /// Whether actions may run. Read before every firing.
    pub fn should_execute_actions(&self) -> bool {
        !self.is_set(HIDE_ACTIVITY_KEY)
    }

    pub fn set_hide_activity(&self, hide: bool) -> Result<(), FlagStoreError> {
        self.store.set(HIDE_ACTIVITY_KEY, bool_str(hide))
    }

    pub fn debug_enabled(&self) -> bool {
        self.is_set(DEBUG_KEY)
    }

    pub fn set_debug_enabled(&self, enabled: bool) -> Result<(), FlagStoreError> {
        self.store.set(DEBUG_KEY, bool_str(enabled))
    }

    fn is_set(&self, key: &str) -> bool {
        match self.store.get(key) {
            Ok(value) => value.as_deref() == Some("true"),
            Err(e) => {
                warn!(key, error = %e, "Failed to read persisted flag");
                false
            }
        }
    }
}

fn bool_str(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>, FlagStoreError> {
            Err(std::io::Error::other("storage disabled").into())
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), FlagStoreError> {
            Err(std::io::Error::other("storage disabled").into())
        }
    }

    #[test]
    fn test_defaults() {
        let flags = FlagStore::in_memory();
        assert!(flags.should_execute_actions());
        assert!(!flags.debug_enabled());
    }

    #[test]
    fn test_hide_activity_round_trip() {
        let flags = FlagStore::in_memory();

        flags.set_hide_activity(true).unwrap();
        assert!(!flags.should_execute_actions());

        flags.set_hide_activity(false).unwrap();
        assert!(flags.should_execute_actions());
    }

    #[test]
    fn test_only_literal_true_sets_flag() {
        let store = Arc::new(MemoryStore::new());
        store.set(DEBUG_KEY, "yes").unwrap();
        store.set(HIDE_ACTIVITY_KEY, "TRUE").unwrap();

        let flags = FlagStore::new(store);
        assert!(!flags.debug_enabled());
        assert!(flags.should_execute_actions());
    }

    #[test]
    fn test_read_errors_are_unset() {
        let flags = FlagStore::new(Arc::new(BrokenStore));
        assert!(flags.should_execute_actions());
        assert!(!flags.debug_enabled());
        assert!(flags.set_debug_enabled(true).is_err());
    }
}
