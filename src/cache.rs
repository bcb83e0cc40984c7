//! Single-slot store for the latest accepted reading.

use crate::domain::Reading;
use parking_lot::RwLock;
use std::sync::Arc;

/// Holds exactly one reading; every accept replaces it.
///
/// Arrival order wins: an accepted reading replaces the current one even if
/// its timestamp is older.
pub struct StateCache {
    current: RwLock<Arc<Reading>>,
}

impl StateCache {
    /// starts with `Reading::initial()` so readers never see an empty slot
    pub fn new() -> Self {
        Self::with_reading(Reading::initial())
    }

    pub fn with_reading(reading: Reading) -> Self {
        Self {
            current: RwLock::new(Arc::new(reading)),
        }
    }

    pub fn accept(&self, reading: Reading) -> Arc<Reading> {
        let reading = Arc::new(reading);
        *self.current.write() = Arc::clone(&reading);
        reading
    }

    pub fn snapshot(&self) -> Arc<Reading> {
        Arc::clone(&self.current.read())
    }
}

impl Default for StateCache {
    fn default() -> Self {
        Self::new()
    }
}
