use std::collections::HashMap;

use crate::models::PresenceStatus;

/// Last-known presence per contact. Populated exclusively by the
/// reconciler; entries never expire on their own and only become
/// authoritative again after the next successful cycle.
#[derive(Debug, Default)]
pub struct StatusCache {
    statuses: HashMap<i64, PresenceStatus>,
}

impl StatusCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, contact_id: i64) -> Option<PresenceStatus> {
        self.statuses.get(&contact_id).copied()
    }

    pub fn set(&mut self, contact_id: i64, status: PresenceStatus) {
        self.statuses.insert(contact_id, status);
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_get_set() {
        let mut cache = StatusCache::new();
        assert!(cache.is_empty());
        assert_eq!(cache.get(1), None);

        cache.set(1, PresenceStatus::Away);
        assert_eq!(cache.get(1), Some(PresenceStatus::Away));
        assert_eq!(cache.len(), 1);

        // Later cycles overwrite, they never merge
        cache.set(1, PresenceStatus::Online);
        assert_eq!(cache.get(1), Some(PresenceStatus::Online));
        assert_eq!(cache.len(), 1);
    }
}
