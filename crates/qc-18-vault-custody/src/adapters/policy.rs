//! In-memory administrative overrides.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::config::PolicyKey;
use crate::error::CustodyResult;
use crate::ports::outbound::PolicyStore;

pub struct InMemoryPolicyStore {
    values: RwLock<BTreeMap<PolicyKey, i64>>,
}

impl InMemoryPolicyStore {
    pub fn new() -> Self {
        Self {
            values: RwLock::new(BTreeMap::new()),
        }
    }
}

impl Default for InMemoryPolicyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyStore for InMemoryPolicyStore {
    fn get(&self, key: &PolicyKey) -> CustodyResult<Option<i64>> {
        Ok(self.values.read().get(key).copied())
    }

    fn set(&self, key: PolicyKey, value: i64) -> CustodyResult<()> {
        self.values.write().insert(key, value);
        Ok(())
    }
}
