use std::cell::RefCell;
use std::collections::HashMap;

/// String key-value persistence. Values are opaque to the store; callers own the encoding.
pub trait Store {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
    fn remove(&self, key: &str) -> anyhow::Result<()>;

    /// Writes every entry or none of them.
    fn set_many(&self, entries: &[(&str, String)]) -> anyhow::Result<()>;
}

/// Process-lifetime store. Backs session-scoped keys and unit tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    map: RefCell<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.map.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.map
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.map.borrow_mut().remove(key);
        Ok(())
    }

    fn set_many(&self, entries: &[(&str, String)]) -> anyhow::Result<()> {
        let mut map = self.map.borrow_mut();
        for (k, v) in entries {
            map.insert((*k).to_string(), v.clone());
        }
        Ok(())
    }
}
