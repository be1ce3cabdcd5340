use super::SessionStore;
use crate::errors::StoreError;
use dashmap::DashMap;

/// In-process session store for single-node deployments and tests.
#[derive(Default)]
pub struct LocalStore {
    store: DashMap<String, Vec<u8>>,
}

impl LocalStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl SessionStore for LocalStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.store.get(key).map(|entry| entry.value().clone()))
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.store.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.store.remove(key);
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn supports_cas(&self) -> bool {
        true
    }

    async fn compare_and_set(
        &self,
        key: &str,
        old: Option<&[u8]>,
        new: &[u8],
    ) -> Result<bool, StoreError> {
        match self.store.entry(key.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(mut occupied) => match old {
                Some(old) if occupied.get().as_slice() == old => {
                    occupied.insert(new.to_vec());
                    Ok(true)
                }
                _ => Ok(false),
            },
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                if old.is_some() {
                    return Ok(false);
                }
                vacant.insert(new.to_vec());
                Ok(true)
            }
        }
    }
}
