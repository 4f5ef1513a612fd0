use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use crate::credentials::CredentialStore;

/// Persistent key/value store the auth layer keeps its tokens in
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// Apply all entries in one write. `None` removes the key.
    async fn set_all(&self, entries: Vec<(String, Option<String>)>) -> Result<()>;
}

/// `TokenStore` backed by the credentials file
pub struct FileTokenStore {
    inner: Mutex<CredentialStore>,
}

impl FileTokenStore {
    pub fn new(store: CredentialStore) -> Self {
        Self {
            inner: Mutex::new(store),
        }
    }

    /// Open and load the credential file at `path`
    pub fn open(path: std::path::PathBuf) -> Result<Self> {
        let mut store = CredentialStore::new(path);
        store.load()?;
        Ok(Self::new(store))
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.inner.lock().await.get(key).cloned())
    }

    async fn set_all(&self, entries: Vec<(String, Option<String>)>) -> Result<()> {
        let mut store = self.inner.lock().await;
        for (key, value) in entries {
            match value {
                Some(value) => store.set(key, value),
                None => store.remove(&key),
            }
        }
        store.save()
    }
}

/// In-memory `TokenStore`
#[derive(Default)]
pub struct MemoryTokenStore {
    data: Mutex<HashMap<String, String>>,
    writes: Mutex<usize>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let data = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            data: Mutex::new(data),
            writes: Mutex::new(0),
        }
    }

    /// Number of `set_all` calls so far
    pub async fn write_count(&self) -> usize {
        *self.writes.lock().await
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.data.lock().await.get(key).cloned())
    }

    async fn set_all(&self, entries: Vec<(String, Option<String>)>) -> Result<()> {
        let mut data = self.data.lock().await;
        for (key, value) in entries {
            match value {
                Some(value) => data.insert(key, value),
                None => data.remove(&key),
            };
        }
        *self.writes.lock().await += 1;
        Ok(())
    }
}
