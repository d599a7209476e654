use crate::error::TrieError;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

/// Storage backend for trie nodes: raw node RLP keyed by node hash.
pub trait TrieDB: Send + Sync {
    fn get(&self, key: Vec<u8>) -> Result<Option<Vec<u8>>, TrieError>;
    fn put(&self, key: Vec<u8>, value: Vec<u8>) -> Result<(), TrieError>;
    fn put_batch(&self, key_values: Vec<(Vec<u8>, Vec<u8>)>) -> Result<(), TrieError>;
}

/// Hash-map backed [`TrieDB`], shared behind a mutex so several handles can
/// read and write the same table.
pub struct InMemoryTrieDB {
    nodes: Arc<Mutex<HashMap<Vec<u8>, Vec<u8>>>>,
}

impl InMemoryTrieDB {
    pub fn new(nodes: Arc<Mutex<HashMap<Vec<u8>, Vec<u8>>>>) -> Self {
        Self { nodes }
    }

    pub fn new_empty() -> Self {
        Self {
            nodes: Default::default(),
        }
    }

    fn table(&self) -> Result<MutexGuard<'_, HashMap<Vec<u8>, Vec<u8>>>, TrieError> {
        self.nodes.lock().map_err(|_| TrieError::LockError)
    }
}

impl TrieDB for InMemoryTrieDB {
    fn get(&self, key: Vec<u8>) -> Result<Option<Vec<u8>>, TrieError> {
        Ok(self.table()?.get(&key).cloned())
    }

    fn put(&self, key: Vec<u8>, value: Vec<u8>) -> Result<(), TrieError> {
        self.put_batch(vec![(key, value)])
    }

    fn put_batch(&self, key_values: Vec<(Vec<u8>, Vec<u8>)>) -> Result<(), TrieError> {
        self.table()?.extend(key_values);
        Ok(())
    }
}
