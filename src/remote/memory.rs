//! In-process document store.

use super::{split_path, Collection, RemoteStore, StoreEndpoint};
use crate::error::{Result, SyncError};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// A document tree held in memory.
///
/// Behaves like the remote store: appends get fresh, increasing keys and
/// reads of missing paths come back absent. Taking the store offline makes
/// every request fail with a transport error until it is brought back.
pub struct MemoryStore {
    root: Mutex<Value>,
    next_key: AtomicU64,
    offline: AtomicBool,
    reads: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            root: Mutex::new(Value::Object(Map::new())),
            next_key: AtomicU64::new(1),
            offline: AtomicBool::new(false),
            reads: AtomicU64::new(0),
        }
    }

    /// Simulate losing (or regaining) the connection.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of reads served or refused so far.
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    /// Value stored at `path`, if any.
    pub fn get(&self, path: &str) -> Result<Option<Value>> {
        let segments = split_path(path)?;
        let root = self.root.lock();
        let mut node = &*root;
        for segment in segments {
            match node.get(segment) {
                Some(child) => node = child,
                None => return Ok(None),
            }
        }
        Ok(Some(node.clone()))
    }

    /// Store `value` at `path`, creating parents. `null` deletes.
    pub fn put(&self, path: &str, value: Value) -> Result<()> {
        let segments = split_path(path)?;
        let mut root = self.root.lock();
        let (last, parents) = segments
            .split_last()
            .ok_or_else(|| SyncError::InvalidPath(path.to_string()))?;
        let parent = descend_mut(&mut root, parents);
        if value.is_null() {
            parent.remove(*last);
        } else {
            parent.insert((*last).to_string(), value);
        }
        Ok(())
    }

    /// Store `value` under a fresh key below `path` and return the key.
    pub fn push(&self, path: &str, value: Value) -> Result<String> {
        let key = format!("-{:019}", self.next_key.fetch_add(1, Ordering::SeqCst));
        self.put(&format!("{}/{}", path.trim_end_matches('/'), key), value)?;
        Ok(key)
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(SyncError::Transport("store is offline".to_string()));
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteStore for MemoryStore {
    fn fetch_collection(&self, _endpoint: &StoreEndpoint, path: &str) -> Result<Option<Collection>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        match self.get(path)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Object(map)) => Ok(Some(map)),
            Some(_) => Err(SyncError::protocol(None, format!("{path} is not a collection"))),
        }
    }

    fn append(&self, _endpoint: &StoreEndpoint, path: &str, payload: &Value) -> Result<()> {
        self.check_online()?;
        self.push(path, payload.clone()).map(|_| ())
    }

    fn replace(&self, _endpoint: &StoreEndpoint, path: &str, payload: &Value) -> Result<()> {
        self.check_online()?;
        self.put(path, payload.clone())
    }
}

/// Walk to the object at `segments`, replacing non-objects on the way.
fn descend_mut<'a>(mut node: &'a mut Value, segments: &[&str]) -> &'a mut Map<String, Value> {
    for segment in segments {
        let map = ensure_object(node);
        node = map
            .entry((*segment).to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    ensure_object(node)
}

fn ensure_object(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just replaced with an object"),
    }
}
