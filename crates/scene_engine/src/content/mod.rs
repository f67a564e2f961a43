//! Content access
//!
//! The scene never decodes files itself. Decoded resources come from a
//! [`ContentManager`] keyed by resource path; [`ContentManagerExt::load`]
//! downcasts them to the requested type and [`load_deferred`] runs the load
//! on the worker pool.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::tasks::{TaskHandle, WorkerPool};

/// Content loading errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ContentError {
    /// Nothing is stored under the path
    #[error("Content not found: {0}")]
    NotFound(String),

    /// The stored resource has another type
    #[error("Content '{path}' is not a {expected}")]
    TypeMismatch {
        /// Requested path
        path: String,
        /// Requested type
        expected: &'static str,
    },

    /// The backing store failed
    #[error("Content backend error: {0}")]
    Backend(String),
}

/// Source of decoded resources
pub trait ContentManager: Send + Sync {
    /// Load the resource stored under `path`
    fn load_any(&self, path: &str) -> Result<Arc<dyn Any + Send + Sync>, ContentError>;

    /// Whether `path` is already decoded and resident
    fn is_cached(&self, _path: &str) -> bool {
        false
    }
}

/// Typed loading on top of [`ContentManager`]
pub trait ContentManagerExt {
    /// Load `path` as a `T`
    fn load<T: Any + Send + Sync>(&self, path: &str) -> Result<Arc<T>, ContentError>;
}

impl<M: ContentManager + ?Sized> ContentManagerExt for M {
    fn load<T: Any + Send + Sync>(&self, path: &str) -> Result<Arc<T>, ContentError> {
        self.load_any(path)?
            .downcast::<T>()
            .map_err(|_| ContentError::TypeMismatch {
                path: path.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }
}

/// Result of a load running on the worker pool
pub struct Deferred<T> {
    handle: TaskHandle,
    slot: Arc<Mutex<Option<Result<Arc<T>, ContentError>>>>,
}

impl<T> Deferred<T> {
    /// Whether the load has finished
    pub fn is_ready(&self) -> bool {
        self.handle.is_finished()
    }

    /// Block until the load finishes
    pub fn wait(self) -> Result<Arc<T>, ContentError> {
        self.handle.wait();
        self.slot
            .lock()
            .take()
            .unwrap_or_else(|| Err(ContentError::Backend("deferred load produced no result".to_string())))
    }
}

impl<T> std::fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deferred").field("ready", &self.is_ready()).finish()
    }
}

/// Load `path` on the worker pool
pub fn load_deferred<T: Any + Send + Sync>(
    content: Arc<dyn ContentManager>,
    pool: &WorkerPool,
    path: impl Into<String>,
) -> Deferred<T> {
    let path = path.into();
    let slot = Arc::new(Mutex::new(None));
    let result_slot = Arc::clone(&slot);

    let handle = pool.spawn(move || {
        let result = content.load::<T>(&path);
        if let Err(error) = &result {
            log::warn!("Deferred load of '{}' failed: {}", path, error);
        }
        *result_slot.lock() = Some(result);
    });

    Deferred { handle, slot }
}

/// In-memory content store
#[derive(Default)]
pub struct MemoryContent {
    resources: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl MemoryContent {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a decoded resource under `path`
    pub fn insert<T: Any + Send + Sync>(&mut self, path: impl Into<String>, resource: Arc<T>) {
        self.resources.insert(path.into(), resource);
    }

    /// Number of stored resources
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl ContentManager for MemoryContent {
    fn load_any(&self, path: &str) -> Result<Arc<dyn Any + Send + Sync>, ContentError> {
        self.resources
            .get(path)
            .cloned()
            .ok_or_else(|| ContentError::NotFound(path.to_string()))
    }

    fn is_cached(&self, path: &str) -> bool {
        self.resources.contains_key(path)
    }
}

impl std::fmt::Debug for MemoryContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryContent")
            .field("resources", &self.resources.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_load() {
        let mut content = MemoryContent::new();
        content.insert("answer", Arc::new(42u32));

        assert_eq!(*content.load::<u32>("answer").unwrap(), 42);
        assert!(content.is_cached("answer"));
        assert!(matches!(content.load::<u32>("missing"), Err(ContentError::NotFound(_))));
        assert!(matches!(
            content.load::<String>("answer"),
            Err(ContentError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_deferred_load_on_pool() {
        let mut content = MemoryContent::new();
        content.insert("greeting", Arc::new(String::from("hello")));
        let content: Arc<dyn ContentManager> = Arc::new(content);
        let pool = WorkerPool::new(2);

        let ok = load_deferred::<String>(Arc::clone(&content), &pool, "greeting");
        let missing = load_deferred::<String>(content, &pool, "nope");

        assert_eq!(ok.wait().unwrap().as_str(), "hello");
        assert!(matches!(missing.wait(), Err(ContentError::NotFound(_))));
    }
}
