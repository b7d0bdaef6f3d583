//! Test storage lister with operation tracing.
//!
//! Wraps an in-memory backend and records every listing for test assertions.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use cairn_core::error::{Error, Result};
use cairn_core::storage::{MemoryBackend, StorageLister};

/// Record of a listing for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOp {
    /// Storage root that was listed.
    pub root: String,
    /// Prefix that was listed.
    pub prefix: String,
}

/// In-memory storage lister with operation tracing.
#[derive(Debug, Clone, Default)]
pub struct TracingLister {
    objects: Arc<MemoryBackend>,
    operations: Arc<Mutex<Vec<ListOp>>>,
    fail_prefixes: Arc<Mutex<Vec<String>>>,
    latency: Option<Duration>,
}

impl TracingLister {
    /// Creates an empty lister.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a lister whose listings take at least `latency`.
    #[must_use]
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    /// Writes an empty object.
    pub fn put(&self, root: &str, key: impl Into<String>) {
        self.objects
            .put(root, key, Bytes::from_static(b"test"))
            .expect("put");
    }

    /// Removes an object.
    pub fn delete(&self, root: &str, key: &str) {
        self.objects.delete(root, key).expect("delete");
    }

    /// Returns all recorded listings.
    #[must_use]
    pub fn operations(&self) -> Vec<ListOp> {
        self.operations.lock().expect("lock").clone()
    }

    /// Clears recorded listings.
    pub fn clear_operations(&self) {
        self.operations.lock().expect("lock").clear();
    }

    /// Makes listings of prefixes starting with `prefix` fail.
    pub fn inject_failure(&self, prefix: impl Into<String>) {
        self.fail_prefixes.lock().expect("lock").push(prefix.into());
    }

    /// Clears all injected failures.
    pub fn clear_failures(&self) {
        self.fail_prefixes.lock().expect("lock").clear();
    }

    fn check_failure(&self, prefix: &str) -> Result<()> {
        let fail_prefixes = self.fail_prefixes.lock().expect("lock");
        if fail_prefixes.iter().any(|p| prefix.starts_with(p.as_str())) {
            return Err(Error::storage_unavailable(format!(
                "Injected failure for prefix: {prefix}"
            )));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl StorageLister for TracingLister {
    async fn list(&self, root: &str, prefix: &str) -> Result<Vec<String>> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.operations.lock().expect("lock").push(ListOp {
            root: root.to_string(),
            prefix: prefix.to_string(),
        });
        self.check_failure(prefix)?;
        self.objects.list(root, prefix).await
    }
}
