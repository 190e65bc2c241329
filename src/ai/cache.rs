use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::db::Repository;
use crate::error::Result;
use crate::models::{AiOperation, CacheRecord};

/// Digest of an operation, its input and the parameters that shape the output.
pub fn content_hash(operation: AiOperation, text: &str, params: &[&str]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(operation.as_str().as_bytes());
    hasher.update(b"|");
    hasher.update(text.as_bytes());
    for param in params {
        hasher.update(b"|");
        hasher.update(param.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Content-addressed store of AI results.
#[derive(Clone)]
pub struct ContentCache {
    repo: Arc<Repository>,
}

impl ContentCache {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }

    pub async fn lookup(&self, hash: &str, operation: AiOperation) -> Result<Option<CacheRecord>> {
        self.repo.get_cache_record(hash, operation).await
    }

    pub async fn store(&self, record: CacheRecord) -> Result<()> {
        self.repo.put_cache_record(record).await
    }
}
