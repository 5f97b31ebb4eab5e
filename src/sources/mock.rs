//! Mock source for testing purposes.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use crate::models::{FetchResult, Identifier, ResolvedLink};
use crate::sources::{Source, SourceError};

/// A mock source that hands out queued fetch outcomes in order.
///
/// Once the queue is empty every fetch fails with
/// [`SourceError::SourceNotFound`].
#[derive(Debug, Default)]
pub struct MockSource {
    responses: Mutex<VecDeque<Result<FetchResult, SourceError>>>,
}

impl MockSource {
    /// Create a new mock source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful fetch.
    pub fn push_fetch(&self, fetched: FetchResult) {
        self.responses().push_back(Ok(fetched));
    }

    /// Queue a failed fetch.
    pub fn push_error(&self, error: SourceError) {
        self.responses().push_back(Err(error));
    }

    /// Number of outcomes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.responses().len()
    }

    fn responses(&self) -> MutexGuard<'_, VecDeque<Result<FetchResult, SourceError>>> {
        self.responses.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Source for MockSource {
    fn id(&self) -> &str {
        "mock"
    }

    fn name(&self) -> &str {
        "Mock Source"
    }

    async fn resolve(&self, identifier: &Identifier) -> Result<ResolvedLink, SourceError> {
        match self.responses().front() {
            Some(Ok(fetched)) => Ok(ResolvedLink::new(&fetched.source_url, identifier.clone())),
            _ => Err(SourceError::SourceNotFound(identifier.to_string())),
        }
    }

    async fn fetch(&self, identifier: &Identifier) -> Result<FetchResult, SourceError> {
        self.responses()
            .pop_front()
            .unwrap_or_else(|| Err(SourceError::SourceNotFound(identifier.to_string())))
    }
}

/// Helper to build a fetch result the way a real source would name it.
pub fn make_fetch(url: &str, bytes: &[u8]) -> FetchResult {
    FetchResult {
        bytes: bytes.to_vec(),
        source_url: url.to_string(),
        generated_name: crate::utils::generate_name(url, bytes),
    }
}
