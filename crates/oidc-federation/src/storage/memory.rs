//! In-memory statement fetcher.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use crate::entity::EntityId;
use crate::error::FetchError;
use crate::resolve::Fetcher;

type StatementKey = (EntityId, EntityId);

#[derive(Debug, Clone)]
enum Response {
    Statement(String),
    Failure(FetchError),
}

/// A [`Fetcher`] serving statements from memory.
///
/// Failures such as timeouts can be injected per issuer/subject pair. Every
/// request is logged in order, which makes the walk order observable.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    responses: RwLock<HashMap<StatementKey, Response>>,
    requests: Mutex<Vec<StatementKey>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `raw_jws` for the statement `issuer` made about `subject`.
    pub fn insert(&self, issuer: &EntityId, subject: &EntityId, raw_jws: impl Into<String>) {
        self.write(issuer, subject, Response::Statement(raw_jws.into()));
    }

    /// Serve an entity configuration.
    pub fn insert_configuration(&self, entity: &EntityId, raw_jws: impl Into<String>) {
        self.insert(entity, entity, raw_jws);
    }

    /// Fail requests for the statement `issuer` made about `subject`.
    pub fn insert_failure(&self, issuer: &EntityId, subject: &EntityId, error: FetchError) {
        self.write(issuer, subject, Response::Failure(error));
    }

    /// Stop serving a statement.
    pub fn remove(&self, issuer: &EntityId, subject: &EntityId) -> bool {
        self.responses
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&(issuer.clone(), subject.clone()))
            .is_some()
    }

    /// Number of statements and failures registered.
    pub fn len(&self) -> usize {
        self.responses
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every request served so far, in order.
    pub fn requests(&self) -> Vec<(EntityId, EntityId)> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Forget the request log.
    pub fn clear_requests(&self) {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    fn write(&self, issuer: &EntityId, subject: &EntityId, response: Response) {
        self.responses
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert((issuer.clone(), subject.clone()), response);
    }
}

impl Fetcher for MemoryFetcher {
    fn fetch_statement(
        &self,
        issuer: &EntityId,
        subject: &EntityId,
    ) -> Result<String, FetchError> {
        let key = (issuer.clone(), subject.clone());
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(key.clone());

        let responses = self.responses.read().unwrap_or_else(|e| e.into_inner());
        match responses.get(&key) {
            Some(Response::Statement(raw)) => Ok(raw.clone()),
            Some(Response::Failure(error)) => Err(error.clone()),
            None => Err(FetchError::NotFound {
                issuer: issuer.clone(),
                subject: subject.clone(),
            }),
        }
    }
}
